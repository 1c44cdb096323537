//! Favorites and shopping-cart entries: (user, recipe) presence toggles.
//!
//! Adding relies on the composite primary key of the table: the insert is
//! attempted directly and a unique violation becomes `ServiceError::Conflict`,
//! so two concurrent adds leave exactly one row behind.

use chrono::Utc;
use sea_orm::{
    ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QuerySelect, Set,
};
use std::collections::HashSet;
use tracing::info;

use crate::db::entities::{favorite, recipe, shopping_cart};
use crate::db::services::{ServiceError, is_foreign_key_violation, is_unique_violation};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Membership {
    Favorite,
    ShoppingCart,
}

impl Membership {
    fn already_added(self) -> &'static str {
        match self {
            Membership::Favorite => "Recipe is already in favorites.",
            Membership::ShoppingCart => "Recipe is already in the shopping cart.",
        }
    }

    fn not_present(self) -> &'static str {
        match self {
            Membership::Favorite => "Recipe is not in favorites.",
            Membership::ShoppingCart => "Recipe is not in the shopping cart.",
        }
    }
}

async fn recipe_exists<C: ConnectionTrait>(db: &C, recipe_id: i32) -> Result<recipe::Model, ServiceError> {
    recipe::Entity::find_by_id(recipe_id)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::NotFound("No Recipe matches the given query.".to_string()))
}

/// Adds the recipe and returns it, for the short representation in the response.
pub async fn add<C: ConnectionTrait>(
    db: &C,
    kind: Membership,
    user_id: i32,
    recipe_id: i32,
) -> Result<recipe::Model, ServiceError> {
    let recipe = recipe_exists(db, recipe_id).await?;
    let now = Utc::now();

    let result = match kind {
        Membership::Favorite => {
            favorite::Entity::insert(favorite::ActiveModel {
                user_id: Set(user_id),
                recipe_id: Set(recipe_id),
                created_at: Set(now),
            })
            .exec_without_returning(db)
            .await
        }
        Membership::ShoppingCart => {
            shopping_cart::Entity::insert(shopping_cart::ActiveModel {
                user_id: Set(user_id),
                recipe_id: Set(recipe_id),
                created_at: Set(now),
            })
            .exec_without_returning(db)
            .await
        }
    };

    match result {
        Ok(_) => {
            info!(user_id, recipe_id, membership = ?kind, "Recipe added.");
            Ok(recipe)
        }
        Err(e) if is_unique_violation(&e) => Err(ServiceError::Conflict(kind.already_added().to_string())),
        // The recipe vanished between the lookup and the insert.
        Err(e) if is_foreign_key_violation(&e) => Err(ServiceError::NotFound(
            "No Recipe matches the given query.".to_string(),
        )),
        Err(e) => Err(e.into()),
    }
}

pub async fn remove<C: ConnectionTrait>(
    db: &C,
    kind: Membership,
    user_id: i32,
    recipe_id: i32,
) -> Result<(), ServiceError> {
    recipe_exists(db, recipe_id).await?;

    let rows_affected = match kind {
        Membership::Favorite => {
            favorite::Entity::delete_many()
                .filter(favorite::Column::UserId.eq(user_id))
                .filter(favorite::Column::RecipeId.eq(recipe_id))
                .exec(db)
                .await?
                .rows_affected
        }
        Membership::ShoppingCart => {
            shopping_cart::Entity::delete_many()
                .filter(shopping_cart::Column::UserId.eq(user_id))
                .filter(shopping_cart::Column::RecipeId.eq(recipe_id))
                .exec(db)
                .await?
                .rows_affected
        }
    };

    if rows_affected == 0 {
        return Err(ServiceError::Conflict(kind.not_present().to_string()));
    }
    info!(user_id, recipe_id, membership = ?kind, "Recipe removed.");
    Ok(())
}

/// The subset of `recipe_ids` the user has marked.
pub async fn marked_recipe_ids<C: ConnectionTrait>(
    db: &C,
    kind: Membership,
    user_id: i32,
    recipe_ids: &[i32],
) -> Result<HashSet<i32>, ServiceError> {
    if recipe_ids.is_empty() {
        return Ok(HashSet::new());
    }
    let ids: Vec<i32> = match kind {
        Membership::Favorite => {
            favorite::Entity::find()
                .select_only()
                .column(favorite::Column::RecipeId)
                .filter(favorite::Column::UserId.eq(user_id))
                .filter(favorite::Column::RecipeId.is_in(recipe_ids.to_vec()))
                .into_tuple::<i32>()
                .all(db)
                .await?
        }
        Membership::ShoppingCart => {
            shopping_cart::Entity::find()
                .select_only()
                .column(shopping_cart::Column::RecipeId)
                .filter(shopping_cart::Column::UserId.eq(user_id))
                .filter(shopping_cart::Column::RecipeId.is_in(recipe_ids.to_vec()))
                .into_tuple::<i32>()
                .all(db)
                .await?
        }
    };
    Ok(ids.into_iter().collect())
}
