use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set};
use tracing::info;

use crate::db::entities::ingredient;
use crate::db::services::{ServiceError, is_unique_violation};
use crate::services::aggregation::rank_by_name;
use crate::services::validation::NewIngredient;

/// All ingredients by name, or, with a query, prefix matches followed by substring matches.
///
/// Ranking runs in Rust: case folding is then the same for Cyrillic and Latin
/// names whatever the database collation does.
pub async fn search_ingredients<C: ConnectionTrait>(
    db: &C,
    query: Option<&str>,
) -> Result<Vec<ingredient::Model>, ServiceError> {
    let mut all = ingredient::Entity::find().all(db).await?;
    all.sort_by_cached_key(|i| (i.name.to_lowercase(), i.id));

    Ok(match query {
        Some(q) => rank_by_name(all, q, |i| i.name.as_str()),
        None => all,
    })
}

pub async fn get_ingredient<C: ConnectionTrait>(
    db: &C,
    ingredient_id: i32,
) -> Result<ingredient::Model, ServiceError> {
    ingredient::Entity::find_by_id(ingredient_id)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::NotFound("No Ingredient matches the given query.".to_string()))
}

/// Ids from `ingredient_ids` that have no row.
pub async fn missing_ingredient_ids<C: ConnectionTrait>(
    db: &C,
    ingredient_ids: &[i32],
) -> Result<Vec<i32>, ServiceError> {
    if ingredient_ids.is_empty() {
        return Ok(Vec::new());
    }
    let found: Vec<i32> = ingredient::Entity::find()
        .filter(ingredient::Column::Id.is_in(ingredient_ids.to_vec()))
        .all(db)
        .await?
        .into_iter()
        .map(|i| i.id)
        .collect();
    Ok(ingredient_ids
        .iter()
        .copied()
        .filter(|id| !found.contains(id))
        .collect())
}

pub async fn create_ingredient<C: ConnectionTrait>(
    db: &C,
    new_ingredient: NewIngredient,
) -> Result<ingredient::Model, ServiceError> {
    let active = ingredient::ActiveModel {
        name: Set(new_ingredient.name),
        measurement_unit: Set(new_ingredient.measurement_unit),
        ..Default::default()
    };
    match active.insert(db).await {
        Ok(ingredient) => {
            info!(ingredient_id = ingredient.id, name = %ingredient.name, "Ingredient created.");
            Ok(ingredient)
        }
        Err(e) if is_unique_violation(&e) => Err(ServiceError::Conflict(
            "An ingredient with this name and measurement unit already exists.".to_string(),
        )),
        Err(e) => Err(e.into()),
    }
}
