use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    IntoActiveModel, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, QueryTrait, Set,
    TransactionTrait,
};
use std::collections::{HashMap, HashSet};
use tokio::try_join;
use tracing::{info, warn};

use crate::db::entities::{
    favorite, ingredient, recipe, recipe_ingredient, recipe_tag, shopping_cart, tag, user,
};
use crate::db::services::membership_service::{self, Membership};
use crate::db::services::{
    PageRequest, PageSlice, ServiceError, ingredient_service, subscription_service, tag_service,
};
use crate::services::aggregation::{
    CartLine, FlagScope, ShoppingListItem, Viewer, ViewerMarks, aggregate_shopping_list,
    flag_scope,
};
use crate::services::media_service::MediaStore;
use crate::services::validation::{FieldErrors, IngredientLine, RecipeChanges};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngredientAmount {
    pub ingredient: ingredient::Model,
    pub amount: i32,
}

/// A recipe with everything its read representation needs, as seen by one viewer.
#[derive(Debug, Clone)]
pub struct RecipeDetails {
    pub recipe: recipe::Model,
    pub author: user::Model,
    pub author_is_subscribed: bool,
    pub tags: Vec<tag::Model>,
    pub ingredients: Vec<IngredientAmount>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
}

#[derive(Debug, Clone, Default)]
pub struct RecipeFilter {
    pub author_id: Option<i32>,
    /// Matches recipes carrying any of these tags.
    pub tag_slugs: Vec<String>,
    pub is_favorited: Option<bool>,
    pub is_in_shopping_cart: Option<bool>,
}

fn recipe_not_found() -> ServiceError {
    ServiceError::NotFound("No Recipe matches the given query.".to_string())
}

pub async fn list_recipes<C: ConnectionTrait>(
    db: &C,
    viewer: Viewer,
    filter: &RecipeFilter,
    page: PageRequest,
) -> Result<PageSlice<RecipeDetails>, ServiceError> {
    let favorited = flag_scope(viewer, filter.is_favorited);
    let in_cart = flag_scope(viewer, filter.is_in_shopping_cart);
    if favorited == FlagScope::Nothing || in_cart == FlagScope::Nothing {
        return Ok(PageSlice {
            items: Vec::new(),
            total: 0,
        });
    }

    let mut query = recipe::Entity::find();
    if let Some(author_id) = filter.author_id {
        query = query.filter(recipe::Column::AuthorId.eq(author_id));
    }
    if !filter.tag_slugs.is_empty() {
        let tagged = recipe_tag::Entity::find()
            .select_only()
            .column(recipe_tag::Column::RecipeId)
            .inner_join(tag::Entity)
            .filter(tag::Column::Slug.is_in(filter.tag_slugs.clone()))
            .into_query();
        query = query.filter(recipe::Column::Id.in_subquery(tagged));
    }
    if let FlagScope::MarkedBy(user_id) = favorited {
        let marked = favorite::Entity::find()
            .select_only()
            .column(favorite::Column::RecipeId)
            .filter(favorite::Column::UserId.eq(user_id))
            .into_query();
        query = query.filter(recipe::Column::Id.in_subquery(marked));
    }
    if let FlagScope::MarkedBy(user_id) = in_cart {
        let marked = shopping_cart::Entity::find()
            .select_only()
            .column(shopping_cart::Column::RecipeId)
            .filter(shopping_cart::Column::UserId.eq(user_id))
            .into_query();
        query = query.filter(recipe::Column::Id.in_subquery(marked));
    }

    let paginator = query
        .order_by_desc(recipe::Column::CreatedAt)
        .order_by_desc(recipe::Column::Id)
        .paginate(db, page.limit);
    let total = paginator.num_items().await?;
    let recipes = paginator.fetch_page(page.page - 1).await?;

    let items = hydrate(db, viewer, recipes).await?;
    Ok(PageSlice { items, total })
}

pub async fn get_recipe<C: ConnectionTrait>(
    db: &C,
    viewer: Viewer,
    recipe_id: i32,
) -> Result<RecipeDetails, ServiceError> {
    let recipe = recipe::Entity::find_by_id(recipe_id)
        .one(db)
        .await?
        .ok_or_else(recipe_not_found)?;
    hydrate(db, viewer, vec![recipe])
        .await?
        .pop()
        .ok_or_else(recipe_not_found)
}

async fn viewer_marks<C: ConnectionTrait>(
    db: &C,
    viewer: Viewer,
    recipe_ids: &[i32],
    author_ids: &[i32],
) -> Result<ViewerMarks, ServiceError> {
    let Viewer::User(user_id) = viewer else {
        return Ok(ViewerMarks::default());
    };
    let (favorited, in_cart, subscribed_authors) = try_join!(
        membership_service::marked_recipe_ids(db, Membership::Favorite, user_id, recipe_ids),
        membership_service::marked_recipe_ids(db, Membership::ShoppingCart, user_id, recipe_ids),
        subscription_service::subscribed_author_ids(db, user_id, author_ids),
    )?;
    Ok(ViewerMarks {
        favorited,
        in_cart,
        subscribed_authors,
    })
}

/// Loads authors, tags, ingredient lines and viewer flags for a batch of recipes,
/// keeping the order of `recipes`.
async fn hydrate<C: ConnectionTrait>(
    db: &C,
    viewer: Viewer,
    recipes: Vec<recipe::Model>,
) -> Result<Vec<RecipeDetails>, ServiceError> {
    if recipes.is_empty() {
        return Ok(Vec::new());
    }
    let recipe_ids: Vec<i32> = recipes.iter().map(|r| r.id).collect();
    let author_ids: Vec<i32> = recipes
        .iter()
        .map(|r| r.author_id)
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();

    let authors_future = user::Entity::find()
        .filter(user::Column::Id.is_in(author_ids.clone()))
        .all(db);
    let tags_future = recipe_tag::Entity::find()
        .filter(recipe_tag::Column::RecipeId.is_in(recipe_ids.clone()))
        .find_also_related(tag::Entity)
        .all(db);
    let lines_future = recipe_ingredient::Entity::find()
        .filter(recipe_ingredient::Column::RecipeId.is_in(recipe_ids.clone()))
        .find_also_related(ingredient::Entity)
        .all(db);
    let (authors, tag_links, lines) = try_join!(authors_future, tags_future, lines_future)?;
    let marks = viewer_marks(db, viewer, &recipe_ids, &author_ids).await?;

    let authors: HashMap<i32, user::Model> = authors.into_iter().map(|u| (u.id, u)).collect();

    let mut tags_by_recipe: HashMap<i32, Vec<tag::Model>> = HashMap::new();
    for (link, tag) in tag_links {
        if let Some(tag) = tag {
            tags_by_recipe.entry(link.recipe_id).or_default().push(tag);
        }
    }

    let mut lines_by_recipe: HashMap<i32, Vec<IngredientAmount>> = HashMap::new();
    for (line, ingredient) in lines {
        if let Some(ingredient) = ingredient {
            lines_by_recipe
                .entry(line.recipe_id)
                .or_default()
                .push(IngredientAmount {
                    ingredient,
                    amount: line.amount,
                });
        }
    }

    let mut details = Vec::with_capacity(recipes.len());
    for recipe in recipes {
        let Some(author) = authors.get(&recipe.author_id).cloned() else {
            warn!(recipe_id = recipe.id, author_id = recipe.author_id, "Recipe author is missing.");
            continue;
        };
        let mut tags = tags_by_recipe.remove(&recipe.id).unwrap_or_default();
        tags.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        let mut ingredients = lines_by_recipe.remove(&recipe.id).unwrap_or_default();
        ingredients.sort_by(|a, b| {
            a.ingredient
                .name
                .cmp(&b.ingredient.name)
                .then(a.ingredient.id.cmp(&b.ingredient.id))
        });

        details.push(RecipeDetails {
            author_is_subscribed: marks.is_subscribed(viewer, author.id),
            is_favorited: marks.is_favorited(viewer, recipe.id),
            is_in_shopping_cart: marks.is_in_shopping_cart(viewer, recipe.id),
            author,
            tags,
            ingredients,
            recipe,
        });
    }
    Ok(details)
}

/// Field errors for tag or ingredient ids that do not exist.
async fn check_references<C: ConnectionTrait>(
    db: &C,
    tags: Option<&[i32]>,
    ingredients: Option<&[IngredientLine]>,
) -> Result<(), ServiceError> {
    let mut errors = FieldErrors::new();
    if let Some(tag_ids) = tags {
        for id in tag_service::missing_tag_ids(db, tag_ids).await? {
            errors.add("tags", format!("Invalid pk \"{id}\" - object does not exist."));
        }
    }
    if let Some(lines) = ingredients {
        let ids: Vec<i32> = lines.iter().map(|l| l.ingredient_id).collect();
        for id in ingredient_service::missing_ingredient_ids(db, &ids).await? {
            errors.add("ingredients", format!("Invalid pk \"{id}\" - object does not exist."));
        }
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ServiceError::Validation(errors))
    }
}

async fn replace_tags<C: ConnectionTrait>(db: &C, recipe_id: i32, tag_ids: &[i32]) -> Result<(), DbErr> {
    recipe_tag::Entity::delete_many()
        .filter(recipe_tag::Column::RecipeId.eq(recipe_id))
        .exec(db)
        .await?;
    if tag_ids.is_empty() {
        return Ok(());
    }
    let links = tag_ids.iter().map(|&tag_id| recipe_tag::ActiveModel {
        recipe_id: Set(recipe_id),
        tag_id: Set(tag_id),
    });
    recipe_tag::Entity::insert_many(links)
        .exec_without_returning(db)
        .await?;
    Ok(())
}

async fn replace_ingredients<C: ConnectionTrait>(
    db: &C,
    recipe_id: i32,
    lines: &[IngredientLine],
) -> Result<(), DbErr> {
    recipe_ingredient::Entity::delete_many()
        .filter(recipe_ingredient::Column::RecipeId.eq(recipe_id))
        .exec(db)
        .await?;
    if lines.is_empty() {
        return Ok(());
    }
    let rows = lines.iter().map(|line| recipe_ingredient::ActiveModel {
        recipe_id: Set(recipe_id),
        ingredient_id: Set(line.ingredient_id),
        amount: Set(line.amount),
    });
    recipe_ingredient::Entity::insert_many(rows)
        .exec_without_returning(db)
        .await?;
    Ok(())
}

/// Creates a recipe from a fully validated write and returns its id.
/// The image is stored first and removed again if the database write fails.
pub async fn create_recipe(
    db: &DatabaseConnection,
    media: &MediaStore,
    author_id: i32,
    changes: RecipeChanges,
) -> Result<i32, ServiceError> {
    let RecipeChanges {
        name: Some(name),
        text: Some(text),
        cooking_time: Some(cooking_time),
        image: Some(image),
        tags: Some(tags),
        ingredients: Some(ingredients),
    } = changes
    else {
        return Err(ServiceError::Validation(FieldErrors::single(
            "non_field_errors",
            "Recipe is incomplete.",
        )));
    };
    check_references(db, Some(tags.as_slice()), Some(ingredients.as_slice())).await?;

    let image_path = media.save_recipe_image(&image).await?;

    let stored = async {
        let txn = db.begin().await?;
        let recipe = recipe::ActiveModel {
            author_id: Set(author_id),
            name: Set(name),
            image: Set(image_path.clone()),
            text: Set(text),
            cooking_time: Set(cooking_time),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        replace_tags(&txn, recipe.id, &tags).await?;
        replace_ingredients(&txn, recipe.id, &ingredients).await?;
        txn.commit().await?;
        Ok::<i32, DbErr>(recipe.id)
    }
    .await;

    match stored {
        Ok(recipe_id) => {
            info!(recipe_id, author_id, "Recipe created.");
            Ok(recipe_id)
        }
        Err(e) => {
            media.remove(&image_path).await;
            Err(e.into())
        }
    }
}

/// Only the author or an admin may change or delete a recipe.
pub fn ensure_can_modify(recipe: &recipe::Model, user_id: i32, is_admin: bool) -> Result<(), ServiceError> {
    if recipe.author_id == user_id || is_admin {
        Ok(())
    } else {
        Err(ServiceError::PermissionDenied(
            "You do not have permission to perform this action.".to_string(),
        ))
    }
}

/// Applies a partial update. Supplied tag and ingredient lists replace the old ones wholesale.
pub async fn update_recipe(
    db: &DatabaseConnection,
    media: &MediaStore,
    recipe_id: i32,
    user_id: i32,
    is_admin: bool,
    changes: RecipeChanges,
) -> Result<(), ServiceError> {
    let existing = recipe::Entity::find_by_id(recipe_id)
        .one(db)
        .await?
        .ok_or_else(recipe_not_found)?;
    ensure_can_modify(&existing, user_id, is_admin)?;
    check_references(db, changes.tags.as_deref(), changes.ingredients.as_deref()).await?;

    let new_image = match changes.image.as_ref() {
        Some(upload) => Some(media.save_recipe_image(upload).await?),
        None => None,
    };

    let stored = async {
        let txn = db.begin().await?;
        let mut active = existing.clone().into_active_model();
        if let Some(name) = changes.name {
            active.name = Set(name);
        }
        if let Some(text) = changes.text {
            active.text = Set(text);
        }
        if let Some(cooking_time) = changes.cooking_time {
            active.cooking_time = Set(cooking_time);
        }
        if let Some(path) = new_image.as_ref() {
            active.image = Set(path.clone());
        }
        if active.is_changed() {
            active.update(&txn).await?;
        }
        if let Some(tags) = changes.tags.as_deref() {
            replace_tags(&txn, recipe_id, tags).await?;
        }
        if let Some(lines) = changes.ingredients.as_deref() {
            replace_ingredients(&txn, recipe_id, lines).await?;
        }
        txn.commit().await
    }
    .await;

    match stored {
        Ok(()) => {
            if new_image.is_some() {
                media.remove(&existing.image).await;
            }
            info!(recipe_id, user_id, "Recipe updated.");
            Ok(())
        }
        Err(e) => {
            if let Some(path) = new_image.as_ref() {
                media.remove(path).await;
            }
            Err(e.into())
        }
    }
}

/// Removes recipes together with their favorites, cart entries, ingredient lines and tag links.
/// Runs on the caller's connection so it composes into a larger transaction.
pub async fn delete_recipe_rows<C: ConnectionTrait>(db: &C, recipe_ids: &[i32]) -> Result<(), DbErr> {
    if recipe_ids.is_empty() {
        return Ok(());
    }
    favorite::Entity::delete_many()
        .filter(favorite::Column::RecipeId.is_in(recipe_ids.to_vec()))
        .exec(db)
        .await?;
    shopping_cart::Entity::delete_many()
        .filter(shopping_cart::Column::RecipeId.is_in(recipe_ids.to_vec()))
        .exec(db)
        .await?;
    recipe_ingredient::Entity::delete_many()
        .filter(recipe_ingredient::Column::RecipeId.is_in(recipe_ids.to_vec()))
        .exec(db)
        .await?;
    recipe_tag::Entity::delete_many()
        .filter(recipe_tag::Column::RecipeId.is_in(recipe_ids.to_vec()))
        .exec(db)
        .await?;
    recipe::Entity::delete_many()
        .filter(recipe::Column::Id.is_in(recipe_ids.to_vec()))
        .exec(db)
        .await?;
    Ok(())
}

pub async fn delete_recipe(
    db: &DatabaseConnection,
    media: &MediaStore,
    recipe_id: i32,
    user_id: i32,
    is_admin: bool,
) -> Result<(), ServiceError> {
    let existing = recipe::Entity::find_by_id(recipe_id)
        .one(db)
        .await?
        .ok_or_else(recipe_not_found)?;
    ensure_can_modify(&existing, user_id, is_admin)?;

    let txn = db.begin().await?;
    delete_recipe_rows(&txn, &[recipe_id]).await?;
    txn.commit().await?;

    media.remove(&existing.image).await;
    info!(recipe_id, user_id, "Recipe deleted.");
    Ok(())
}

/// The user's combined shopping list over every recipe in their cart.
pub async fn shopping_list<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
) -> Result<Vec<ShoppingListItem>, ServiceError> {
    let in_cart = shopping_cart::Entity::find()
        .select_only()
        .column(shopping_cart::Column::RecipeId)
        .filter(shopping_cart::Column::UserId.eq(user_id))
        .into_query();
    let lines = recipe_ingredient::Entity::find()
        .filter(recipe_ingredient::Column::RecipeId.in_subquery(in_cart))
        .find_also_related(ingredient::Entity)
        .all(db)
        .await?;

    Ok(aggregate_shopping_list(lines.into_iter().filter_map(
        |(line, ingredient)| {
            ingredient.map(|ingredient| CartLine {
                ingredient_id: ingredient.id,
                name: ingredient.name,
                measurement_unit: ingredient.measurement_unit,
                amount: line.amount,
            })
        },
    )))
}
