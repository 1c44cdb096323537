use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use std::collections::{HashMap, HashSet};
use tracing::info;

use crate::db::entities::{recipe, subscription, user};
use crate::db::services::{
    PageRequest, PageSlice, ServiceError, is_check_violation, is_foreign_key_violation,
    is_unique_violation, user_service,
};

/// An author as listed under the follower's subscriptions.
#[derive(Debug, Clone)]
pub struct SubscribedAuthor {
    pub author: user::Model,
    /// Newest first, truncated to `recipes_limit` when one is given.
    pub recent_recipes: Vec<recipe::Model>,
    pub recipes_count: u64,
}

pub async fn subscribe<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
    author_id: i32,
) -> Result<user::Model, ServiceError> {
    let author = user_service::get_user(db, author_id).await?;
    if user_id == author_id {
        return Err(ServiceError::Conflict("You cannot subscribe to yourself.".to_string()));
    }

    let result = subscription::Entity::insert(subscription::ActiveModel {
        user_id: Set(user_id),
        author_id: Set(author_id),
        created_at: Set(Utc::now()),
    })
    .exec_without_returning(db)
    .await;

    match result {
        Ok(_) => {
            info!(user_id, author_id, "Subscribed to author.");
            Ok(author)
        }
        Err(e) if is_unique_violation(&e) => Err(ServiceError::Conflict(
            "You are already subscribed to this user.".to_string(),
        )),
        Err(e) if is_check_violation(&e) => {
            Err(ServiceError::Conflict("You cannot subscribe to yourself.".to_string()))
        }
        Err(e) if is_foreign_key_violation(&e) => Err(ServiceError::NotFound(
            "No User matches the given query.".to_string(),
        )),
        Err(e) => Err(e.into()),
    }
}

pub async fn unsubscribe<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
    author_id: i32,
) -> Result<(), ServiceError> {
    user_service::get_user(db, author_id).await?;
    let result = subscription::Entity::delete_many()
        .filter(subscription::Column::UserId.eq(user_id))
        .filter(subscription::Column::AuthorId.eq(author_id))
        .exec(db)
        .await?;
    if result.rows_affected == 0 {
        return Err(ServiceError::Conflict(
            "You are not subscribed to this user.".to_string(),
        ));
    }
    info!(user_id, author_id, "Unsubscribed from author.");
    Ok(())
}

/// The subset of `author_ids` the user follows.
pub async fn subscribed_author_ids<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
    author_ids: &[i32],
) -> Result<HashSet<i32>, ServiceError> {
    if author_ids.is_empty() {
        return Ok(HashSet::new());
    }
    let ids = subscription::Entity::find()
        .select_only()
        .column(subscription::Column::AuthorId)
        .filter(subscription::Column::UserId.eq(user_id))
        .filter(subscription::Column::AuthorId.is_in(author_ids.to_vec()))
        .into_tuple::<i32>()
        .all(db)
        .await?;
    Ok(ids.into_iter().collect())
}

/// Authors the user follows, in the order the subscriptions were made.
pub async fn list_subscriptions<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
    page: PageRequest,
    recipes_limit: Option<u64>,
) -> Result<PageSlice<SubscribedAuthor>, ServiceError> {
    let base = subscription::Entity::find().filter(subscription::Column::UserId.eq(user_id));
    let total = base.clone().count(db).await?;

    let author_ids: Vec<i32> = base
        .select_only()
        .column(subscription::Column::AuthorId)
        .order_by_asc(subscription::Column::CreatedAt)
        .order_by_asc(subscription::Column::AuthorId)
        .offset(page.offset())
        .limit(page.limit)
        .into_tuple::<i32>()
        .all(db)
        .await?;

    let items = describe_authors(db, &author_ids, recipes_limit).await?;
    Ok(PageSlice { items, total })
}

/// Loads the authors with their recipe counts and most recent recipes, keeping the order of `author_ids`.
pub async fn describe_authors<C: ConnectionTrait>(
    db: &C,
    author_ids: &[i32],
    recipes_limit: Option<u64>,
) -> Result<Vec<SubscribedAuthor>, ServiceError> {
    if author_ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut authors: HashMap<i32, user::Model> = user::Entity::find()
        .filter(user::Column::Id.is_in(author_ids.to_vec()))
        .all(db)
        .await?
        .into_iter()
        .map(|u| (u.id, u))
        .collect();

    let counts: HashMap<i32, i64> = recipe::Entity::find()
        .select_only()
        .column(recipe::Column::AuthorId)
        .column_as(Expr::col(recipe::Column::Id).count(), "recipes_count")
        .filter(recipe::Column::AuthorId.is_in(author_ids.to_vec()))
        .group_by(recipe::Column::AuthorId)
        .into_tuple::<(i32, i64)>()
        .all(db)
        .await?
        .into_iter()
        .collect();

    let mut recipes_by_author: HashMap<i32, Vec<recipe::Model>> = HashMap::new();
    for recipe in recipe::Entity::find()
        .filter(recipe::Column::AuthorId.is_in(author_ids.to_vec()))
        .order_by_desc(recipe::Column::CreatedAt)
        .order_by_desc(recipe::Column::Id)
        .all(db)
        .await?
    {
        let bucket = recipes_by_author.entry(recipe.author_id).or_default();
        if recipes_limit.is_none_or(|limit| (bucket.len() as u64) < limit) {
            bucket.push(recipe);
        }
    }

    Ok(author_ids
        .iter()
        .filter_map(|id| {
            let author = authors.remove(id)?;
            Some(SubscribedAuthor {
                recent_recipes: recipes_by_author.remove(id).unwrap_or_default(),
                recipes_count: counts.get(id).copied().unwrap_or(0).max(0) as u64,
                author,
            })
        })
        .collect())
}
