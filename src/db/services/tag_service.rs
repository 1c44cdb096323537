use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use tracing::info;

use crate::db::entities::tag;
use crate::db::services::{ServiceError, is_unique_violation};
use crate::services::validation::NewTag;

pub async fn list_tags<C: ConnectionTrait>(db: &C) -> Result<Vec<tag::Model>, ServiceError> {
    Ok(tag::Entity::find()
        .order_by_asc(tag::Column::Name)
        .order_by_asc(tag::Column::Id)
        .all(db)
        .await?)
}

pub async fn get_tag<C: ConnectionTrait>(db: &C, tag_id: i32) -> Result<tag::Model, ServiceError> {
    tag::Entity::find_by_id(tag_id)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::NotFound("No Tag matches the given query.".to_string()))
}

/// Ids from `tag_ids` that have no row.
pub async fn missing_tag_ids<C: ConnectionTrait>(db: &C, tag_ids: &[i32]) -> Result<Vec<i32>, ServiceError> {
    if tag_ids.is_empty() {
        return Ok(Vec::new());
    }
    let found: Vec<i32> = tag::Entity::find()
        .filter(tag::Column::Id.is_in(tag_ids.to_vec()))
        .all(db)
        .await?
        .into_iter()
        .map(|t| t.id)
        .collect();
    Ok(tag_ids.iter().copied().filter(|id| !found.contains(id)).collect())
}

pub async fn create_tag<C: ConnectionTrait>(db: &C, new_tag: NewTag) -> Result<tag::Model, ServiceError> {
    let active = tag::ActiveModel {
        name: Set(new_tag.name),
        color: Set(new_tag.color),
        slug: Set(new_tag.slug),
        ..Default::default()
    };
    match active.insert(db).await {
        Ok(tag) => {
            info!(tag_id = tag.id, slug = %tag.slug, "Tag created.");
            Ok(tag)
        }
        Err(e) if is_unique_violation(&e) => Err(ServiceError::Conflict(
            "A tag with this name or slug already exists.".to_string(),
        )),
        Err(e) => Err(e.into()),
    }
}
