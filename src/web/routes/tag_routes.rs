use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
};
use axum_extra::extract::WithRejection;
use std::sync::Arc;

use crate::db::services::tag_service;
use crate::services::validation;
use crate::web::models::{AuthenticatedUser, TagCreateRequest, TagResponse};
use crate::web::{AppError, AppState, require_admin};

pub fn create_tags_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tags/", get(list_tags).post(create_tag))
        .route("/tags/{id}/", get(get_tag))
}

async fn list_tags(State(app_state): State<Arc<AppState>>) -> Result<Json<Vec<TagResponse>>, AppError> {
    let tags = tag_service::list_tags(&app_state.db_pool).await?;
    Ok(Json(tags.into_iter().map(TagResponse::from).collect()))
}

async fn get_tag(
    State(app_state): State<Arc<AppState>>,
    WithRejection(Path(tag_id), _): WithRejection<Path<i32>, AppError>,
) -> Result<Json<TagResponse>, AppError> {
    let tag = tag_service::get_tag(&app_state.db_pool, tag_id).await?;
    Ok(Json(tag.into()))
}

async fn create_tag(
    auth_user: AuthenticatedUser,
    State(app_state): State<Arc<AppState>>,
    WithRejection(Json(payload), _): WithRejection<Json<TagCreateRequest>, AppError>,
) -> Result<(StatusCode, Json<TagResponse>), AppError> {
    require_admin(&auth_user)?;
    let new_tag = validation::validate_tag(&payload).map_err(AppError::Validation)?;
    let tag = tag_service::create_tag(&app_state.db_pool, new_tag).await?;
    Ok((StatusCode::CREATED, Json(tag.into())))
}
