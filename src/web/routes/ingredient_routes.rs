use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
};
use axum_extra::extract::{Query, WithRejection};
use std::sync::Arc;

use crate::db::services::ingredient_service;
use crate::services::validation;
use crate::web::models::{
    AuthenticatedUser, IngredientCreateRequest, IngredientResponse, IngredientSearchQuery,
};
use crate::web::{AppError, AppState, require_admin};

pub fn create_ingredients_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ingredients/", get(search_ingredients).post(create_ingredient))
        .route("/ingredients/{id}/", get(get_ingredient))
}

async fn search_ingredients(
    State(app_state): State<Arc<AppState>>,
    WithRejection(Query(query), _): WithRejection<Query<IngredientSearchQuery>, AppError>,
) -> Result<Json<Vec<IngredientResponse>>, AppError> {
    let name = query.name.as_deref().map(str::trim).filter(|n| !n.is_empty());
    let ingredients = ingredient_service::search_ingredients(&app_state.db_pool, name).await?;
    Ok(Json(ingredients.into_iter().map(IngredientResponse::from).collect()))
}

async fn get_ingredient(
    State(app_state): State<Arc<AppState>>,
    WithRejection(Path(ingredient_id), _): WithRejection<Path<i32>, AppError>,
) -> Result<Json<IngredientResponse>, AppError> {
    let ingredient = ingredient_service::get_ingredient(&app_state.db_pool, ingredient_id).await?;
    Ok(Json(ingredient.into()))
}

async fn create_ingredient(
    auth_user: AuthenticatedUser,
    State(app_state): State<Arc<AppState>>,
    WithRejection(Json(payload), _): WithRejection<Json<IngredientCreateRequest>, AppError>,
) -> Result<(StatusCode, Json<IngredientResponse>), AppError> {
    require_admin(&auth_user)?;
    let new_ingredient = validation::validate_ingredient(&payload).map_err(AppError::Validation)?;
    let ingredient = ingredient_service::create_ingredient(&app_state.db_pool, new_ingredient).await?;
    Ok((StatusCode::CREATED, Json(ingredient.into())))
}
