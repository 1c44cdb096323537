use axum::{
    Json, Router,
    extract::{OriginalUri, Path, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use axum_extra::extract::{Query, WithRejection};
use std::sync::Arc;

use crate::db::services::membership_service::{self, Membership};
use crate::db::services::recipe_service::{self, RecipeFilter};
use crate::services::aggregation::{Viewer, render_shopping_list};
use crate::services::validation::{self, FieldErrors};
use crate::web::models::{
    AuthenticatedUser, RecipeListQuery, RecipeResponse, RecipeWriteRequest, ShortRecipeResponse,
};
use crate::web::pagination::{Page, page_request};
use crate::web::{AppError, AppState};

pub fn create_recipes_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/recipes/", get(list_recipes).post(create_recipe))
        .route("/recipes/download_shopping_cart/", get(download_shopping_cart))
        .route(
            "/recipes/{id}/",
            get(get_recipe).patch(update_recipe).delete(delete_recipe),
        )
        .route("/recipes/{id}/favorite/", post(add_favorite).delete(remove_favorite))
        .route(
            "/recipes/{id}/shopping_cart/",
            post(add_to_shopping_cart).delete(remove_from_shopping_cart),
        )
}

/// `?tags=a&tags=b` and `?tags=a,b` mean the same thing.
fn split_tag_slugs(raw: &[String]) -> Vec<String> {
    let mut slugs: Vec<String> = raw
        .iter()
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .filter(|slug| !slug.is_empty())
        .map(str::to_string)
        .collect();
    slugs.sort();
    slugs.dedup();
    slugs
}

fn recipe_filter(query: &RecipeListQuery) -> Result<RecipeFilter, AppError> {
    let mut errors = FieldErrors::new();
    let is_favorited =
        validation::parse_flag(&mut errors, "is_favorited", query.is_favorited.as_deref());
    let is_in_shopping_cart = validation::parse_flag(
        &mut errors,
        "is_in_shopping_cart",
        query.is_in_shopping_cart.as_deref(),
    );
    let filter = RecipeFilter {
        author_id: query.author,
        tag_slugs: split_tag_slugs(&query.tags),
        is_favorited,
        is_in_shopping_cart,
    };
    errors.into_result(filter).map_err(AppError::Validation)
}

async fn list_recipes(
    viewer: Viewer,
    State(app_state): State<Arc<AppState>>,
    OriginalUri(uri): OriginalUri,
    WithRejection(Query(query), _): WithRejection<Query<RecipeListQuery>, AppError>,
) -> Result<Json<Page<RecipeResponse>>, AppError> {
    let filter = recipe_filter(&query)?;
    let request = page_request(&app_state.config, query.page, query.limit)?;
    let slice = recipe_service::list_recipes(&app_state.db_pool, viewer, &filter, request).await?;
    let results = slice
        .items
        .into_iter()
        .map(|details| RecipeResponse::from_details(details, &app_state.media))
        .collect();
    Ok(Json(Page::new(&uri, request, slice.total, results)?))
}

async fn get_recipe(
    viewer: Viewer,
    State(app_state): State<Arc<AppState>>,
    WithRejection(Path(recipe_id), _): WithRejection<Path<i32>, AppError>,
) -> Result<Json<RecipeResponse>, AppError> {
    let details = recipe_service::get_recipe(&app_state.db_pool, viewer, recipe_id).await?;
    Ok(Json(RecipeResponse::from_details(details, &app_state.media)))
}

async fn create_recipe(
    auth_user: AuthenticatedUser,
    State(app_state): State<Arc<AppState>>,
    WithRejection(Json(payload), _): WithRejection<Json<RecipeWriteRequest>, AppError>,
) -> Result<(StatusCode, Json<RecipeResponse>), AppError> {
    let changes = validation::validate_recipe_create(&payload).map_err(AppError::Validation)?;
    let recipe_id =
        recipe_service::create_recipe(&app_state.db_pool, &app_state.media, auth_user.id, changes)
            .await?;
    let details =
        recipe_service::get_recipe(&app_state.db_pool, Viewer::User(auth_user.id), recipe_id)
            .await?;
    Ok((
        StatusCode::CREATED,
        Json(RecipeResponse::from_details(details, &app_state.media)),
    ))
}

async fn update_recipe(
    auth_user: AuthenticatedUser,
    State(app_state): State<Arc<AppState>>,
    WithRejection(Path(recipe_id), _): WithRejection<Path<i32>, AppError>,
    WithRejection(Json(payload), _): WithRejection<Json<RecipeWriteRequest>, AppError>,
) -> Result<Json<RecipeResponse>, AppError> {
    let changes = validation::validate_recipe_update(&payload).map_err(AppError::Validation)?;
    recipe_service::update_recipe(
        &app_state.db_pool,
        &app_state.media,
        recipe_id,
        auth_user.id,
        auth_user.is_admin,
        changes,
    )
    .await?;
    let details =
        recipe_service::get_recipe(&app_state.db_pool, Viewer::User(auth_user.id), recipe_id)
            .await?;
    Ok(Json(RecipeResponse::from_details(details, &app_state.media)))
}

async fn delete_recipe(
    auth_user: AuthenticatedUser,
    State(app_state): State<Arc<AppState>>,
    WithRejection(Path(recipe_id), _): WithRejection<Path<i32>, AppError>,
) -> Result<StatusCode, AppError> {
    recipe_service::delete_recipe(
        &app_state.db_pool,
        &app_state.media,
        recipe_id,
        auth_user.id,
        auth_user.is_admin,
    )
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn add_membership(
    app_state: &AppState,
    kind: Membership,
    user_id: i32,
    recipe_id: i32,
) -> Result<(StatusCode, Json<ShortRecipeResponse>), AppError> {
    let recipe = membership_service::add(&app_state.db_pool, kind, user_id, recipe_id).await?;
    Ok((
        StatusCode::CREATED,
        Json(ShortRecipeResponse::new(&recipe, &app_state.media)),
    ))
}

async fn remove_membership(
    app_state: &AppState,
    kind: Membership,
    user_id: i32,
    recipe_id: i32,
) -> Result<StatusCode, AppError> {
    membership_service::remove(&app_state.db_pool, kind, user_id, recipe_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn add_favorite(
    auth_user: AuthenticatedUser,
    State(app_state): State<Arc<AppState>>,
    WithRejection(Path(recipe_id), _): WithRejection<Path<i32>, AppError>,
) -> Result<(StatusCode, Json<ShortRecipeResponse>), AppError> {
    add_membership(&app_state, Membership::Favorite, auth_user.id, recipe_id).await
}

async fn remove_favorite(
    auth_user: AuthenticatedUser,
    State(app_state): State<Arc<AppState>>,
    WithRejection(Path(recipe_id), _): WithRejection<Path<i32>, AppError>,
) -> Result<StatusCode, AppError> {
    remove_membership(&app_state, Membership::Favorite, auth_user.id, recipe_id).await
}

async fn add_to_shopping_cart(
    auth_user: AuthenticatedUser,
    State(app_state): State<Arc<AppState>>,
    WithRejection(Path(recipe_id), _): WithRejection<Path<i32>, AppError>,
) -> Result<(StatusCode, Json<ShortRecipeResponse>), AppError> {
    add_membership(&app_state, Membership::ShoppingCart, auth_user.id, recipe_id).await
}

async fn remove_from_shopping_cart(
    auth_user: AuthenticatedUser,
    State(app_state): State<Arc<AppState>>,
    WithRejection(Path(recipe_id), _): WithRejection<Path<i32>, AppError>,
) -> Result<StatusCode, AppError> {
    remove_membership(&app_state, Membership::ShoppingCart, auth_user.id, recipe_id).await
}

async fn download_shopping_cart(
    auth_user: AuthenticatedUser,
    State(app_state): State<Arc<AppState>>,
) -> Result<Response, AppError> {
    let items = recipe_service::shopping_list(&app_state.db_pool, auth_user.id).await?;
    let body = render_shopping_list(&items);

    let file_name = format!("{}_shopping_list.txt", auth_user.username);
    let disposition = HeaderValue::from_str(&format!(
        "attachment; filename*=UTF-8''{}",
        urlencoding::encode(&file_name)
    ))
    .map_err(|e| AppError::Internal(format!("Invalid Content-Disposition header: {e}")))?;

    Ok((
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; charset=utf-8"),
            ),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}
