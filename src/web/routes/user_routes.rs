use axum::{
    Json, Router,
    extract::{OriginalUri, Path, State},
    http::StatusCode,
    routing::{get, post},
};
use axum_extra::extract::{Query, WithRejection};
use std::sync::Arc;
use tracing::info;

use crate::db::services::{subscription_service, user_service};
use crate::services::aggregation::Viewer;
use crate::services::{auth_service, validation};
use crate::web::models::{
    AuthenticatedUser, RegisterRequest, SetPasswordRequest, ShortRecipeResponse,
    SubscriptionQuery, SubscriptionResponse, UserCreatedResponse, UserListQuery, UserResponse,
    UserUpdateRequest,
};
use crate::web::pagination::{Page, page_request};
use crate::web::{AppError, AppState, require_admin};

pub fn create_user_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users/", get(list_users).post(register))
        .route("/users/me/", get(me))
        .route("/users/set_password/", post(set_password))
        .route("/users/subscriptions/", get(list_subscriptions))
        .route(
            "/users/{id}/",
            get(get_user).patch(update_user).delete(delete_user),
        )
        .route("/users/{id}/subscribe/", post(subscribe).delete(unsubscribe))
}

async fn is_subscribed(app_state: &AppState, viewer: Viewer, author_id: i32) -> Result<bool, AppError> {
    let Some(user_id) = viewer.user_id() else {
        return Ok(false);
    };
    Ok(
        subscription_service::subscribed_author_ids(&app_state.db_pool, user_id, &[author_id])
            .await?
            .contains(&author_id),
    )
}

async fn list_users(
    viewer: Viewer,
    State(app_state): State<Arc<AppState>>,
    OriginalUri(uri): OriginalUri,
    WithRejection(Query(query), _): WithRejection<Query<UserListQuery>, AppError>,
) -> Result<Json<Page<UserResponse>>, AppError> {
    let request = page_request(&app_state.config, query.page, query.limit)?;
    let slice = user_service::list_users(&app_state.db_pool, request).await?;

    let subscribed = match viewer.user_id() {
        Some(user_id) => {
            let ids: Vec<i32> = slice.items.iter().map(|u| u.id).collect();
            subscription_service::subscribed_author_ids(&app_state.db_pool, user_id, &ids).await?
        }
        None => Default::default(),
    };
    let results = slice
        .items
        .into_iter()
        .map(|user| {
            let is_subscribed = subscribed.contains(&user.id);
            UserResponse::new(user, is_subscribed)
        })
        .collect();
    Ok(Json(Page::new(&uri, request, slice.total, results)?))
}

async fn register(
    State(app_state): State<Arc<AppState>>,
    WithRejection(Json(payload), _): WithRejection<Json<RegisterRequest>, AppError>,
) -> Result<(StatusCode, Json<UserCreatedResponse>), AppError> {
    let user = auth_service::register_user(&app_state.db_pool, &payload, &app_state.config).await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

async fn me(
    auth_user: AuthenticatedUser,
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<UserResponse>, AppError> {
    let user = user_service::get_user(&app_state.db_pool, auth_user.id).await?;
    Ok(Json(UserResponse::new(user, false)))
}

async fn set_password(
    auth_user: AuthenticatedUser,
    State(app_state): State<Arc<AppState>>,
    WithRejection(Json(payload), _): WithRejection<Json<SetPasswordRequest>, AppError>,
) -> Result<StatusCode, AppError> {
    auth_service::change_password(&app_state.db_pool, &auth_user, &payload, &app_state.config)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_user(
    viewer: Viewer,
    State(app_state): State<Arc<AppState>>,
    WithRejection(Path(user_id), _): WithRejection<Path<i32>, AppError>,
) -> Result<Json<UserResponse>, AppError> {
    let user = user_service::get_user(&app_state.db_pool, user_id).await?;
    let subscribed = is_subscribed(&app_state, viewer, user.id).await?;
    Ok(Json(UserResponse::new(user, subscribed)))
}

async fn update_user(
    auth_user: AuthenticatedUser,
    State(app_state): State<Arc<AppState>>,
    WithRejection(Path(user_id), _): WithRejection<Path<i32>, AppError>,
    WithRejection(Json(payload), _): WithRejection<Json<UserUpdateRequest>, AppError>,
) -> Result<Json<UserResponse>, AppError> {
    if auth_user.id != user_id {
        require_admin(&auth_user)?;
    }
    let changes = validation::validate_user_update(&payload).map_err(AppError::Validation)?;
    let user = user_service::update_user(&app_state.db_pool, user_id, changes).await?;
    let subscribed = is_subscribed(&app_state, Viewer::User(auth_user.id), user.id).await?;
    Ok(Json(UserResponse::new(user, subscribed)))
}

async fn delete_user(
    auth_user: AuthenticatedUser,
    State(app_state): State<Arc<AppState>>,
    WithRejection(Path(user_id), _): WithRejection<Path<i32>, AppError>,
) -> Result<StatusCode, AppError> {
    require_admin(&auth_user)?;
    let images = user_service::delete_user(&app_state.db_pool, user_id).await?;
    for image in &images {
        app_state.media.remove(image).await;
    }
    info!(user_id, admin_id = auth_user.id, "User removed by admin.");
    Ok(StatusCode::NO_CONTENT)
}

async fn subscribe(
    auth_user: AuthenticatedUser,
    State(app_state): State<Arc<AppState>>,
    WithRejection(Path(author_id), _): WithRejection<Path<i32>, AppError>,
    WithRejection(Query(query), _): WithRejection<Query<SubscriptionQuery>, AppError>,
) -> Result<(StatusCode, Json<SubscriptionResponse>), AppError> {
    subscription_service::subscribe(&app_state.db_pool, auth_user.id, author_id).await?;
    let author = subscription_service::describe_authors(
        &app_state.db_pool,
        &[author_id],
        query.recipes_limit,
    )
    .await?
    .pop()
    .ok_or_else(|| AppError::NotFound("No User matches the given query.".to_string()))?;
    Ok((
        StatusCode::CREATED,
        Json(subscription_response(&app_state, author)),
    ))
}

async fn unsubscribe(
    auth_user: AuthenticatedUser,
    State(app_state): State<Arc<AppState>>,
    WithRejection(Path(author_id), _): WithRejection<Path<i32>, AppError>,
) -> Result<StatusCode, AppError> {
    subscription_service::unsubscribe(&app_state.db_pool, auth_user.id, author_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_subscriptions(
    auth_user: AuthenticatedUser,
    State(app_state): State<Arc<AppState>>,
    OriginalUri(uri): OriginalUri,
    WithRejection(Query(query), _): WithRejection<Query<SubscriptionQuery>, AppError>,
) -> Result<Json<Page<SubscriptionResponse>>, AppError> {
    let request = page_request(&app_state.config, query.page, query.limit)?;
    let slice = subscription_service::list_subscriptions(
        &app_state.db_pool,
        auth_user.id,
        request,
        query.recipes_limit,
    )
    .await?;
    let results = slice
        .items
        .into_iter()
        .map(|author| subscription_response(&app_state, author))
        .collect();
    Ok(Json(Page::new(&uri, request, slice.total, results)?))
}

/// Authors in these responses are always followed by the viewer.
fn subscription_response(
    app_state: &AppState,
    author: subscription_service::SubscribedAuthor,
) -> SubscriptionResponse {
    SubscriptionResponse {
        recipes: author
            .recent_recipes
            .iter()
            .map(|recipe| ShortRecipeResponse::new(recipe, &app_state.media))
            .collect(),
        recipes_count: author.recipes_count,
        user: UserResponse::new(author.author, true),
    }
}
