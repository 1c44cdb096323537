use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::post,
};
use axum_extra::extract::{
    WithRejection,
    cookie::{Cookie, CookieJar, SameSite},
};
use std::sync::Arc;

use crate::services::auth_service;
use crate::web::models::{AuthenticatedUser, LoginRequest, LoginResponse};
use crate::web::{AppError, AppState};

pub fn create_auth_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/token/login/", post(login))
        .route("/auth/token/logout/", post(logout))
}

async fn login(
    State(app_state): State<Arc<AppState>>,
    jar: CookieJar,
    WithRejection(Json(payload), _): WithRejection<Json<LoginRequest>, AppError>,
) -> Result<(CookieJar, Json<LoginResponse>), AppError> {
    let login_response =
        auth_service::login_user(&app_state.db_pool, &payload, &app_state.config).await?;

    let auth_cookie = Cookie::build(("token", login_response.auth_token.clone()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(true)
        .build();

    Ok((jar.add(auth_cookie), Json(login_response)))
}

async fn logout(
    auth_user: AuthenticatedUser,
    State(app_state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<(CookieJar, StatusCode), AppError> {
    auth_service::logout(&app_state.db_pool, &auth_user).await?;
    let mut expired = Cookie::from("token");
    expired.set_path("/");
    Ok((jar.remove(expired), StatusCode::NO_CONTENT))
}
