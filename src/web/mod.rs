use axum::{
    Router,
    http::{Method, header},
    middleware as axum_middleware,
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use crate::server::config::ServerConfig;
use crate::services::media_service::MediaStore;
use crate::web::{middleware::auth, routes::*};

pub mod error;
pub mod middleware;
pub mod models;
pub mod pagination;
pub mod routes;

pub use error::AppError;

#[derive(Clone)]
pub struct AppState {
    pub db_pool: DatabaseConnection,
    pub config: Arc<ServerConfig>,
    pub media: MediaStore,
}

/// Guard for endpoints reserved to admins.
pub(crate) fn require_admin(user: &models::AuthenticatedUser) -> Result<(), AppError> {
    if user.is_admin {
        Ok(())
    } else {
        Err(AppError::PermissionDenied(
            "You do not have permission to perform this action.".to_string(),
        ))
    }
}

pub fn create_axum_router(db_pool: DatabaseConnection, config: Arc<ServerConfig>) -> Router {
    let media = MediaStore::new(&config.media_dir, &config.media_url);
    let media_route = format!("/{}", config.media_url.trim_matches('/'));
    let media_root = media.root().to_path_buf();

    let app_state = Arc::new(AppState {
        db_pool,
        config,
        media,
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(vec![
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let api = Router::new()
        .merge(auth_routes::create_auth_router())
        .merge(user_routes::create_user_router())
        .merge(tag_routes::create_tags_router())
        .merge(ingredient_routes::create_ingredients_router())
        .merge(recipe_routes::create_recipes_router())
        .route_layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            auth::resolve_viewer,
        ));

    let router = Router::new().nest("/api", api);
    let router = if media_route == "/" {
        router.fallback_service(ServeDir::new(media_root))
    } else {
        router.nest_service(&media_route, ServeDir::new(media_root))
    };

    router
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
