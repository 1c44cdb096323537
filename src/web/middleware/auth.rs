use axum::{
    body::Body as AxumBody,
    extract::{FromRequestParts, State},
    http::{Request, header, request::Parts},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;
use tracing::debug;

use crate::services::aggregation::Viewer;
use crate::services::auth_service;
use crate::web::models::AuthenticatedUser;
use crate::web::{AppState, error::AppError};

/// Where the request's token came from.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Credentials {
    Header(String),
    Cookie(String),
}

/// Pulls the raw token out of `Authorization: Token <t>`, `Authorization: Bearer <t>`
/// or the `token` cookie, in that order.
fn extract_token(req: &Request<AxumBody>, jar: &CookieJar) -> Option<Credentials> {
    let from_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| {
            value
                .strip_prefix("Token ")
                .or_else(|| value.strip_prefix("Bearer "))
        })
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
        .map(Credentials::Header);
    from_header.or_else(|| {
        jar.get("token")
            .map(|c| c.value().to_string())
            .filter(|token| !token.is_empty())
            .map(Credentials::Cookie)
    })
}

/// Resolves the viewer for every API request.
///
/// No credentials at all means an anonymous viewer. An `Authorization` header
/// that fails to verify is rejected with 401 even on public endpoints; a stale
/// `token` cookie is ignored so the browser can still log in again.
pub async fn resolve_viewer(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut req: Request<AxumBody>,
    next: Next,
) -> Result<Response, AppError> {
    match extract_token(&req, &jar) {
        Some(Credentials::Header(token)) => {
            let user =
                auth_service::authenticate_token(&state.db_pool, &token, &state.config.jwt_secret)
                    .await?;
            req.extensions_mut().insert(user);
        }
        Some(Credentials::Cookie(token)) => {
            match auth_service::authenticate_token(&state.db_pool, &token, &state.config.jwt_secret)
                .await
            {
                Ok(user) => {
                    req.extensions_mut().insert(user);
                }
                Err(AppError::Unauthenticated(reason)) => {
                    debug!(%reason, "Ignoring stale token cookie.");
                }
                Err(e) => return Err(e),
            }
        }
        None => {}
    }
    Ok(next.run(req).await)
}

/// Extractor for endpoints that require a logged-in user.
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<AuthenticatedUser>().cloned().ok_or_else(|| {
            AppError::Unauthenticated("Authentication credentials were not provided.".to_string())
        })
    }
}

/// Extractor for endpoints open to anonymous viewers.
impl<S> FromRequestParts<S> for Viewer
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<AuthenticatedUser>()
            .map_or(Viewer::Anonymous, |user| Viewer::User(user.id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_with_auth(value: &str) -> Request<AxumBody> {
        Request::builder()
            .header(header::AUTHORIZATION, value)
            .body(AxumBody::empty())
            .unwrap()
    }

    #[test]
    fn test_token_and_bearer_schemes() {
        let jar = CookieJar::new();
        assert_eq!(
            extract_token(&request_with_auth("Token abc"), &jar),
            Some(Credentials::Header("abc".to_string()))
        );
        assert_eq!(
            extract_token(&request_with_auth("Bearer xyz"), &jar),
            Some(Credentials::Header("xyz".to_string()))
        );
        assert_eq!(extract_token(&request_with_auth("Basic Zm9v"), &jar), None);
    }

    #[test]
    fn test_cookie_fallback() {
        let req = Request::builder()
            .header(header::COOKIE, "token=from-cookie")
            .body(AxumBody::empty())
            .unwrap();
        let jar = CookieJar::from_headers(req.headers());
        assert_eq!(
            extract_token(&req, &jar),
            Some(Credentials::Cookie("from-cookie".to_string()))
        );
    }

    #[tokio::test]
    async fn test_missing_user_is_unauthenticated() {
        let (mut parts, _) = Request::builder().body(()).unwrap().into_parts();
        let result = AuthenticatedUser::from_request_parts(&mut parts, &()).await;
        assert!(matches!(result, Err(AppError::Unauthenticated(_))));
        let viewer = Viewer::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(viewer, Viewer::Anonymous);
    }
}
