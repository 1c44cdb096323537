use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::QueryRejection;
use thiserror::Error;
use tracing::error;

use crate::db::services::ServiceError;
use crate::services::validation::FieldErrors;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation failed: {0:?}")]
    Validation(FieldErrors),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    #[error("Not Found: {0}")]
    NotFound(String),
    #[error("Database error: {0}")]
    Database(String),
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::Conflict(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            AppError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            AppError::Validation(errors) => serde_json::to_value(errors)
                .unwrap_or_else(|_| serde_json::json!({ "non_field_errors": ["Invalid input."] })),
            AppError::Conflict(msg) => serde_json::json!({ "errors": msg }),
            AppError::Unauthenticated(msg)
            | AppError::PermissionDenied(msg)
            | AppError::NotFound(msg) => serde_json::json!({ "detail": msg }),
            AppError::Database(msg) | AppError::Internal(msg) => {
                error!(error = %msg, "Request failed with an internal error.");
                serde_json::json!({ "detail": "A server error occurred." })
            }
        };
        (status, Json(body)).into_response()
    }
}

impl From<sea_orm::DbErr> for AppError {
    fn from(err: sea_orm::DbErr) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Db(e) => e.into(),
            ServiceError::NotFound(msg) => AppError::NotFound(msg),
            ServiceError::Conflict(msg) => AppError::Conflict(msg),
            ServiceError::PermissionDenied(msg) => AppError::PermissionDenied(msg),
            ServiceError::Validation(errors) => AppError::Validation(errors),
            ServiceError::Media(e) => AppError::Internal(format!("Media storage error: {e}")),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(FieldErrors::single("non_field_errors", rejection.body_text()))
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Validation(FieldErrors::single("non_field_errors", rejection.to_string()))
    }
}

impl From<PathRejection> for AppError {
    fn from(_: PathRejection) -> Self {
        AppError::NotFound("Not found.".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_conflict_uses_errors_key() {
        let (status, body) = body_json(AppError::Conflict("Already there.".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, serde_json::json!({ "errors": "Already there." }));
    }

    #[tokio::test]
    async fn test_validation_is_field_map() {
        let mut errors = FieldErrors::new();
        errors.add("tags", "At least one tag is required.");
        errors.add("tags", "Another.");
        let (status, body) = body_json(AppError::Validation(errors)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body,
            serde_json::json!({ "tags": ["At least one tag is required.", "Another."] })
        );
    }

    #[tokio::test]
    async fn test_detail_statuses() {
        let (status, body) = body_json(AppError::PermissionDenied("No.".into())).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["detail"], "No.");
        let (status, _) = body_json(AppError::Unauthenticated("Who?".into())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = body_json(AppError::NotFound("Gone.".into())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_internal_errors_are_not_leaked() {
        let (status, body) = body_json(AppError::Database("connection refused".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["detail"], "A server error occurred.");
    }

    #[test]
    fn test_service_error_mapping() {
        let err: AppError = ServiceError::Conflict("dup".into()).into();
        assert!(matches!(err, AppError::Conflict(msg) if msg == "dup"));
        let err: AppError = ServiceError::PermissionDenied("no".into()).into();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }
}
