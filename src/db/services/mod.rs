//! Data-access services. Each sub-module owns the queries of one aggregate
//! (users, tags, ingredients, recipes, memberships, subscriptions) so handlers
//! never build SQL themselves.

use sea_orm::{DbErr, RuntimeErr};

use crate::services::validation::FieldErrors;

pub mod ingredient_service;
pub mod membership_service;
pub mod recipe_service;
pub mod subscription_service;
pub mod tag_service;
pub mod user_service;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    Db(#[from] DbErr),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    #[error("Validation failed: {0:?}")]
    Validation(FieldErrors),
    #[error("Media storage error: {0}")]
    Media(#[from] std::io::Error),
}

/// One page of rows plus the total number of rows matching the query.
#[derive(Debug, Clone)]
pub struct PageSlice<T> {
    pub items: Vec<T>,
    pub total: u64,
}

/// 1-based page number plus page size, already bounded by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub limit: u64,
}

impl PageRequest {
    pub fn offset(&self) -> u64 {
        self.page.saturating_sub(1).saturating_mul(self.limit)
    }
}

fn database_error(err: &DbErr) -> Option<&dyn sqlx::error::DatabaseError> {
    match err {
        DbErr::Query(RuntimeErr::SqlxError(sqlx::Error::Database(e)))
        | DbErr::Exec(RuntimeErr::SqlxError(sqlx::Error::Database(e))) => Some(e.as_ref()),
        _ => None,
    }
}

pub fn is_unique_violation(err: &DbErr) -> bool {
    database_error(err).is_some_and(|e| e.is_unique_violation())
}

pub fn is_foreign_key_violation(err: &DbErr) -> bool {
    database_error(err).is_some_and(|e| e.is_foreign_key_violation())
}

pub fn is_check_violation(err: &DbErr) -> bool {
    database_error(err).is_some_and(|e| e.is_check_violation())
}
