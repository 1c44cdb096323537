use serde::{Deserialize, Serialize};

pub mod recipe_models;
pub mod user_models;

pub use recipe_models::*;
pub use user_models::*;

// JWT Claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // username
    pub user_id: i32,
    /// Id of the `auth_tokens` row backing this token.
    pub jti: String,
    pub exp: usize,
}

/// Struct to hold authenticated user details, to be passed as a request extension.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub id: i32,
    pub username: String,
    pub is_admin: bool,
    pub jti: String,
}
