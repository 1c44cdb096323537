use bcrypt::{hash, verify};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set};
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::entities::{auth_token, user};
use crate::db::services::user_service::{self, NewAccount};
use crate::server::config::ServerConfig;
use crate::services::validation::{self, FieldErrors};
use crate::web::error::AppError;
use crate::web::models::{
    AuthenticatedUser, Claims, LoginRequest, LoginResponse, RegisterRequest, SetPasswordRequest,
};

pub fn hash_password(password: &str, cost: u32) -> Result<String, AppError> {
    hash(password, cost).map_err(|e| AppError::Internal(format!("Password hashing failed: {e}")))
}

pub async fn register_user<C: ConnectionTrait>(
    db: &C,
    req: &RegisterRequest,
    config: &ServerConfig,
) -> Result<user::Model, AppError> {
    let new_user = validation::validate_registration(req).map_err(AppError::Validation)?;
    let password_hash = hash_password(&new_user.password, config.password_hash_cost)?;
    let user = user_service::create_user(
        db,
        NewAccount {
            email: new_user.email,
            username: new_user.username,
            first_name: new_user.first_name,
            last_name: new_user.last_name,
            password_hash,
            is_admin: false,
        },
    )
    .await?;
    Ok(user)
}

fn invalid_credentials() -> AppError {
    AppError::Validation(FieldErrors::single(
        "non_field_errors",
        "Unable to log in with provided credentials.",
    ))
}

pub async fn login_user<C: ConnectionTrait>(
    db: &C,
    req: &LoginRequest,
    config: &ServerConfig,
) -> Result<LoginResponse, AppError> {
    let mut errors = FieldErrors::new();
    let email = req.email.as_deref().map(str::trim).unwrap_or_default();
    let password = req.password.as_deref().unwrap_or_default();
    if email.is_empty() {
        errors.add("email", "This field is required.");
    }
    if password.is_empty() {
        errors.add("password", "This field is required.");
    }
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let user = user_service::find_by_email(db, email)
        .await?
        .ok_or_else(invalid_credentials)?;

    let valid_password = verify(password, &user.password_hash)
        .map_err(|e| AppError::Internal(format!("Password verification failed: {e}")))?;
    if !valid_password {
        return Err(invalid_credentials());
    }

    let auth_token = issue_token(db, &user, config).await?;
    info!(user_id = user.id, "User logged in.");
    Ok(LoginResponse { auth_token })
}

/// Records a new session for the user and returns the signed token.
pub async fn issue_token<C: ConnectionTrait>(
    db: &C,
    user: &user::Model,
    config: &ServerConfig,
) -> Result<String, AppError> {
    let now = Utc::now();
    let jti = Uuid::new_v4().to_string();
    let expiration = (now + Duration::hours(config.token_ttl_hours)).timestamp() as usize;

    auth_token::Entity::insert(auth_token::ActiveModel {
        jti: Set(jti.clone()),
        user_id: Set(user.id),
        created_at: Set(now),
    })
    .exec_without_returning(db)
    .await?;

    let claims = Claims {
        sub: user.username.clone(),
        user_id: user.id,
        jti,
        exp: expiration,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_ref()),
    )
    .map_err(|e| AppError::Internal(format!("Token creation failed: {e}")))
}

/// Validates signature and expiry, then checks the session still exists.
pub async fn authenticate_token<C: ConnectionTrait>(
    db: &C,
    token: &str,
    jwt_secret: &str,
) -> Result<AuthenticatedUser, AppError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt_secret.as_ref()),
        &Validation::default(),
    )
    .map_err(|e| {
        warn!(error = ?e, "JWT decoding error during authentication.");
        AppError::Unauthenticated("Invalid token.".to_string())
    })?;
    let claims = token_data.claims;

    let session = auth_token::Entity::find_by_id(claims.jti.clone())
        .filter(auth_token::Column::UserId.eq(claims.user_id))
        .one(db)
        .await?;
    if session.is_none() {
        warn!(user_id = claims.user_id, "Token has been revoked.");
        return Err(AppError::Unauthenticated("Invalid token.".to_string()));
    }

    let user = user::Entity::find_by_id(claims.user_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::Unauthenticated("User inactive or deleted.".to_string()))?;

    Ok(AuthenticatedUser {
        id: user.id,
        username: user.username,
        is_admin: user.is_admin,
        jti: claims.jti,
    })
}

pub async fn logout<C: ConnectionTrait>(db: &C, auth_user: &AuthenticatedUser) -> Result<(), AppError> {
    auth_token::Entity::delete_by_id(auth_user.jti.clone())
        .exec(db)
        .await?;
    info!(user_id = auth_user.id, "User logged out.");
    Ok(())
}

pub async fn change_password<C: ConnectionTrait>(
    db: &C,
    auth_user: &AuthenticatedUser,
    req: &SetPasswordRequest,
    config: &ServerConfig,
) -> Result<(), AppError> {
    let mut errors = FieldErrors::new();
    let new_password = validation::check_password(&mut errors, "new_password", req.new_password.as_ref());
    let current_password = match req.current_password.as_deref() {
        Some(p) if !p.is_empty() => Some(p),
        _ => {
            errors.add("current_password", "This field is required.");
            None
        }
    };
    let (Some(current_password), Some(new_password)) = (current_password, new_password) else {
        return Err(AppError::Validation(errors));
    };

    let user = user_service::get_user(db, auth_user.id).await?;
    let valid_password = verify(current_password, &user.password_hash)
        .map_err(|e| AppError::Internal(format!("Password verification failed: {e}")))?;
    if !valid_password {
        return Err(AppError::Validation(FieldErrors::single(
            "current_password",
            "Invalid password.",
        )));
    }

    let password_hash = hash_password(&new_password, config.password_hash_cost)?;
    user_service::set_password_hash(db, user.id, password_hash).await?;
    Ok(())
}

/// Creates an admin account, or promotes the account that already owns the email.
pub async fn ensure_admin<C: ConnectionTrait>(
    db: &C,
    req: &RegisterRequest,
    config: &ServerConfig,
) -> Result<user::Model, AppError> {
    if let Some(existing) = user_service::find_by_email(db, req.email.as_deref().unwrap_or_default()).await? {
        let user = user_service::set_admin(db, existing.id, true).await?;
        info!(user_id = user.id, "Existing user promoted to admin.");
        return Ok(user);
    }
    let new_user = validation::validate_registration(req).map_err(AppError::Validation)?;
    let password_hash = hash_password(&new_user.password, config.password_hash_cost)?;
    Ok(user_service::create_user(
        db,
        NewAccount {
            email: new_user.email,
            username: new_user.username,
            first_name: new_user.first_name,
            last_name: new_user.last_name,
            password_hash,
            is_admin: true,
        },
    )
    .await?)
}
