use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use tracing::info;

use crate::db::entities::{auth_token, favorite, recipe, shopping_cart, subscription, user};
use crate::db::services::{
    PageRequest, PageSlice, ServiceError, is_unique_violation, recipe_service,
};
use crate::services::validation::{FieldErrors, UserChanges};

/// Identity fields of an account about to be created. The password is already hashed.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
    pub is_admin: bool,
}

pub async fn get_user<C: ConnectionTrait>(db: &C, user_id: i32) -> Result<user::Model, ServiceError> {
    user::Entity::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::NotFound("No User matches the given query.".to_string()))
}

pub async fn find_by_email<C: ConnectionTrait>(
    db: &C,
    email: &str,
) -> Result<Option<user::Model>, ServiceError> {
    Ok(user::Entity::find()
        .filter(user::Column::Email.eq(email.to_lowercase()))
        .one(db)
        .await?)
}

/// Field-scoped errors for an email or username already held by another user.
async fn check_identity_free<C: ConnectionTrait>(
    db: &C,
    email: Option<&str>,
    username: Option<&str>,
    except_user_id: Option<i32>,
) -> Result<(), ServiceError> {
    let mut errors = FieldErrors::new();
    if let Some(email) = email {
        let mut query = user::Entity::find().filter(user::Column::Email.eq(email));
        if let Some(id) = except_user_id {
            query = query.filter(user::Column::Id.ne(id));
        }
        if query.one(db).await?.is_some() {
            errors.add("email", "A user with that email already exists.");
        }
    }
    if let Some(username) = username {
        let mut query = user::Entity::find().filter(user::Column::Username.eq(username));
        if let Some(id) = except_user_id {
            query = query.filter(user::Column::Id.ne(id));
        }
        if query.one(db).await?.is_some() {
            errors.add("username", "A user with that username already exists.");
        }
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ServiceError::Validation(errors))
    }
}

fn identity_taken(e: sea_orm::DbErr) -> ServiceError {
    if is_unique_violation(&e) {
        ServiceError::Conflict("A user with that email or username already exists.".to_string())
    } else {
        e.into()
    }
}

pub async fn create_user<C: ConnectionTrait>(
    db: &C,
    account: NewAccount,
) -> Result<user::Model, ServiceError> {
    check_identity_free(db, Some(&account.email), Some(&account.username), None).await?;

    let new_user = user::ActiveModel {
        email: Set(account.email),
        username: Set(account.username),
        first_name: Set(account.first_name),
        last_name: Set(account.last_name),
        password_hash: Set(account.password_hash),
        is_admin: Set(account.is_admin),
        created_at: Set(Utc::now()),
        ..Default::default()
    };
    let user = new_user.insert(db).await.map_err(identity_taken)?;
    info!(user_id = user.id, username = %user.username, is_admin = user.is_admin, "User created.");
    Ok(user)
}

pub async fn list_users<C: ConnectionTrait>(
    db: &C,
    page: PageRequest,
) -> Result<PageSlice<user::Model>, ServiceError> {
    let paginator = user::Entity::find()
        .order_by_asc(user::Column::Id)
        .paginate(db, page.limit);
    let total = paginator.num_items().await?;
    let items = paginator.fetch_page(page.page - 1).await?;
    Ok(PageSlice { items, total })
}

pub async fn update_user<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
    changes: UserChanges,
) -> Result<user::Model, ServiceError> {
    let existing = get_user(db, user_id).await?;
    check_identity_free(
        db,
        changes.email.as_deref(),
        changes.username.as_deref(),
        Some(user_id),
    )
    .await?;

    let mut active = existing.clone().into_active_model();
    if let Some(email) = changes.email {
        active.email = Set(email);
    }
    if let Some(username) = changes.username {
        active.username = Set(username);
    }
    if let Some(first_name) = changes.first_name {
        active.first_name = Set(first_name);
    }
    if let Some(last_name) = changes.last_name {
        active.last_name = Set(last_name);
    }
    if !active.is_changed() {
        return Ok(existing);
    }
    let updated = active.update(db).await.map_err(identity_taken)?;
    info!(user_id, "User profile updated.");
    Ok(updated)
}

pub async fn set_password_hash<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
    password_hash: String,
) -> Result<(), ServiceError> {
    let mut active = get_user(db, user_id).await?.into_active_model();
    active.password_hash = Set(password_hash);
    active.update(db).await?;
    info!(user_id, "Password changed.");
    Ok(())
}

pub async fn set_admin<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
    is_admin: bool,
) -> Result<user::Model, ServiceError> {
    let mut active = get_user(db, user_id).await?.into_active_model();
    active.is_admin = Set(is_admin);
    Ok(active.update(db).await?)
}

/// Deletes the user and everything that hangs off it, in one transaction:
/// authored recipes (with their lines, tags, favorites and cart entries), the
/// user's own favorites and cart entries, subscriptions in both directions,
/// issued tokens and finally the user row.
///
/// Returns the media paths of the deleted recipes so the caller can remove the files.
pub async fn delete_user(db: &DatabaseConnection, user_id: i32) -> Result<Vec<String>, ServiceError> {
    get_user(db, user_id).await?;
    let txn = db.begin().await?;

    let authored: Vec<recipe::Model> = recipe::Entity::find()
        .filter(recipe::Column::AuthorId.eq(user_id))
        .all(&txn)
        .await?;
    let recipe_ids: Vec<i32> = authored.iter().map(|r| r.id).collect();
    recipe_service::delete_recipe_rows(&txn, &recipe_ids).await?;

    favorite::Entity::delete_many()
        .filter(favorite::Column::UserId.eq(user_id))
        .exec(&txn)
        .await?;
    shopping_cart::Entity::delete_many()
        .filter(shopping_cart::Column::UserId.eq(user_id))
        .exec(&txn)
        .await?;
    subscription::Entity::delete_many()
        .filter(
            subscription::Column::UserId
                .eq(user_id)
                .or(subscription::Column::AuthorId.eq(user_id)),
        )
        .exec(&txn)
        .await?;
    auth_token::Entity::delete_many()
        .filter(auth_token::Column::UserId.eq(user_id))
        .exec(&txn)
        .await?;
    user::Entity::delete_by_id(user_id).exec(&txn).await?;

    txn.commit().await?;
    info!(user_id, recipes = recipe_ids.len(), "User deleted.");
    Ok(authored.into_iter().map(|r| r.image).collect())
}
