mod common;

use chrono::Utc;
use common::setup_db;
use foodgram::db::entities::{favorite, subscription};
use foodgram::db::services::membership_service::{self, Membership};
use foodgram::db::services::user_service::{self, NewAccount};
use foodgram::db::services::{ServiceError, is_check_violation, is_unique_violation, subscription_service};
use sea_orm::{DatabaseConnection, EntityTrait, Set};

async fn account(db: &DatabaseConnection, name: &str) -> i32 {
    user_service::create_user(
        db,
        NewAccount {
            email: format!("{name}@example.com"),
            username: name.to_string(),
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            password_hash: "x".to_string(),
            is_admin: false,
        },
    )
    .await
    .unwrap()
    .id
}

#[tokio::test]
async fn test_self_subscription_rejected_by_the_store() {
    let db = setup_db().await;
    let user_id = account(&db, "narcissus").await;

    let err = subscription::Entity::insert(subscription::ActiveModel {
        user_id: Set(user_id),
        author_id: Set(user_id),
        created_at: Set(Utc::now()),
    })
    .exec_without_returning(&db)
    .await
    .unwrap_err();
    assert!(is_check_violation(&err), "{err:?}");

    let result = subscription_service::subscribe(&db, user_id, user_id).await;
    assert!(matches!(result, Err(ServiceError::Conflict(_))));
}

#[tokio::test]
async fn test_duplicate_subscription_rejected_by_the_store() {
    let db = setup_db().await;
    let follower = account(&db, "follower").await;
    let author = account(&db, "author").await;

    subscription_service::subscribe(&db, follower, author).await.unwrap();
    let err = subscription::Entity::insert(subscription::ActiveModel {
        user_id: Set(follower),
        author_id: Set(author),
        created_at: Set(Utc::now()),
    })
    .exec_without_returning(&db)
    .await
    .unwrap_err();
    assert!(is_unique_violation(&err), "{err:?}");
}

#[tokio::test]
async fn test_membership_for_missing_recipe() {
    let db = setup_db().await;
    let user_id = account(&db, "fan").await;

    let result = membership_service::add(&db, Membership::Favorite, user_id, 77).await;
    assert!(matches!(result, Err(ServiceError::NotFound(_))));

    let err = favorite::Entity::insert(favorite::ActiveModel {
        user_id: Set(user_id),
        recipe_id: Set(77),
        created_at: Set(Utc::now()),
    })
    .exec_without_returning(&db)
    .await
    .unwrap_err();
    assert!(foodgram::db::services::is_foreign_key_violation(&err), "{err:?}");
}
