mod common;

use axum::http::{Method, StatusCode};
use common::spawn_app;
use serde_json::json;

#[tokio::test]
async fn test_registration_and_profile() {
    let app = spawn_app().await;
    let user = app.user("alice").await;

    let (status, body) = app.get("/api/users/me/", Some(&user.token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "alice@example.com");
    assert_eq!(body["is_subscribed"], false);
    assert!(body.get("password").is_none());
    assert!(body.get("password_hash").is_none());

    let (status, _) = app.get("/api/users/me/", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_duplicate_registration_is_field_scoped() {
    let app = spawn_app().await;
    app.user("alice").await;
    let (status, body) = app
        .post(
            "/api/users/",
            None,
            json!({
                "email": "ALICE@example.com",
                "username": "alice",
                "first_name": "A",
                "last_name": "B",
                "password": "long-enough-password",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["email"].is_array());
    assert!(body["username"].is_array());
}

#[tokio::test]
async fn test_bad_credentials() {
    let app = spawn_app().await;
    app.user("alice").await;
    let (status, body) = app
        .post(
            "/api/auth/token/login/",
            None,
            json!({ "email": "alice@example.com", "password": "wrong-password" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["non_field_errors"][0],
        "Unable to log in with provided credentials."
    );
}

#[tokio::test]
async fn test_logout_revokes_token() {
    let app = spawn_app().await;
    let user = app.user("alice").await;

    let (status, _) = app
        .post("/api/auth/token/logout/", Some(&user.token), json!({}))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = app.get("/api/users/me/", Some(&user.token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["detail"], "Invalid token.");

    // A rejected header token is not silently treated as anonymous.
    let (status, _) = app.get("/api/recipes/", Some(&user.token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_stale_cookie_does_not_block_login() {
    let app = spawn_app().await;
    let user = app.user("alice").await;
    let (status, _) = app
        .post("/api/auth/token/logout/", Some(&user.token), json!({}))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = app
        .request_with_cookie(
            Method::POST,
            "/api/auth/token/login/",
            &user.token,
            json!({ "email": "alice@example.com", "password": "correct-horse-battery" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body["auth_token"].is_string());

    let (status, _) = app
        .request_with_cookie(Method::GET, "/api/recipes/", "not-a-jwt", json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app
        .request_with_cookie(Method::GET, "/api/users/me/", &user.token, json!({}))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let fresh = body["auth_token"].as_str().unwrap();
    let (status, body) = app
        .request_with_cookie(Method::GET, "/api/users/me/", fresh, json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "alice");
}

#[tokio::test]
async fn test_set_password() {
    let app = spawn_app().await;
    let user = app.user("alice").await;

    let (status, body) = app
        .post(
            "/api/users/set_password/",
            Some(&user.token),
            json!({ "current_password": "nope-nope-nope", "new_password": "fresh-password-1" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["current_password"][0], "Invalid password.");

    let (status, _) = app
        .post(
            "/api/users/set_password/",
            Some(&user.token),
            json!({ "current_password": "correct-horse-battery", "new_password": "fresh-password-1" }),
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app
        .post(
            "/api/auth/token/login/",
            None,
            json!({ "email": "alice@example.com", "password": "fresh-password-1" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_profile_update_is_self_or_admin() {
    let app = spawn_app().await;
    let alice = app.user("alice").await;
    let bob = app.user("bob").await;
    let admin = app.admin("root").await;
    let uri = format!("/api/users/{}/", alice.id);

    let (status, _) = app
        .request(Method::PATCH, &uri, Some(&bob.token), Some(json!({ "first_name": "Eve" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .request(Method::PATCH, &uri, Some(&alice.token), Some(json!({ "first_name": "Alicia" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["first_name"], "Alicia");

    let (status, _) = app
        .request(Method::PATCH, &uri, Some(&admin.token), Some(json!({ "last_name": "Liddell" })))
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_users_list_is_paginated() {
    let app = spawn_app().await;
    for name in ["u1", "u2", "u3"] {
        app.user(name).await;
    }
    let (status, body) = app.get("/api/users/?limit=2", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 3);
    assert_eq!(body["results"][0]["username"], "u1");
    assert_eq!(body["next"], "/api/users/?limit=2&page=2");
}

#[tokio::test]
async fn test_admin_deletes_user_with_their_recipes() {
    let app = spawn_app().await;
    let author = app.user("author").await;
    let fan = app.user("fan").await;
    let admin = app.admin("root").await;
    let tag = app.tag("Lunch", "lunch").await;
    let egg = app.ingredient("egg", "pcs").await;
    let recipe = app.recipe(&author, "Omelette", &[tag], &[(egg, 2)]).await;
    app.post(&format!("/api/recipes/{}/favorite/", recipe["id"]), Some(&fan.token), json!({}))
        .await;
    app.post(&format!("/api/users/{}/subscribe/", author.id), Some(&fan.token), json!({}))
        .await;

    let uri = format!("/api/users/{}/", author.id);
    let (status, _) = app.delete(&uri, Some(&fan.token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.delete(&uri, Some(&admin.token)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.get(&uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, body) = app.get("/api/recipes/", None).await;
    assert_eq!(body["count"], 0);
    let (_, body) = app.get("/api/users/subscriptions/", Some(&fan.token)).await;
    assert_eq!(body["count"], 0);
    let (_, body) = app
        .get("/api/recipes/?is_favorited=1", Some(&fan.token))
        .await;
    assert_eq!(body["count"], 0);
    let (status, _) = app.get("/api/users/me/", Some(&author.token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
