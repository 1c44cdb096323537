mod common;

use axum::http::StatusCode;
use common::spawn_app;
use serde_json::json;

#[tokio::test]
async fn test_favorite_toggle_contract() {
    let app = spawn_app().await;
    let author = app.user("author").await;
    let fan = app.user("fan").await;
    let tag = app.tag("Lunch", "lunch").await;
    let egg = app.ingredient("egg", "pcs").await;
    let recipe = app.recipe(&author, "Omelette", &[tag], &[(egg, 2)]).await;
    let uri = format!("/api/recipes/{}/favorite/", recipe["id"]);

    let (status, body) = app.post(&uri, Some(&fan.token), json!({})).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["id"], recipe["id"]);
    assert_eq!(body["name"], "Omelette");
    assert_eq!(body["cooking_time"], 10);
    assert!(body["image"].is_string());
    assert!(body.get("author").is_none());

    let (status, body) = app.post(&uri, Some(&fan.token), json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["errors"].is_string());

    let (status, _) = app.delete(&uri, Some(&fan.token)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, body) = app.delete(&uri, Some(&fan.token)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["errors"].is_string());
}

#[tokio::test]
async fn test_shopping_cart_toggle_contract() {
    let app = spawn_app().await;
    let cook = app.user("cook").await;
    let tag = app.tag("Lunch", "lunch").await;
    let egg = app.ingredient("egg", "pcs").await;
    let recipe = app.recipe(&cook, "Omelette", &[tag], &[(egg, 2)]).await;
    let uri = format!("/api/recipes/{}/shopping_cart/", recipe["id"]);

    let (status, _) = app.post(&uri, Some(&cook.token), json!({})).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = app.delete(&uri, Some(&cook.token)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.delete(&uri, Some(&cook.token)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_toggles_require_authentication_and_existing_recipe() {
    let app = spawn_app().await;
    let user = app.user("someone").await;

    let (status, _) = app.post("/api/recipes/1/favorite/", None, json!({})).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app
        .post("/api/recipes/42/shopping_cart/", Some(&user.token), json!({}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["detail"].is_string());
}

#[tokio::test]
async fn test_subscribe_contract() {
    let app = spawn_app().await;
    let follower = app.user("follower").await;
    let author = app.user("author").await;
    let tag = app.tag("Lunch", "lunch").await;
    let egg = app.ingredient("egg", "pcs").await;
    for name in ["First", "Second", "Third"] {
        app.recipe(&author, name, &[tag], &[(egg, 1)]).await;
    }

    let (status, body) = app
        .post(&format!("/api/users/{}/subscribe/", follower.id), Some(&follower.token), json!({}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["errors"].is_string());

    let uri = format!("/api/users/{}/subscribe/?recipes_limit=2", author.id);
    let (status, body) = app.post(&uri, Some(&follower.token), json!({})).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["username"], "author");
    assert_eq!(body["is_subscribed"], true);
    assert_eq!(body["recipes_count"], 3);
    assert_eq!(body["recipes"].as_array().unwrap().len(), 2);
    assert_eq!(body["recipes"][0]["name"], "Third");

    let (status, _) = app.post(&uri, Some(&follower.token), json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = app
        .get(&format!("/api/users/{}/", author.id), Some(&follower.token))
        .await;
    assert_eq!(body["is_subscribed"], true);

    let (status, _) = app
        .delete(&format!("/api/users/{}/subscribe/", author.id), Some(&follower.token))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app
        .delete(&format!("/api/users/{}/subscribe/", author.id), Some(&follower.token))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_subscriptions_list_in_subscription_order() {
    let app = spawn_app().await;
    let follower = app.user("follower").await;
    let zed = app.user("zed").await;
    let amy = app.user("amy").await;
    let tag = app.tag("Lunch", "lunch").await;
    let egg = app.ingredient("egg", "pcs").await;
    app.recipe(&amy, "Soup", &[tag], &[(egg, 1)]).await;
    app.recipe(&amy, "Salad", &[tag], &[(egg, 1)]).await;

    for author in [&zed, &amy] {
        let (status, _) = app
            .post(&format!("/api/users/{}/subscribe/", author.id), Some(&follower.token), json!({}))
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = app
        .get("/api/users/subscriptions/?recipes_limit=1", Some(&follower.token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);
    assert_eq!(body["results"][0]["username"], "zed");
    assert_eq!(body["results"][0]["recipes_count"], 0);
    assert_eq!(body["results"][1]["username"], "amy");
    assert_eq!(body["results"][1]["recipes_count"], 2);
    assert_eq!(body["results"][1]["recipes"].as_array().unwrap().len(), 1);

    let (status, _) = app.get("/api/users/subscriptions/", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
