mod common;

use axum::http::StatusCode;
use common::spawn_app;
use serde_json::json;

#[tokio::test]
async fn test_tags_admin_create_and_list() {
    let app = spawn_app().await;
    let user = app.user("plain").await;
    let admin = app.admin("root").await;
    let payload = json!({ "name": "Завтрак", "color": "#e26c2d", "slug": "breakfast" });

    let (status, _) = app.post("/api/tags/", Some(&user.token), payload.clone()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.post("/api/tags/", Some(&admin.token), payload.clone()).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["color"], "#E26C2D");
    let tag_id = body["id"].as_i64().unwrap();

    let (status, body) = app.post("/api/tags/", Some(&admin.token), payload).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["errors"].is_string());

    let (status, body) = app
        .post(
            "/api/tags/",
            Some(&admin.token),
            json!({ "name": "Bad", "color": "orange", "slug": "not a slug" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["color"].is_array());
    assert!(body["slug"].is_array());

    app.tag("Ужин", "dinner").await;
    let (status, body) = app.get("/api/tags/", None).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Завтрак", "Ужин"]);

    let (status, body) = app.get(&format!("/api/tags/{tag_id}/"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["slug"], "breakfast");
    let (status, _) = app.get("/api/tags/999/", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.get("/api/tags/abc/", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_ingredient_search_ranks_prefix_first() {
    let app = spawn_app().await;
    app.ingredient("Сахарный ингредиент", "г").await;
    app.ingredient("Ингредиент основной", "г").await;
    app.ingredient("Соль", "г").await;

    let (status, body) = app
        .get("/api/ingredients/?name=%D0%B8%D0%BD%D0%B3%D1%80%D0%B5%D0%B4%D0%B8%D0%B5%D0%BD%D1%82", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Ингредиент основной", "Сахарный ингредиент"]);

    let (status, body) = app.get("/api/ingredients/?name=zzz", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));

    let (_, body) = app.get("/api/ingredients/", None).await;
    assert_eq!(body.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_ingredient_order_ignores_case() {
    let app = spawn_app().await;
    app.ingredient("яблоко", "шт").await;
    app.ingredient("Ягода", "г").await;
    app.ingredient("ананас", "шт").await;
    app.ingredient("Банан", "шт").await;

    let (status, body) = app.get("/api/ingredients/", None).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["ананас", "Банан", "яблоко", "Ягода"]);

    let (_, body) = app
        .get("/api/ingredients/?name=%D1%8F", None)
        .await;
    let names: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["яблоко", "Ягода"]);
}

#[tokio::test]
async fn test_ingredient_admin_create_and_read() {
    let app = spawn_app().await;
    let admin = app.admin("root").await;

    let (status, body) = app
        .post(
            "/api/ingredients/",
            Some(&admin.token),
            json!({ "name": "flour", "measurement_unit": "g" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["id"].as_i64().unwrap();

    let (status, _) = app
        .post(
            "/api/ingredients/",
            Some(&admin.token),
            json!({ "name": "flour", "measurement_unit": "g" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post(
            "/api/ingredients/",
            Some(&admin.token),
            json!({ "name": "flour", "measurement_unit": "kg" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app.get(&format!("/api/ingredients/{id}/"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "id": id, "name": "flour", "measurement_unit": "g" }));
}

#[tokio::test]
async fn test_malformed_json_is_a_validation_error() {
    let app = spawn_app().await;
    let admin = app.admin("root").await;
    let response = app
        .send(
            axum::http::Method::POST,
            "/api/tags/",
            Some(&admin.token),
            Some(json!("not an object")),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
