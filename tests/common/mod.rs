#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
    response::Response,
};
use foodgram::db::schema;
use foodgram::db::services::{ingredient_service, tag_service, user_service};
use foodgram::server::config::ServerConfig;
use foodgram::services::validation::{NewIngredient, NewTag};
use http_body_util::BodyExt;
use sea_orm::{Database, DatabaseConnection};
use serde_json::{Value, json};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

pub const GIF: &str =
    "data:image/gif;base64,R0lGODlhAgABAIAAAAAAAP///yH5BAAAAAAALAAAAAACAAEAAAICDAoAOw==";

pub struct TestApp {
    pub app: Router,
    pub db: DatabaseConnection,
    pub config: Arc<ServerConfig>,
    pub media_dir: TempDir,
}

pub struct TestUser {
    pub id: i32,
    pub username: String,
    pub token: String,
}

pub async fn setup_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    schema::create_tables(&db).await.unwrap();
    db
}

pub async fn spawn_app() -> TestApp {
    let db = setup_db().await;
    let media_dir = tempfile::tempdir().unwrap();
    let mut config = ServerConfig::with_defaults("sqlite::memory:", "integration-secret");
    config.media_dir = media_dir.path().to_string_lossy().into_owned();
    config.password_hash_cost = 4;
    let config = Arc::new(config);
    let app = foodgram::web::create_axum_router(db.clone(), config.clone());
    TestApp {
        app,
        db,
        config,
        media_dir,
    }
}

impl TestApp {
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Token {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.app.clone().oneshot(request).await.unwrap()
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let response = self.send(method, uri, token, body).await;
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        if bytes.is_empty() {
            return (status, Value::Null);
        }
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    /// Sends a JSON request that carries the token as a `token` cookie instead of a header.
    pub async fn request_with_cookie(
        &self,
        method: Method,
        uri: &str,
        cookie_token: &str,
        body: Value,
    ) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::COOKIE, format!("token={cookie_token}"))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        if bytes.is_empty() {
            return (status, Value::Null);
        }
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.request(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, token, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.request(Method::DELETE, uri, token, None).await
    }

    /// Registers through the API and logs in, returning the token.
    pub async fn user(&self, username: &str) -> TestUser {
        let email = format!("{username}@example.com");
        let (status, body) = self
            .post(
                "/api/users/",
                None,
                json!({
                    "email": email,
                    "username": username,
                    "first_name": "Test",
                    "last_name": "User",
                    "password": "correct-horse-battery",
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        let id = body["id"].as_i64().unwrap() as i32;

        let (status, body) = self
            .post(
                "/api/auth/token/login/",
                None,
                json!({ "email": email, "password": "correct-horse-battery" }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        TestUser {
            id,
            username: username.to_string(),
            token: body["auth_token"].as_str().unwrap().to_string(),
        }
    }

    pub async fn admin(&self, username: &str) -> TestUser {
        let user = self.user(username).await;
        user_service::set_admin(&self.db, user.id, true).await.unwrap();
        user
    }

    pub async fn tag(&self, name: &str, slug: &str) -> i32 {
        tag_service::create_tag(
            &self.db,
            NewTag {
                name: name.to_string(),
                color: "#E26C2D".to_string(),
                slug: slug.to_string(),
            },
        )
        .await
        .unwrap()
        .id
    }

    pub async fn ingredient(&self, name: &str, unit: &str) -> i32 {
        ingredient_service::create_ingredient(
            &self.db,
            NewIngredient {
                name: name.to_string(),
                measurement_unit: unit.to_string(),
            },
        )
        .await
        .unwrap()
        .id
    }

    /// Creates a recipe through the API; `ingredients` are (id, amount) pairs.
    pub async fn recipe(
        &self,
        author: &TestUser,
        name: &str,
        tags: &[i32],
        ingredients: &[(i32, i64)],
    ) -> Value {
        let ingredients: Vec<Value> = ingredients
            .iter()
            .map(|(id, amount)| json!({ "id": id, "amount": amount }))
            .collect();
        let (status, body) = self
            .post(
                "/api/recipes/",
                Some(&author.token),
                json!({
                    "ingredients": ingredients,
                    "tags": tags,
                    "image": GIF,
                    "name": name,
                    "text": "Mix everything.",
                    "cooking_time": 10,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body
    }
}
