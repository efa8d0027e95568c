#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Method, Request, StatusCode, header},
};
use chrono::Utc;
use menu_catalog::{
    AppConfig, AppState, MemoryStore, StoreState, auth, create_router,
    models::{Role, User, UserDraft},
    repository::Repository,
};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::util::ServiceExt;

pub const DEFAULT_PASSWORD: &str = "Secret123!";

/// The full router over a fresh in-memory store.
pub struct TestApp {
    pub router: Router,
    pub store: StoreState,
    pub config: AppConfig,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_store(Arc::new(MemoryStore::new()))
    }

    pub fn failing() -> Self {
        Self::with_store(Arc::new(MemoryStore::new_failing()))
    }

    pub fn with_store(store: StoreState) -> Self {
        Self::with_config(store, AppConfig::default())
    }

    pub fn with_config(store: StoreState, config: AppConfig) -> Self {
        let router = create_router(AppState::new(store.clone(), config.clone()));
        Self {
            router,
            store,
            config,
        }
    }

    pub fn users(&self) -> Repository<User> {
        Repository::new(self.store.clone())
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(request).await
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        self.request(Method::GET, uri, None, None).await
    }

    pub async fn get_as(&self, uri: &str, token: &str) -> TestResponse {
        self.request(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.request(Method::POST, uri, token, Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.request(Method::PUT, uri, token, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.request(Method::DELETE, uri, token, None).await
    }

    /// Stores a user with `roles` directly and returns its id with a valid token.
    pub async fn user_with_roles(&self, username: &str, roles: &[Role]) -> (String, String) {
        let now = Utc::now();
        let draft = UserDraft {
            username: username.to_string(),
            email: format!("{username}@example.com"),
            hashed_password: auth::hash_password(DEFAULT_PASSWORD).await.unwrap(),
            avatar: None,
            roles: roles.to_vec(),
            created_at: now,
            updated_at: now,
        };
        let user = self.users().insert(&draft).await.unwrap();
        let token = auth::issue_token(&user.id, &self.config).unwrap();
        (user.id, token)
    }

    pub async fn admin_token(&self) -> String {
        self.user_with_roles("catalog_admin", &[Role::Admin]).await.1
    }

    pub async fn super_admin_token(&self) -> String {
        self.user_with_roles("root_admin", &[Role::SuperAdmin]).await.1
    }

    /// Creates a category through the API and returns its id.
    pub async fn create_category(&self, token: &str, name: &str) -> String {
        let response = self
            .post("/categories/", Some(token), category_body(name))
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
        response.body["id"].as_str().unwrap().to_string()
    }

    /// Creates a product through the API and returns its id.
    pub async fn create_product(&self, token: &str, name: &str, category_id: &str) -> String {
        let response = self
            .post("/products/", Some(token), product_body(name, category_id))
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
        response.body["id"].as_str().unwrap().to_string()
    }
}

pub fn category_body(name: &str) -> Value {
    json!({ "name": name, "image": "https://example.com/category.jpg" })
}

pub fn product_body(name: &str, category_id: &str) -> Value {
    json!({
        "name": name,
        "description": "Rich chocolate cake",
        "category_id": category_id,
        "tags": ["dessert", "chocolate"],
        "price": 19.99,
        "image": "https://example.com/product.jpg"
    })
}

pub fn signup_body(username: &str, email: &str) -> Value {
    json!({
        "username": username,
        "email": email,
        "password": DEFAULT_PASSWORD,
        "confirm_password": DEFAULT_PASSWORD
    })
}
