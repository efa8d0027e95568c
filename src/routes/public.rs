use crate::{
    AppState,
    handlers::{categories, products, users},
};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a token: read-only catalog access, self-service
/// sign-up and login. Collection paths answer with and without the trailing slash.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /categories/?page=&page_size=
        .route("/categories", get(categories::list_categories))
        .route("/categories/", get(categories::list_categories))
        // GET /categories/{id}
        .route("/categories/{id}", get(categories::get_category))
        // GET /categories/{id}/products/
        // Products referencing the category; empty for an unknown category.
        .route(
            "/categories/{id}/products",
            get(categories::list_category_products),
        )
        .route(
            "/categories/{id}/products/",
            get(categories::list_category_products),
        )
        // GET /products/?page=&page_size=
        .route("/products", get(products::list_products))
        .route("/products/", get(products::list_products))
        // GET /products/{id}
        .route("/products/{id}", get(products::get_product))
        // POST /users/
        // Sign-up. New accounts always receive the `user` role.
        .route("/users", post(users::create_user))
        .route("/users/", post(users::create_user))
        // GET /users/{id}
        .route("/users/{id}", get(users::get_user))
        // POST /login
        // Email + password in, bearer token out.
        .route("/login", post(users::login))
}
