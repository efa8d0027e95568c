use crate::{
    AppState,
    handlers::{categories, products, users},
};
use axum::{
    Router,
    routing::{get, post, put},
};

/// Staff Router Module
///
/// Catalog mutations and user lookups, restricted to `admin` and `super-admin`
/// by the `require_roles::<Staff>` layer. Paths overlap with the public group;
/// axum merges the method routers, so `GET /categories/{id}` stays public while
/// `PUT` on the same path is gated.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // POST /categories/
        // Duplicate names (ignoring case) are rejected with 409.
        .route("/categories", post(categories::create_category))
        .route("/categories/", post(categories::create_category))
        // PUT/DELETE /categories/{id}
        // Deletion is refused with 422 while products still reference the category.
        .route(
            "/categories/{id}",
            put(categories::update_category).delete(categories::delete_category),
        )
        // POST /products/
        // `category_id` must reference an existing category.
        .route("/products", post(products::create_product))
        .route("/products/", post(products::create_product))
        // PUT/DELETE /products/{id}
        .route(
            "/products/{id}",
            put(products::update_product).delete(products::delete_product),
        )
        // GET /users/?page=&page_size=
        .route("/users", get(users::list_users))
        .route("/users/", get(users::list_users))
        // GET /users/email/{email}, /users/username/{username}
        .route("/users/email/{email}", get(users::get_user_by_email))
        .route("/users/username/{username}", get(users::get_user_by_username))
}
