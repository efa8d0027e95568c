use axum::{Json, extract::State, http::StatusCode};

use crate::{
    error::{AppError, AppResult},
    extract::{EntityId, ValidJson, ValidQuery},
    models::{Category, Message, NewProduct, PageParams, Product, ProductPatch},
    repository::Repository,
    store::Filter,
};

/// The referenced category must exist; a dangling reference is a 422, not a 404.
async fn ensure_category_exists(
    categories: &Repository<Category>,
    category_id: &str,
) -> AppResult<()> {
    match categories.find_by_id(category_id).await {
        Ok(_) => Ok(()),
        Err(AppError::NotFound(_)) => Err(AppError::Relationship(format!(
            "Category '{category_id}' does not exist"
        ))),
        Err(other) => Err(other),
    }
}

/// list_products
///
/// [Public Route] The whole menu in insertion order.
///
/// *Paging*: `page` and `page_size` window the listing. With only one supplied the
/// other takes its default, and a page beyond the data is an empty list.
#[utoipa::path(
    get,
    path = "/products/",
    tag = "products",
    params(PageParams),
    responses(
        (status = 200, description = "Products", body = [Product]),
        (status = 400, description = "Invalid paging parameters")
    )
)]
pub async fn list_products(
    State(products): State<Repository<Product>>,
    ValidQuery(page): ValidQuery<PageParams>,
) -> AppResult<Json<Vec<Product>>> {
    Ok(Json(products.find_all(Filter::All, page.window()).await?))
}

/// get_product
///
/// [Public Route] A single product by id.
#[utoipa::path(
    get,
    path = "/products/{id}",
    tag = "products",
    params(("id" = String, Path, description = "Product id (24 hex characters)")),
    responses(
        (status = 200, description = "Product", body = Product),
        (status = 400, description = "Malformed id"),
        (status = 404, description = "Product not found")
    )
)]
pub async fn get_product(
    EntityId(id): EntityId,
    State(products): State<Repository<Product>>,
) -> AppResult<Json<Product>> {
    Ok(Json(products.find_by_id(&id).await?))
}

/// create_product
///
/// [Staff Route] Adds a product to the menu.
///
/// *Checks*: The name must be unused, ignoring case (409), and `category_id` must
/// name an existing category (422). Field rules such as a positive price and one to
/// ten tags are enforced by `ValidJson` beforehand.
#[utoipa::path(
    post,
    path = "/products/",
    tag = "products",
    request_body = NewProduct,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Product created", body = Product),
        (status = 400, description = "Validation failed"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Requires admin or super-admin"),
        (status = 409, description = "Name already taken"),
        (status = 422, description = "Unknown category")
    )
)]
pub async fn create_product(
    State(products): State<Repository<Product>>,
    State(categories): State<Repository<Category>>,
    ValidJson(payload): ValidJson<NewProduct>,
) -> AppResult<(StatusCode, Json<Product>)> {
    // 1. Name uniqueness.
    if products.exists("name", &payload.name).await? {
        return Err(AppError::Conflict(format!(
            "Product '{}' already exists",
            payload.name
        )));
    }
    // 2. The referenced category.
    ensure_category_exists(&categories, &payload.category_id).await?;

    // 3. Persist.
    let product = products.insert(&payload).await?;
    tracing::info!(
        product_id = %product.id,
        category_id = %product.category_id,
        "product created"
    );
    Ok((StatusCode::CREATED, Json(product)))
}

/// update_product
///
/// [Staff Route] Merges the supplied fields into the stored product.
///
/// The creation checks apply only to the fields present: a new name must not be
/// held by another product, and a new `category_id` must exist. Re-sending the
/// current name is not a conflict.
#[utoipa::path(
    put,
    path = "/products/{id}",
    tag = "products",
    params(("id" = String, Path, description = "Product id")),
    request_body = ProductPatch,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Product updated", body = Product),
        (status = 400, description = "Malformed id or validation failed"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Requires admin or super-admin"),
        (status = 404, description = "Product not found"),
        (status = 409, description = "Name already taken"),
        (status = 422, description = "Unknown category")
    )
)]
pub async fn update_product(
    EntityId(id): EntityId,
    State(products): State<Repository<Product>>,
    State(categories): State<Repository<Category>>,
    ValidJson(patch): ValidJson<ProductPatch>,
) -> AppResult<Json<Product>> {
    // 1. Existence check.
    products.find_by_id(&id).await?;

    // 2. Checks on the supplied fields.

    if let Some(name) = &patch.name {
        if products.natural_key_taken(name, Some(&id)).await? {
            return Err(AppError::Conflict(format!("Product '{name}' already exists")));
        }
    }
    if let Some(category_id) = &patch.category_id {
        ensure_category_exists(&categories, category_id).await?;
    }

    // 3. Merge.
    let product = products.update_by_id(&id, &patch).await?;
    tracing::info!(product_id = %product.id, "product updated");
    Ok(Json(product))
}

/// delete_product
///
/// [Staff Route] Removes a product. Never cascades; the category it belonged to is
/// left as is.
#[utoipa::path(
    delete,
    path = "/products/{id}",
    tag = "products",
    params(("id" = String, Path, description = "Product id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Product deleted", body = Message),
        (status = 400, description = "Malformed id"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Requires admin or super-admin"),
        (status = 404, description = "Product not found")
    )
)]
pub async fn delete_product(
    EntityId(id): EntityId,
    State(products): State<Repository<Product>>,
) -> AppResult<Json<Message>> {
    products.delete_by_id(&id).await?;
    tracing::info!(product_id = %id, "product deleted");
    Ok(Json(Message::new("Product deleted successfully")))
}
