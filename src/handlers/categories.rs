use axum::{Json, extract::State, http::StatusCode};

use crate::{
    error::{AppError, AppResult},
    extract::{EntityId, ValidJson, ValidQuery},
    models::{Category, CategoryPatch, Message, NewCategory, PageParams, Product},
    repository::Repository,
    store::Filter,
};

/// list_categories
///
/// [Public Route] Every category in insertion order, optionally windowed by
/// `page` / `page_size`.
///
/// *Paging*: With neither parameter the full list is returned. A page past the end
/// is an empty list, not an error.
#[utoipa::path(
    get,
    path = "/categories/",
    tag = "categories",
    params(PageParams),
    responses(
        (status = 200, description = "Categories", body = [Category]),
        (status = 400, description = "Invalid paging parameters")
    )
)]
pub async fn list_categories(
    State(categories): State<Repository<Category>>,
    ValidQuery(page): ValidQuery<PageParams>,
) -> AppResult<Json<Vec<Category>>> {
    let records = categories.find_all(Filter::All, page.window()).await?;
    Ok(Json(records))
}

/// get_category
///
/// [Public Route] A single category by id. The id format is checked by `EntityId`
/// before the store is queried.
#[utoipa::path(
    get,
    path = "/categories/{id}",
    tag = "categories",
    params(("id" = String, Path, description = "Category id (24 hex characters)")),
    responses(
        (status = 200, description = "Category", body = Category),
        (status = 400, description = "Malformed id"),
        (status = 404, description = "Category not found")
    )
)]
pub async fn get_category(
    EntityId(id): EntityId,
    State(categories): State<Repository<Category>>,
) -> AppResult<Json<Category>> {
    Ok(Json(categories.find_by_id(&id).await?))
}

/// list_category_products
///
/// [Public Route] Products whose `category_id` is `{id}`. An unknown category
/// simply has no products.
#[utoipa::path(
    get,
    path = "/categories/{id}/products/",
    tag = "categories",
    params(("id" = String, Path, description = "Category id")),
    responses(
        (status = 200, description = "Products in the category", body = [Product]),
        (status = 400, description = "Malformed id")
    )
)]
pub async fn list_category_products(
    EntityId(id): EntityId,
    State(products): State<Repository<Product>>,
) -> AppResult<Json<Vec<Product>>> {
    Ok(Json(products.find_by_category(&id).await?))
}

/// create_category
///
/// [Staff Route] Adds a category to the menu.
///
/// *Uniqueness*: Names are compared case-insensitively and as whole values, so
/// `POSTRES` collides with `Postres` while `Post` does not.
#[utoipa::path(
    post,
    path = "/categories/",
    tag = "categories",
    request_body = NewCategory,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Category created", body = Category),
        (status = 400, description = "Validation failed"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Requires admin or super-admin"),
        (status = 409, description = "Name already taken")
    )
)]
pub async fn create_category(
    State(categories): State<Repository<Category>>,
    ValidJson(payload): ValidJson<NewCategory>,
) -> AppResult<(StatusCode, Json<Category>)> {
    if categories.exists("name", &payload.name).await? {
        return Err(AppError::Conflict(format!(
            "Category '{}' already exists",
            payload.name
        )));
    }

    let category = categories.insert(&payload).await?;
    tracing::info!(category_id = %category.id, name = %category.name, "category created");
    Ok((StatusCode::CREATED, Json(category)))
}

/// update_category
///
/// [Staff Route] Merges the supplied fields. A new name is checked against the
/// other categories only, so re-sending the current name is not a conflict.
#[utoipa::path(
    put,
    path = "/categories/{id}",
    tag = "categories",
    params(("id" = String, Path, description = "Category id")),
    request_body = CategoryPatch,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Category updated", body = Category),
        (status = 400, description = "Malformed id or validation failed"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Requires admin or super-admin"),
        (status = 404, description = "Category not found"),
        (status = 409, description = "Name already taken")
    )
)]
pub async fn update_category(
    EntityId(id): EntityId,
    State(categories): State<Repository<Category>>,
    ValidJson(patch): ValidJson<CategoryPatch>,
) -> AppResult<Json<Category>> {
    // 1. Existence check, so a missing category is a 404 before any conflict check.
    categories.find_by_id(&id).await?;

    // 2. Name uniqueness against the other categories.
    if let Some(name) = &patch.name {
        if categories.natural_key_taken(name, Some(&id)).await? {
            return Err(AppError::Conflict(format!("Category '{name}' already exists")));
        }
    }

    // 3. Merge the supplied fields.
    let category = categories.update_by_id(&id, &patch).await?;
    tracing::info!(category_id = %category.id, "category updated");
    Ok(Json(category))
}

/// delete_category
///
/// [Staff Route] Removes a category from the menu.
///
/// *Integrity*: There is no cascade. While any product still references the
/// category the request is refused with 422, and the client must move or delete
/// those products first.
#[utoipa::path(
    delete,
    path = "/categories/{id}",
    tag = "categories",
    params(("id" = String, Path, description = "Category id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Category deleted", body = Message),
        (status = 400, description = "Malformed id"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Requires admin or super-admin"),
        (status = 404, description = "Category not found"),
        (status = 422, description = "Category still has products")
    )
)]
pub async fn delete_category(
    EntityId(id): EntityId,
    State(categories): State<Repository<Category>>,
    State(products): State<Repository<Product>>,
) -> AppResult<Json<Message>> {
    // 1. Existence check.
    categories.find_by_id(&id).await?;

    // 2. Relationship guard.
    if products.any_in_category(&id).await? {
        return Err(AppError::Relationship(
            "Category has products associated with it; delete its products first".to_string(),
        ));
    }

    // 3. Delete.
    categories.delete_by_id(&id).await?;
    tracing::info!(category_id = %id, "category deleted");
    Ok(Json(Message::new("Category deleted successfully")))
}
