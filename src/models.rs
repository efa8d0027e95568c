use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidationError};

use crate::{
    repository::{Entity, is_valid_id},
    store::Window,
};

// --- Roles ---

/// Role
///
/// Authorization tag carried by a user. Serialized in kebab-case, so
/// `Role::SuperAdmin` travels as `"super-admin"`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS, ToSchema,
)]
#[serde(rename_all = "kebab-case")]
#[ts(export)]
pub enum Role {
    User,
    Admin,
    SuperAdmin,
}

/// Sorts and de-duplicates a role list so it behaves as a set.
pub fn normalize_roles(mut roles: Vec<Role>) -> Vec<Role> {
    roles.sort();
    roles.dedup();
    roles
}

// --- Stored records (responses) ---

/// Category
///
/// A menu section such as "Postres". `name` is unique case-insensitively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Category {
    #[schema(example = "60d5ec49f87d2e5a2c9c1234")]
    pub id: String,
    #[schema(example = "Postres")]
    pub name: String,
    #[schema(example = "https://example.com/category.jpg")]
    pub image: String,
}

/// Product
///
/// A menu item. `category_id` holds the id of an existing category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Product {
    pub id: String,
    #[schema(example = "Torta de Chocolate")]
    pub name: String,
    pub description: String,
    pub category_id: String,
    pub tags: Vec<String>,
    #[schema(example = 19.99)]
    pub price: f64,
    pub image: String,
}

/// Identity data linked from a Google sign-in. Stored and returned as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct GoogleInfo {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}

/// User
///
/// The full stored user, including the password hash. Never serialized into a
/// response; handlers convert it to `PublicUser` first.
#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub hashed_password: String,
    #[serde(default)]
    pub avatar: Option<String>,
    pub roles: Vec<Role>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub google_info: Option<GoogleInfo>,
    #[serde(default)]
    pub reset_tokens: Option<Vec<String>>,
}

impl User {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

/// PublicUser
///
/// The client-facing view of a user: no password hash, no reset tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct PublicUser {
    pub id: String,
    pub username: String,
    pub email: String,
    pub avatar: Option<String>,
    pub roles: Vec<Role>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub google_info: Option<GoogleInfo>,
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            avatar: user.avatar,
            roles: user.roles,
            created_at: user.created_at,
            updated_at: user.updated_at,
            google_info: user.google_info,
        }
    }
}

impl Entity for Category {
    const COLLECTION: &'static str = "categories";
    const LABEL: &'static str = "Category";
    const NATURAL_KEY: &'static str = "name";
}

impl Entity for Product {
    const COLLECTION: &'static str = "products";
    const LABEL: &'static str = "Product";
    const NATURAL_KEY: &'static str = "name";
}

impl Entity for User {
    const COLLECTION: &'static str = "users";
    const LABEL: &'static str = "User";
    const NATURAL_KEY: &'static str = "email";
}

// --- Request payloads (input schemas) ---

/// NewCategory
///
/// Body of `POST /categories/`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, TS, ToSchema)]
#[ts(export)]
pub struct NewCategory {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(url)]
    pub image: String,
}

/// CategoryPatch
///
/// Body of `PUT /categories/{id}`. Only supplied fields are validated and merged.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, TS, ToSchema)]
#[ts(export)]
pub struct CategoryPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(url)]
    pub image: Option<String>,
}

/// NewProduct
///
/// Body of `POST /products/`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, TS, ToSchema)]
#[ts(export)]
pub struct NewProduct {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(min = 1, max = 300))]
    pub description: String,
    #[validate(custom(function = "validate_object_id"))]
    pub category_id: String,
    #[validate(length(min = 1, max = 10), custom(function = "validate_tags"))]
    pub tags: Vec<String>,
    #[validate(range(exclusive_min = 0.0))]
    pub price: f64,
    #[validate(url)]
    pub image: String,
}

/// ProductPatch
///
/// Body of `PUT /products/{id}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, TS, ToSchema)]
#[ts(export)]
pub struct ProductPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 300))]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(custom(function = "validate_object_id"))]
    pub category_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 10), custom(function = "validate_tags"))]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(exclusive_min = 0.0))]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(url)]
    pub image: Option<String>,
}

/// NewUser
///
/// Body of the public `POST /users/` sign-up. `confirm_password` is checked and
/// dropped; new accounts always start with the `user` role.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, TS, ToSchema)]
#[ts(export)]
pub struct NewUser {
    #[validate(length(min = 4, max = 50))]
    pub username: String,
    #[validate(email)]
    pub email: String,
    #[validate(custom(function = "validate_password"))]
    pub password: String,
    #[validate(must_match(other = "password"))]
    pub confirm_password: String,
    #[serde(default)]
    #[validate(url)]
    pub avatar: Option<String>,
}

/// UserPatch
///
/// Body of `PUT /users/{id}` (super-admin only). A new password is hashed
/// before it is stored.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, TS, ToSchema)]
#[ts(export)]
pub struct UserPatch {
    #[serde(default)]
    #[validate(length(min = 4, max = 50))]
    pub username: Option<String>,
    #[serde(default)]
    #[validate(email)]
    pub email: Option<String>,
    #[serde(default)]
    #[validate(custom(function = "validate_password"))]
    pub password: Option<String>,
    #[serde(default)]
    #[validate(url)]
    pub avatar: Option<String>,
    #[serde(default)]
    #[validate(length(min = 1))]
    pub roles: Option<Vec<Role>>,
}

/// LoginRequest
///
/// Body of `POST /login`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, TS, ToSchema)]
#[ts(export)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

/// TokenResponse
///
/// A freshly issued bearer token.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct TokenResponse {
    pub access_token: String,
    #[schema(example = "bearer")]
    pub token_type: String,
}

/// Plain acknowledgement body for deletions.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Message {
    pub message: String,
}

impl Message {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

// --- Persistence shapes for users ---
// Users are written through these instead of the request payloads so the plaintext
// password never reaches the store.

/// Fields written when a user is created.
#[derive(Debug, Clone, Serialize)]
pub struct UserDraft {
    pub username: String,
    pub email: String,
    pub hashed_password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    pub roles: Vec<Role>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields merged into a stored user by an update. `updated_at` is always set.
#[derive(Debug, Clone, Serialize)]
pub struct UserChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hashed_password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<Role>>,
    pub updated_at: DateTime<Utc>,
}

// --- Pagination ---

/// PageParams
///
/// `?page=&page_size=` on listing endpoints. With neither present the listing is
/// not windowed; with only one present the other takes its default.
#[derive(Debug, Clone, Copy, Default, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageParams {
    /// 1-based page number.
    #[validate(range(min = 1))]
    pub page: Option<u64>,
    /// Records per page, 1 to 100.
    #[validate(range(min = 1, max = 100))]
    pub page_size: Option<u64>,
}

impl PageParams {
    pub const DEFAULT_PAGE_SIZE: u64 = 10;

    /// The offset/limit window for these parameters. Assumes they were validated.
    pub fn window(&self) -> Option<Window> {
        if self.page.is_none() && self.page_size.is_none() {
            return None;
        }
        let page = self.page.unwrap_or(1).max(1);
        let page_size = self.page_size.unwrap_or(Self::DEFAULT_PAGE_SIZE);
        Some(Window {
            skip: (page - 1).saturating_mul(page_size),
            limit: page_size,
        })
    }
}

// --- Field rules ---

/// Characters of which a password must contain at least one.
pub const PASSWORD_SPECIALS: &[char] = &['!', '@', '#', '$', '%', '^', '&', '*', ':'];

pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    let rules = [
        (password.chars().count() >= 8, "at least 8 characters"),
        (password.chars().any(char::is_uppercase), "an uppercase letter"),
        (password.chars().any(char::is_lowercase), "a lowercase letter"),
        (password.chars().any(|c| c.is_ascii_digit()), "a digit"),
        (
            password.chars().any(|c| PASSWORD_SPECIALS.contains(&c)),
            "one of ! @ # $ % ^ & * :",
        ),
    ];

    let missing: Vec<&str> = rules
        .iter()
        .filter(|(passed, _)| !passed)
        .map(|(_, rule)| *rule)
        .collect();

    if missing.is_empty() {
        return Ok(());
    }
    Err(ValidationError::new("password_strength")
        .with_message(format!("password must contain {}", missing.join(", ")).into()))
}

pub fn validate_tags(tags: &[String]) -> Result<(), ValidationError> {
    if tags.iter().any(|tag| tag.trim().is_empty()) {
        return Err(ValidationError::new("empty_tag").with_message("tags must not be empty".into()));
    }
    Ok(())
}

pub fn validate_object_id(id: &str) -> Result<(), ValidationError> {
    if is_valid_id(id) {
        return Ok(());
    }
    Err(ValidationError::new("object_id")
        .with_message("must be a 24-character hexadecimal id".into()))
}
