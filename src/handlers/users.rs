use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;

use crate::{
    auth::{self, AuthUser},
    config::{AppConfig, SuperAdminSeed},
    error::{AppError, AppResult},
    extract::{EntityId, ValidJson, ValidQuery},
    models::{
        LoginRequest, NewUser, PageParams, PublicUser, Role, TokenResponse, User, UserChanges,
        UserDraft, UserPatch, normalize_roles,
    },
    repository::Repository,
    store::Filter,
};

fn user_not_found() -> AppError {
    AppError::NotFound("User not found".to_string())
}

/// create_user
///
/// [Public Route] Self-service sign-up. The account always starts with the
/// `user` role; roles are granted later by a super-admin.
///
/// *Validation*: `ValidJson` checks username length, email shape, password strength
/// and that `confirm_password` matches before this handler runs. Any `roles` field in
/// the body is ignored.
///
/// *Uniqueness*: Emails are compared case-insensitively, so `Maria@Example.com` and
/// `maria@example.com` collide with a 409.
#[utoipa::path(
    post,
    path = "/users/",
    tag = "users",
    request_body = NewUser,
    responses(
        (status = 201, description = "User created", body = PublicUser),
        (status = 400, description = "Validation failed"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn create_user(
    State(users): State<Repository<User>>,
    ValidJson(payload): ValidJson<NewUser>,
) -> AppResult<(StatusCode, Json<PublicUser>)> {
    if users.exists("email", &payload.email).await? {
        return Err(AppError::Conflict(format!(
            "Email '{}' is already registered",
            payload.email
        )));
    }

    let now = Utc::now();
    let draft = UserDraft {
        username: payload.username,
        email: payload.email,
        hashed_password: auth::hash_password(&payload.password).await?,
        avatar: payload.avatar,
        roles: vec![Role::User],
        created_at: now,
        updated_at: now,
    };

    let user = users.insert(&draft).await?;
    tracing::info!(user_id = %user.id, "user registered");
    Ok((StatusCode::CREATED, Json(PublicUser::from(user))))
}

/// login
///
/// [Public Route] Exchanges email and password for a bearer token.
///
/// *Security*: Unknown email and wrong password produce the same 401 body, so the
/// endpoint cannot be used to discover registered addresses. The token carries only
/// the user id; roles are re-read from the store on every request.
#[utoipa::path(
    post,
    path = "/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token issued", body = TokenResponse),
        (status = 400, description = "Validation failed"),
        (status = 401, description = "Incorrect email or password")
    )
)]
pub async fn login(
    State(users): State<Repository<User>>,
    State(config): State<AppConfig>,
    ValidJson(credentials): ValidJson<LoginRequest>,
) -> AppResult<Json<TokenResponse>> {
    let rejected = || AppError::Unauthenticated("Incorrect email or password".to_string());

    // 1. Lookup by email, ignoring case.
    let user = users
        .find_one(Filter::eq_ignore_case("email", &credentials.email))
        .await?
        .ok_or_else(rejected)?;

    // 2. Password check against the stored argon2 hash.
    if !auth::verify_password(&credentials.password, &user.hashed_password).await? {
        tracing::warn!(user_id = %user.id, "login with wrong password");
        return Err(rejected());
    }

    // 3. Sign a token for the configured lifetime.
    let access_token = auth::issue_token(&user.id, &config)?;
    tracing::info!(user_id = %user.id, "access token issued");
    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer".to_string(),
    }))
}

/// get_me
///
/// [Authenticated Route] The profile of the token's owner.
///
/// *Note*: The identity comes from the `AuthUser` extractor, which has already loaded
/// the user once. The record is fetched again so the response reflects the stored
/// profile rather than the trimmed identity.
#[utoipa::path(
    get,
    path = "/users/me",
    tag = "users",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Current user", body = PublicUser),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn get_me(
    AuthUser { id, .. }: AuthUser,
    State(users): State<Repository<User>>,
) -> AppResult<Json<PublicUser>> {
    let user = users.find_by_id(&id).await?;
    Ok(Json(PublicUser::from(user)))
}

/// get_user
///
/// [Public Route] A single user's public profile by id. The password hash and
/// account-recovery fields are never part of the response.
#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "users",
    params(("id" = String, Path, description = "User id (24 hex characters)")),
    responses(
        (status = 200, description = "User", body = PublicUser),
        (status = 400, description = "Malformed id"),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_user(
    EntityId(id): EntityId,
    State(users): State<Repository<User>>,
) -> AppResult<Json<PublicUser>> {
    Ok(Json(PublicUser::from(users.find_by_id(&id).await?)))
}

/// list_users
///
/// [Staff Route] All users in insertion order, windowed when `page` or `page_size`
/// is given.
#[utoipa::path(
    get,
    path = "/users/",
    tag = "users",
    params(PageParams),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Users", body = [PublicUser]),
        (status = 400, description = "Invalid paging parameters"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Requires admin or super-admin")
    )
)]
pub async fn list_users(
    State(users): State<Repository<User>>,
    ValidQuery(page): ValidQuery<PageParams>,
) -> AppResult<Json<Vec<PublicUser>>> {
    let records = users.find_all(Filter::All, page.window()).await?;
    Ok(Json(records.into_iter().map(PublicUser::from).collect()))
}

/// get_user_by_email
///
/// [Staff Route] Case-insensitive exact match.
#[utoipa::path(
    get,
    path = "/users/email/{email}",
    tag = "users",
    params(("email" = String, Path, description = "Email address")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "User", body = PublicUser),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Requires admin or super-admin"),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_user_by_email(
    Path(email): Path<String>,
    State(users): State<Repository<User>>,
) -> AppResult<Json<PublicUser>> {
    let user = users
        .find_one(Filter::eq_ignore_case("email", email))
        .await?
        .ok_or_else(user_not_found)?;
    Ok(Json(PublicUser::from(user)))
}

/// get_user_by_username
///
/// [Staff Route] Usernames are not unique; the first match is returned.
#[utoipa::path(
    get,
    path = "/users/username/{username}",
    tag = "users",
    params(("username" = String, Path, description = "Username")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "User", body = PublicUser),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Requires admin or super-admin"),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_user_by_username(
    Path(username): Path<String>,
    State(users): State<Repository<User>>,
) -> AppResult<Json<PublicUser>> {
    let user = users
        .find_one(Filter::eq("username", username))
        .await?
        .ok_or_else(user_not_found)?;
    Ok(Json(PublicUser::from(user)))
}

/// update_user
///
/// [Super-Admin Route] Merges the supplied fields into the stored user.
///
/// Only fields present in the body change. A new password is hashed before it is
/// stored, roles collapse to a set in canonical order, and `updated_at` is always
/// refreshed.
///
/// *Conflicts*: Keeping one's own email is allowed; taking another user's is a 409.
#[utoipa::path(
    put,
    path = "/users/{id}",
    tag = "users",
    params(("id" = String, Path, description = "User id")),
    request_body = UserPatch,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "User updated", body = PublicUser),
        (status = 400, description = "Malformed id or validation failed"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Requires super-admin"),
        (status = 404, description = "User not found"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn update_user(
    EntityId(id): EntityId,
    State(users): State<Repository<User>>,
    ValidJson(patch): ValidJson<UserPatch>,
) -> AppResult<Json<PublicUser>> {
    // 1. Existence check, so a missing user is a 404 before any conflict check.
    users.find_by_id(&id).await?;

    // 2. Email uniqueness, excluding the user being edited.
    if let Some(email) = &patch.email {
        if users.natural_key_taken(email, Some(&id)).await? {
            return Err(AppError::Conflict(format!(
                "Email '{email}' is already registered"
            )));
        }
    }

    // 3. Hash the replacement password, if any.
    let hashed_password = match patch.password.as_deref() {
        Some(plain) => Some(auth::hash_password(plain).await?),
        None => None,
    };

    let changes = UserChanges {
        username: patch.username,
        email: patch.email,
        hashed_password,
        avatar: patch.avatar,
        roles: patch.roles.map(normalize_roles),
        updated_at: Utc::now(),
    };

    // 4. Apply as a single `$set` and return the stored result.
    let user = users.update_by_id(&id, &changes).await?;
    tracing::info!(user_id = %user.id, roles = ?user.roles, "user updated");
    Ok(Json(PublicUser::from(user)))
}

/// delete_user
///
/// [Super-Admin Route] Removes a user.
///
/// *Authorization*: Super-admin accounts are protected. Deleting one is a 403, even
/// when the caller is another super-admin.
#[utoipa::path(
    delete,
    path = "/users/{id}",
    tag = "users",
    params(("id" = String, Path, description = "User id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 204, description = "User deleted"),
        (status = 400, description = "Malformed id"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Requires super-admin, or target is a super-admin"),
        (status = 404, description = "User not found")
    )
)]
pub async fn delete_user(
    EntityId(id): EntityId,
    State(users): State<Repository<User>>,
) -> AppResult<StatusCode> {
    let target = users.find_by_id(&id).await?;
    if target.has_role(Role::SuperAdmin) {
        tracing::warn!(user_id = %id, "refused to delete a super-admin");
        return Err(AppError::Forbidden(
            "Super-admin accounts cannot be deleted".to_string(),
        ));
    }

    users.delete_by_id(&id).await?;
    tracing::info!(user_id = %id, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// ensure_super_admin
///
/// Startup seeding: creates the configured super-admin unless a user with that
/// email already exists. Returns whether an account was created.
///
/// An existing account is left untouched, including its password and roles.
pub async fn ensure_super_admin(users: &Repository<User>, seed: &SuperAdminSeed) -> AppResult<bool> {
    if users.exists("email", &seed.email).await? {
        return Ok(false);
    }

    let now = Utc::now();
    let draft = UserDraft {
        username: "superadmin".to_string(),
        email: seed.email.clone(),
        hashed_password: auth::hash_password(&seed.password).await?,
        avatar: None,
        roles: vec![Role::SuperAdmin],
        created_at: now,
        updated_at: now,
    };
    let user = users.insert(&draft).await?;
    tracing::info!(user_id = %user.id, "super-admin seeded");
    Ok(true)
}
