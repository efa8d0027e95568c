use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::{
    extract::{FromRef, FromRequestParts, Request},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use chrono::{TimeDelta, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use serde::{Deserialize, Serialize};

use crate::{
    config::AppConfig,
    error::{AppError, AppResult},
    models::{Role, User},
    repository::{Repository, is_valid_id},
    store::StoreState,
};

/// Claims
///
/// Payload of an access token. `sub` is the hex id of the user it was issued to.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    /// Expiry (seconds since the epoch). Always validated.
    pub exp: u64,
    pub iat: u64,
}

/// AuthUser
///
/// The caller's resolved identity. Roles come from the stored user at request
/// time, not from the token, so a role change takes effect immediately.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: String,
    pub email: String,
    pub roles: Vec<Role>,
}

impl AuthUser {
    pub fn has_any_role(&self, allowed: &[Role]) -> bool {
        self.roles.iter().any(|role| allowed.contains(role))
    }
}

impl From<User> for AuthUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            roles: user.roles,
        }
    }
}

/// AuthUser Extractor
///
/// 1. Reuses an identity already resolved by `require_roles` for this request.
/// 2. Requires `Authorization: Bearer <token>`.
/// 3. Verifies signature and expiry.
/// 4. Loads the subject from the `users` collection.
///
/// Every failure is a 401; store faults surface as 500.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    StoreState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }

        let config = AppConfig::from_ref(state);
        let users = Repository::<User>::new(StoreState::from_ref(state));

        let token = bearer_token(parts)?;
        let claims = verify_token(token, &config.jwt_secret)?;

        // A well-signed token whose subject is not an id cannot name a user.
        if !is_valid_id(&claims.sub) {
            return Err(AppError::Unauthenticated("Invalid token subject".to_string()));
        }

        match users.find_by_id(&claims.sub).await {
            Ok(user) => Ok(AuthUser::from(user)),
            Err(AppError::NotFound(_)) => Err(AppError::Unauthenticated(
                "User for this token no longer exists".to_string(),
            )),
            Err(other) => Err(other),
        }
    }
}

fn bearer_token(parts: &Parts) -> AppResult<&str> {
    let value = parts
        .headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| AppError::Unauthenticated("Not authenticated".to_string()))?
        .to_str()
        .map_err(|_| AppError::Unauthenticated("Malformed Authorization header".to_string()))?;

    let token = value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .ok_or_else(|| AppError::Unauthenticated("Authorization must use the Bearer scheme".to_string()))?;

    if token.is_empty() {
        return Err(AppError::Unauthenticated("Empty bearer token".to_string()));
    }
    Ok(token)
}

/// Decodes and validates an access token signed with `secret`.
pub fn verify_token(token: &str, secret: &str) -> AppResult<Claims> {
    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let mut validation = Validation::default();
    validation.validate_exp = true;

    decode::<Claims>(token, &decoding_key, &validation)
        .map(|data| data.claims)
        .map_err(|error| match error.kind() {
            ErrorKind::ExpiredSignature => AppError::Unauthenticated("Token has expired".to_string()),
            _ => AppError::Unauthenticated("Could not validate credentials".to_string()),
        })
}

/// Signs an access token for `user_id`, valid for the configured lifetime.
pub fn issue_token(user_id: &str, config: &AppConfig) -> AppResult<String> {
    let now = Utc::now();
    let expires = TimeDelta::try_minutes(config.access_token_ttl_minutes)
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .ok_or_else(|| {
            AppError::Internal(format!(
                "token lifetime of {} minutes is out of range",
                config.access_token_ttl_minutes
            ))
        })?;
    let claims = Claims {
        sub: user_id.to_string(),
        exp: expires.timestamp().max(0) as u64,
        iat: now.timestamp().max(0) as u64,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|error| AppError::Internal(format!("failed to sign access token: {error}")))
}

// --- Role gates ---

/// RoleGate
///
/// A named set of roles allowed through `require_roles`.
pub trait RoleGate: Send + Sync + 'static {
    const NAME: &'static str;
    const ALLOWED: &'static [Role];
}

/// Any signed-in user.
pub struct Authenticated;

/// Catalog maintainers: `admin` and `super-admin`.
pub struct Staff;

/// User administration: `super-admin` only.
pub struct SuperAdminOnly;

impl RoleGate for Authenticated {
    const NAME: &'static str = "authenticated";
    const ALLOWED: &'static [Role] = &[Role::User, Role::Admin, Role::SuperAdmin];
}

impl RoleGate for Staff {
    const NAME: &'static str = "staff";
    const ALLOWED: &'static [Role] = &[Role::Admin, Role::SuperAdmin];
}

impl RoleGate for SuperAdminOnly {
    const NAME: &'static str = "super-admin";
    const ALLOWED: &'static [Role] = &[Role::SuperAdmin];
}

/// require_roles
///
/// Route-group middleware: authenticates the caller (401 on failure), then
/// intersects their roles with `G::ALLOWED` (403 when empty). The resolved
/// `AuthUser` is stored in the request extensions for the handler.
pub async fn require_roles<G: RoleGate>(
    user: AuthUser,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if !user.has_any_role(G::ALLOWED) {
        tracing::warn!(user_id = %user.id, gate = G::NAME, "access denied");
        return Err(AppError::Forbidden(
            "You do not have permission to perform this action".to_string(),
        ));
    }

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

// --- Passwords ---
//
// Argon2 is CPU-bound; both operations run on the blocking pool, off the async workers.

/// One-way hash (argon2id, random salt) in PHC string format.
pub async fn hash_password(plain: &str) -> AppResult<String> {
    let plain = plain.to_owned();
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(plain.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|error| AppError::Internal(format!("failed to hash password: {error}")))
    })
    .await
    .map_err(|error| AppError::Internal(format!("password hashing task failed: {error}")))?
}

/// Checks `plain` against a stored PHC hash. A malformed hash never verifies.
pub async fn verify_password(plain: &str, hashed: &str) -> AppResult<bool> {
    let (plain, hashed) = (plain.to_owned(), hashed.to_owned());
    tokio::task::spawn_blocking(move || {
        PasswordHash::new(&hashed).is_ok_and(|parsed| {
            Argon2::default()
                .verify_password(plain.as_bytes(), &parsed)
                .is_ok()
        })
    })
    .await
    .map_err(|error| AppError::Internal(format!("password verification task failed: {error}")))
}
