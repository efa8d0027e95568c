use crate::{AppState, handlers::users};
use axum::{Router, routing::get};

/// Authenticated Router Module
///
/// Routes open to any caller holding a valid token, whatever their role. The
/// `require_roles::<Authenticated>` layer resolves the `AuthUser` before the
/// handler runs.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /users/me
        // The profile of the token's owner. Static segment, so it wins over /users/{id}.
        .route("/users/me", get(users::get_me))
}
