use crate::{AppState, handlers::users};
use axum::{Router, routing::put};

/// Super-Admin Router Module
///
/// User administration behind `require_roles::<SuperAdminOnly>`. Role grants
/// only happen here, which keeps self-service sign-up from escalating privileges.
pub fn super_admin_routes() -> Router<AppState> {
    Router::new()
        // PUT/DELETE /users/{id}
        // Super-admin accounts themselves cannot be deleted (403).
        .route(
            "/users/{id}",
            put(users::update_user).delete(users::delete_user),
        )
}
