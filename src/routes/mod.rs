/// Router Module Index
///
/// Routes are split by the role gate that protects them. `create_router` wraps
/// every group except `public` in `require_roles::<G>` via `route_layer`, so a
/// handler can never be mounted without its gate.

/// Anonymous access: catalog reads, sign-up, login, health.
pub mod public;

/// Any valid token (`Authenticated` gate).
pub mod authenticated;

/// Catalog maintenance and user lookups (`Staff` gate: admin, super-admin).
pub mod admin;

/// User administration (`SuperAdminOnly` gate).
pub mod super_admin;
