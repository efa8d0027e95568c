//! HTTP handlers, grouped by resource.
//!
//! Access control is not repeated here: each handler is mounted in a route group
//! whose `require_roles` layer has already admitted the caller. Handlers only
//! perform the uniqueness and relationship checks before calling the repository.

pub mod categories;
pub mod products;
pub mod system;
pub mod users;
