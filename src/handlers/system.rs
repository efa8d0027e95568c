use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::store::StoreState;

/// Health report returned by `GET /health`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthReport {
    /// `"ok"` when every dependency answered, `"degraded"` otherwise.
    pub status: String,
    pub name: String,
    pub version: String,
    pub dependencies: HealthDependencies,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthDependencies {
    /// `"healthy"` or `"unhealthy: <reason>"`.
    pub database: String,
}

/// health
///
/// [Public Route] Liveness plus a store ping, for load balancers and monitors.
#[utoipa::path(
    get,
    path = "/health",
    tag = "system",
    responses(
        (status = 200, description = "Service and store are up", body = HealthReport),
        (status = 503, description = "Store unreachable", body = HealthReport)
    )
)]
pub async fn health(State(store): State<StoreState>) -> (StatusCode, Json<HealthReport>) {
    let (status_code, status, database) = match store.ping().await {
        Ok(()) => (StatusCode::OK, "ok", "healthy".to_string()),
        Err(error) => {
            tracing::warn!(%error, "health check: store ping failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "degraded",
                format!("unhealthy: {error}"),
            )
        }
    };

    let report = HealthReport {
        status: status.to_string(),
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        dependencies: HealthDependencies { database },
    };
    (status_code, Json(report))
}
