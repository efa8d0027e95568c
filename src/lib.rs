use axum::{
    Router,
    extract::FromRef,
    http::{HeaderName, HeaderValue},
    middleware,
    routing::get,
};
use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod store;

// Route groups, one per role gate.
pub mod routes;
use auth::{Authenticated, Staff, SuperAdminOnly, require_roles};
use handlers::{categories, products, system, users};
use routes::{admin, authenticated, public, super_admin};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use store::{MemoryStore, MongoStore, StoreState};

/// ApiDoc
///
/// OpenAPI document for every endpoint and body schema, served at
/// `/api-docs/openapi.json` and browsable at `/swagger-ui`.
#[derive(OpenApi)]
#[openapi(
    paths(
        system::health,
        categories::list_categories, categories::get_category, categories::list_category_products,
        categories::create_category, categories::update_category, categories::delete_category,
        products::list_products, products::get_product, products::create_product,
        products::update_product, products::delete_product,
        users::create_user, users::login, users::get_me, users::get_user, users::list_users,
        users::get_user_by_email, users::get_user_by_username, users::update_user,
        users::delete_user,
    ),
    components(
        schemas(
            models::Role, models::Category, models::NewCategory, models::CategoryPatch,
            models::Product, models::NewProduct, models::ProductPatch,
            models::PublicUser, models::GoogleInfo, models::NewUser, models::UserPatch,
            models::LoginRequest, models::TokenResponse, models::Message,
            system::HealthReport, system::HealthDependencies,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "categories", description = "Menu sections"),
        (name = "products", description = "Menu items"),
        (name = "users", description = "Accounts and roles"),
        (name = "auth", description = "Token issuance"),
        (name = "system", description = "Health")
    )
)]
pub struct ApiDoc;

/// Registers the `bearer_auth` scheme referenced by gated endpoints.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// AppState
///
/// The single shared container handed to every request: the document store
/// handle and the immutable configuration. Cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub store: StoreState,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(store: StoreState, config: AppConfig) -> Self {
        Self { store, config }
    }
}

// --- Axum FromRef Extractor Implementations ---
// Handlers pull `State<StoreState>`, `State<AppConfig>` or a typed
// `State<Repository<T>>` (see repository.rs) instead of the whole state.

impl FromRef<AppState> for StoreState {
    fn from_ref(app_state: &AppState) -> StoreState {
        app_state.store.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles the route groups behind their role gates, mounts them under the
/// configured prefix, and wraps everything in the request-id, tracing and CORS
/// layers.
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_origins);
    let x_request_id = HeaderName::from_static("x-request-id");

    // 1. Catalog API: one `require_roles` gate per group.
    let api = Router::new()
        .merge(public::public_routes())
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                require_roles::<Authenticated>,
            )),
        )
        .merge(admin::admin_routes().route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_roles::<Staff>,
        )))
        .merge(
            super_admin::super_admin_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                require_roles::<SuperAdminOnly>,
            )),
        );

    // 2. Health and docs stay at the root whatever the prefix.
    let root = Router::new()
        .route("/health", get(system::health))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    let prefix = state.config.api_prefix.clone();
    let router = if prefix.is_empty() {
        root.merge(api)
    } else {
        root.nest(&prefix, api)
    };

    // 3. Observability and correlation layers.
    router
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// An empty origin list allows any origin; otherwise only the listed ones.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return cors.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "ignoring unparsable CORS origin");
                None
            }
        })
        .collect();
    cors.allow_origin(AllowOrigin::list(allowed))
}

/// trace_span_logger
///
/// Opens the `http_request` span with method, uri and the `x-request-id` set by
/// `SetRequestIdLayer`, so every log line of a request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
