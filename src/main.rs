use anyhow::Context;
use menu_catalog::{
    AppState, MemoryStore, MongoStore, StoreState,
    config::{AppConfig, Env},
    create_router,
    handlers::users::ensure_super_admin,
    models::{Category, Product, User},
    repository::{Entity, Repository},
};
use std::sync::Arc;
use tokio::{net::TcpListener, signal};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Loads configuration, initializes logging, connects the store, prepares
/// indexes and the bootstrap account, then serves until Ctrl-C or SIGTERM.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Configuration (fail fast on missing secrets).
    dotenv::dotenv().ok();
    let config = AppConfig::load().context("invalid configuration")?;

    // 2. Logging: RUST_LOG wins, otherwise crate-level debug.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "menu_catalog=debug,tower_http=info,axum=info".into());

    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 3. Document store.
    let store: StoreState = match &config.mongodb_uri {
        Some(uri) => {
            let mongo = MongoStore::connect(uri, &config.database_name)
                .await
                .context("failed to connect to MongoDB; check MONGODB_URI")?;
            tracing::info!(database = %config.database_name, "connected to MongoDB");
            Arc::new(mongo)
        }
        None => {
            tracing::warn!("MONGODB_URI not set; using the in-memory store (data is not persisted)");
            Arc::new(MemoryStore::new())
        }
    };

    // 4. Natural-key indexes.
    for (collection, field) in [
        (Category::COLLECTION, Category::NATURAL_KEY),
        (Product::COLLECTION, Product::NATURAL_KEY),
        (User::COLLECTION, User::NATURAL_KEY),
    ] {
        store
            .ensure_text_index(collection, field)
            .await
            .with_context(|| format!("failed to create the text index on {collection}.{field}"))?;
    }

    // 5. Bootstrap super-admin.
    if let Some(seed) = &config.super_admin {
        let users = Repository::<User>::new(store.clone());
        let created = ensure_super_admin(&users, seed)
            .await
            .context("failed to seed the super-admin account")?;
        if !created {
            tracing::debug!("super-admin already present");
        }
    }

    // 6. Router and server.
    let bind_addr = config.bind_addr.clone();
    let app = create_router(AppState::new(store.clone(), config));

    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;

    tracing::info!("Listening on {bind_addr}");
    tracing::info!("API Documentation (Swagger UI) available at: http://{bind_addr}/swagger-ui");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    store.shutdown().await;
    tracing::info!("store connection closed; bye");
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            tracing::error!(%error, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(error) => {
                tracing::error!(%error, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
