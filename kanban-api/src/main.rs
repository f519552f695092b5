//! # Kanban API Server
//!
//! Loads configuration, connects to PostgreSQL, applies pending migrations
//! and serves the API until Ctrl-C.
//!
//! ## Usage
//!
//! ```bash
//! DATABASE_URL=postgres://localhost/kanban \
//! JWT_SECRET=change-me-to-at-least-32-characters \
//! cargo run -p kanban-api
//! ```
//!
//! Set `LOG_FORMAT=json` for one JSON object per log line.

use kanban_api::{
    app::{build_router, AppState},
    config::Config,
};
use kanban_shared::db::{
    migrations::run_migrations,
    pool::{close_pool, create_pool},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_LOG_FILTER: &str = "kanban_api=debug,kanban_shared=debug,tower_http=debug";

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());

    let registry = tracing_subscriber::registry().with(filter);

    if std::env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json")) {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }

    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    tracing::info!("Kanban API Server v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;

    let pool = create_pool(config.pool_config()).await?;
    run_migrations(&pool).await?;

    let address = config.bind_address();
    let app = build_router(AppState::new(pool.clone(), config));

    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(address = %address, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    close_pool(pool).await;
    tracing::info!("Server stopped");

    Ok(())
}
