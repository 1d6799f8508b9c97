//! Product Search Gateway - Main Application Entry Point
//!
//! A REST API that issues API keys tied to subscription tiers, meters their usage
//! against a quota that resets every window, and proxies a product search to an
//! upstream marketplace API for keys that still have quota.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum (async HTTP server)
//! - **Database**: PostgreSQL with sqlx (async queries)
//! - **Authentication**: `X-API-Key` UUID v4 tokens, stored as SHA-256 hashes
//! - **Upstream**: GraphQL search over reqwest with a request timeout
//! - **Format**: JSON requests/responses
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment variables
//! 2. Create database connection pool
//! 3. Run database migrations
//! 4. Build the upstream client, key store and access gate
//! 5. Build HTTP router with routes and middleware
//! 6. Start server on configured port

mod config;
mod db;
mod error;
mod handlers;
mod middleware;
mod models;
mod services;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::{
    services::{fetch_client::HttpSearchClient, key_store::PgKeyStore},
    state::AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging with tracing subscriber. Reads RUST_LOG environment variable (defaults to "info" level)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = config::Config::from_env()?;
    tracing::info!("Configuration loaded");

    let pool = db::create_pool(&config.database_url).await?;
    tracing::info!("Database pool created");

    db::run_migrations(&pool).await?;
    tracing::info!("Database migrations complete");

    let client = HttpSearchClient::new(&config.upstream_url, config.upstream_timeout())?;
    tracing::info!(upstream = %config.upstream_url, "Upstream client ready");

    let key_store = PgKeyStore::new(pool, config.quota_policy());
    let state = AppState::new(&config, Arc::new(key_store), Arc::new(client));

    let app = app(state);

    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    // Peer addresses are needed by the key issuance allow-list
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Build the HTTP router.
fn app(state: AppState) -> Router {
    // Searches charged to an API key
    let gated_routes = Router::new()
        .route("/api/v1/search", post(handlers::search::gated_search))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::api_key_middleware,
        ));

    // Key issuance, restricted to allow-listed peers
    let admin_routes = Router::new()
        .route("/api/v1/keys", post(handlers::keys::create_key))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::origin::allow_listed_origin,
        ));

    Router::new()
        // Public routes (no authentication required)
        .route("/health", get(handlers::health::health_check))
        // Ungated and uncharged; kept for compatibility with existing clients
        .route(
            "/api/v1/search/{region}",
            get(handlers::search::public_search),
        )
        .merge(gated_routes)
        .merge(admin_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
