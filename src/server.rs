//! Router construction and server startup.

use anyhow::Result;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::cache::QuoteCache;
use crate::quote_provider::CodeLengthPolicy;
use crate::routes;

/// Shared state handed to every request handler. The cache owns the
/// provider, so handlers never reach the upstream directly.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<QuoteCache>,
    pub code_policy: CodeLengthPolicy,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/api/fund", post(routes::fund_batch))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run_server(state: AppState, host: &str, port: u16) -> Result<()> {
    let app = create_router(state);

    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("estnav listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C handler");
    info!("Shutting down...");
}
