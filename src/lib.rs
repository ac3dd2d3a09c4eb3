pub mod cache;
pub mod config;
pub mod error;
pub mod log;
pub mod providers;
pub mod quote_provider;
pub mod routes;
pub mod server;

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub async fn run(config_path: Option<&str>, host: &str, port: u16) -> Result<()> {
    info!("Fund estimate relay starting...");

    let config = match config_path {
        Some(path) => config::AppConfig::load_from_path(path)?,
        None => config::AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let provider = Arc::new(providers::eastmoney::EastmoneyProvider::new(
        &config.upstream,
    )?);
    let cache = Arc::new(cache::QuoteCache::new(
        provider,
        Duration::from_secs(config.cache.ttl_secs),
        config.cache.cache_failures,
    ));

    // Entries are only ever superseded, never removed, so sweep stale ones
    // in the background to keep the map bounded.
    let sweeper = Arc::clone(&cache);
    let sweep_interval = Duration::from_secs(config.cache.sweep_interval_secs);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(sweep_interval);
        interval.tick().await;
        loop {
            interval.tick().await;
            sweeper.purge_expired().await;
        }
    });

    let state = server::AppState {
        cache,
        code_policy: config.code_length_policy,
    };

    server::run_server(state, host, port).await
}
