//! pairpool server entry point.
//!
//! Wires the store, cache and entropy source selected by [`AppConfig`] into
//! the services and serves the REST API with Axum.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use pairpool::api;
use pairpool::app_state::AppState;
use pairpool::cache::{MemoryCache, ReadThroughCache};
use pairpool::config::{AppConfig, LogFormat};
use pairpool::domain::{Clock, SystemClock};
use pairpool::matching::{EntropySource, MatchingEngine, RandomOrgClient, Shuffler};
use pairpool::persistence::{MemoryStore, PoolStore, PostgresStore};
use pairpool::service::{HistoryService, PoolService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = AppConfig::from_env().context("invalid LISTEN_ADDR")?;
    init_tracing(config.log_format);
    tracing::info!(addr = %config.listen_addr, "starting pairpool");

    // Build persistence layer
    let store: Arc<dyn PoolStore> = if config.persistence_enabled {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
            .connect(&config.database_url)
            .await
            .context("connecting to PostgreSQL")?;
        let store = PostgresStore::new(pool);
        store.migrate().await.context("running migrations")?;
        Arc::new(store)
    } else {
        tracing::warn!("persistence disabled, data lives in memory only");
        Arc::new(MemoryStore::new())
    };

    // Build cache layer
    let cache = if config.cache_enabled {
        ReadThroughCache::new(
            Arc::new(MemoryCache::new()),
            config.cache_ttl,
            config.cache_op_timeout,
        )
    } else {
        tracing::info!("cache disabled");
        ReadThroughCache::disabled()
    };

    // Build matching engine
    let entropy = match &config.entropy_api_key {
        Some(key) => {
            let client = RandomOrgClient::new(&config.entropy_endpoint, key, config.entropy_timeout)
                .context("building entropy client")?;
            EntropySource::new(Arc::new(client), config.entropy_timeout)
        }
        None => {
            tracing::info!("no entropy API key, using local generator");
            EntropySource::local()
        }
    };
    let engine = MatchingEngine::new(Shuffler::new(Arc::new(entropy)));

    // Build service layer
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let pool_service =
        PoolService::new(Arc::clone(&store), cache.clone(), engine, Arc::clone(&clock))
            .with_display_names(config.display_names.clone())
            .with_default_cooldown(config.default_cooldown_secs);
    let history_service =
        HistoryService::new(store, cache, clock).with_display_names(config.display_names.clone());

    // Build application state
    let app_state = AppState {
        pool_service: Arc::new(pool_service),
        history_service: Arc::new(history_service),
    };

    // Build router
    let app = api::build_router()
        .layer(TimeoutLayer::new(config.request_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match format {
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
