// =============================================================================
// CATALOG SERVICE - Main Entry Point
// =============================================================================
// Serves the catalog HTTP API:
// - discount application / removal
// - email subscriber intake
// - product lookups and low stock alerts
// - health, readiness and Prometheus metrics
// =============================================================================

use std::sync::Arc;

use tracing::{info, warn};

use catalog_service::cache::ProductCache;
use catalog_service::config::Config;
use catalog_service::db::Database;
use catalog_service::metrics::setup_metrics;
use catalog_service::{build_router, init_tracing, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -------------------------------------------------------------------------
    // STEP 1: Environment and logging
    // -------------------------------------------------------------------------
    dotenvy::dotenv().ok();
    init_tracing(true);

    info!("Starting Catalog Service...");

    // -------------------------------------------------------------------------
    // STEP 2: Configuration and metrics
    // -------------------------------------------------------------------------
    let config = Config::from_env()?;
    info!(port = config.port, cache = config.redis_url.is_some(), "Configuration loaded");

    let metrics_handle = setup_metrics()?;
    info!("Prometheus metrics initialized");

    // -------------------------------------------------------------------------
    // STEP 3: PostgreSQL
    // -------------------------------------------------------------------------
    let db = Database::connect(&config.database_url).await?;
    info!("Connected to PostgreSQL");

    db.run_migrations().await?;
    info!("Database migrations completed");

    // -------------------------------------------------------------------------
    // STEP 4: Redis (optional)
    // -------------------------------------------------------------------------
    // The service runs uncached rather than refusing to start.
    let cache = match &config.redis_url {
        Some(url) => match ProductCache::connect(url, config.product_cache_ttl_secs).await {
            Ok(cache) => {
                info!("Connected to Redis");
                Some(cache)
            }
            Err(err) => {
                warn!(error = ?err, "Redis unavailable, product cache disabled");
                None
            }
        },
        None => {
            info!("REDIS_URL not set, product cache disabled");
            None
        }
    };

    // -------------------------------------------------------------------------
    // STEP 5: State, routes, serve
    // -------------------------------------------------------------------------
    let addr = format!("0.0.0.0:{}", config.port);
    let state = Arc::new(AppState {
        store: Arc::new(db),
        cache,
        config,
        metrics_handle,
    });
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(address = %addr, "Catalog Service is listening");

    axum::serve(listener, app).await?;

    Ok(())
}
