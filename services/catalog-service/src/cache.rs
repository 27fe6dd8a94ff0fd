// =============================================================================
// CACHE MODULE
// =============================================================================
// Redis cache for product lookups by SKU.
//
// The cache is best-effort: a Redis failure is logged and treated as a miss,
// never as a request failure.
// =============================================================================

use std::time::Instant;

use anyhow::{Context, Result};
use redis::aio::ConnectionManager;

use crate::metrics;
use crate::models::Product;

#[derive(Clone)]
pub struct ProductCache {
    conn: ConnectionManager,
    ttl_secs: u64,
}

fn sku_key(sku: &str) -> String {
    format!("product:sku:{sku}")
}

impl ProductCache {
    pub async fn connect(redis_url: &str, ttl_secs: u64) -> Result<Self> {
        let client = redis::Client::open(redis_url).context("Invalid REDIS_URL")?;
        let conn = ConnectionManager::new(client)
            .await
            .context("Failed to connect to Redis")?;
        Ok(Self { conn, ttl_secs })
    }

    pub async fn get(&self, sku: &str) -> Option<Product> {
        let start = Instant::now();
        let cached: Result<Option<String>, _> = redis::cmd("GET")
            .arg(sku_key(sku))
            .query_async(&mut self.conn.clone())
            .await;
        metrics::record_cache_operation("get", start.elapsed().as_secs_f64());

        match cached {
            Ok(Some(json)) => serde_json::from_str(&json).ok(),
            Ok(None) => None,
            Err(err) => {
                tracing::warn!(sku, error = %err, "Product cache read failed");
                None
            }
        }
    }

    pub async fn put(&self, product: &Product) {
        let Ok(json) = serde_json::to_string(product) else {
            return;
        };

        let start = Instant::now();
        let result: Result<(), _> = redis::cmd("SETEX")
            .arg(sku_key(&product.sku))
            .arg(self.ttl_secs)
            .arg(json)
            .query_async(&mut self.conn.clone())
            .await;
        metrics::record_cache_operation("set", start.elapsed().as_secs_f64());

        if let Err(err) = result {
            tracing::warn!(sku = %product.sku, error = %err, "Product cache write failed");
        }
    }

    /// Drop cached entries for products whose documents just changed.
    pub async fn invalidate(&self, skus: &[String]) {
        if skus.is_empty() {
            return;
        }

        let start = Instant::now();
        let mut cmd = redis::cmd("DEL");
        for sku in skus {
            cmd.arg(sku_key(sku));
        }
        let result: Result<(), _> = cmd.query_async(&mut self.conn.clone()).await;
        metrics::record_cache_operation("delete", start.elapsed().as_secs_f64());

        if let Err(err) = result {
            tracing::warn!(count = skus.len(), error = %err, "Product cache invalidation failed");
        }
    }

    pub async fn ping(&self) -> bool {
        redis::cmd("PING")
            .query_async::<_, String>(&mut self.conn.clone())
            .await
            .is_ok()
    }
}
