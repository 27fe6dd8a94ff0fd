// =============================================================================
// CATALOG SERVICE
// =============================================================================
// Back-office core of the key & remote storefront:
// - imports vendor spreadsheets into the product catalog (`import` binary)
// - applies and removes discounts across the catalog
// - records email subscribers from the storefront forms
//
// Both binaries share this library; `main.rs` serves the HTTP API.
// =============================================================================

pub mod cache;
pub mod classify;
pub mod config;
pub mod db;
pub mod discounts;
pub mod error;
pub mod handlers;
pub mod importer;
pub mod metrics;
pub mod models;
pub mod pricing;
pub mod store;
pub mod subscribers;
pub mod vendor;

use std::sync::Arc;

use axum::{
    routing::{delete, get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::cache::ProductCache;
use crate::config::Config;
use crate::store::CatalogStore;

pub const SERVICE_NAME: &str = "catalog-service";

const DEFAULT_LOG_FILTER: &str = "info,catalog_service=debug";

// -----------------------------------------------------------------------------
// APPLICATION STATE
// -----------------------------------------------------------------------------
/// Shared by every request handler through `State<Arc<AppState>>`.
pub struct AppState {
    pub store: Arc<dyn CatalogStore>,

    /// Product lookup cache; `None` when REDIS_URL is not set
    pub cache: Option<ProductCache>,

    pub config: Config,

    pub metrics_handle: PrometheusHandle,
}

/// Initialise the global tracing subscriber.
///
/// `RUST_LOG` controls levels. The server logs JSON lines; the CLI passes
/// `json = false` for human-readable output.
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .init();
    }
}

// -----------------------------------------------------------------------------
// ROUTES
// -----------------------------------------------------------------------------
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // ----- health & metrics -----
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_handler))
        .route("/api/v1/diagnostics/config", get(handlers::config_diagnostics))
        // ----- catalog -----
        .route("/api/v1/products", get(handlers::list_products))
        .route("/api/v1/products/sku/:sku", get(handlers::get_product_by_sku))
        .route("/api/v1/products/alerts", get(handlers::low_stock_alerts))
        // ----- discounts -----
        .route(
            "/apply-discount",
            post(handlers::apply_discount).delete(handlers::remove_discount),
        )
        // ----- subscribers -----
        .route("/collect-email", post(handlers::collect_email))
        .route("/collect-email/:id", delete(handlers::unsubscribe))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request, StatusCode};
    use metrics_exporter_prometheus::PrometheusBuilder;
    use rust_decimal::Decimal;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::models::DiscountType;
    use crate::store::test_support::{discount, product};
    use crate::store::MemoryStore;

    fn app(store: Arc<MemoryStore>) -> Router {
        let config = Config {
            port: 0,
            database_url: String::new(),
            redis_url: None,
            product_cache_ttl_secs: 300,
            import_batch_size: 10,
            import_batch_pause_ms: 0,
        };
        build_router(Arc::new(AppState {
            store,
            cache: None,
            config,
            metrics_handle: PrometheusBuilder::new().build_recorder().handle(),
        }))
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(value) => {
                request = request.header("content-type", "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };

        let response = app.clone().oneshot(request.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn health_reports_service() {
        let app = app(Arc::new(MemoryStore::new()));
        let (status, body) = send(&app, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["service"], SERVICE_NAME);
    }

    #[tokio::test]
    async fn applies_and_removes_discount() {
        let store = Arc::new(MemoryStore::new());
        let remote = product("KR-1", "remotes", "100.00");
        store.create_product(&remote).await.unwrap();
        let mut sale = discount(DiscountType::Percentage, Decimal::from(20));
        sale.applicable_categories = vec!["remotes".to_string()];
        store.put_discount(&sale).await.unwrap();
        let app = app(store.clone());

        let request = json!({ "discountId": sale.id.to_string() });
        let (status, body) = send(&app, Method::POST, "/apply-discount", Some(request.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["updatedCount"], 1);
        assert_eq!(body["discountInfo"]["id"], sale.id.to_string());
        assert_eq!(body["discountInfo"]["type"], "percentage");
        let priced = store.get_product(remote.id).await.unwrap().unwrap();
        assert_eq!(priced.price, "80.00");

        let (status, body) = send(&app, Method::DELETE, "/apply-discount", Some(request)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["updatedCount"], 1);
        let restored = store.get_product(remote.id).await.unwrap().unwrap();
        assert_eq!(restored.price, "100.00");
    }

    #[tokio::test]
    async fn unknown_discount_is_not_found() {
        let app = app(Arc::new(MemoryStore::new()));
        let request = json!({ "discountId": uuid::Uuid::new_v4().to_string() });

        let (status, body) = send(&app, Method::POST, "/apply-discount", Some(request)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn inactive_discount_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let mut sale = discount(DiscountType::Fixed, Decimal::TEN);
        sale.active = false;
        sale.applicable_categories = vec!["remotes".to_string()];
        store.put_discount(&sale).await.unwrap();
        let app = app(store);

        let request = json!({ "discountId": sale.id.to_string() });
        let (status, body) = send(&app, Method::POST, "/apply-discount", Some(request)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_STATE");
    }

    #[tokio::test]
    async fn discount_without_targets_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let sale = discount(DiscountType::Fixed, Decimal::TEN);
        store.put_discount(&sale).await.unwrap();
        let app = app(store);

        let request = json!({ "discountId": sale.id.to_string() });
        let (status, body) = send(&app, Method::POST, "/apply-discount", Some(request)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn missing_discount_id_is_rejected() {
        let app = app(Arc::new(MemoryStore::new()));
        let (status, body) = send(&app, Method::POST, "/apply-discount", Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn repeat_subscription_returns_same_id() {
        let store = Arc::new(MemoryStore::new());
        let app = app(store.clone());
        let request = json!({ "email": "Jane@Example.com", "source": "footer" });

        let (status, first) = send(&app, Method::POST, "/collect-email", Some(request.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first["success"], true);

        let (status, second) = send(&app, Method::POST, "/collect-email", Some(request)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(second["id"], first["id"]);
        assert_eq!(store.subscribers().await.len(), 1);
    }

    #[tokio::test]
    async fn mistyped_body_is_a_validation_error() {
        let app = app(Arc::new(MemoryStore::new()));

        let (status, body) = send(&app, Method::POST, "/collect-email", Some(json!({ "email": 42 }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn body_without_json_content_type_is_a_validation_error() {
        let app = app(Arc::new(MemoryStore::new()));

        let (status, body) = send(&app, Method::DELETE, "/apply-discount", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn last_possible_page_is_empty() {
        let store = Arc::new(MemoryStore::new());
        store
            .create_product(&product("KR-1", "remotes", "10.00"))
            .await
            .unwrap();
        let app = app(store);

        let uri = format!("/api/v1/products?page={}&per_page=100", i64::MAX);
        let (status, body) = send(&app, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 1);
        assert_eq!(body["items"], json!([]));
    }

    #[tokio::test]
    async fn sku_lookup_misses_with_not_found() {
        let app = app(Arc::new(MemoryStore::new()));
        let (status, body) = send(&app, Method::GET, "/api/v1/products/sku/NOPE", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
    }
}
