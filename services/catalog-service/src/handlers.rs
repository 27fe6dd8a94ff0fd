// =============================================================================
// HANDLERS MODULE
// =============================================================================
// HTTP request handlers (controller layer).
//
// Handlers stay thin: extract, call into `discounts` / `subscribers` / the
// store, record metrics, shape the response. Errors are `AppError` and turn
// into `{ success: false, error, code }` bodies on their own.
// =============================================================================

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::discounts;
use crate::error::{AppError, AppResult};
use crate::metrics;
use crate::models::*;
use crate::subscribers::{self, ConsentContext};
use crate::{AppState, SERVICE_NAME};

/// Record request count and latency for a finished handler.
fn observe<T>(method: &str, endpoint: &str, start: Instant, result: &AppResult<T>) {
    let status = match result {
        Ok(_) => StatusCode::OK,
        Err(err) => err.status(),
    };
    metrics::record_http_request(
        method,
        endpoint,
        status.as_u16(),
        start.elapsed().as_secs_f64(),
    );
}

/// Unwrap a JSON body, turning extractor rejections into validation errors.
fn body<T>(payload: Result<Json<T>, JsonRejection>) -> AppResult<T> {
    payload.map(|Json(value)| value).map_err(AppError::from)
}

/// "rejected" for caller mistakes, "failed" for our own.
fn outcome_label<T>(result: &AppResult<T>) -> &'static str {
    match result {
        Ok(_) => "success",
        Err(err) if err.status().is_client_error() => "rejected",
        Err(_) => "failed",
    }
}

// =============================================================================
// HEALTH CHECK ENDPOINTS
// =============================================================================

/// Liveness probe.
///
/// GET /health
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: SERVICE_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Readiness probe: the store must answer, and so must Redis when a cache
/// is configured.
///
/// GET /ready
pub async fn readiness_check(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ReadinessResponse>, StatusCode> {
    let db_healthy = state.store.health_check().await;

    let redis_healthy = match &state.cache {
        Some(cache) => Some(cache.ping().await),
        None => None,
    };

    let all_healthy = db_healthy && redis_healthy.unwrap_or(true);
    if !all_healthy {
        tracing::warn!(database = db_healthy, redis = ?redis_healthy, "Service not ready");
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }

    Ok(Json(ReadinessResponse {
        status: "ready".to_string(),
        checks: ReadinessChecks {
            database: db_healthy,
            redis: redis_healthy,
        },
    }))
}

/// Prometheus text exposition.
///
/// GET /metrics
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> String {
    state.metrics_handle.render()
}

/// GET /api/v1/diagnostics/config
///
/// Connection strings are never echoed.
pub async fn config_diagnostics(State(state): State<Arc<AppState>>) -> Json<ConfigDiagnostics> {
    let config = &state.config;
    Json(ConfigDiagnostics {
        service: SERVICE_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        port: config.port,
        cache_enabled: state.cache.is_some(),
        product_cache_ttl_secs: config.product_cache_ttl_secs,
        import_batch_size: config.import_batch_size,
        import_batch_pause_ms: config.import_batch_pause_ms,
    })
}

// =============================================================================
// CATALOG ENDPOINTS
// =============================================================================

/// GET /api/v1/products?page=2&per_page=50
#[derive(Debug, Deserialize)]
pub struct ListParams {
    /// 1-indexed (default: 1)
    #[serde(default = "default_page")]
    pub page: i64,

    /// default: 20, max: 100
    #[serde(default = "default_per_page")]
    pub per_page: i64,
}

fn default_page() -> i64 {
    1
}
fn default_per_page() -> i64 {
    20
}

pub async fn list_products(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> AppResult<Json<ProductListResponse>> {
    let start = Instant::now();

    let page = params.page.max(1);
    let per_page = params.per_page.clamp(1, 100);

    let result = state
        .store
        .list_products(page, per_page)
        .await
        .map_err(AppError::from);
    observe("GET", "/api/v1/products", start, &result);

    let (items, total) = result?;
    Ok(Json(ProductListResponse {
        items,
        total,
        page,
        per_page,
    }))
}

/// Product lookup by SKU, served from Redis when possible.
///
/// GET /api/v1/products/sku/:sku
pub async fn get_product_by_sku(
    State(state): State<Arc<AppState>>,
    Path(sku): Path<String>,
) -> AppResult<Json<Product>> {
    let start = Instant::now();
    const ENDPOINT: &str = "/api/v1/products/sku/:sku";

    if let Some(cache) = &state.cache {
        if let Some(product) = cache.get(&sku).await {
            tracing::debug!(%sku, "Product cache hit");
            observe("GET", ENDPOINT, start, &Ok::<_, AppError>(()));
            return Ok(Json(product));
        }
    }

    let result = match state.store.find_product_by_sku(&sku).await {
        Ok(Some(product)) => Ok(product),
        Ok(None) => Err(AppError::NotFound(format!("SKU not found: {sku}"))),
        Err(err) => Err(AppError::from(err)),
    };
    observe("GET", ENDPOINT, start, &result);

    let product = result?;
    if let Some(cache) = &state.cache {
        cache.put(&product).await;
    }
    Ok(Json(product))
}

/// Products whose stock is below their low-stock threshold.
///
/// GET /api/v1/products/alerts
pub async fn low_stock_alerts(
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<Vec<LowStockAlert>>> {
    let start = Instant::now();

    let result = state
        .store
        .low_stock_products()
        .await
        .map_err(AppError::from);
    observe("GET", "/api/v1/products/alerts", start, &result);

    let alerts: Vec<LowStockAlert> = result?.iter().map(LowStockAlert::from).collect();
    metrics::set_low_stock_count(alerts.len());

    Ok(Json(alerts))
}

// =============================================================================
// DISCOUNT ENDPOINTS
// =============================================================================

/// Apply a discount to every product it targets.
///
/// POST /apply-discount
///
/// # Request Body
/// ```json
/// { "discountId": "5f0c2a3e-8d4b-4f52-9a53-2a1f3c9b7e10" }
/// ```
///
/// # Response
/// - 200 OK: `{ "success": true, "updatedCount": 12, "discountInfo": {...} }`
/// - 400: missing id, inactive or expired discount, no matching products
/// - 404: discount does not exist
pub async fn apply_discount(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<DiscountRequest>, JsonRejection>,
) -> AppResult<Json<ApplyDiscountResponse>> {
    let start = Instant::now();

    let id = body(payload).and_then(|r| discounts::parse_discount_id(r.discount_id.as_deref()));
    let result = match id {
        Ok(id) => discounts::apply_discount(state.store.as_ref(), id, Utc::now()).await,
        Err(err) => Err(err),
    };
    observe("POST", "/apply-discount", start, &result);
    metrics::record_discount_operation(
        "apply",
        outcome_label(&result),
        result.as_ref().map_or(0, |o| o.updated_count),
    );

    let outcome = result?;
    if let Some(cache) = &state.cache {
        cache.invalidate(&outcome.skus).await;
    }

    Ok(Json(ApplyDiscountResponse {
        success: true,
        updated_count: outcome.updated_count,
        discount_info: outcome.discount,
    }))
}

/// Restore original prices on every product carrying the discount.
///
/// DELETE /apply-discount
pub async fn remove_discount(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<DiscountRequest>, JsonRejection>,
) -> AppResult<Json<RemoveDiscountResponse>> {
    let start = Instant::now();

    let id = body(payload).and_then(|r| discounts::parse_discount_id(r.discount_id.as_deref()));
    let result = match id {
        Ok(id) => discounts::revert_discount(state.store.as_ref(), id, Utc::now()).await,
        Err(err) => Err(err),
    };
    observe("DELETE", "/apply-discount", start, &result);
    metrics::record_discount_operation(
        "revert",
        outcome_label(&result),
        result.as_ref().map_or(0, |o| o.reverted_count),
    );

    let outcome = result?;
    if let Some(cache) = &state.cache {
        cache.invalidate(&outcome.skus).await;
    }

    Ok(Json(RemoveDiscountResponse {
        success: true,
        updated_count: outcome.reverted_count,
    }))
}

// =============================================================================
// SUBSCRIBER ENDPOINTS
// =============================================================================

fn consent_context(headers: &HeaderMap) -> ConsentContext {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    ConsentContext {
        // first hop is the client
        ip_address: header("x-forwarded-for")
            .and_then(|v| v.split(',').next().map(|ip| ip.trim().to_string())),
        user_agent: header("user-agent"),
    }
}

/// POST /collect-email
///
/// # Request Body
/// ```json
/// { "email": "jane@example.com", "phone": "555-123-4567", "source": "footer" }
/// ```
///
/// A repeat submission of the same address returns the existing id.
pub async fn collect_email(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<CollectEmailRequest>, JsonRejection>,
) -> AppResult<Json<CollectEmailResponse>> {
    let start = Instant::now();

    let result = match body(payload) {
        Ok(request) => {
            subscribers::collect_email(
                state.store.as_ref(),
                request,
                consent_context(&headers),
                Utc::now(),
            )
            .await
        }
        Err(err) => Err(err),
    };
    observe("POST", "/collect-email", start, &result);

    let label = match &result {
        Ok(outcome) if outcome.created => "created",
        Ok(_) => "duplicate",
        Err(_) => outcome_label(&result),
    };
    metrics::record_subscription(label);

    let outcome = result?;
    let message = if outcome.created {
        "Subscribed"
    } else {
        "Already subscribed"
    };

    Ok(Json(CollectEmailResponse {
        success: true,
        id: outcome.id,
        message: message.to_string(),
    }))
}

/// DELETE /collect-email/:id
pub async fn unsubscribe(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Json<SuccessResponse>> {
    let start = Instant::now();

    let result = match Uuid::parse_str(id.trim()) {
        Ok(id) => subscribers::unsubscribe(state.store.as_ref(), id).await,
        Err(_) => Err(AppError::Validation(format!("Invalid subscriber id: {id}"))),
    };
    observe("DELETE", "/collect-email/:id", start, &result);

    result?;
    metrics::record_subscription("unsubscribed");
    Ok(Json(SuccessResponse { success: true }))
}
