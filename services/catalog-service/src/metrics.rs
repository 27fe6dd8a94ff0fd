// =============================================================================
// METRICS MODULE
// =============================================================================
// Prometheus metrics for the catalog service.
//
// NAMING: snake_case, unit suffix (_seconds), _total for counters.
// =============================================================================

use anyhow::Result;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

// =============================================================================
// METRIC NAMES
// =============================================================================

/// Labels: method, endpoint, status
pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";

/// Labels: method, endpoint
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "http_request_duration_seconds";

/// Labels: operation (select/insert/update)
pub const DB_QUERY_DURATION_SECONDS: &str = "db_query_duration_seconds";

/// Labels: operation (get/set/delete)
pub const CACHE_OPERATION_DURATION_SECONDS: &str = "cache_operation_duration_seconds";

/// Labels: operation (apply/revert), outcome (success/rejected/failed)
pub const DISCOUNT_OPERATIONS_TOTAL: &str = "discount_operations_total";

/// Labels: operation (apply/revert)
pub const DISCOUNT_PRODUCTS_REPRICED_TOTAL: &str = "discount_products_repriced_total";

/// Labels: result (created/duplicate/unsubscribed)
pub const EMAIL_SUBSCRIPTIONS_TOTAL: &str = "email_subscriptions_total";

/// Number of products currently below their low stock threshold
pub const CATALOG_LOW_STOCK_PRODUCTS: &str = "catalog_low_stock_products";

// =============================================================================
// SETUP FUNCTION
// =============================================================================
/// Install the Prometheus recorder globally and return its render handle.
pub fn setup_metrics() -> Result<PrometheusHandle> {
    let latency_buckets = &[
        0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
    ];

    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(HTTP_REQUEST_DURATION_SECONDS.to_string()),
            latency_buckets,
        )?
        .set_buckets_for_metric(
            Matcher::Full(DB_QUERY_DURATION_SECONDS.to_string()),
            latency_buckets,
        )?
        .set_buckets_for_metric(
            Matcher::Full(CACHE_OPERATION_DURATION_SECONDS.to_string()),
            latency_buckets,
        )?
        .install_recorder()?;

    describe_counter!(HTTP_REQUESTS_TOTAL, "Total number of HTTP requests received");
    describe_histogram!(HTTP_REQUEST_DURATION_SECONDS, "HTTP request latency in seconds");
    describe_histogram!(DB_QUERY_DURATION_SECONDS, "Database query latency in seconds");
    describe_histogram!(
        CACHE_OPERATION_DURATION_SECONDS,
        "Product cache operation latency in seconds"
    );
    describe_counter!(
        DISCOUNT_OPERATIONS_TOTAL,
        "Discount apply/revert requests by outcome"
    );
    describe_counter!(
        DISCOUNT_PRODUCTS_REPRICED_TOTAL,
        "Products whose price was changed or restored by a discount operation"
    );
    describe_counter!(
        EMAIL_SUBSCRIPTIONS_TOTAL,
        "Email intake submissions by result"
    );
    describe_gauge!(
        CATALOG_LOW_STOCK_PRODUCTS,
        "Number of products currently below their low stock threshold"
    );

    Ok(handle)
}

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================
// Without an installed recorder these are no-ops, so library code and tests
// can call them freely.

pub fn record_http_request(method: &str, endpoint: &str, status: u16, duration_secs: f64) {
    counter!(
        HTTP_REQUESTS_TOTAL,
        "method" => method.to_string(),
        "endpoint" => endpoint.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        HTTP_REQUEST_DURATION_SECONDS,
        "method" => method.to_string(),
        "endpoint" => endpoint.to_string()
    )
    .record(duration_secs);
}

pub fn record_db_query(operation: &str, duration_secs: f64) {
    histogram!(
        DB_QUERY_DURATION_SECONDS,
        "operation" => operation.to_string()
    )
    .record(duration_secs);
}

pub fn record_cache_operation(operation: &str, duration_secs: f64) {
    histogram!(
        CACHE_OPERATION_DURATION_SECONDS,
        "operation" => operation.to_string()
    )
    .record(duration_secs);
}

/// Record one discount operation and, on success, how many products it touched.
pub fn record_discount_operation(operation: &str, outcome: &str, products: usize) {
    counter!(
        DISCOUNT_OPERATIONS_TOTAL,
        "operation" => operation.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);

    if products > 0 {
        counter!(
            DISCOUNT_PRODUCTS_REPRICED_TOTAL,
            "operation" => operation.to_string()
        )
        .increment(products as u64);
    }
}

pub fn record_subscription(result: &str) {
    counter!(EMAIL_SUBSCRIPTIONS_TOTAL, "result" => result.to_string()).increment(1);
}

pub fn set_low_stock_count(count: usize) {
    gauge!(CATALOG_LOW_STOCK_PRODUCTS).set(count as f64);
}
