// =============================================================================
// MODELS MODULE
// =============================================================================
// Documents stored in the catalog collections and the request/response
// shapes of the HTTP API.
//
// Documents serialize in camelCase because the storefront front-end and the
// admin pages read the same collections.
// =============================================================================

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// PRODUCT
// =============================================================================

/// Lifecycle status shown in the admin product list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ProductStatus {
    #[default]
    Active,
    OutOfStock,
}

/// Storefront availability badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Availability {
    #[default]
    InStock,
    OutOfStock,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Visibility {
    #[default]
    Visible,
    Hidden,
}

/// Key-specific attributes. Free-form, never validated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct TechnicalSpecs {
    pub fcc_id: String,
    pub frequency: String,
    pub battery_type: String,
    pub chip_type: String,
    pub buttons: String,
    pub clonable: bool,
    pub reusable: bool,
}

/// A heuristically inferred vehicle fit for a key or remote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct CompatibilityEntry {
    /// "car", "truck", "suv", or empty when no vehicle type was found
    pub vehicle_type: String,
    pub brand: String,
    pub model: String,
    pub year_start: Option<i32>,
    pub year_end: Option<i32>,
    pub key_types: Vec<String>,
}

/// Snapshot of the discount that produced a product's current sale price.
///
/// The owning [`Discount`] stays the source of truth; this record only says
/// how the price was derived and how to undo it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscountInfo {
    pub discount_id: Uuid,
    pub discount_name: String,
    pub discount_type: DiscountType,
    #[serde(with = "rust_decimal::serde::float")]
    pub discount_value: Decimal,
    /// The product's `price` exactly as it was before the discount
    pub original_price: String,
    pub discounted_price: String,
    pub discount_amount: String,
    pub applied_at: DateTime<Utc>,
    pub valid_until: Option<DateTime<Utc>>,
}

/// The canonical catalog entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,

    /// Intended unique, not enforced at write time
    pub sku: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub short_description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub images: Vec<String>,

    // Prices are decimal strings; empty means "not set".
    pub price: String,
    #[serde(default)]
    pub regular_price: String,
    #[serde(default)]
    pub sale_price: String,
    #[serde(default)]
    pub discount_info: Option<DiscountInfo>,

    #[serde(default)]
    pub stock: i64,
    #[serde(default)]
    pub low_stock_threshold: i64,
    #[serde(default)]
    pub status: ProductStatus,
    #[serde(default)]
    pub availability: Availability,
    #[serde(default)]
    pub visibility: Visibility,

    #[serde(default)]
    pub technical: TechnicalSpecs,
    #[serde(default)]
    pub compatibility: Vec<CompatibilityEntry>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// True when stock has fallen below the configured threshold.
    pub fn is_low_stock(&self) -> bool {
        self.stock < self.low_stock_threshold
    }
}

// =============================================================================
// DISCOUNT
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    Percentage,
    Fixed,
    /// Presentation-layer marker; prices are left unchanged.
    BuyXGetY,
    /// Any value the admin UI wrote that the engine does not understand.
    #[serde(other)]
    Unknown,
}

/// A discount definition, created by the admin UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Discount {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub discount_type: DiscountType,
    /// Percentage (0-100) or a currency amount, depending on the type
    #[serde(with = "rust_decimal::serde::float")]
    pub value: Decimal,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub has_start_date: bool,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub has_end_date: bool,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub applicable_products: Vec<Uuid>,
    #[serde(default)]
    pub applicable_categories: Vec<String>,
    #[serde(default)]
    pub used_count: u64,
}

// =============================================================================
// EMAIL SUBSCRIBERS
// =============================================================================

/// Where on the storefront an address was collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SubscriberSource {
    #[default]
    Popup,
    Footer,
    Checkout,
    Contact,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct MarketingPreferences {
    pub email_opt_in: bool,
    pub sms_opt_in: bool,
}

/// Consent evidence captured at submission time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentRecord {
    pub consented_at: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Campaign / UTM attribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Attribution {
    pub campaign: Option<String>,
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
    pub referrer: Option<String>,
}

/// Primary subscriber record, keyed by lowercased email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailSubscriber {
    pub id: Uuid,
    pub email: String,
    pub phone: Option<String>,
    pub source: SubscriberSource,
    #[serde(default)]
    pub sources: Vec<SubscriberSource>,
    pub subscribed: bool,
    #[serde(default)]
    pub marketing: MarketingPreferences,
    pub consent: ConsentRecord,
    #[serde(default)]
    pub attribution: Attribution,
    pub created_at: DateTime<Utc>,
}

/// Flat copy of a subscriber kept for mailing-list exports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketingEmail {
    pub id: Uuid,
    pub subscriber_id: Uuid,
    pub email: String,
    pub phone: Option<String>,
    pub source: SubscriberSource,
    pub email_opt_in: bool,
    pub sms_opt_in: bool,
    pub subscribed_at: DateTime<Utc>,
}

impl From<&EmailSubscriber> for MarketingEmail {
    fn from(subscriber: &EmailSubscriber) -> Self {
        Self {
            id: Uuid::new_v4(),
            subscriber_id: subscriber.id,
            email: subscriber.email.clone(),
            phone: subscriber.phone.clone(),
            source: subscriber.source,
            email_opt_in: subscriber.marketing.email_opt_in,
            sms_opt_in: subscriber.marketing.sms_opt_in,
            subscribed_at: subscriber.created_at,
        }
    }
}

// =============================================================================
// API REQUEST/RESPONSE STRUCTURES
// =============================================================================

/// Body of `POST /apply-discount` and `DELETE /apply-discount`.
///
/// The id is kept as a raw string so a missing or malformed value becomes a
/// validation error instead of an extractor rejection.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscountRequest {
    #[serde(default)]
    pub discount_id: Option<String>,
}

/// Summary of the discount that was applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscountSummary {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub discount_type: DiscountType,
    #[serde(with = "rust_decimal::serde::float")]
    pub value: Decimal,
}

impl From<&Discount> for DiscountSummary {
    fn from(discount: &Discount) -> Self {
        Self {
            id: discount.id,
            name: discount.name.clone(),
            discount_type: discount.discount_type.clone(),
            value: discount.value,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyDiscountResponse {
    pub success: bool,
    pub updated_count: usize,
    pub discount_info: DiscountSummary,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveDiscountResponse {
    pub success: bool,
    pub updated_count: usize,
}

/// Body of `POST /collect-email`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CollectEmailRequest {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub source: Option<SubscriberSource>,
    pub email_opt_in: Option<bool>,
    pub sms_opt_in: Option<bool>,
    pub campaign: Option<String>,
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
    pub referrer: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectEmailResponse {
    pub success: bool,
    pub id: Uuid,
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuccessResponse {
    pub success: bool,
}

/// Paginated product listing for the admin pages.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductListResponse {
    pub items: Vec<Product>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}

/// A product whose stock is below its threshold.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LowStockAlert {
    pub id: Uuid,
    pub sku: String,
    pub title: String,
    pub stock: i64,
    pub threshold: i64,
}

impl From<&Product> for LowStockAlert {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id,
            sku: product.sku.clone(),
            title: product.title.clone(),
            stock: product.stock,
            threshold: product.low_stock_threshold,
        }
    }
}

// =============================================================================
// HEALTH & DIAGNOSTICS RESPONSES
// =============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub status: String,
    pub checks: ReadinessChecks,
}

#[derive(Debug, Serialize)]
pub struct ReadinessChecks {
    pub database: bool,
    /// `None` when no cache is configured
    pub redis: Option<bool>,
}

/// Non-secret configuration, for operational debugging.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigDiagnostics {
    pub service: String,
    pub version: String,
    pub port: u16,
    pub cache_enabled: bool,
    pub product_cache_ttl_secs: u64,
    pub import_batch_size: usize,
    pub import_batch_pause_ms: u64,
}

// =============================================================================
// ERROR RESPONSES
// =============================================================================

/// API error body: `{ "success": false, "error": "...", "code": "..." }`
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub code: String,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            code: code.into(),
        }
    }
}
