// =============================================================================
// DISCOUNTS MODULE
// =============================================================================
// Applies a discount across its target products, or reverts it.
//
// Apply:  load -> validate -> resolve targets -> price -> commit
// Revert: load -> find stamped products -> restore prices -> commit
//
// Both paths write through one `WriteBatch`, so a failed commit leaves no
// product partially updated. The usage counter rides in the same batch.
// =============================================================================

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Discount, DiscountInfo, DiscountSummary, Product};
use crate::pricing::{format_price, parse_price, reprice};
use crate::store::{CatalogStore, WriteBatch};

/// Result of applying a discount.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyOutcome {
    pub updated_count: usize,
    pub discount: DiscountSummary,
    /// SKUs of the products whose documents changed
    pub skus: Vec<String>,
}

/// Result of reverting a discount.
#[derive(Debug, Clone, PartialEq)]
pub struct RevertOutcome {
    pub reverted_count: usize,
    pub skus: Vec<String>,
}

/// Parses a discount id taken from a request body.
pub fn parse_discount_id(raw: Option<&str>) -> AppResult<Uuid> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::Validation("discountId is required".to_string()))?;

    Uuid::parse_str(raw)
        .map_err(|_| AppError::Validation(format!("discountId is not a valid id: {raw}")))
}

// =============================================================================
// APPLY
// =============================================================================

/// Applies discount `discount_id` to every product it targets.
///
/// # Errors
/// - `NotFound` when the discount does not exist
/// - `InvalidState` when it is inactive or outside its validity window
/// - `Validation` when its target set resolves to no products
pub async fn apply_discount(
    store: &dyn CatalogStore,
    discount_id: Uuid,
    now: DateTime<Utc>,
) -> AppResult<ApplyOutcome> {
    let discount = store
        .get_discount(discount_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Discount not found: {discount_id}")))?;

    if !discount.active {
        return Err(AppError::InvalidState(format!(
            "Discount {} is not active",
            discount.name
        )));
    }
    check_validity_window(&discount, now)?;

    let targets = resolve_targets(store, &discount).await?;
    if targets.is_empty() {
        return Err(AppError::Validation(format!(
            "Discount {} does not match any products",
            discount.name
        )));
    }

    // One read per product: a stale id is skipped instead of failing the batch.
    let mut batch = WriteBatch::new();
    let mut skus = Vec::new();
    for product_id in &targets {
        let Some(product) = store.get_product(*product_id).await? else {
            tracing::debug!(%product_id, "Skipping missing product");
            continue;
        };

        if let Some(updated) = price_product(product, &discount, now) {
            skus.push(updated.sku.clone());
            batch.update_product(updated);
        }
    }

    batch.increment_usage(discount.id);
    store.commit(batch).await?;

    tracing::info!(
        discount_id = %discount.id,
        discount = %discount.name,
        targets = targets.len(),
        updated = skus.len(),
        "Discount applied"
    );

    Ok(ApplyOutcome {
        updated_count: skus.len(),
        discount: DiscountSummary::from(&discount),
        skus,
    })
}

/// Bounds are only checked when their flag is set.
fn check_validity_window(discount: &Discount, now: DateTime<Utc>) -> AppResult<()> {
    if discount.has_start_date {
        if let Some(start) = discount.start_date {
            if now < start {
                return Err(AppError::InvalidState(format!(
                    "Discount {} has not started yet",
                    discount.name
                )));
            }
        }
    }

    if discount.has_end_date {
        if let Some(end) = discount.end_date {
            if now > end {
                return Err(AppError::InvalidState(format!(
                    "Discount {} has expired",
                    discount.name
                )));
            }
        }
    }

    Ok(())
}

/// Union of the explicit product ids and the products in the listed
/// categories, explicit ids first, without duplicates.
async fn resolve_targets(store: &dyn CatalogStore, discount: &Discount) -> AppResult<Vec<Uuid>> {
    let mut seen = HashSet::new();
    let mut targets = Vec::new();

    for id in &discount.applicable_products {
        if seen.insert(*id) {
            targets.push(*id);
        }
    }

    if !discount.applicable_categories.is_empty() {
        let in_categories = store
            .product_ids_in_categories(&discount.applicable_categories)
            .await?;
        for id in in_categories {
            if seen.insert(id) {
                targets.push(id);
            }
        }
    }

    Ok(targets)
}

/// Prices one product under `discount`.
///
/// Returns `None` when the product is left alone: no positive price, or a
/// discount type the engine does not understand. A product that already
/// carries a discount is priced from its recorded original price.
fn price_product(mut product: Product, discount: &Discount, now: DateTime<Utc>) -> Option<Product> {
    let original_price = match &product.discount_info {
        Some(info) => info.original_price.clone(),
        None => product.price.clone(),
    };

    let price = parse_price(&original_price).filter(|p| *p > Decimal::ZERO)?;
    let repriced = reprice(price, &discount.discount_type, discount.value)?;
    let discounted = format_price(repriced.discounted);

    product.discount_info = Some(DiscountInfo {
        discount_id: discount.id,
        discount_name: discount.name.clone(),
        discount_type: discount.discount_type.clone(),
        discount_value: discount.value,
        original_price,
        discounted_price: discounted.clone(),
        discount_amount: format_price(repriced.amount),
        applied_at: now,
        valid_until: discount.end_date.filter(|_| discount.has_end_date),
    });
    product.regular_price = format_price(price);
    product.sale_price = discounted.clone();
    product.price = discounted;
    product.updated_at = now;

    Some(product)
}

// =============================================================================
// REVERT
// =============================================================================

/// Restores every product stamped with `discount_id` to its original price.
///
/// The discount's own `active` flag and `usedCount` are left untouched.
///
/// # Errors
/// `NotFound` when the discount does not exist. No matching products is a
/// success with a count of zero.
pub async fn revert_discount(
    store: &dyn CatalogStore,
    discount_id: Uuid,
    now: DateTime<Utc>,
) -> AppResult<RevertOutcome> {
    let discount = store
        .get_discount(discount_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Discount not found: {discount_id}")))?;

    let stamped = store.products_with_discount(discount.id).await?;

    let mut batch = WriteBatch::new();
    let mut skus = Vec::with_capacity(stamped.len());
    for mut product in stamped {
        let Some(info) = product.discount_info.take() else {
            continue;
        };
        product.price = info.original_price;
        product.sale_price.clear();
        product.regular_price.clear();
        product.updated_at = now;

        skus.push(product.sku.clone());
        batch.update_product(product);
    }

    if !batch.is_empty() {
        store.commit(batch).await?;
    }

    tracing::info!(
        discount_id = %discount.id,
        discount = %discount.name,
        reverted = skus.len(),
        "Discount removed"
    );

    Ok(RevertOutcome {
        reverted_count: skus.len(),
        skus,
    })
}
