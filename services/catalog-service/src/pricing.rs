// =============================================================================
// PRICING MODULE
// =============================================================================
// Discount arithmetic on decimal prices.
//
// Prices live in documents as strings ("100.00"); they are parsed into
// `Decimal` for the calculation and formatted back with two fraction digits.
// =============================================================================

use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};

use crate::models::DiscountType;

/// Result of pricing one product under one discount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Repricing {
    pub discounted: Decimal,
    pub amount: Decimal,
}

/// Parses a stored price string.
///
/// Accepts surrounding whitespace, a leading `$` and thousands separators.
/// Returns `None` for empty or malformed input.
pub fn parse_price(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw
        .trim()
        .trim_start_matches('$')
        .chars()
        .filter(|c| *c != ',')
        .collect();

    if cleaned.is_empty() {
        return None;
    }

    Decimal::from_str(&cleaned).ok()
}

/// Computes the discounted price of `price` under a discount of `kind`.
///
/// - percentage: `price - price * value / 100`
/// - fixed: `price - min(value, price)`
/// - buy_x_get_y: unchanged
///
/// The result is clamped to zero. Returns `None` for discount types the
/// engine does not know, and when the arithmetic leaves the range of
/// `Decimal`, so the caller can skip the product.
pub fn reprice(price: Decimal, kind: &DiscountType, value: Decimal) -> Option<Repricing> {
    let value = value.max(Decimal::ZERO);

    let reduction = match kind {
        DiscountType::Percentage => price.checked_mul(value)?.checked_div(Decimal::ONE_HUNDRED)?,
        DiscountType::Fixed => value.min(price),
        DiscountType::BuyXGetY => Decimal::ZERO,
        DiscountType::Unknown => return None,
    };

    let discounted = price.checked_sub(reduction)?.max(Decimal::ZERO);

    Some(Repricing {
        discounted,
        amount: price - discounted,
    })
}

/// Formats a price with exactly two decimals, rounding half away from zero.
pub fn format_price(value: Decimal) -> String {
    let mut rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    if rounded.is_zero() {
        rounded.set_sign_positive(true);
    }
    rounded.to_string()
}
