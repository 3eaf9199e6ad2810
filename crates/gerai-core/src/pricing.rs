//! # Order Pricing
//!
//! Pure totals computation: subtotal, discount rules, shipping, final total.
//!
//! Rounding rule: percentage discounts round half-up on the subtotal, so
//! reapplying the same code to the same subtotal always yields the same
//! amount (see [`Money::percentage_bps`]).

use chrono::{DateTime, Utc};

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{DiscountCode, DiscountKind};

// =============================================================================
// Totals
// =============================================================================

/// The priced breakdown of an order before persistence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderTotals {
    pub subtotal: Money,
    pub discount_amount: Money,
    pub shipping_cost: Money,
    /// `max(0, subtotal - discount_amount + shipping_cost)`
    pub total: Money,
}

/// Validates a discount code against a subtotal at a point in time.
///
/// Rules, in order: active flag, validity window, minimum purchase.
pub fn validate_discount(
    code: &DiscountCode,
    subtotal: Money,
    now: DateTime<Utc>,
) -> CoreResult<()> {
    if !code.is_active {
        return Err(CoreError::DiscountInactive {
            code: code.code.clone(),
        });
    }

    if now < code.valid_from || code.valid_until.is_some_and(|until| now > until) {
        return Err(CoreError::DiscountOutsideWindow {
            code: code.code.clone(),
        });
    }

    if let Some(min) = code.min_purchase {
        if subtotal.rupiah() < min {
            return Err(CoreError::MinPurchaseNotMet {
                code: code.code.clone(),
                min,
                subtotal: subtotal.rupiah(),
            });
        }
    }

    Ok(())
}

/// Computes the discount amount for a validated code.
///
/// Never exceeds the subtotal. A code that computes to zero is still
/// considered applied; it just changes nothing.
pub fn discount_amount(code: &DiscountCode, subtotal: Money) -> Money {
    let raw = match code.kind {
        DiscountKind::Percentage(bps) => subtotal.percentage_bps(bps),
        DiscountKind::FixedAmount(amount) => Money::from_rupiah(amount),
    };
    raw.min(subtotal)
}

/// Prices a cart of reserved units into order totals.
///
/// ## Example
/// ```rust
/// use chrono::Utc;
/// use gerai_core::money::Money;
/// use gerai_core::pricing::compute_totals;
///
/// let prices = [Money::from_rupiah(5_000_000), Money::from_rupiah(7_000_000)];
/// let totals = compute_totals(&prices, None, Money::zero(), Utc::now()).unwrap();
/// assert_eq!(totals.total.rupiah(), 12_000_000);
/// ```
pub fn compute_totals(
    unit_prices: &[Money],
    discount: Option<&DiscountCode>,
    shipping_cost: Money,
    now: DateTime<Utc>,
) -> CoreResult<OrderTotals> {
    if unit_prices.is_empty() {
        return Err(CoreError::EmptyCart);
    }

    let subtotal: Money = unit_prices.iter().copied().sum();

    let discount_amt = match discount {
        Some(code) => {
            validate_discount(code, subtotal, now)?;
            discount_amount(code, subtotal)
        }
        None => Money::zero(),
    };

    let total = subtotal.saturating_sub_floor_zero(discount_amt) + shipping_cost;

    Ok(OrderTotals {
        subtotal,
        discount_amount: discount_amt,
        shipping_cost,
        total,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn pct_code(bps: u32) -> DiscountCode {
        DiscountCode {
            code: "HEMAT".to_string(),
            kind: DiscountKind::Percentage(bps),
            min_purchase: None,
            is_active: true,
            valid_from: Utc::now() - Duration::days(1),
            valid_until: Some(Utc::now() + Duration::days(1)),
        }
    }

    #[test]
    fn test_totals_without_discount() {
        let prices = [Money::from_rupiah(5_000_000), Money::from_rupiah(7_000_000)];
        let totals = compute_totals(&prices, None, Money::zero(), Utc::now()).unwrap();
        assert_eq!(totals.subtotal.rupiah(), 12_000_000);
        assert_eq!(totals.discount_amount, Money::zero());
        assert_eq!(totals.total.rupiah(), 12_000_000);
    }

    #[test]
    fn test_empty_cart_rejected() {
        let err = compute_totals(&[], None, Money::zero(), Utc::now()).unwrap_err();
        assert!(matches!(err, CoreError::EmptyCart));
    }

    #[test]
    fn test_percentage_discount() {
        let prices = [Money::from_rupiah(10_000_000)];
        let code = pct_code(1000); // 10%
        let totals =
            compute_totals(&prices, Some(&code), Money::from_rupiah(50_000), Utc::now()).unwrap();
        assert_eq!(totals.discount_amount.rupiah(), 1_000_000);
        assert_eq!(totals.total.rupiah(), 9_050_000);
    }

    #[test]
    fn test_fixed_discount_capped_at_subtotal() {
        let code = DiscountCode {
            kind: DiscountKind::FixedAmount(2_000_000),
            ..pct_code(0)
        };
        let prices = [Money::from_rupiah(1_500_000)];
        let totals = compute_totals(&prices, Some(&code), Money::zero(), Utc::now()).unwrap();
        assert_eq!(totals.discount_amount.rupiah(), 1_500_000);
        assert_eq!(totals.total, Money::zero());
    }

    #[test]
    fn test_zero_discount_still_applies() {
        let code = pct_code(0);
        let prices = [Money::from_rupiah(3_000_000)];
        let totals = compute_totals(&prices, Some(&code), Money::zero(), Utc::now()).unwrap();
        assert_eq!(totals.discount_amount, Money::zero());
        assert_eq!(totals.total.rupiah(), 3_000_000);
    }

    #[test]
    fn test_inactive_code_rejected() {
        let code = DiscountCode {
            is_active: false,
            ..pct_code(1000)
        };
        let err = validate_discount(&code, Money::from_rupiah(1_000_000), Utc::now()).unwrap_err();
        assert!(matches!(err, CoreError::DiscountInactive { .. }));
    }

    #[test]
    fn test_expired_code_rejected() {
        let code = DiscountCode {
            valid_until: Some(Utc::now() - Duration::hours(1)),
            ..pct_code(1000)
        };
        let err = validate_discount(&code, Money::from_rupiah(1_000_000), Utc::now()).unwrap_err();
        assert!(matches!(err, CoreError::DiscountOutsideWindow { .. }));
    }

    #[test]
    fn test_not_yet_valid_rejected() {
        let code = DiscountCode {
            valid_from: Utc::now() + Duration::hours(1),
            ..pct_code(1000)
        };
        let err = validate_discount(&code, Money::from_rupiah(1_000_000), Utc::now()).unwrap_err();
        assert!(matches!(err, CoreError::DiscountOutsideWindow { .. }));
    }

    #[test]
    fn test_min_purchase_rule() {
        let code = DiscountCode {
            min_purchase: Some(5_000_000),
            ..pct_code(1000)
        };
        let err = validate_discount(&code, Money::from_rupiah(3_000_000), Utc::now()).unwrap_err();
        assert!(matches!(err, CoreError::MinPurchaseNotMet { .. }));

        validate_discount(&code, Money::from_rupiah(5_000_000), Utc::now()).unwrap();
    }

    #[test]
    fn test_discount_is_deterministic() {
        let code = pct_code(1250);
        let subtotal = Money::from_rupiah(7_777_777);
        let first = discount_amount(&code, subtotal);
        for _ in 0..20 {
            assert_eq!(discount_amount(&code, subtotal), first);
        }
    }
}
