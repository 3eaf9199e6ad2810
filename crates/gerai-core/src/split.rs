//! # Split-Payment Planning
//!
//! Partitions an order total into payment legs when it exceeds the
//! per-payment ceiling.
//!
//! Policy: the minimum number of legs, each at or below the ceiling, amounts
//! as equal as practical. The division remainder is spread one rupiah at a
//! time across the leading legs, so no leg ever differs from another by more
//! than one rupiah.
//!
//! ```text
//! total 12.000.000, ceiling 10.000.000
//!   → 2 legs: 6.000.000 + 6.000.000
//!
//! total 25.000.001, ceiling 10.000.000
//!   → 3 legs: 8.333.334 + 8.333.334 + 8.333.333
//! ```
//!
//! The sum of legs always equals the total; [`verify_plan`] re-checks this
//! before anything is submitted to the gateway.

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::MAX_SPLIT_LEGS;

// =============================================================================
// Planning
// =============================================================================

/// Plans leg amounts for a total under a per-payment ceiling.
///
/// A total at or below the ceiling yields exactly one leg.
pub fn plan_legs(total: Money, ceiling: Money) -> CoreResult<Vec<Money>> {
    if !total.is_positive() {
        return Err(CoreError::NonPositiveTotal {
            total: total.rupiah(),
        });
    }
    if !ceiling.is_positive() {
        return Err(CoreError::NonPositiveTotal {
            total: ceiling.rupiah(),
        });
    }

    if total <= ceiling {
        return Ok(vec![total]);
    }

    // Minimum leg count: ceil(total / ceiling)
    let t = total.rupiah();
    let c = ceiling.rupiah();
    let count = (t + c - 1) / c;

    // An order needing more legs than this is a data error, not a sale.
    if count as usize > MAX_SPLIT_LEGS {
        return Err(CoreError::InvalidState {
            entity: "payment plan".to_string(),
            current: format!("{count} legs"),
            operation: format!("split beyond {MAX_SPLIT_LEGS} legs"),
        });
    }

    let base = t / count;
    let remainder = (t % count) as usize;

    // remainder < count, and base + 1 never exceeds the ceiling when the
    // leg count is minimal, so every leg stays within bounds even for
    // tight ceilings where one leg absorbing the whole remainder would not.
    let mut legs = vec![Money::from_rupiah(base); count as usize];
    for leg in legs.iter_mut().take(remainder) {
        *leg = Money::from_rupiah(base + 1);
    }

    verify_plan(&legs, total, ceiling)?;
    Ok(legs)
}

/// Re-checks a plan: legs sum to the total and none exceeds the ceiling.
///
/// A failed check is an integrity error; the plan must not be submitted.
pub fn verify_plan(legs: &[Money], total: Money, ceiling: Money) -> CoreResult<()> {
    let sum: Money = legs.iter().copied().sum();
    if sum != total || legs.iter().any(|leg| *leg > ceiling) {
        return Err(CoreError::AmountMismatch {
            legs_sum: sum.rupiah(),
            total: total.rupiah(),
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
