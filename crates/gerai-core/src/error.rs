//! # Error Types
//!
//! Domain-specific error types for gerai-core.
//!
//! ## Error Taxonomy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Kinds                                     │
//! │                                                                         │
//! │  Conflict      resource already in use → retry with another selection  │
//! │  InvalidState  operation illegal for current lifecycle stage           │
//! │  Unauthorized  policy violation, terminal for the request              │
//! │  Transient     gateway unavailable, safe to retry with backoff         │
//! │  Integrity     an all-or-nothing guarantee was violated — escalate     │
//! │  Invalid       bad input, fix and resubmit                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. `thiserror` derive macros, never manual impls
//! 2. Context in messages (IMEI, order code, amounts)
//! 3. Errors are enum variants, never String

use thiserror::Error;

use crate::types::{ActorRole, SoldChannel, StockStatus};

// =============================================================================
// Error Kind
// =============================================================================

/// Coarse classification driving caller behavior (retry / surface / escalate).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Conflict,
    InvalidState,
    Unauthorized,
    Transient,
    Integrity,
    Invalid,
}

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// State pair not in the allowed table for this role.
    #[error("invalid transition {from:?} -> {to:?}")]
    InvalidTransition { from: StockStatus, to: StockStatus },

    /// Transitioning to sold without a sale channel.
    #[error("transition to sold requires a sale channel")]
    MissingChannel,

    /// Role not permitted any transition from this state.
    #[error("{role:?} may not move a unit out of {from:?}")]
    Unauthorized { role: ActorRole, from: StockStatus },

    /// Channel outside the role's allow-list (e.g. an employee recording a
    /// POS sale).
    #[error("{role:?} may not record a sale through {channel:?}")]
    ChannelNotAllowed { role: ActorRole, channel: SoldChannel },

    /// An order needs at least one unit.
    #[error("cart is empty")]
    EmptyCart,

    /// Discount code is disabled in the catalog.
    #[error("discount code {code} is not active")]
    DiscountInactive { code: String },

    /// Discount code used outside its validity window.
    #[error("discount code {code} is expired or not yet valid")]
    DiscountOutsideWindow { code: String },

    /// Subtotal below the code's minimum purchase rule.
    #[error("discount code {code} requires a minimum purchase of {min}, subtotal is {subtotal}")]
    MinPurchaseNotMet {
        code: String,
        min: i64,
        subtotal: i64,
    },

    /// A payment plan was asked for a non-positive total.
    #[error("cannot plan payment for non-positive total {total}")]
    NonPositiveTotal { total: i64 },

    /// Sum of leg amounts diverged from the order total. Must never be
    /// submitted to the gateway.
    #[error("payment legs sum to {legs_sum}, order total is {total}")]
    AmountMismatch { legs_sum: i64, total: i64 },

    /// Operation not legal for the entity's current lifecycle stage.
    #[error("{entity} is {current}, cannot {operation}")]
    InvalidState {
        entity: String,
        current: String,
        operation: String,
    },

    /// Stock-take session is locked; no further scans or completion.
    #[error("opname session is locked")]
    SessionLocked,

    /// Input validation failure.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Classifies this error for caller retry/surface/escalate policy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::InvalidTransition { .. }
            | CoreError::InvalidState { .. }
            | CoreError::SessionLocked => ErrorKind::InvalidState,

            CoreError::Unauthorized { .. } | CoreError::ChannelNotAllowed { .. } => {
                ErrorKind::Unauthorized
            }

            CoreError::AmountMismatch { .. } => ErrorKind::Integrity,

            CoreError::MissingChannel
            | CoreError::EmptyCart
            | CoreError::DiscountInactive { .. }
            | CoreError::DiscountOutsideWindow { .. }
            | CoreError::MinPurchaseNotMet { .. }
            | CoreError::NonPositiveTotal { .. }
            | CoreError::Validation(_) => ErrorKind::Invalid,
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors, raised before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: String },

    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    #[error("{field} must be positive")]
    MustBePositive { field: String },

    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },
}

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InvalidTransition {
            from: StockStatus::Sold,
            to: StockStatus::Available,
        };
        assert_eq!(err.to_string(), "invalid transition Sold -> Available");

        let err = CoreError::MinPurchaseNotMet {
            code: "HEMAT10".to_string(),
            min: 5_000_000,
            subtotal: 3_000_000,
        };
        assert!(err.to_string().contains("HEMAT10"));
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            CoreError::Unauthorized {
                role: ActorRole::Employee,
                from: StockStatus::Sold,
            }
            .kind(),
            ErrorKind::Unauthorized
        );
        assert_eq!(
            CoreError::AmountMismatch {
                legs_sum: 1,
                total: 2
            }
            .kind(),
            ErrorKind::Integrity
        );
        assert_eq!(CoreError::SessionLocked.kind(), ErrorKind::InvalidState);
        assert_eq!(CoreError::EmptyCart.kind(), ErrorKind::Invalid);
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let v = ValidationError::Required {
            field: "imei".to_string(),
        };
        let core: CoreError = v.into();
        assert!(matches!(core, CoreError::Validation(_)));
        assert_eq!(core.kind(), ErrorKind::Invalid);
    }
}
