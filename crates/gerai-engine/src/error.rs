//! # Engine Error Types
//!
//! Errors for the orchestration layer. Mostly a funnel: core and db errors
//! pass through with their own classification; the genuinely new failures
//! here are gateway-shaped.

use thiserror::Error;

use gerai_core::{CoreError, ErrorKind};
use gerai_db::DbError;

/// Orchestration errors.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Business rule violation from gerai-core.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Storage or ledger failure from gerai-db.
    #[error(transparent)]
    Db(#[from] DbError),

    /// The gateway could not be reached (timeout, connect failure). Always
    /// retryable; never grounds for cancelling anything.
    #[error("payment gateway unavailable: {0}")]
    GatewayUnavailable(String),

    /// The gateway answered but refused the request.
    #[error("payment gateway rejected the request: {0}")]
    GatewayRejected(String),

    /// The gateway answered something we cannot interpret.
    #[error("unexpected gateway response: {0}")]
    GatewayProtocol(String),

    /// Payment was submitted for an order that is not pending.
    #[error("order {order_id} is {status}, cannot {operation}")]
    OrderNotPending {
        order_id: String,
        status: String,
        operation: String,
    },
}

impl EngineError {
    /// Classification per the workspace error taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Core(e) => e.kind(),
            EngineError::Db(e) => e.kind(),
            EngineError::GatewayUnavailable(_) => ErrorKind::Transient,
            EngineError::GatewayRejected(_) => ErrorKind::Invalid,
            EngineError::GatewayProtocol(_) => ErrorKind::Integrity,
            EngineError::OrderNotPending { .. } => ErrorKind::InvalidState,
        }
    }

    /// Whether a caller may retry the same call unchanged.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }
}

impl From<reqwest::Error> for EngineError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            EngineError::GatewayUnavailable(err.to_string())
        } else if err.is_decode() {
            EngineError::GatewayProtocol(err.to_string())
        } else {
            EngineError::GatewayRejected(err.to_string())
        }
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_timeouts_are_transient() {
        let err = EngineError::GatewayUnavailable("connect timeout".to_string());
        assert_eq!(err.kind(), ErrorKind::Transient);
        assert!(err.is_retryable());
    }

    #[test]
    fn test_wrapped_errors_keep_their_kind() {
        let err = EngineError::Db(DbError::UnitUnavailable {
            unit_ids: vec!["u-1".to_string()],
        });
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(!err.is_retryable());
    }
}
