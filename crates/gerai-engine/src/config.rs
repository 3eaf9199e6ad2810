//! # Engine Configuration
//!
//! Builder-style configuration for the orchestration layer. Defaults match
//! production gateway limits; tests shrink the timeouts.

use std::time::Duration;

use gerai_core::{DEFAULT_LEG_EXPIRY_SECS, SPLIT_CEILING_RUPIAH};

/// Engine configuration.
///
/// ## Example
/// ```rust
/// use gerai_engine::config::EngineConfig;
///
/// let config = EngineConfig::new("https://gateway.example")
///     .split_ceiling(5_000_000)
///     .retry_attempts(5);
/// ```
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Base URL of the payment gateway REST API.
    pub gateway_base_url: String,

    /// Per-request timeout against the gateway. The checkout path blocks on
    /// this, so it stays short.
    pub request_timeout: Duration,

    /// Attempts per gateway call when the gateway is unreachable.
    pub retry_attempts: u32,

    /// Base backoff between retries (doubled each attempt).
    pub retry_backoff: Duration,

    /// Largest amount a single payment leg may carry, whole rupiah.
    pub split_ceiling: i64,

    /// How long a submitted leg stays payable.
    pub leg_expiry: Duration,
}

impl EngineConfig {
    /// Creates a configuration with production defaults.
    pub fn new(gateway_base_url: impl Into<String>) -> Self {
        EngineConfig {
            gateway_base_url: gateway_base_url.into(),
            request_timeout: Duration::from_secs(10),
            retry_attempts: 3,
            retry_backoff: Duration::from_millis(500),
            split_ceiling: SPLIT_CEILING_RUPIAH,
            leg_expiry: Duration::from_secs(DEFAULT_LEG_EXPIRY_SECS as u64),
        }
    }

    /// Sets the per-request gateway timeout.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the retry attempt count for unreachable-gateway errors.
    pub fn retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts.max(1);
        self
    }

    /// Sets the base retry backoff.
    pub fn retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Sets the per-leg amount ceiling.
    pub fn split_ceiling(mut self, ceiling: i64) -> Self {
        self.split_ceiling = ceiling;
        self
    }

    /// Sets the leg expiry window.
    pub fn leg_expiry(mut self, expiry: Duration) -> Self {
        self.leg_expiry = expiry;
        self
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
