//! # Payment Gateway Client
//!
//! The REST seam to the external payment provider. Everything behind an
//! object-safe trait so the orchestrator is testable without a network.
//!
//! ## Failure Mapping
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  timeout / connect refused   → GatewayUnavailable (retryable)       │
//! │  4xx / 5xx response          → GatewayRejected                      │
//! │  unparseable body / status   → GatewayProtocol (integrity)          │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! An unreachable gateway says nothing about the payment itself, so
//! `GatewayUnavailable` never cancels an order; callers retry or leave the
//! order pending.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use gerai_core::LegStatus;

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};

// =============================================================================
// Wire Types
// =============================================================================

/// Request to open one payment with the gateway. One request per leg.
#[derive(Debug, Clone, Serialize)]
pub struct CreatePaymentRequest {
    /// Order code plus leg seq, e.g. `WEB-M3K1A9-2`. Unique per leg so the
    /// gateway can deduplicate resubmissions.
    pub merchant_ref: String,
    /// Whole rupiah.
    pub amount: i64,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    /// When the payment window closes.
    pub expires_at: DateTime<Utc>,
}

/// What the gateway assigned to a created payment.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayPayment {
    /// The gateway's own reference; how we poll later.
    pub external_ref: String,
    /// Where the customer pays.
    pub pay_url: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: String,
}

fn parse_leg_status(raw: &str) -> EngineResult<LegStatus> {
    match raw {
        "unpaid" | "pending" => Ok(LegStatus::Unpaid),
        "paid" | "settled" => Ok(LegStatus::Paid),
        "expired" => Ok(LegStatus::Expired),
        "failed" => Ok(LegStatus::Failed),
        "refund" | "refunded" => Ok(LegStatus::Refunded),
        other => Err(EngineError::GatewayProtocol(format!(
            "unknown payment status '{other}'"
        ))),
    }
}

// =============================================================================
// The Trait
// =============================================================================

/// Async seam to the payment provider.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Opens one payment; returns the gateway's reference and pay URL.
    async fn create_payment(&self, req: CreatePaymentRequest) -> EngineResult<GatewayPayment>;

    /// Current status of a previously created payment.
    async fn payment_status(&self, external_ref: &str) -> EngineResult<LegStatus>;
}

// =============================================================================
// REST Implementation
// =============================================================================

/// Production gateway client over HTTPS.
#[derive(Debug, Clone)]
pub struct RestGateway {
    client: reqwest::Client,
    base_url: String,
}

impl RestGateway {
    /// Builds the client from engine config. The timeout bounds every call;
    /// checkout latency is capped by it.
    pub fn new(config: &EngineConfig) -> EngineResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| EngineError::GatewayUnavailable(e.to_string()))?;

        Ok(RestGateway {
            client,
            base_url: config.gateway_base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl PaymentGateway for RestGateway {
    async fn create_payment(&self, req: CreatePaymentRequest) -> EngineResult<GatewayPayment> {
        debug!(merchant_ref = %req.merchant_ref, amount = req.amount, "creating gateway payment");

        let response = self
            .client
            .post(format!("{}/payments", self.base_url))
            .json(&req)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::GatewayRejected(format!("{status}: {body}")));
        }

        let payment: GatewayPayment = response.json().await?;
        Ok(payment)
    }

    async fn payment_status(&self, external_ref: &str) -> EngineResult<LegStatus> {
        let response = self
            .client
            .get(format!("{}/payments/{external_ref}", self.base_url))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(EngineError::GatewayRejected(format!(
                "{status} while polling {external_ref}"
            )));
        }

        let body: StatusResponse = response.json().await?;
        parse_leg_status(&body.status)
    }
}

// =============================================================================
// Test Double
// =============================================================================


// =============================================================================
// Unit Tests
// =============================================================================
