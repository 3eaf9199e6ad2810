//! # Split-Payment Orchestrator
//!
//! Drives an order's payment legs through the gateway.
//!
//! ## Leg Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  submit_payment(order)                                              │
//! │    plan  := split(total, ceiling)      gerai-core, sum == total     │
//! │    legs  := persist plan (once)                                     │
//! │    for each leg without a gateway ref:                              │
//! │        create_payment  (bounded retries on unreachable gateway)     │
//! │        attach ref + pay_url                                         │
//! │                                                                     │
//! │  poll_status(order)                                                 │
//! │    per open leg: ask gateway, flip paid/expired/failed              │
//! │    aggregate:  all paid        → Paid                               │
//! │                any dead leg    → Failed                             │
//! │                otherwise       → InProgress { paid, total }         │
//! │                                                                     │
//! │  apply_outcome(order)                                               │
//! │    Paid   + pending    → confirm (units sold)                       │
//! │    Paid   + cancelled  → operator alert, NEVER reactivates          │
//! │    Failed + pending    → mark failed, release units                 │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Submission is resumable: legs are persisted before any gateway call, so
//! a crash or outage mid-submission picks up where it left off without
//! planning twice or double-charging a leg.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};

use gerai_core::split::{plan_legs, verify_plan};
use gerai_core::{ActorRole, LegStatus, Money, OrderStatus, PaymentLeg, SoldChannel};
use gerai_db::Database;

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::gateway::{CreatePaymentRequest, PaymentGateway};
use crate::orders::OrderService;

// =============================================================================
// Aggregate Status
// =============================================================================

/// Where an order's payment stands, derived from its legs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentProgress {
    /// Every leg settled.
    Paid,
    /// At least one leg expired or failed; the order cannot complete.
    Failed,
    /// Still collecting.
    InProgress { paid: usize, total: usize },
}

/// Derives the aggregate from stored legs. Pure; polling happens elsewhere.
pub fn aggregate_legs(legs: &[PaymentLeg]) -> PaymentProgress {
    let total = legs.len();
    let paid = legs.iter().filter(|l| l.status == LegStatus::Paid).count();

    if total > 0 && paid == total {
        return PaymentProgress::Paid;
    }

    let dead = legs
        .iter()
        .any(|l| matches!(l.status, LegStatus::Expired | LegStatus::Failed));
    if dead {
        return PaymentProgress::Failed;
    }

    PaymentProgress::InProgress { paid, total }
}

// =============================================================================
// Service
// =============================================================================

/// Split-payment orchestration service.
#[derive(Clone)]
pub struct PaymentService {
    db: Database,
    gateway: Arc<dyn PaymentGateway>,
    config: EngineConfig,
}

impl PaymentService {
    /// Creates a new PaymentService.
    pub fn new(db: Database, gateway: Arc<dyn PaymentGateway>, config: EngineConfig) -> Self {
        PaymentService { db, gateway, config }
    }

    /// Plans and submits payment for a pending order.
    ///
    /// Idempotent and resumable: the plan is persisted once, and only legs
    /// without a gateway reference are (re)submitted. An unreachable
    /// gateway aborts with `GatewayUnavailable` after the configured
    /// retries; the order stays pending, its units stay reserved.
    pub async fn submit_payment(&self, order_id: &str) -> EngineResult<Vec<PaymentLeg>> {
        let order = self.db.orders().get_by_id(order_id).await?;

        if order.status != OrderStatus::Pending {
            return Err(EngineError::OrderNotPending {
                order_id: order_id.to_string(),
                status: format!("{:?}", order.status).to_lowercase(),
                operation: "submit payment".to_string(),
            });
        }

        let legs_repo = self.db.payment_legs();
        let mut legs = legs_repo.get_for_order(order_id).await?;

        if legs.is_empty() {
            let total = order.total_money();
            let ceiling = Money::from_rupiah(self.config.split_ceiling);

            let plan = plan_legs(total, ceiling)?;
            // Sum drift here would charge the customer wrongly; check before
            // anything leaves this process.
            if let Err(err) = verify_plan(&plan, total, ceiling) {
                error!(order_id = %order_id, error = %err, "split plan failed verification");
                return Err(err.into());
            }

            let amounts: Vec<i64> = plan.iter().map(|m| m.rupiah()).collect();
            let expires_at = Utc::now()
                + chrono::Duration::from_std(self.config.leg_expiry)
                    .unwrap_or_else(|_| chrono::Duration::hours(3));

            legs = legs_repo.create_plan(order_id, &amounts, Some(expires_at)).await?;

            info!(
                order_id = %order_id,
                legs = legs.len(),
                total = total.rupiah(),
                "payment plan created"
            );
        }

        for leg in &mut legs {
            if leg.external_ref.is_some() || leg.status != LegStatus::Unpaid {
                continue;
            }

            let request = CreatePaymentRequest {
                merchant_ref: format!("{}-{}", order.code, leg.seq),
                amount: leg.amount,
                customer_name: order.customer_name.clone(),
                customer_email: order.customer_email.clone(),
                expires_at: leg.expires_at.unwrap_or_else(Utc::now),
            };

            let payment = self
                .with_retries(|| self.gateway.create_payment(request.clone()))
                .await?;

            *leg = legs_repo
                .attach_gateway_ref(
                    &leg.id,
                    &payment.external_ref,
                    payment.pay_url.as_deref(),
                    payment.expires_at,
                )
                .await?;
        }

        Ok(legs)
    }

    /// Polls the gateway for every open leg and returns the aggregate.
    ///
    /// An unreachable gateway propagates as `GatewayUnavailable`; nothing
    /// is flipped on hearsay, and nothing is ever cancelled because the
    /// gateway went quiet.
    pub async fn poll_status(&self, order_id: &str) -> EngineResult<PaymentProgress> {
        let legs_repo = self.db.payment_legs();
        let legs = legs_repo.get_for_order(order_id).await?;

        for leg in &legs {
            if leg.status != LegStatus::Unpaid {
                continue;
            }
            let Some(external_ref) = leg.external_ref.as_deref() else {
                continue; // never submitted, nothing to ask about
            };

            let status = self
                .with_retries(|| self.gateway.payment_status(external_ref))
                .await?;

            match status {
                LegStatus::Paid => {
                    legs_repo.mark_paid(&leg.id, Utc::now()).await?;
                }
                LegStatus::Expired => {
                    legs_repo.mark_expired(&leg.id).await?;
                    warn!(order_id = %order_id, seq = leg.seq, "payment leg expired");
                }
                LegStatus::Failed => {
                    legs_repo.mark_failed(&leg.id).await?;
                    warn!(order_id = %order_id, seq = leg.seq, "payment leg failed");
                }
                LegStatus::Unpaid | LegStatus::Refunded => {}
            }
        }

        let legs = legs_repo.get_for_order(order_id).await?;
        Ok(aggregate_legs(&legs))
    }

    /// Acts on the stored aggregate for an order.
    ///
    /// - `Paid` + pending order: confirm it; units become sold through
    ///   `channel`.
    /// - `Paid` + cancelled order: the money arrived after cancellation.
    ///   The order is NOT reactivated; an operator alert goes out and a
    ///   manual refund follows.
    /// - `Failed` + pending order: mark it failed and release its units.
    pub async fn apply_outcome(
        &self,
        order_id: &str,
        channel: SoldChannel,
        role: ActorRole,
    ) -> EngineResult<PaymentProgress> {
        let legs = self.db.payment_legs().get_for_order(order_id).await?;
        let progress = aggregate_legs(&legs);
        let order = self.db.orders().get_by_id(order_id).await?;

        match (progress, order.status) {
            (PaymentProgress::Paid, OrderStatus::Pending) => {
                OrderService::new(self.db.clone())
                    .confirm_order(order_id, channel, role)
                    .await?;
            }

            (PaymentProgress::Paid, OrderStatus::Cancelled) => {
                error!(
                    order_id = %order_id,
                    code = %order.code,
                    total = order.total,
                    "payment settled for a cancelled order; refund required, order stays cancelled"
                );
            }

            (PaymentProgress::Failed, OrderStatus::Pending) => {
                self.db.orders().mark_failed(order_id).await?;
                let released = self.db.units().release(order_id, role).await?;
                info!(
                    order_id = %order_id,
                    released = released,
                    "payment failed, order failed and units released"
                );
            }

            // Terminal orders and in-flight payments: nothing to do.
            _ => {}
        }

        Ok(progress)
    }

    /// One poll-then-apply cycle; what a background payment worker runs.
    pub async fn run_cycle(
        &self,
        order_id: &str,
        channel: SoldChannel,
        role: ActorRole,
    ) -> EngineResult<PaymentProgress> {
        self.poll_status(order_id).await?;
        self.apply_outcome(order_id, channel, role).await
    }

    /// Runs a gateway call with bounded retries on unreachability. Backoff
    /// doubles per attempt. Any other error aborts immediately.
    async fn with_retries<T, F, Fut>(&self, mut call: F) -> EngineResult<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = EngineResult<T>>,
    {
        let mut backoff = self.config.retry_backoff;
        let mut last_err = None;

        for attempt in 1..=self.config.retry_attempts {
            match call().await {
                Ok(value) => return Ok(value),
                Err(err @ EngineError::GatewayUnavailable(_)) => {
                    warn!(attempt, error = %err, "gateway unreachable");
                    last_err = Some(err);
                    if attempt < self.config.retry_attempts {
                        tokio::time::sleep(backoff).await;
                        backoff *= 2;
                    }
                }
                Err(err) => return Err(err),
            }
        }

        Err(last_err
            .unwrap_or_else(|| EngineError::GatewayUnavailable("no attempts made".to_string())))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::mock::MockGateway;
    use crate::orders::{CreateOrderInput, OrderSource};
    use gerai_core::{ConditionSeverity, StockStatus};
    use gerai_db::{DbConfig, NewStockUnit};
    use std::time::Duration;

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn test_config() -> EngineConfig {
        EngineConfig::new("https://gateway.test")
            .retry_attempts(2)
            .retry_backoff(Duration::from_millis(1))
    }

    async fn seed_order(db: &Database, prices: &[i64]) -> String {
        let mut unit_ids = Vec::new();
        for (i, price) in prices.iter().enumerate() {
            let unit = db
                .units()
                .create(NewStockUnit {
                    imei: format!("3567891048350{i:02}"),
                    branch_id: "branch-1".to_string(),
                    product_label: "iPhone 13 128GB".to_string(),
                    condition: ConditionSeverity::None,
                    condition_note: None,
                    selling_price: *price,
                    status: StockStatus::Available,
                })
                .await
                .unwrap();
            unit_ids.push(unit.id);
        }

        OrderService::new(db.clone())
            .create_order(CreateOrderInput {
                source: OrderSource::Web,
                branch_id: "branch-1".to_string(),
                customer_name: Some("Budi".to_string()),
                customer_email: None,
                customer_phone: None,
                unit_ids,
                discount: None,
                shipping_cost: 0,
                role: ActorRole::AdminBranch,
            })
            .await
            .unwrap()
            .id
    }

    fn service(db: &Database, gateway: Arc<MockGateway>) -> PaymentService {
        PaymentService::new(db.clone(), gateway, test_config())
    }

    #[tokio::test]
    async fn test_submit_splits_above_ceiling() {
        let db = test_db().await;
        let gw = Arc::new(MockGateway::new());
        let svc = service(&db, gw.clone());

        let order_id = seed_order(&db, &[12_000_000]).await;
        let legs = svc.submit_payment(&order_id).await.unwrap();

        assert_eq!(legs.len(), 2);
        assert_eq!(legs[0].amount, 6_000_000);
        assert_eq!(legs[1].amount, 6_000_000);
        assert!(legs.iter().all(|l| l.external_ref.is_some()));
        assert_eq!(gw.created_count(), 2);
    }

    #[tokio::test]
    async fn test_submit_single_leg_under_ceiling() {
        let db = test_db().await;
        let gw = Arc::new(MockGateway::new());
        let svc = service(&db, gw.clone());

        let order_id = seed_order(&db, &[7_500_000]).await;
        let legs = svc.submit_payment(&order_id).await.unwrap();

        assert_eq!(legs.len(), 1);
        assert_eq!(legs[0].amount, 7_500_000);
    }

    #[tokio::test]
    async fn test_submit_survives_one_outage() {
        let db = test_db().await;
        let gw = Arc::new(MockGateway::new());
        gw.fail_next(1);
        let svc = service(&db, gw.clone());

        let order_id = seed_order(&db, &[7_500_000]).await;
        let legs = svc.submit_payment(&order_id).await.unwrap();
        assert!(legs[0].external_ref.is_some());
    }

    #[tokio::test]
    async fn test_submit_resumes_after_outage() {
        let db = test_db().await;
        let gw = Arc::new(MockGateway::new());
        let svc = service(&db, gw.clone());

        let order_id = seed_order(&db, &[12_000_000]).await;

        // Exactly both attempts of the first gateway call fail.
        gw.fail_next(2);
        let err = svc.submit_payment(&order_id).await.unwrap_err();
        assert!(matches!(err, EngineError::GatewayUnavailable(_)));

        // The plan persisted; the order is untouched.
        let legs = db.payment_legs().get_for_order(&order_id).await.unwrap();
        assert_eq!(legs.len(), 2);
        assert_eq!(db.orders().get_by_id(&order_id).await.unwrap().status, OrderStatus::Pending);

        // Gateway is back: resubmission fills in the refs without replanning.
        let legs = svc.submit_payment(&order_id).await.unwrap();
        assert_eq!(legs.len(), 2);
        assert!(legs.iter().all(|l| l.external_ref.is_some()));
    }

    #[tokio::test]
    async fn test_poll_aggregates_partial_payment() {
        let db = test_db().await;
        let gw = Arc::new(MockGateway::new());
        let svc = service(&db, gw.clone());

        let order_id = seed_order(&db, &[12_000_000]).await;
        let legs = svc.submit_payment(&order_id).await.unwrap();

        gw.set_status(legs[0].external_ref.as_deref().unwrap(), LegStatus::Paid);
        let progress = svc.poll_status(&order_id).await.unwrap();
        assert_eq!(progress, PaymentProgress::InProgress { paid: 1, total: 2 });

        gw.set_status(legs[1].external_ref.as_deref().unwrap(), LegStatus::Paid);
        let progress = svc.poll_status(&order_id).await.unwrap();
        assert_eq!(progress, PaymentProgress::Paid);
    }

    #[tokio::test]
    async fn test_all_paid_confirms_order() {
        let db = test_db().await;
        let gw = Arc::new(MockGateway::new());
        let svc = service(&db, gw.clone());

        let order_id = seed_order(&db, &[12_000_000]).await;
        let legs = svc.submit_payment(&order_id).await.unwrap();
        for leg in &legs {
            gw.set_status(leg.external_ref.as_deref().unwrap(), LegStatus::Paid);
        }

        let progress = svc
            .run_cycle(&order_id, SoldChannel::Website, ActorRole::AdminBranch)
            .await
            .unwrap();
        assert_eq!(progress, PaymentProgress::Paid);

        let order = db.orders().get_by_id(&order_id).await.unwrap();
        assert_eq!(order.status, OrderStatus::Completed);

        let held = db.units().list_by_reservation(&order_id).await.unwrap();
        assert!(held.is_empty());
    }

    #[tokio::test]
    async fn test_expired_leg_fails_order_and_releases() {
        let db = test_db().await;
        let gw = Arc::new(MockGateway::new());
        let svc = service(&db, gw.clone());

        let order_id = seed_order(&db, &[12_000_000]).await;
        let legs = svc.submit_payment(&order_id).await.unwrap();

        gw.set_status(legs[0].external_ref.as_deref().unwrap(), LegStatus::Paid);
        gw.set_status(legs[1].external_ref.as_deref().unwrap(), LegStatus::Expired);

        let progress = svc
            .run_cycle(&order_id, SoldChannel::Website, ActorRole::AdminBranch)
            .await
            .unwrap();
        assert_eq!(progress, PaymentProgress::Failed);

        let order = db.orders().get_by_id(&order_id).await.unwrap();
        assert_eq!(order.status, OrderStatus::Failed);

        // One leg stays paid (refund is manual), but the stock is free again.
        let held = db.units().list_by_reservation(&order_id).await.unwrap();
        assert!(held.is_empty());
    }

    #[tokio::test]
    async fn test_late_payment_never_reactivates_cancelled_order() {
        let db = test_db().await;
        let gw = Arc::new(MockGateway::new());
        let svc = service(&db, gw.clone());

        let order_id = seed_order(&db, &[7_500_000]).await;
        let legs = svc.submit_payment(&order_id).await.unwrap();

        OrderService::new(db.clone())
            .cancel_order(&order_id, ActorRole::AdminBranch)
            .await
            .unwrap();

        // The customer pays anyway.
        gw.set_status(legs[0].external_ref.as_deref().unwrap(), LegStatus::Paid);

        let progress = svc
            .run_cycle(&order_id, SoldChannel::Website, ActorRole::AdminBranch)
            .await
            .unwrap();
        assert_eq!(progress, PaymentProgress::Paid);

        let order = db.orders().get_by_id(&order_id).await.unwrap();
        assert_eq!(order.status, OrderStatus::Cancelled);

        let legs = db.payment_legs().get_for_order(&order_id).await.unwrap();
        assert_eq!(legs[0].status, LegStatus::Paid);
    }

    #[tokio::test]
    async fn test_submit_refused_for_non_pending_order() {
        let db = test_db().await;
        let gw = Arc::new(MockGateway::new());
        let svc = service(&db, gw.clone());

        let order_id = seed_order(&db, &[7_500_000]).await;
        OrderService::new(db.clone())
            .cancel_order(&order_id, ActorRole::AdminBranch)
            .await
            .unwrap();

        let err = svc.submit_payment(&order_id).await.unwrap_err();
        assert!(matches!(err, EngineError::OrderNotPending { .. }));
    }

    #[test]
    fn test_aggregate_edge_cases() {
        assert_eq!(
            aggregate_legs(&[]),
            PaymentProgress::InProgress { paid: 0, total: 0 }
        );
    }
}
