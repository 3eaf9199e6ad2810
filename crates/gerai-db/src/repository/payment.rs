//! # Payment Leg Repository
//!
//! Persistence for split-payment legs. One order owns 1..n legs; planning
//! (how many, what amounts) happens in gerai-core, gateway traffic happens
//! in gerai-engine, and this file only stores what both decided.
//!
//! A leg is immutable once `paid`. Pollers and webhook handlers may observe
//! the same settlement more than once, so `mark_paid` is idempotent; every
//! other flip out of `paid` is refused (refund excepted).

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use gerai_core::{CoreError, LegStatus, PaymentLeg};

/// Repository for payment legs.
#[derive(Debug, Clone)]
pub struct PaymentLegRepository {
    pool: SqlitePool,
}

impl PaymentLegRepository {
    /// Creates a new PaymentLegRepository.
    pub fn new(pool: SqlitePool) -> Self {
        PaymentLegRepository { pool }
    }

    /// Inserts a planned set of legs for an order, seq 1..=n, all `unpaid`.
    ///
    /// The caller has already verified the amounts sum to the order total;
    /// this inserts them atomically so a half-planned order never exists.
    pub async fn create_plan(
        &self,
        order_id: &str,
        amounts: &[i64],
        expires_at: Option<DateTime<Utc>>,
    ) -> DbResult<Vec<PaymentLeg>> {
        if amounts.is_empty() {
            return Err(CoreError::NonPositiveTotal { total: 0 }.into());
        }

        let now = Utc::now();
        let mut legs = Vec::with_capacity(amounts.len());

        let mut tx = self.pool.begin().await?;

        for (i, &amount) in amounts.iter().enumerate() {
            let leg = PaymentLeg {
                id: Uuid::new_v4().to_string(),
                order_id: order_id.to_string(),
                seq: (i + 1) as i64,
                external_ref: None,
                pay_url: None,
                amount,
                status: LegStatus::Unpaid,
                expires_at,
                created_at: now,
                paid_at: None,
            };

            sqlx::query(
                r#"
                INSERT INTO payment_legs (
                    id, order_id, seq, external_ref, pay_url,
                    amount, status, expires_at, created_at, paid_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                "#,
            )
            .bind(&leg.id)
            .bind(&leg.order_id)
            .bind(leg.seq)
            .bind(&leg.external_ref)
            .bind(&leg.pay_url)
            .bind(leg.amount)
            .bind(leg.status)
            .bind(leg.expires_at)
            .bind(leg.created_at)
            .bind(leg.paid_at)
            .execute(&mut *tx)
            .await?;

            legs.push(leg);
        }

        tx.commit().await?;

        info!(order_id = %order_id, legs = legs.len(), "payment plan stored");

        Ok(legs)
    }

    /// Gets a leg by ID.
    pub async fn get_by_id(&self, leg_id: &str) -> DbResult<PaymentLeg> {
        sqlx::query_as::<_, PaymentLeg>("SELECT * FROM payment_legs WHERE id = ?1")
            .bind(leg_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("PaymentLeg", leg_id))
    }

    /// Looks a leg up by the reference the gateway assigned it.
    pub async fn get_by_external_ref(&self, external_ref: &str) -> DbResult<PaymentLeg> {
        sqlx::query_as::<_, PaymentLeg>("SELECT * FROM payment_legs WHERE external_ref = ?1")
            .bind(external_ref)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("PaymentLeg", external_ref))
    }

    /// All legs of an order, in seq order.
    pub async fn get_for_order(&self, order_id: &str) -> DbResult<Vec<PaymentLeg>> {
        let legs = sqlx::query_as::<_, PaymentLeg>(
            "SELECT * FROM payment_legs WHERE order_id = ?1 ORDER BY seq",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(legs)
    }

    /// Records what the gateway returned for a submitted leg.
    pub async fn attach_gateway_ref(
        &self,
        leg_id: &str,
        external_ref: &str,
        pay_url: Option<&str>,
        expires_at: Option<DateTime<Utc>>,
    ) -> DbResult<PaymentLeg> {
        debug!(leg_id = %leg_id, external_ref = %external_ref, "attaching gateway reference");

        let result = sqlx::query(
            r#"
            UPDATE payment_legs SET
                external_ref = ?1,
                pay_url = ?2,
                expires_at = COALESCE(?3, expires_at)
            WHERE id = ?4 AND status = 'unpaid'
            "#,
        )
        .bind(external_ref)
        .bind(pay_url)
        .bind(expires_at)
        .bind(leg_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let leg = self.get_by_id(leg_id).await?;
            return Err(self.wrong_state(&leg, "attach gateway reference"));
        }

        self.get_by_id(leg_id).await
    }

    /// Marks a leg paid. Idempotent: re-observing a settled leg succeeds
    /// without touching the row, so the first `paid_at` wins.
    pub async fn mark_paid(&self, leg_id: &str, paid_at: DateTime<Utc>) -> DbResult<PaymentLeg> {
        let result = sqlx::query(
            "UPDATE payment_legs SET status = 'paid', paid_at = ?1 WHERE id = ?2 AND status = 'unpaid'",
        )
        .bind(paid_at)
        .bind(leg_id)
        .execute(&self.pool)
        .await?;

        let leg = self.get_by_id(leg_id).await?;

        if result.rows_affected() == 0 && leg.status != LegStatus::Paid {
            return Err(self.wrong_state(&leg, "mark paid"));
        }

        if result.rows_affected() > 0 {
            info!(leg_id = %leg_id, order_id = %leg.order_id, seq = leg.seq, "leg paid");
        }

        Ok(leg)
    }

    /// Marks an unpaid leg expired.
    pub async fn mark_expired(&self, leg_id: &str) -> DbResult<PaymentLeg> {
        self.close_unpaid(leg_id, LegStatus::Expired).await
    }

    /// Marks an unpaid leg failed.
    pub async fn mark_failed(&self, leg_id: &str) -> DbResult<PaymentLeg> {
        self.close_unpaid(leg_id, LegStatus::Failed).await
    }

    /// Marks a paid leg refunded.
    pub async fn mark_refunded(&self, leg_id: &str) -> DbResult<PaymentLeg> {
        let result = sqlx::query(
            "UPDATE payment_legs SET status = 'refunded' WHERE id = ?1 AND status = 'paid'",
        )
        .bind(leg_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let leg = self.get_by_id(leg_id).await?;
            return Err(self.wrong_state(&leg, "refund"));
        }

        self.get_by_id(leg_id).await
    }

    /// Flips an unpaid leg to a dead status. Idempotent on re-observation
    /// of the same status; never touches a paid leg.
    async fn close_unpaid(&self, leg_id: &str, to: LegStatus) -> DbResult<PaymentLeg> {
        let result = sqlx::query("UPDATE payment_legs SET status = ?1 WHERE id = ?2 AND status = 'unpaid'")
            .bind(to)
            .bind(leg_id)
            .execute(&self.pool)
            .await?;

        let leg = self.get_by_id(leg_id).await?;

        if result.rows_affected() == 0 && leg.status != to {
            return Err(self.wrong_state(&leg, "close"));
        }

        Ok(leg)
    }

    fn wrong_state(&self, leg: &PaymentLeg, operation: &str) -> DbError {
        CoreError::InvalidState {
            entity: "payment leg".to_string(),
            current: format!("{:?}", leg.status).to_lowercase(),
            operation: operation.to_string(),
        }
        .into()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
