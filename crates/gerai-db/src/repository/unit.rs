//! # Stock Unit Repository (Reservation Ledger)
//!
//! Every status flip a unit can undergo goes through this file, and every
//! write is conditional on the state the caller believes the unit is in.
//!
//! ## Reserve / Release / Commit
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                   reserve_for_order(order, [a, b, c])               │
//! │                                                                     │
//! │  BEGIN                                                              │
//! │    UPDATE a SET reserved WHERE status = 'available'  → 1 row        │
//! │    UPDATE b SET reserved WHERE status = 'available'  → 1 row        │
//! │    UPDATE c SET reserved WHERE status = 'available'  → 0 rows ✗     │
//! │  ROLLBACK                → Err(UnitUnavailable { [c] })             │
//! │                                                                     │
//! │  a and b come back untouched: a buyer holds all units of an order   │
//! │  or none of them.                                                   │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The conditional UPDATE is the concurrency story: two checkouts racing for
//! the same unit both run `WHERE status = 'available'`, SQLite serializes
//! the writes, and exactly one sees `rows_affected == 1`. There is no
//! read-then-write gap to exploit.
//!
//! ## Audit
//! Accepted transitions append a `stock_unit_logs` row after commit. A
//! failed append is logged at error level and never rolls the transition
//! back; the transition already happened in the world.

use chrono::{DateTime, Utc};
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use gerai_core::transition::check_transition;
use gerai_core::validation::{validate_imei, validate_price};
use gerai_core::{
    ActorRole, ConditionSeverity, CoreError, SoldChannel, StockStatus, StockUnit, TransitionLog,
};

/// Parameters for unit intake. Everything else on [`StockUnit`] is assigned
/// by the repository.
#[derive(Debug, Clone)]
pub struct NewStockUnit {
    pub imei: String,
    pub branch_id: String,
    pub product_label: String,
    pub condition: ConditionSeverity,
    pub condition_note: Option<String>,
    /// Whole rupiah.
    pub selling_price: i64,
    /// Must be `Available` or `ComingSoon`; everything else is an outcome,
    /// not an intake state.
    pub status: StockStatus,
}

/// Repository for stock units and the reservation ledger.
///
/// ## Usage
/// ```rust,ignore
/// let units = db.units();
///
/// units.reserve_for_order(&order.id, &unit_ids, ActorRole::Employee).await?;
/// units.commit_sold(&order.id, &unit_ids, SoldChannel::Website, ActorRole::AdminBranch).await?;
/// ```
#[derive(Debug, Clone)]
pub struct UnitRepository {
    pool: SqlitePool,
}

impl UnitRepository {
    /// Creates a new UnitRepository.
    pub fn new(pool: SqlitePool) -> Self {
        UnitRepository { pool }
    }

    // =========================================================================
    // Intake & Lookup
    // =========================================================================

    /// Registers a unit at intake.
    ///
    /// ## Rules
    /// - IMEI must be 15-17 digits and unique across all units
    /// - price must be non-negative
    /// - initial status must be `Available` or `ComingSoon`
    pub async fn create(&self, new: NewStockUnit) -> DbResult<StockUnit> {
        validate_imei(&new.imei).map_err(CoreError::from)?;
        validate_price(new.selling_price).map_err(CoreError::from)?;

        if !matches!(new.status, StockStatus::Available | StockStatus::ComingSoon) {
            return Err(CoreError::InvalidState {
                entity: "stock unit".to_string(),
                current: new.status.as_str().to_string(),
                operation: "register at intake".to_string(),
            }
            .into());
        }

        let now = Utc::now();
        let unit = StockUnit {
            id: Uuid::new_v4().to_string(),
            imei: new.imei,
            branch_id: new.branch_id,
            product_label: new.product_label,
            condition: new.condition,
            condition_note: new.condition_note,
            selling_price: new.selling_price,
            status: new.status,
            sold_channel: None,
            reservation_ref: None,
            received_at: now,
            status_changed_at: now,
            created_at: now,
            updated_at: now,
        };

        debug!(imei = %unit.imei, branch = %unit.branch_id, "registering stock unit");

        sqlx::query(
            r#"
            INSERT INTO stock_units (
                id, imei, branch_id, product_label,
                condition, condition_note, selling_price,
                status, sold_channel, reservation_ref,
                received_at, status_changed_at, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
        )
        .bind(&unit.id)
        .bind(&unit.imei)
        .bind(&unit.branch_id)
        .bind(&unit.product_label)
        .bind(unit.condition)
        .bind(&unit.condition_note)
        .bind(unit.selling_price)
        .bind(unit.status)
        .bind(unit.sold_channel)
        .bind(&unit.reservation_ref)
        .bind(unit.received_at)
        .bind(unit.status_changed_at)
        .bind(unit.created_at)
        .bind(unit.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(unit)
    }

    /// Gets a unit by ID.
    pub async fn get_by_id(&self, unit_id: &str) -> DbResult<StockUnit> {
        sqlx::query_as::<_, StockUnit>("SELECT * FROM stock_units WHERE id = ?1")
            .bind(unit_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("StockUnit", unit_id))
    }

    /// Gets a unit by IMEI. IMEIs are unique so this is at most one row.
    pub async fn get_by_imei(&self, imei: &str) -> DbResult<StockUnit> {
        sqlx::query_as::<_, StockUnit>("SELECT * FROM stock_units WHERE imei = ?1")
            .bind(imei)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("StockUnit", imei))
    }

    /// Lists units in a branch, optionally filtered by status.
    pub async fn list_by_branch(
        &self,
        branch_id: &str,
        status: Option<StockStatus>,
    ) -> DbResult<Vec<StockUnit>> {
        let units = match status {
            Some(status) => {
                sqlx::query_as::<_, StockUnit>(
                    "SELECT * FROM stock_units WHERE branch_id = ?1 AND status = ?2 ORDER BY received_at",
                )
                .bind(branch_id)
                .bind(status)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, StockUnit>(
                    "SELECT * FROM stock_units WHERE branch_id = ?1 ORDER BY received_at",
                )
                .bind(branch_id)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(units)
    }

    /// Lists the units currently held by an order's reservation.
    pub async fn list_by_reservation(&self, order_id: &str) -> DbResult<Vec<StockUnit>> {
        let units = sqlx::query_as::<_, StockUnit>(
            "SELECT * FROM stock_units WHERE reservation_ref = ?1 ORDER BY imei",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(units)
    }

    // =========================================================================
    // Reservation Ledger
    // =========================================================================

    /// Atomically reserves a set of units for an order.
    ///
    /// All-or-nothing: if any unit is not `available` at write time, the
    /// whole transaction rolls back and the error lists every conflicting
    /// unit, so the caller can drop them from the cart and retry once.
    pub async fn reserve_for_order(
        &self,
        order_id: &str,
        unit_ids: &[String],
        role: ActorRole,
    ) -> DbResult<()> {
        if unit_ids.is_empty() {
            return Err(CoreError::EmptyCart.into());
        }

        check_transition(StockStatus::Available, StockStatus::Reserved, role, None)?;

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let mut conflicts: Vec<String> = Vec::new();

        for unit_id in unit_ids {
            let result = sqlx::query(
                r#"
                UPDATE stock_units SET
                    status = 'reserved',
                    reservation_ref = ?1,
                    status_changed_at = ?2,
                    updated_at = ?2
                WHERE id = ?3 AND status = 'available'
                "#,
            )
            .bind(order_id)
            .bind(now)
            .bind(unit_id)
            .execute(&mut *tx)
            .await?;

            // Keep going on conflict so the error names every loser, not
            // just the first one.
            if result.rows_affected() == 0 {
                conflicts.push(unit_id.clone());
            }
        }

        if !conflicts.is_empty() {
            tx.rollback().await?;
            info!(
                order_id = %order_id,
                conflicts = conflicts.len(),
                "reservation rejected, units no longer available"
            );
            return Err(DbError::UnitUnavailable { unit_ids: conflicts });
        }

        tx.commit().await?;

        info!(order_id = %order_id, units = unit_ids.len(), "units reserved");

        for unit_id in unit_ids {
            self.append_log(
                unit_id,
                "status",
                Some("available"),
                Some("reserved"),
                role,
                Some(&format!("reserved by order {order_id}")),
            )
            .await;
        }

        Ok(())
    }

    /// Releases every unit held by an order back to `available`.
    ///
    /// Idempotent: releasing an order that holds nothing releases zero
    /// units and succeeds. Returns the number of units released.
    pub async fn release(&self, order_id: &str, role: ActorRole) -> DbResult<u64> {
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;

        let held: Vec<String> =
            sqlx::query_scalar("SELECT id FROM stock_units WHERE reservation_ref = ?1")
                .bind(order_id)
                .fetch_all(&mut *tx)
                .await?;

        let result = sqlx::query(
            r#"
            UPDATE stock_units SET
                status = 'available',
                reservation_ref = NULL,
                status_changed_at = ?1,
                updated_at = ?1
            WHERE reservation_ref = ?2
            "#,
        )
        .bind(now)
        .bind(order_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        let released = result.rows_affected();
        if released > 0 {
            info!(order_id = %order_id, units = released, "reservation released");
        }

        for unit_id in &held {
            self.append_log(
                unit_id,
                "status",
                Some("reserved"),
                Some("available"),
                role,
                Some(&format!("released by order {order_id}")),
            )
            .await;
        }

        Ok(released)
    }

    /// Converts an order's reservation into completed sales.
    ///
    /// Each unit must still be reserved by exactly this order; a unit whose
    /// `reservation_ref` points elsewhere (or nowhere) aborts the whole
    /// commit. On success every unit is `sold`, carries the channel, and no
    /// longer references the order.
    pub async fn commit_sold(
        &self,
        order_id: &str,
        unit_ids: &[String],
        channel: SoldChannel,
        role: ActorRole,
    ) -> DbResult<()> {
        if unit_ids.is_empty() {
            return Err(CoreError::EmptyCart.into());
        }

        check_transition(StockStatus::Reserved, StockStatus::Sold, role, Some(channel))?;

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        if let Err(err) = commit_sold_in_tx(&mut tx, order_id, unit_ids, channel, now).await {
            tx.rollback().await?;
            return Err(err);
        }

        tx.commit().await?;

        info!(
            order_id = %order_id,
            units = unit_ids.len(),
            channel = channel.as_str(),
            "reservation committed to sold"
        );

        for unit_id in unit_ids {
            self.append_log(
                unit_id,
                "status",
                Some("reserved"),
                Some("sold"),
                role,
                Some(&format!("sold by order {order_id}")),
            )
            .await;
            self.append_log(unit_id, "sold_channel", None, Some(channel.as_str()), role, None)
                .await;
        }

        Ok(())
    }

    // =========================================================================
    // Operator Transitions
    // =========================================================================

    /// Moves a single unit to a new state on behalf of an operator.
    ///
    /// The write is conditional on the status read here; if another writer
    /// got in between, the caller sees [`DbError::StaleStatus`] and should
    /// re-read rather than retry blindly.
    ///
    /// `Reserved` is not a valid target: reservations only come from
    /// [`Self::reserve_for_order`], which knows the order holding them.
    pub async fn transition(
        &self,
        unit_id: &str,
        to: StockStatus,
        role: ActorRole,
        channel: Option<SoldChannel>,
        reason: Option<&str>,
    ) -> DbResult<StockUnit> {
        let unit = self.get_by_id(unit_id).await?;

        if to == StockStatus::Reserved {
            return Err(CoreError::InvalidState {
                entity: "stock unit".to_string(),
                current: unit.status.as_str().to_string(),
                operation: "reserve without an order".to_string(),
            }
            .into());
        }

        check_transition(unit.status, to, role, channel)?;

        let new_channel = if to == StockStatus::Sold { channel } else { None };
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE stock_units SET
                status = ?1,
                sold_channel = ?2,
                reservation_ref = NULL,
                status_changed_at = ?3,
                updated_at = ?3
            WHERE id = ?4 AND status = ?5
            "#,
        )
        .bind(to)
        .bind(new_channel)
        .bind(now)
        .bind(unit_id)
        .bind(unit.status)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::StaleStatus {
                unit_id: unit_id.to_string(),
                expected: unit.status.as_str().to_string(),
            });
        }

        info!(
            unit_id = %unit_id,
            from = unit.status.as_str(),
            to = to.as_str(),
            role = ?role,
            "unit transitioned"
        );

        self.append_log(
            unit_id,
            "status",
            Some(unit.status.as_str()),
            Some(to.as_str()),
            role,
            reason,
        )
        .await;

        if unit.sold_channel != new_channel {
            self.append_log(
                unit_id,
                "sold_channel",
                unit.sold_channel.map(|c| c.as_str()),
                new_channel.map(|c| c.as_str()),
                role,
                None,
            )
            .await;
        }

        self.get_by_id(unit_id).await
    }

    /// Corrects the recorded sale channel of a sold unit.
    ///
    /// Admin-level only; front-line operators cannot rewrite sale history.
    pub async fn update_sold_channel(
        &self,
        unit_id: &str,
        channel: SoldChannel,
        role: ActorRole,
    ) -> DbResult<StockUnit> {
        if role == ActorRole::Employee {
            return Err(CoreError::ChannelNotAllowed { role, channel }.into());
        }

        let unit = self.get_by_id(unit_id).await?;

        if unit.status != StockStatus::Sold {
            return Err(CoreError::InvalidState {
                entity: "stock unit".to_string(),
                current: unit.status.as_str().to_string(),
                operation: "change sale channel".to_string(),
            }
            .into());
        }

        let now = Utc::now();

        sqlx::query(
            "UPDATE stock_units SET sold_channel = ?1, updated_at = ?2 WHERE id = ?3 AND status = 'sold'",
        )
        .bind(channel)
        .bind(now)
        .bind(unit_id)
        .execute(&self.pool)
        .await?;

        self.append_log(
            unit_id,
            "sold_channel",
            unit.sold_channel.map(|c| c.as_str()),
            Some(channel.as_str()),
            role,
            None,
        )
        .await;

        self.get_by_id(unit_id).await
    }

    /// Hard-deletes a unit. Refused while reserved or referenced by any
    /// order line; sold history must stay queryable.
    pub async fn delete(&self, unit_id: &str) -> DbResult<()> {
        let unit = self.get_by_id(unit_id).await?;

        if !unit.deletable() {
            return Err(CoreError::InvalidState {
                entity: "stock unit".to_string(),
                current: unit.status.as_str().to_string(),
                operation: "delete".to_string(),
            }
            .into());
        }

        let referenced: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM order_items WHERE unit_id = ?1")
                .bind(unit_id)
                .fetch_one(&self.pool)
                .await?;

        if referenced > 0 {
            return Err(CoreError::InvalidState {
                entity: "stock unit".to_string(),
                current: format!("referenced by {referenced} order line(s)"),
                operation: "delete".to_string(),
            }
            .into());
        }

        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM stock_unit_logs WHERE unit_id = ?1")
            .bind(unit_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM stock_units WHERE id = ?1")
            .bind(unit_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(unit_id = %unit_id, imei = %unit.imei, "unit deleted");

        Ok(())
    }

    // =========================================================================
    // Audit
    // =========================================================================

    /// Returns the audit trail for a unit, oldest first.
    pub async fn logs(&self, unit_id: &str) -> DbResult<Vec<TransitionLog>> {
        let logs = sqlx::query_as::<_, TransitionLog>(
            "SELECT * FROM stock_unit_logs WHERE unit_id = ?1 ORDER BY changed_at, id",
        )
        .bind(unit_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(logs)
    }

    async fn append_log(
        &self,
        unit_id: &str,
        field_changed: &str,
        old_value: Option<&str>,
        new_value: Option<&str>,
        actor_role: ActorRole,
        reason: Option<&str>,
    ) {
        append_unit_log(
            &self.pool,
            unit_id,
            field_changed,
            old_value,
            new_value,
            actor_role,
            reason,
        )
        .await;
    }
}

// =============================================================================
// Shared Ledger Writes
// =============================================================================

/// Moves every listed unit from this order's reservation to `sold` inside
/// the caller's transaction, so the order flip and the unit commit can share
/// one atomic unit of work.
///
/// A unit whose `reservation_ref` points elsewhere (or nowhere) aborts with
/// [`DbError::UnitNotReserved`]; the caller owns the rollback.
pub(crate) async fn commit_sold_in_tx(
    tx: &mut Transaction<'_, Sqlite>,
    order_id: &str,
    unit_ids: &[String],
    channel: SoldChannel,
    now: DateTime<Utc>,
) -> DbResult<()> {
    for unit_id in unit_ids {
        let result = sqlx::query(
            r#"
            UPDATE stock_units SET
                status = 'sold',
                sold_channel = ?1,
                reservation_ref = NULL,
                status_changed_at = ?2,
                updated_at = ?2
            WHERE id = ?3 AND reservation_ref = ?4 AND status = 'reserved'
            "#,
        )
        .bind(channel)
        .bind(now)
        .bind(unit_id)
        .bind(order_id)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::UnitNotReserved {
                unit_id: unit_id.clone(),
                order_id: order_id.to_string(),
            });
        }
    }

    Ok(())
}

/// Appends one audit row. Best-effort: the transition it records has
/// already committed, so a failure here is an integrity event to
/// escalate, not a reason to undo the transition.
pub(crate) async fn append_unit_log(
    pool: &SqlitePool,
    unit_id: &str,
    field_changed: &str,
    old_value: Option<&str>,
    new_value: Option<&str>,
    actor_role: ActorRole,
    reason: Option<&str>,
) {
    let id = Uuid::new_v4().to_string();
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO stock_unit_logs (
            id, unit_id, field_changed, old_value, new_value,
            actor_role, reason, changed_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&id)
    .bind(unit_id)
    .bind(field_changed)
    .bind(old_value)
    .bind(new_value)
    .bind(actor_role)
    .bind(reason)
    .bind(now)
    .execute(pool)
    .await;

    if let Err(err) = result {
        error!(
            unit_id = %unit_id,
            field = field_changed,
            error = %err,
            "audit log append failed, transition is committed but unrecorded"
        );
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn new_unit(imei: &str) -> NewStockUnit {
        NewStockUnit {
            imei: imei.to_string(),
            branch_id: "branch-1".to_string(),
            product_label: "iPhone 13 128GB".to_string(),
            condition: ConditionSeverity::None,
            condition_note: None,
            selling_price: 7_500_000,
            status: StockStatus::Available,
        }
    }

    #[tokio::test]
    async fn test_intake_and_lookup() {
        let db = test_db().await;
        let repo = db.units();

        let unit = repo.create(new_unit("356789104835001")).await.unwrap();
        assert_eq!(unit.status, StockStatus::Available);

        let by_imei = repo.get_by_imei("356789104835001").await.unwrap();
        assert_eq!(by_imei.id, unit.id);
    }

    #[tokio::test]
    async fn test_duplicate_imei_rejected() {
        let db = test_db().await;
        let repo = db.units();

        repo.create(new_unit("356789104835001")).await.unwrap();
        let err = repo.create(new_unit("356789104835001")).await.unwrap_err();

        assert!(matches!(err, DbError::UniqueViolation { .. }));
        assert_eq!(err.kind(), gerai_core::ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_intake_rejects_outcome_states() {
        let db = test_db().await;
        let repo = db.units();

        let mut unit = new_unit("356789104835001");
        unit.status = StockStatus::Sold;

        let err = repo.create(unit).await.unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::InvalidState { .. })));
    }

    #[tokio::test]
    async fn test_reserve_sets_ref_on_all_units() {
        let db = test_db().await;
        let repo = db.units();

        let a = repo.create(new_unit("356789104835001")).await.unwrap();
        let b = repo.create(new_unit("356789104835002")).await.unwrap();

        repo.reserve_for_order("order-1", &[a.id.clone(), b.id.clone()], ActorRole::Employee)
            .await
            .unwrap();

        let held = repo.list_by_reservation("order-1").await.unwrap();
        assert_eq!(held.len(), 2);
        for unit in held {
            assert_eq!(unit.status, StockStatus::Reserved);
            assert_eq!(unit.reservation_ref.as_deref(), Some("order-1"));
        }
    }

    #[tokio::test]
    async fn test_reserve_is_all_or_nothing_and_names_conflicts() {
        let db = test_db().await;
        let repo = db.units();

        let a = repo.create(new_unit("356789104835001")).await.unwrap();
        let b = repo.create(new_unit("356789104835002")).await.unwrap();

        // Someone else already holds b.
        repo.reserve_for_order("order-1", &[b.id.clone()], ActorRole::AdminBranch)
            .await
            .unwrap();

        let err = repo
            .reserve_for_order("order-2", &[a.id.clone(), b.id.clone()], ActorRole::AdminBranch)
            .await
            .unwrap_err();

        match err {
            DbError::UnitUnavailable { unit_ids } => assert_eq!(unit_ids, vec![b.id.clone()]),
            other => panic!("expected UnitUnavailable, got {other:?}"),
        }

        // The winner keeps its hold and the loser's other unit is untouched.
        let a = repo.get_by_id(&a.id).await.unwrap();
        assert_eq!(a.status, StockStatus::Available);
        assert!(a.reservation_ref.is_none());

        let b = repo.get_by_id(&b.id).await.unwrap();
        assert_eq!(b.reservation_ref.as_deref(), Some("order-1"));
    }

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let db = test_db().await;
        let repo = db.units();

        let a = repo.create(new_unit("356789104835001")).await.unwrap();
        repo.reserve_for_order("order-1", &[a.id.clone()], ActorRole::Employee)
            .await
            .unwrap();

        assert_eq!(repo.release("order-1", ActorRole::Employee).await.unwrap(), 1);
        assert_eq!(repo.release("order-1", ActorRole::Employee).await.unwrap(), 0);

        let a = repo.get_by_id(&a.id).await.unwrap();
        assert_eq!(a.status, StockStatus::Available);
        assert!(a.reservation_ref.is_none());
    }

    #[tokio::test]
    async fn test_commit_sold_clears_ref_and_sets_channel() {
        let db = test_db().await;
        let repo = db.units();

        let a = repo.create(new_unit("356789104835001")).await.unwrap();
        repo.reserve_for_order("order-1", &[a.id.clone()], ActorRole::AdminBranch)
            .await
            .unwrap();

        repo.commit_sold("order-1", &[a.id.clone()], SoldChannel::Website, ActorRole::AdminBranch)
            .await
            .unwrap();

        let a = repo.get_by_id(&a.id).await.unwrap();
        assert_eq!(a.status, StockStatus::Sold);
        assert_eq!(a.sold_channel, Some(SoldChannel::Website));
        assert!(a.reservation_ref.is_none());
    }

    #[tokio::test]
    async fn test_commit_sold_rejects_foreign_reservation() {
        let db = test_db().await;
        let repo = db.units();

        let a = repo.create(new_unit("356789104835001")).await.unwrap();
        let b = repo.create(new_unit("356789104835002")).await.unwrap();

        repo.reserve_for_order("order-1", &[a.id.clone()], ActorRole::AdminBranch)
            .await
            .unwrap();
        repo.reserve_for_order("order-2", &[b.id.clone()], ActorRole::AdminBranch)
            .await
            .unwrap();

        let err = repo
            .commit_sold(
                "order-1",
                &[a.id.clone(), b.id.clone()],
                SoldChannel::Pos,
                ActorRole::AdminBranch,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::UnitNotReserved { .. }));

        // The whole commit rolled back: a is still reserved, not sold.
        let a = repo.get_by_id(&a.id).await.unwrap();
        assert_eq!(a.status, StockStatus::Reserved);
    }

    #[tokio::test]
    async fn test_employee_cannot_commit_reserved_stock() {
        let db = test_db().await;
        let repo = db.units();

        let a = repo.create(new_unit("356789104835001")).await.unwrap();
        repo.reserve_for_order("order-1", &[a.id.clone()], ActorRole::Employee)
            .await
            .unwrap();

        // Employees have no legal move out of `reserved` at all.
        let err = repo
            .commit_sold("order-1", &[a.id.clone()], SoldChannel::Pos, ActorRole::Employee)
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::Core(CoreError::Unauthorized { .. })));
    }

    #[tokio::test]
    async fn test_operator_transition_and_audit_trail() {
        let db = test_db().await;
        let repo = db.units();

        let a = repo.create(new_unit("356789104835001")).await.unwrap();

        let a = repo
            .transition(&a.id, StockStatus::Service, ActorRole::AdminBranch, None, Some("cracked screen"))
            .await
            .unwrap();
        assert_eq!(a.status, StockStatus::Service);

        let logs = repo.logs(&a.id).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].field_changed, "status");
        assert_eq!(logs[0].old_value.as_deref(), Some("available"));
        assert_eq!(logs[0].new_value.as_deref(), Some("service"));
        assert_eq!(logs[0].reason.as_deref(), Some("cracked screen"));
    }

    #[tokio::test]
    async fn test_manual_reserve_is_refused() {
        let db = test_db().await;
        let repo = db.units();

        let a = repo.create(new_unit("356789104835001")).await.unwrap();

        let err = repo
            .transition(&a.id, StockStatus::Reserved, ActorRole::SuperAdmin, None, None)
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::Core(CoreError::InvalidState { .. })));
    }

    #[tokio::test]
    async fn test_employee_cannot_unsell() {
        let db = test_db().await;
        let repo = db.units();

        let a = repo.create(new_unit("356789104835001")).await.unwrap();
        repo.reserve_for_order("order-1", &[a.id.clone()], ActorRole::AdminBranch)
            .await
            .unwrap();
        repo.commit_sold("order-1", &[a.id.clone()], SoldChannel::Pos, ActorRole::AdminBranch)
            .await
            .unwrap();

        let err = repo
            .transition(&a.id, StockStatus::Available, ActorRole::Employee, None, None)
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::Core(CoreError::Unauthorized { .. })));

        // Super admin correction also clears the stale channel.
        let a = repo
            .transition(&a.id, StockStatus::Available, ActorRole::SuperAdmin, None, Some("mis-scan"))
            .await
            .unwrap();
        assert_eq!(a.status, StockStatus::Available);
        assert!(a.sold_channel.is_none());
    }

    #[tokio::test]
    async fn test_delete_refused_while_reserved() {
        let db = test_db().await;
        let repo = db.units();

        let a = repo.create(new_unit("356789104835001")).await.unwrap();
        repo.reserve_for_order("order-1", &[a.id.clone()], ActorRole::AdminBranch)
            .await
            .unwrap();

        let err = repo.delete(&a.id).await.unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::InvalidState { .. })));

        repo.release("order-1", ActorRole::AdminBranch).await.unwrap();
        repo.delete(&a.id).await.unwrap();
        assert!(repo.get_by_id(&a.id).await.is_err());
    }
}
