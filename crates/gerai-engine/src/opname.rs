//! # Opname Reconciliation
//!
//! Drives stock-take sessions and turns their discrepancies into ledger
//! transitions. The counting itself lives in gerai-db/gerai-core; what this
//! adds is the resolution step: a missing unit only becomes `lost` when an
//! operator says so, through the same state machine as every other move.

use tracing::{info, warn};

use gerai_core::{
    ActorRole, OpnameSession, OpnameSnapshotItem, ScannedItem, SessionStatus, StockStatus,
    StockUnit,
};
use gerai_db::Database;

use crate::error::EngineResult;

/// Stock-take session service.
#[derive(Clone)]
pub struct OpnameService {
    db: Database,
}

impl OpnameService {
    /// Creates a new OpnameService.
    pub fn new(db: Database) -> Self {
        OpnameService { db }
    }

    /// Opens a session for a branch, freezing its expected-unit snapshot.
    pub async fn start_session(&self, branch_id: &str) -> EngineResult<OpnameSession> {
        Ok(self.db.opname().start_session(branch_id).await?)
    }

    /// Records one physical scan; returns it with its classification.
    pub async fn record_scan(
        &self,
        session_id: &str,
        imei: &str,
        note: Option<&str>,
    ) -> EngineResult<ScannedItem> {
        Ok(self.db.opname().record_scan(session_id, imei, note).await?)
    }

    /// Completes a session, freezing its counters.
    ///
    /// Completion never touches stock units; the discrepancy list is a
    /// finding, not a verdict.
    pub async fn complete_session(&self, session_id: &str) -> EngineResult<OpnameSession> {
        let session = self.db.opname().complete_session(session_id).await?;

        if session.total_missing > 0 || session.total_unregistered > 0 {
            warn!(
                session_id = %session_id,
                missing = session.total_missing,
                unregistered = session.total_unregistered,
                "stock-take completed with discrepancies"
            );
        }

        Ok(session)
    }

    /// Locks a session. Terminal.
    pub async fn lock_session(&self, session_id: &str) -> EngineResult<OpnameSession> {
        Ok(self.db.opname().lock_session(session_id).await?)
    }

    /// The units a completed session could not account for.
    pub async fn missing_items(&self, session_id: &str) -> EngineResult<Vec<OpnameSnapshotItem>> {
        Ok(self.db.opname().missing_items(session_id).await?)
    }

    /// Resolves one missing unit by transitioning it, typically to `lost`.
    ///
    /// The session must be completed (not in progress, not locked), the
    /// unit must actually be on its missing list, and the transition goes
    /// through the state machine with the operator's role; an employee
    /// cannot write stock off.
    pub async fn resolve_missing(
        &self,
        session_id: &str,
        unit_id: &str,
        to: StockStatus,
        role: ActorRole,
        reason: Option<&str>,
    ) -> EngineResult<StockUnit> {
        let session = self.db.opname().get_session(session_id).await?;

        if session.status != SessionStatus::Completed {
            return Err(gerai_core::CoreError::InvalidState {
                entity: "opname session".to_string(),
                current: format!("{:?}", session.status).to_lowercase(),
                operation: "resolve missing unit".to_string(),
            }
            .into());
        }

        let missing = self.db.opname().missing_items(session_id).await?;
        if !missing.iter().any(|item| item.unit_id == unit_id) {
            return Err(gerai_core::CoreError::InvalidState {
                entity: "stock unit".to_string(),
                current: "not on the missing list".to_string(),
                operation: "resolve".to_string(),
            }
            .into());
        }

        let unit = self
            .db
            .units()
            .transition(unit_id, to, role, None, reason)
            .await?;

        info!(
            session_id = %session_id,
            unit_id = %unit_id,
            imei = %unit.imei,
            to = to.as_str(),
            "missing unit resolved"
        );

        Ok(unit)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use gerai_core::{ConditionSeverity, CoreError};
    use gerai_db::{DbConfig, DbError, NewStockUnit};

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    async fn seed_unit(db: &Database, imei: &str) -> String {
        db.units()
            .create(NewStockUnit {
                imei: imei.to_string(),
                branch_id: "branch-1".to_string(),
                product_label: "iPhone 13 128GB".to_string(),
                condition: ConditionSeverity::None,
                condition_note: None,
                selling_price: 7_500_000,
                status: StockStatus::Available,
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_resolve_missing_to_lost() {
        let db = test_db().await;
        let svc = OpnameService::new(db.clone());

        let found = seed_unit(&db, "356789104835001").await;
        let gone = seed_unit(&db, "356789104835002").await;

        let session = svc.start_session("branch-1").await.unwrap();
        svc.record_scan(&session.id, "356789104835001", None).await.unwrap();
        svc.complete_session(&session.id).await.unwrap();

        let unit = svc
            .resolve_missing(
                &session.id,
                &gone,
                StockStatus::Lost,
                ActorRole::AdminBranch,
                Some("missing at stock-take"),
            )
            .await
            .unwrap();
        assert_eq!(unit.status, StockStatus::Lost);

        // The unit that was scanned is not resolvable.
        let err = svc
            .resolve_missing(&session.id, &found, StockStatus::Lost, ActorRole::AdminBranch, None)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Core(CoreError::InvalidState { .. })));
    }

    #[tokio::test]
    async fn test_resolution_requires_completed_session() {
        let db = test_db().await;
        let svc = OpnameService::new(db.clone());

        let gone = seed_unit(&db, "356789104835001").await;
        let session = svc.start_session("branch-1").await.unwrap();

        let err = svc
            .resolve_missing(&session.id, &gone, StockStatus::Lost, ActorRole::AdminBranch, None)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Core(CoreError::InvalidState { .. })));
    }

    #[tokio::test]
    async fn test_employee_cannot_write_off_stock() {
        let db = test_db().await;
        let svc = OpnameService::new(db.clone());

        let gone = seed_unit(&db, "356789104835001").await;
        let session = svc.start_session("branch-1").await.unwrap();
        svc.complete_session(&session.id).await.unwrap();

        let err = svc
            .resolve_missing(&session.id, &gone, StockStatus::Lost, ActorRole::Employee, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Db(DbError::Core(CoreError::InvalidTransition { .. }))
        ));

        // Still resolvable by someone who may.
        svc.resolve_missing(&session.id, &gone, StockStatus::Lost, ActorRole::SuperAdmin, None)
            .await
            .unwrap();
    }
}
