//! # Opname Repository
//!
//! Stock-take sessions: snapshot capture, scan recording, counter rollup.
//!
//! ## Session Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  start_session(branch)                                              │
//! │    snapshot := stock-bearing units of the branch, frozen            │
//! │                                                                     │
//! │  record_scan(imei)          repeated per physical unit              │
//! │    in snapshot, unseen  → match        (flips `matched`)            │
//! │    in snapshot, seen    → duplicate    (recorded, not counted)      │
//! │    not in snapshot      → unregistered                              │
//! │                                                                     │
//! │  complete_session()                                                 │
//! │    missing := snapshot rows never matched                           │
//! │    counters frozen, discrepancies await resolution                  │
//! │                                                                     │
//! │  lock_session()             terminal                                │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The snapshot is what makes the numbers defensible: units sold or received
//! mid-count do not move the baseline, so `expected = match + missing` holds
//! by construction.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use gerai_core::opname::{classify_scan, derive_counters, ensure_completable, ensure_lockable, ensure_scannable};
use gerai_core::{CoreError, OpnameSession, OpnameSnapshotItem, ScanOutcome, ScannedItem};

/// Repository for stock-take sessions.
#[derive(Debug, Clone)]
pub struct OpnameRepository {
    pool: SqlitePool,
}

impl OpnameRepository {
    /// Creates a new OpnameRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OpnameRepository { pool }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Opens a session for a branch and freezes its snapshot.
    ///
    /// The snapshot covers every stock-bearing unit of the branch:
    /// `available`, `reserved`, `service`, and `return` are all expected on
    /// the shelf; `sold`, `lost`, and `coming_soon` are not.
    ///
    /// One in-progress session per branch; a second one would count against
    /// a stale baseline.
    pub async fn start_session(&self, branch_id: &str) -> DbResult<OpnameSession> {
        let open: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM opname_sessions WHERE branch_id = ?1 AND status = 'in_progress'",
        )
        .bind(branch_id)
        .fetch_one(&self.pool)
        .await?;

        if open > 0 {
            return Err(CoreError::InvalidState {
                entity: "opname session".to_string(),
                current: "in_progress".to_string(),
                operation: "start another session for this branch".to_string(),
            }
            .into());
        }

        let session_id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO opname_sessions (id, branch_id, status, started_at)
            VALUES (?1, ?2, 'in_progress', ?3)
            "#,
        )
        .bind(&session_id)
        .bind(branch_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO opname_snapshot_items (
                id, session_id, unit_id, imei, product_label,
                status_at_snapshot, matched, created_at
            )
            SELECT
                lower(hex(randomblob(16))), ?1, id, imei, product_label,
                status, 0, ?2
            FROM stock_units
            WHERE branch_id = ?3
              AND status IN ('available', 'reserved', 'service', 'return')
            "#,
        )
        .bind(&session_id)
        .bind(now)
        .bind(branch_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE opname_sessions SET total_expected = (
                SELECT COUNT(*) FROM opname_snapshot_items WHERE session_id = ?1
            ) WHERE id = ?1
            "#,
        )
        .bind(&session_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        let session = self.get_session(&session_id).await?;

        info!(
            session_id = %session.id,
            branch_id = %branch_id,
            expected = session.total_expected,
            "opname session started"
        );

        Ok(session)
    }

    /// Records one physical scan and returns its classification.
    ///
    /// A duplicate is persisted so the operator sees what happened, but the
    /// counters only ever count an IMEI once.
    pub async fn record_scan(
        &self,
        session_id: &str,
        imei: &str,
        note: Option<&str>,
    ) -> DbResult<ScannedItem> {
        let session = self.get_session(session_id).await?;
        ensure_scannable(session.status).map_err(DbError::Core)?;

        let imei = imei.trim();
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;

        // The status check above ran outside the transaction; revalidate at
        // write time so a scan racing a completion or lock loses. The
        // self-assignment takes the write lock, and within this transaction
        // the status can no longer change under the counter updates below.
        let live = sqlx::query(
            "UPDATE opname_sessions SET total_scanned = total_scanned WHERE id = ?1 AND status = 'in_progress'",
        )
        .bind(session_id)
        .execute(&mut *tx)
        .await?;

        if live.rows_affected() == 0 {
            tx.rollback().await?;
            let current = self.get_session(session_id).await?;
            return Err(CoreError::InvalidState {
                entity: "opname session".to_string(),
                current: format!("{:?}", current.status).to_lowercase(),
                operation: "record scan".to_string(),
            }
            .into());
        }

        let snapshot_row: Option<(String, bool)> = sqlx::query_as(
            "SELECT id, matched FROM opname_snapshot_items WHERE session_id = ?1 AND imei = ?2",
        )
        .bind(session_id)
        .bind(imei)
        .fetch_optional(&mut *tx)
        .await?;

        let (in_snapshot, already_matched) = match &snapshot_row {
            Some((_, matched)) => (true, *matched),
            None => (false, false),
        };

        let mut outcome = classify_scan(in_snapshot, already_matched);

        if outcome == ScanOutcome::Match {
            let (snapshot_id, _) = snapshot_row.as_ref().ok_or_else(|| {
                DbError::Internal("match outcome without snapshot row".to_string())
            })?;

            // Conditional flip: two concurrent scans of the same IMEI both
            // classify as a match, only one flips the row.
            let flipped = sqlx::query(
                "UPDATE opname_snapshot_items SET matched = 1 WHERE id = ?1 AND matched = 0",
            )
            .bind(snapshot_id)
            .execute(&mut *tx)
            .await?;

            if flipped.rows_affected() == 0 {
                outcome = ScanOutcome::Duplicate;
            }
        }

        match outcome {
            ScanOutcome::Match => {
                sqlx::query(
                    r#"
                    UPDATE opname_sessions
                    SET total_scanned = total_scanned + 1,
                        total_match = total_match + 1
                    WHERE id = ?1
                    "#,
                )
                .bind(session_id)
                .execute(&mut *tx)
                .await?;
            }
            ScanOutcome::Unregistered => {
                sqlx::query(
                    r#"
                    UPDATE opname_sessions
                    SET total_scanned = total_scanned + 1,
                        total_unregistered = total_unregistered + 1
                    WHERE id = ?1
                    "#,
                )
                .bind(session_id)
                .execute(&mut *tx)
                .await?;
            }
            ScanOutcome::Duplicate => {}
        }

        let scan = ScannedItem {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            imei: imei.to_string(),
            outcome,
            note: note.map(str::to_string),
            scanned_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO opname_scanned_items (id, session_id, imei, outcome, note, scanned_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&scan.id)
        .bind(&scan.session_id)
        .bind(&scan.imei)
        .bind(scan.outcome)
        .bind(&scan.note)
        .bind(scan.scanned_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(session_id = %session_id, imei = %imei, outcome = ?scan.outcome, "scan recorded");

        Ok(scan)
    }

    /// Freezes the session counters and marks it completed.
    ///
    /// Missing is derived, never scanned: whatever portion of the snapshot
    /// was never matched.
    pub async fn complete_session(&self, session_id: &str) -> DbResult<OpnameSession> {
        let session = self.get_session(session_id).await?;
        ensure_completable(session.status).map_err(DbError::Core)?;

        let counters = derive_counters(
            session.total_expected,
            session.total_match,
            session.total_unregistered,
        );

        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE opname_sessions SET
                status = 'completed',
                total_scanned = ?1,
                total_match = ?2,
                total_missing = ?3,
                total_unregistered = ?4,
                completed_at = ?5
            WHERE id = ?6 AND status = 'in_progress'
            "#,
        )
        .bind(counters.total_scanned)
        .bind(counters.total_match)
        .bind(counters.total_missing)
        .bind(counters.total_unregistered)
        .bind(now)
        .bind(session_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            // Raced another completion or a lock; report where it ended up.
            let current = self.get_session(session_id).await?;
            ensure_completable(current.status).map_err(DbError::Core)?;
        }

        let session = self.get_session(session_id).await?;

        info!(
            session_id = %session_id,
            expected = session.total_expected,
            matched = session.total_match,
            missing = session.total_missing,
            unregistered = session.total_unregistered,
            "opname session completed"
        );

        Ok(session)
    }

    /// Locks a session. Terminal: no scans, no completion, no unlocking.
    pub async fn lock_session(&self, session_id: &str) -> DbResult<OpnameSession> {
        let session = self.get_session(session_id).await?;
        ensure_lockable(session.status).map_err(DbError::Core)?;

        let now = Utc::now();

        sqlx::query(
            r#"
            UPDATE opname_sessions SET status = 'locked', locked_at = ?1
            WHERE id = ?2 AND status IN ('in_progress', 'completed')
            "#,
        )
        .bind(now)
        .bind(session_id)
        .execute(&self.pool)
        .await?;

        info!(session_id = %session_id, "opname session locked");

        self.get_session(session_id).await
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    /// Gets a session by ID.
    pub async fn get_session(&self, session_id: &str) -> DbResult<OpnameSession> {
        sqlx::query_as::<_, OpnameSession>("SELECT * FROM opname_sessions WHERE id = ?1")
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("OpnameSession", session_id))
    }

    /// The frozen snapshot of a session, in IMEI order.
    pub async fn snapshot(&self, session_id: &str) -> DbResult<Vec<OpnameSnapshotItem>> {
        let items = sqlx::query_as::<_, OpnameSnapshotItem>(
            "SELECT * FROM opname_snapshot_items WHERE session_id = ?1 ORDER BY imei",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Snapshot rows never matched: the units to chase after completion.
    pub async fn missing_items(&self, session_id: &str) -> DbResult<Vec<OpnameSnapshotItem>> {
        let items = sqlx::query_as::<_, OpnameSnapshotItem>(
            "SELECT * FROM opname_snapshot_items WHERE session_id = ?1 AND matched = 0 ORDER BY imei",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Every scan of a session in the order they happened.
    pub async fn scans(&self, session_id: &str) -> DbResult<Vec<ScannedItem>> {
        let scans = sqlx::query_as::<_, ScannedItem>(
            "SELECT * FROM opname_scanned_items WHERE session_id = ?1 ORDER BY scanned_at, id",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(scans)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
