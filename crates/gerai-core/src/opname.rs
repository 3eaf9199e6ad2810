//! # Opname Classification
//!
//! Pure scan classification and counter derivation for stock-take sessions.
//! The I/O half (snapshot capture, scan persistence) lives in gerai-db and
//! gerai-engine; everything here is deterministic math over what was scanned.

use crate::error::{CoreError, CoreResult};
use crate::types::{ScanOutcome, SessionStatus};

// =============================================================================
// Classification
// =============================================================================

/// Classifies one scan against the snapshot.
///
/// - in snapshot, first scan   → `Match`
/// - in snapshot, seen before  → `Duplicate` (idempotent, never re-counted)
/// - not in snapshot           → `Unregistered`
pub fn classify_scan(in_snapshot: bool, already_matched: bool) -> ScanOutcome {
    match (in_snapshot, already_matched) {
        (true, false) => ScanOutcome::Match,
        (true, true) => ScanOutcome::Duplicate,
        (false, _) => ScanOutcome::Unregistered,
    }
}

// =============================================================================
// Counters
// =============================================================================

/// Session counters derived from snapshot and scan totals.
///
/// Invariant: `total_expected == total_match + total_missing` after
/// completion, and `total_scanned == total_match + total_unregistered`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionCounters {
    pub total_expected: i64,
    pub total_scanned: i64,
    pub total_match: i64,
    pub total_missing: i64,
    pub total_unregistered: i64,
}

/// Derives final counters at session completion. Missing units are never
/// re-scanned; they are whatever portion of the snapshot was never matched.
pub fn derive_counters(
    total_expected: i64,
    total_match: i64,
    total_unregistered: i64,
) -> SessionCounters {
    SessionCounters {
        total_expected,
        total_scanned: total_match + total_unregistered,
        total_match,
        total_missing: total_expected - total_match,
        total_unregistered,
    }
}

// =============================================================================
// Session Lifecycle Rails
// =============================================================================

/// Scans are only accepted while the session is in progress.
pub fn ensure_scannable(status: SessionStatus) -> CoreResult<()> {
    match status {
        SessionStatus::InProgress => Ok(()),
        SessionStatus::Locked => Err(CoreError::SessionLocked),
        SessionStatus::Completed => Err(CoreError::InvalidState {
            entity: "opname session".to_string(),
            current: "completed".to_string(),
            operation: "record scan".to_string(),
        }),
    }
}

/// Completion is legal exactly once, from in-progress.
pub fn ensure_completable(status: SessionStatus) -> CoreResult<()> {
    match status {
        SessionStatus::InProgress => Ok(()),
        SessionStatus::Locked => Err(CoreError::SessionLocked),
        SessionStatus::Completed => Err(CoreError::InvalidState {
            entity: "opname session".to_string(),
            current: "completed".to_string(),
            operation: "complete".to_string(),
        }),
    }
}

/// Locking is terminal and idempotence is rejected: a locked session stays
/// locked and reports it. An in-progress session may be abandoned by locking
/// without completion.
pub fn ensure_lockable(status: SessionStatus) -> CoreResult<()> {
    match status {
        SessionStatus::InProgress | SessionStatus::Completed => Ok(()),
        SessionStatus::Locked => Err(CoreError::SessionLocked),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
