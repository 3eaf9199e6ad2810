//! # Unit State Machine
//!
//! Pure transition policy for stock units: given current state, actor role,
//! and requested state, decide legality and required side data.
//!
//! ## Policy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Role → allowed (from, to) pairs                     │
//! │                                                                         │
//! │  super_admin    any pair of distinct states                             │
//! │                                                                         │
//! │  admin_branch   available   → reserved | coming_soon | service          │
//! │                               | sold | lost                             │
//! │                 reserved    → available | sold                          │
//! │                 coming_soon → available                                 │
//! │                 service     → available                                 │
//! │                 return      → available | service                       │
//! │                 sold, lost  → (nothing)                                 │
//! │                                                                         │
//! │  employee       available   → reserved | coming_soon | service | sold   │
//! │                 (sold only through tokopedia / shopee)                  │
//! │                                                                         │
//! │  Every move to sold requires a channel, for every role.                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The tables are explicit data, evaluated by one pure function, so the
//! policy is testable on its own and no permission check lives anywhere else.

use crate::error::{CoreError, CoreResult};
use crate::types::{ActorRole, SoldChannel, StockStatus};

// =============================================================================
// Transition Tables
// =============================================================================

/// Normal adjacency list used by branch-level actors.
static NORMAL_TABLE: [(StockStatus, &[StockStatus]); 7] = [
    (
        StockStatus::Available,
        &[
            StockStatus::Reserved,
            StockStatus::ComingSoon,
            StockStatus::Service,
            StockStatus::Sold,
            StockStatus::Lost,
        ],
    ),
    (
        StockStatus::Reserved,
        &[StockStatus::Available, StockStatus::Sold],
    ),
    (StockStatus::ComingSoon, &[StockStatus::Available]),
    (StockStatus::Service, &[StockStatus::Available]),
    (StockStatus::Sold, &[]),
    (
        StockStatus::Return,
        &[StockStatus::Available, StockStatus::Service],
    ),
    (StockStatus::Lost, &[]),
];

/// Front-line operators may only move units off the shelf.
static EMPLOYEE_TABLE: [(StockStatus, &[StockStatus]); 1] = [(
    StockStatus::Available,
    &[
        StockStatus::Reserved,
        StockStatus::ComingSoon,
        StockStatus::Service,
        StockStatus::Sold,
    ],
)];

/// Channels an employee may record a sale through.
pub const EMPLOYEE_SOLD_CHANNELS: [SoldChannel; 2] = [SoldChannel::Tokopedia, SoldChannel::Shopee];

fn table_targets(
    table: &'static [(StockStatus, &'static [StockStatus])],
    from: StockStatus,
) -> &'static [StockStatus] {
    table
        .iter()
        .find(|(src, _)| *src == from)
        .map(|(_, targets)| *targets)
        .unwrap_or(&[])
}

/// Allowed target states for a role from a given state.
///
/// `SuperAdmin` is handled in [`check_transition`] (any distinct pair), so
/// this returns the normal table for it.
pub fn allowed_targets(role: ActorRole, from: StockStatus) -> &'static [StockStatus] {
    match role {
        ActorRole::SuperAdmin | ActorRole::AdminBranch => table_targets(&NORMAL_TABLE, from),
        ActorRole::Employee => table_targets(&EMPLOYEE_TABLE, from),
    }
}

// =============================================================================
// The Check
// =============================================================================

/// Decides whether `role` may move a unit `from -> to`, with `channel` as
/// the required side data for sales.
///
/// Check order:
/// 1. self-transitions are never transitions;
/// 2. role must have some legal move out of `from` (else `Unauthorized`);
/// 3. the pair must be in the role's table (else `InvalidTransition`);
/// 4. any move to `Sold` requires a channel, and the channel must be in the
///    role's allow-list.
///
/// ## Example
/// ```rust
/// use gerai_core::transition::check_transition;
/// use gerai_core::types::{ActorRole, SoldChannel, StockStatus};
///
/// check_transition(
///     StockStatus::Reserved,
///     StockStatus::Sold,
///     ActorRole::AdminBranch,
///     Some(SoldChannel::Pos),
/// )
/// .unwrap();
/// ```
pub fn check_transition(
    from: StockStatus,
    to: StockStatus,
    role: ActorRole,
    channel: Option<SoldChannel>,
) -> CoreResult<()> {
    if from == to {
        return Err(CoreError::InvalidTransition { from, to });
    }

    match role {
        // Privileged: any distinct pair, channel rule still applies.
        ActorRole::SuperAdmin => {}
        ActorRole::AdminBranch | ActorRole::Employee => {
            let targets = allowed_targets(role, from);
            if targets.is_empty() {
                return Err(CoreError::Unauthorized { role, from });
            }
            if !targets.contains(&to) {
                return Err(CoreError::InvalidTransition { from, to });
            }
        }
    }

    if to == StockStatus::Sold {
        let channel = channel.ok_or(CoreError::MissingChannel)?;
        if role == ActorRole::Employee && !EMPLOYEE_SOLD_CHANNELS.contains(&channel) {
            return Err(CoreError::ChannelNotAllowed { role, channel });
        }
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
