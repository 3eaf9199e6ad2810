//! # Domain Types
//!
//! Core domain types for serialized (IMEI-tracked) phone resale.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │   StockUnit     │   │     Order       │   │  PaymentLeg     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  id (UUID)      │       │
//! │  │  imei (unique)  │   │  code (human)   │   │  order_id (FK)  │       │
//! │  │  status         │   │  status         │   │  status         │       │
//! │  │  reservation_ref│◄──┤  totals         │   │  amount         │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌──────────────────────┐                        │
//! │  │ OpnameSession   │   │  TransitionLog       │                        │
//! │  │  counters       │   │  old/new/actor/why   │                        │
//! │  └─────────────────┘   └──────────────────────┘                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for database relations
//! - Business ID: (imei, order code, ...) - human-readable

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;

// =============================================================================
// Stock Status
// =============================================================================

/// Lifecycle state of a serialized inventory unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    /// On the shelf, sellable.
    Available,
    /// Held by a pending order; `reservation_ref` points at it.
    Reserved,
    /// Announced but not yet physically received.
    ComingSoon,
    /// In repair; not sellable.
    Service,
    /// Sold; `sold_channel` records where.
    Sold,
    /// Returned by a customer, awaiting triage.
    Return,
    /// Missing after reconciliation.
    Lost,
}

impl StockStatus {
    /// All states, in a fixed order. Used to build transition tables.
    pub const ALL: [StockStatus; 7] = [
        StockStatus::Available,
        StockStatus::Reserved,
        StockStatus::ComingSoon,
        StockStatus::Service,
        StockStatus::Sold,
        StockStatus::Return,
        StockStatus::Lost,
    ];

    /// Wire/database name of this state.
    pub const fn as_str(&self) -> &'static str {
        match self {
            StockStatus::Available => "available",
            StockStatus::Reserved => "reserved",
            StockStatus::ComingSoon => "coming_soon",
            StockStatus::Service => "service",
            StockStatus::Sold => "sold",
            StockStatus::Return => "return",
            StockStatus::Lost => "lost",
        }
    }

    /// Whether a unit in this state is expected on the shelf during a
    /// stock-take. Reserved units are still physically present until shipped.
    pub const fn is_stock_bearing(&self) -> bool {
        matches!(
            self,
            StockStatus::Available | StockStatus::Reserved | StockStatus::Service | StockStatus::Return
        )
    }
}

// =============================================================================
// Sold Channel
// =============================================================================

/// Where a unit was sold. Required on every transition to `Sold`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum SoldChannel {
    /// Offline store walk-in sale.
    Pos,
    /// Tokopedia marketplace listing.
    Tokopedia,
    /// Shopee marketplace listing.
    Shopee,
    /// The web storefront.
    Website,
}

impl SoldChannel {
    /// Wire/database name of this channel.
    pub const fn as_str(&self) -> &'static str {
        match self {
            SoldChannel::Pos => "pos",
            SoldChannel::Tokopedia => "tokopedia",
            SoldChannel::Shopee => "shopee",
            SoldChannel::Website => "website",
        }
    }
}

// =============================================================================
// Actor Role
// =============================================================================

/// Who is asking for a transition. Threaded explicitly into every core call;
/// there is no ambient "current role" anywhere in this workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    /// May move a unit between any two distinct states.
    SuperAdmin,
    /// Branch manager: full normal transition table.
    AdminBranch,
    /// Front-line operator: `available` sources only, marketplace channels only.
    Employee,
}

// =============================================================================
// Condition
// =============================================================================

/// Cosmetic/functional condition severity of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum ConditionSeverity {
    /// No defects.
    None,
    Minor,
    Major,
}

impl Default for ConditionSeverity {
    fn default() -> Self {
        ConditionSeverity::None
    }
}

// =============================================================================
// Stock Unit
// =============================================================================

/// One physical, serially-unique inventory item.
///
/// Invariants (enforced by the ledger, checked in tests):
/// - exactly one unit holds a given IMEI at any time;
/// - `reservation_ref` is non-null iff `status == Reserved`;
/// - `sold_channel` is non-null iff `status == Sold`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockUnit {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Serial number. Unique, immutable after intake.
    pub imei: String,

    /// Branch holding this unit.
    pub branch_id: String,

    /// Human-readable product label, frozen at intake.
    pub product_label: String,

    pub condition: ConditionSeverity,
    pub condition_note: Option<String>,

    /// Price in whole rupiah.
    pub selling_price: i64,

    pub status: StockStatus,

    /// Set iff status is `Sold`.
    pub sold_channel: Option<SoldChannel>,

    /// Order id holding this unit. Set iff status is `Reserved`.
    pub reservation_ref: Option<String>,

    pub received_at: DateTime<Utc>,
    pub status_changed_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StockUnit {
    /// Returns the selling price as a Money type.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_rupiah(self.selling_price)
    }

    /// A unit referenced by an order must never be hard-deleted.
    #[inline]
    pub fn deletable(&self) -> bool {
        self.reservation_ref.is_none()
    }
}

// =============================================================================
// Order
// =============================================================================

/// Status of a sales transaction. `Pending` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Completed,
    Cancelled,
    Failed,
    Refunded,
}

impl OrderStatus {
    /// Terminal orders never transition again.
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatus::Pending)
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Pending
    }
}

/// A sales transaction (POS or web storefront).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Order {
    pub id: String,

    /// Human-readable code, e.g. `WEB-M3K1A9` or `POS-M3K1B2`.
    pub code: String,

    pub branch_id: String,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,

    /// Sum of unit selling prices, whole rupiah.
    pub subtotal: i64,
    pub discount_amount: i64,
    pub discount_code: Option<String>,
    pub shipping_cost: i64,
    /// `max(0, subtotal - discount_amount + shipping_cost)`.
    pub total: i64,

    pub status: OrderStatus,

    pub created_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
}

impl Order {
    #[inline]
    pub fn total_money(&self) -> Money {
        Money::from_rupiah(self.total)
    }
}

/// A line in an order. Unit details are frozen at order time so the order
/// history survives later edits to the unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    pub unit_id: String,
    pub imei: String,
    pub product_label: String,
    pub selling_price: i64,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Discount
// =============================================================================

/// How a discount code computes its amount.
///
/// Buy-X-get-Y and shipping-subsidy kinds exist in the catalog data model but
/// have no computation rule yet; they are deliberately not variants here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum DiscountKind {
    /// Basis points of the subtotal (1000 = 10%), rounded half-up.
    Percentage(u32),
    /// Fixed rupiah amount, capped at the subtotal.
    FixedAmount(i64),
}

/// A discount code as configured in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscountCode {
    pub code: String,
    pub kind: DiscountKind,
    /// Subtotal must meet this before the code applies.
    pub min_purchase: Option<i64>,
    pub is_active: bool,
    pub valid_from: DateTime<Utc>,
    pub valid_until: Option<DateTime<Utc>>,
}

// =============================================================================
// Payment Leg
// =============================================================================

/// Status of one external payment request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum LegStatus {
    Unpaid,
    Paid,
    Expired,
    Failed,
    Refunded,
}

/// One external payment request belonging to an order.
///
/// Invariant: the sum of leg amounts across an order equals `Order.total`.
/// A leg is immutable once `Paid`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PaymentLeg {
    pub id: String,
    pub order_id: String,
    /// 1-based position within the split; leg 1 of a single payment too.
    pub seq: i64,
    /// Reference assigned by the gateway; None until submitted.
    pub external_ref: Option<String>,
    pub pay_url: Option<String>,
    pub amount: i64,
    pub status: LegStatus,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl PaymentLeg {
    #[inline]
    pub fn amount_money(&self) -> Money {
        Money::from_rupiah(self.amount)
    }
}

// =============================================================================
// Opname (stock-take)
// =============================================================================

/// Lifecycle of a stock-take session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    InProgress,
    /// Counters frozen; discrepancies await operator resolution.
    Completed,
    /// Terminal. No further scans or completion.
    Locked,
}

/// One stock-take event for a branch.
///
/// Counters are a derived aggregate of snapshot vs. scanned items and are
/// only written by the reconciliation engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct OpnameSession {
    pub id: String,
    pub branch_id: String,
    pub status: SessionStatus,
    pub total_expected: i64,
    pub total_scanned: i64,
    pub total_match: i64,
    pub total_missing: i64,
    pub total_unregistered: i64,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub locked_at: Option<DateTime<Utc>>,
}

/// One expected unit, captured when the session started. Immutable reference
/// state; `matched` flips when its IMEI is scanned.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct OpnameSnapshotItem {
    pub id: String,
    pub session_id: String,
    pub unit_id: String,
    pub imei: String,
    pub product_label: String,
    pub status_at_snapshot: StockStatus,
    pub matched: bool,
    pub created_at: DateTime<Utc>,
}

/// Outcome of one physical scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum ScanOutcome {
    /// IMEI was in the snapshot and not yet scanned.
    Match,
    /// IMEI was already scanned in this session. Informational, not counted.
    Duplicate,
    /// IMEI absent from the snapshot.
    Unregistered,
}

/// One physical scan event recorded during a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ScannedItem {
    pub id: String,
    pub session_id: String,
    pub imei: String,
    pub outcome: ScanOutcome,
    pub note: Option<String>,
    pub scanned_at: DateTime<Utc>,
}

// =============================================================================
// Audit
// =============================================================================

/// Audit record appended on every accepted unit transition.
///
/// Failure to write one never rolls the transition back, but is surfaced as
/// an integrity event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct TransitionLog {
    pub id: String,
    pub unit_id: String,
    /// Which field changed: `status` or `sold_channel`.
    pub field_changed: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub actor_role: ActorRole,
    pub reason: Option<String>,
    pub changed_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stock_bearing_states() {
        assert!(StockStatus::Available.is_stock_bearing());
        assert!(StockStatus::Reserved.is_stock_bearing());
        assert!(StockStatus::Service.is_stock_bearing());
        assert!(StockStatus::Return.is_stock_bearing());

        assert!(!StockStatus::Sold.is_stock_bearing());
        assert!(!StockStatus::Lost.is_stock_bearing());
        assert!(!StockStatus::ComingSoon.is_stock_bearing());
    }

    #[test]
    fn test_order_status_terminal() {
        assert!(!OrderStatus::Pending.is_terminal());
        assert!(OrderStatus::Completed.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(OrderStatus::Failed.is_terminal());
        assert!(OrderStatus::Refunded.is_terminal());
    }

    #[test]
    fn test_status_serde_snake_case() {
        assert_eq!(
            serde_json::to_string(&StockStatus::ComingSoon).unwrap(),
            "\"coming_soon\""
        );
        assert_eq!(
            serde_json::from_str::<SoldChannel>("\"tokopedia\"").unwrap(),
            SoldChannel::Tokopedia
        );
    }
}
