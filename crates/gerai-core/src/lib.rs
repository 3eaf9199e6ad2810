//! # gerai-core: Pure Business Logic for Gerai
//!
//! This crate is the heart of the stock-unit lifecycle and sales-reservation
//! engine. It contains all business rules as pure functions with zero I/O.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Gerai Architecture                               │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 gerai-engine (orchestration)                    │   │
//! │  │    order assembly · split payment · opname sessions             │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ gerai-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐ ┌───────────┐ ┌───────────┐ ┌───────────┐     │   │
//! │  │   │transition │ │  pricing  │ │   split   │ │  opname   │     │   │
//! │  │   │ role FSM  │ │ discounts │ │ leg plans │ │ scan math │     │   │
//! │  │   └───────────┘ └───────────┘ └───────────┘ └───────────┘     │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS            │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  gerai-db (reservation ledger)                  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (StockUnit, Order, PaymentLeg, opname types)
//! - [`money`] - Integer Money in whole rupiah (no floating point!)
//! - [`transition`] - Role-based unit state machine
//! - [`pricing`] - Discount rules and order totals
//! - [`split`] - Split-payment leg planning
//! - [`opname`] - Scan classification and counter derivation
//! - [`error`] - Domain error types and the Conflict/InvalidState/
//!   Unauthorized/Transient/Integrity taxonomy
//! - [`validation`] - Input validation (IMEI, prices, UUIDs)

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod opname;
pub mod pricing;
pub mod split;
pub mod transition;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ErrorKind, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Per-payment ceiling in whole rupiah. Orders above this are split into
/// multiple payment legs.
pub const SPLIT_CEILING_RUPIAH: i64 = 10_000_000;

/// Default lifetime of an unpaid payment leg.
pub const DEFAULT_LEG_EXPIRY_SECS: i64 = 3 * 60 * 60;

/// Hard cap on legs per order; the ceiling makes more than this meaningless
/// for any realistic order total.
pub const MAX_SPLIT_LEGS: usize = 20;
