//! # Repository Layer
//!
//! One repository per aggregate, each a thin handle over the shared pool:
//!
//! - [`unit::UnitRepository`] — stock units and the reservation ledger
//! - [`order::OrderRepository`] — orders and their frozen line items
//! - [`payment::PaymentLegRepository`] — split-payment legs
//! - [`opname::OpnameRepository`] — stock-take sessions, snapshots, scans
//!
//! Repositories own all SQL. Multi-row invariants (reserve all-or-nothing,
//! commit-sold) run inside explicit transactions; single-row state flips use
//! conditional UPDATEs keyed on the status the caller observed.

pub mod opname;
pub mod order;
pub mod payment;
pub mod unit;
