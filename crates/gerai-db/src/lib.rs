//! # gerai-db: Storage Layer for Gerai
//!
//! SQLite persistence for the stock-unit lifecycle and sales engine, built
//! on sqlx. This crate owns every piece of SQL in the workspace; gerai-core
//! decides what is legal, gerai-engine decides when to act, this crate makes
//! it durable.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Gerai Data Flow                                 │
//! │                                                                         │
//! │  gerai-engine (checkout, payment poller, opname)                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     gerai-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐   │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │   │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │   │   │
//! │  │   │               │    │ UnitRepo      │    │              │   │   │
//! │  │   │ SqlitePool    │◄───│ OrderRepo     │    │ 001_initial  │   │   │
//! │  │   │ WAL, FKs      │    │ PaymentRepo   │    │   _schema    │   │   │
//! │  │   │               │    │ OpnameRepo    │    │              │   │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘   │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │                        SQLite (one file per branch server)              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database and ledger error types
//! - [`repository`] - Repository implementations (unit, order, payment, opname)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use gerai_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/gerai.db")).await?;
//!
//! db.units()
//!     .reserve_for_order(&order.id, &unit_ids, ActorRole::Employee)
//!     .await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::opname::OpnameRepository;
pub use repository::order::{NewOrder, NewOrderItem, OrderRepository};
pub use repository::payment::PaymentLegRepository;
pub use repository::unit::{NewStockUnit, UnitRepository};
