//! # gerai-engine: Orchestration Layer for Gerai
//!
//! The service layer of the stock-unit lifecycle and sales engine. Decides
//! WHEN things happen; WHAT is legal lives in gerai-core and HOW it is made
//! durable lives in gerai-db.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       gerai-engine (THIS CRATE)                         │
//! │                                                                         │
//! │  ┌───────────────┐   ┌────────────────┐   ┌────────────────────────┐   │
//! │  │ OrderService  │   │ PaymentService │   │ OpnameService          │   │
//! │  │ (orders.rs)   │   │ (payments.rs)  │   │ (opname.rs)            │   │
//! │  │               │   │                │   │                        │   │
//! │  │ checkout:     │   │ split plan     │   │ start / scan /         │   │
//! │  │ price+reserve │   │ submit + poll  │   │ complete / lock /      │   │
//! │  │ cancel/confirm│   │ apply outcome  │   │ resolve missing        │   │
//! │  └──────┬────────┘   └──────┬─────────┘   └──────────┬─────────────┘   │
//! │         │                   │                        │                 │
//! │         │            ┌──────┴─────────┐              │                 │
//! │         │            │ PaymentGateway │ ← reqwest REST client          │
//! │         │            │ (gateway.rs)   │   + test double                │
//! │         │            └────────────────┘                                │
//! │         ▼                   ▼                        ▼                 │
//! │                     gerai-db (ledger, repositories)                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use gerai_engine::{EngineConfig, OrderService, PaymentService, RestGateway};
//!
//! let config = EngineConfig::new("https://gateway.example");
//! let gateway = Arc::new(RestGateway::new(&config)?);
//!
//! let orders = OrderService::new(db.clone());
//! let payments = PaymentService::new(db, gateway, config);
//!
//! let order = orders.create_order(input).await?;
//! payments.submit_payment(&order.id).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod gateway;
pub mod opname;
pub mod orders;
pub mod payments;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::EngineConfig;
pub use error::{EngineError, EngineResult};
pub use gateway::{CreatePaymentRequest, GatewayPayment, PaymentGateway, RestGateway};
pub use opname::OpnameService;
pub use orders::{CreateOrderInput, OrderService, OrderSource};
pub use payments::{PaymentProgress, PaymentService};
