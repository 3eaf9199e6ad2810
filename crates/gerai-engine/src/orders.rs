//! # Order Assembly
//!
//! Checkout: turn a cart of unit ids into a priced, pending order whose
//! units are held by the reservation ledger.
//!
//! ## Checkout Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  create_order(cart)                                                 │
//! │                                                                     │
//! │  1. fetch units, snapshot label + price                             │
//! │  2. price the cart (discount, shipping)        gerai-core           │
//! │  3. reserve all units against the new order    gerai-db, atomic     │
//! │       conflict → abort, no order row, error lists the losers        │
//! │  4. insert pending order + frozen line items                        │
//! │                                                                     │
//! │  The reservation happens BEFORE the row exists; the order id is     │
//! │  minted here so step 3 has something to hold the units with.        │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Payment submission failing later never unwinds any of this: the order
//! stays pending, the units stay reserved, and submission is retried.

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};
use uuid::Uuid;

use gerai_core::pricing::compute_totals;
use gerai_core::{ActorRole, DiscountCode, Money, Order, OrderStatus, SoldChannel};
use gerai_db::{Database, NewOrder, NewOrderItem};

use crate::error::EngineResult;

// =============================================================================
// Order Codes
// =============================================================================

/// Where an order was placed; decides its code prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderSource {
    /// Web storefront checkout.
    Web,
    /// In-store POS checkout.
    Pos,
}

impl OrderSource {
    fn prefix(&self) -> &'static str {
        match self {
            OrderSource::Web => "WEB",
            OrderSource::Pos => "POS",
        }
    }
}

fn base36(mut n: u64) -> String {
    const DIGITS: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

/// Generates a human-readable order code, e.g. `WEB-M3K1A9C4F2`.
///
/// Base36 millisecond timestamp plus two random characters; readable over
/// the phone, sortable by creation time, unique enough that the UNIQUE
/// index never fires in practice.
pub fn generate_order_code(source: OrderSource, now: DateTime<Utc>) -> String {
    let millis = now.timestamp_millis().max(0) as u64;
    let salt = Uuid::new_v4().simple().to_string();
    format!(
        "{}-{}{}",
        source.prefix(),
        base36(millis),
        salt[..2].to_uppercase()
    )
}

// =============================================================================
// Service
// =============================================================================

/// Parameters for checkout.
#[derive(Debug, Clone)]
pub struct CreateOrderInput {
    pub source: OrderSource,
    pub branch_id: String,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    /// Units the customer wants, by id.
    pub unit_ids: Vec<String>,
    /// Already looked up and still configured; validation happens here.
    pub discount: Option<DiscountCode>,
    /// Whole rupiah.
    pub shipping_cost: i64,
    pub role: ActorRole,
}

/// Order assembly service.
#[derive(Clone)]
pub struct OrderService {
    db: Database,
}

impl OrderService {
    /// Creates a new OrderService.
    pub fn new(db: Database) -> Self {
        OrderService { db }
    }

    /// Runs checkout: price, reserve, persist.
    ///
    /// On a reservation conflict nothing is persisted and the error lists
    /// every unit that was no longer available, so the caller can drop them
    /// from the cart and try once more.
    pub async fn create_order(&self, input: CreateOrderInput) -> EngineResult<Order> {
        if input.unit_ids.is_empty() {
            return Err(gerai_core::CoreError::EmptyCart.into());
        }

        let units_repo = self.db.units();

        let mut items = Vec::with_capacity(input.unit_ids.len());
        let mut prices = Vec::with_capacity(input.unit_ids.len());

        for unit_id in &input.unit_ids {
            let unit = units_repo.get_by_id(unit_id).await?;
            prices.push(unit.price());
            items.push(NewOrderItem {
                unit_id: unit.id,
                imei: unit.imei,
                product_label: unit.product_label,
                selling_price: unit.selling_price,
            });
        }

        let now = Utc::now();
        let totals = compute_totals(
            &prices,
            input.discount.as_ref(),
            Money::from_rupiah(input.shipping_cost),
            now,
        )?;

        let order_id = Uuid::new_v4().to_string();
        let code = generate_order_code(input.source, now);

        // Reserve before the row exists: a conflict must leave no trace.
        units_repo
            .reserve_for_order(&order_id, &input.unit_ids, input.role)
            .await?;

        let new_order = NewOrder {
            id: order_id.clone(),
            code,
            branch_id: input.branch_id,
            customer_name: input.customer_name,
            customer_email: input.customer_email,
            customer_phone: input.customer_phone,
            subtotal: totals.subtotal.rupiah(),
            discount_amount: totals.discount_amount.rupiah(),
            discount_code: input.discount.map(|d| d.code),
            shipping_cost: totals.shipping_cost.rupiah(),
            total: totals.total.rupiah(),
        };

        match self.db.orders().create(new_order, &items).await {
            Ok(order) => {
                info!(
                    order_id = %order.id,
                    code = %order.code,
                    units = items.len(),
                    total = order.total,
                    "order created"
                );
                Ok(order)
            }
            Err(err) => {
                // The units are held by an order that failed to materialize;
                // put them back before surfacing the failure.
                if let Err(release_err) = units_repo.release(&order_id, input.role).await {
                    error!(
                        order_id = %order_id,
                        error = %release_err,
                        "failed to release reservation of unpersisted order"
                    );
                }
                Err(err.into())
            }
        }
    }

    /// Cancels a pending order and releases its units.
    ///
    /// The status flip is the gate: once an order is cancelled no racing
    /// confirm can touch it, and releasing afterwards is idempotent.
    pub async fn cancel_order(&self, order_id: &str, role: ActorRole) -> EngineResult<Order> {
        let order = self.db.orders().cancel(order_id).await?;
        let released = self.db.units().release(order_id, role).await?;

        info!(order_id = %order_id, released = released, "order cancelled");

        Ok(order)
    }

    /// Confirms a pending order: marks it completed and converts its
    /// reservation into sales through the given channel.
    ///
    /// The completed flip and the unit commit share one transaction, so a
    /// concurrent cancel loses cleanly and a unit moved out from under the
    /// reservation rolls the whole confirmation back. A completed order
    /// always sits over sold units, never reserved ones.
    pub async fn confirm_order(
        &self,
        order_id: &str,
        channel: SoldChannel,
        role: ActorRole,
    ) -> EngineResult<Order> {
        let items = self.db.orders().get_items(order_id).await?;
        let unit_ids: Vec<String> = items.into_iter().map(|i| i.unit_id).collect();

        let order = self
            .db
            .orders()
            .confirm_sold(order_id, &unit_ids, channel, role)
            .await?;

        info!(order_id = %order_id, code = %order.code, "order confirmed");

        Ok(order)
    }

    /// Fetches an order by id.
    pub async fn get_order(&self, order_id: &str) -> EngineResult<Order> {
        Ok(self.db.orders().get_by_id(order_id).await?)
    }

    /// Pending orders older than the cutoff; candidates for expiry sweeps.
    pub async fn stale_pending(&self, cutoff: DateTime<Utc>) -> EngineResult<Vec<Order>> {
        let pending = self.db.orders().list_by_status(OrderStatus::Pending, u32::MAX).await?;
        let stale: Vec<Order> = pending.into_iter().filter(|o| o.created_at < cutoff).collect();

        if !stale.is_empty() {
            warn!(count = stale.len(), "stale pending orders found");
        }

        Ok(stale)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
