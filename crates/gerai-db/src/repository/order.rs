//! # Order Repository
//!
//! Orders and their frozen line items.
//!
//! ## Status Flips
//! An order leaves `pending` exactly once. Every flip is a conditional
//! UPDATE keyed on the status it leaves from, so two pollers (or a poller
//! racing an operator cancel) cannot both move the same order; the loser
//! sees zero rows and gets told what the order actually is now.
//!
//! ## Snapshot Pattern
//! Line items copy imei, label, and price out of the unit at order time.
//! The order's history stays truthful even if the unit is later repriced
//! or relabeled.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::unit;
use gerai_core::transition::check_transition;
use gerai_core::{ActorRole, CoreError, Order, OrderItem, OrderStatus, SoldChannel, StockStatus};

/// Parameters for order creation. Totals arrive pre-computed; this layer
/// stores, it does not price.
#[derive(Debug, Clone)]
pub struct NewOrder {
    /// Caller-assigned UUID. The engine reserves units against this id
    /// before the row exists, so the id cannot be minted here.
    pub id: String,
    /// Human-readable code, unique (e.g. `WEB-M3K1A9`).
    pub code: String,
    pub branch_id: String,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub subtotal: i64,
    pub discount_amount: i64,
    pub discount_code: Option<String>,
    pub shipping_cost: i64,
    pub total: i64,
}

/// Unit snapshot for one order line.
#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub unit_id: String,
    pub imei: String,
    pub product_label: String,
    pub selling_price: i64,
}

/// Repository for orders and order items.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    /// Creates a new OrderRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Inserts an order and its line items in one transaction.
    ///
    /// The order starts `pending`. Rejects an empty line list; an order
    /// with nothing in it is a pricing bug upstream.
    pub async fn create(&self, new: NewOrder, items: &[NewOrderItem]) -> DbResult<Order> {
        if items.is_empty() {
            return Err(CoreError::EmptyCart.into());
        }

        let now = Utc::now();
        let order = Order {
            id: new.id,
            code: new.code,
            branch_id: new.branch_id,
            customer_name: new.customer_name,
            customer_email: new.customer_email,
            customer_phone: new.customer_phone,
            subtotal: new.subtotal,
            discount_amount: new.discount_amount,
            discount_code: new.discount_code,
            shipping_cost: new.shipping_cost,
            total: new.total,
            status: OrderStatus::Pending,
            created_at: now,
            confirmed_at: None,
        };

        debug!(code = %order.code, items = items.len(), "creating order");

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, code, branch_id,
                customer_name, customer_email, customer_phone,
                subtotal, discount_amount, discount_code, shipping_cost, total,
                status, created_at, confirmed_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
        )
        .bind(&order.id)
        .bind(&order.code)
        .bind(&order.branch_id)
        .bind(&order.customer_name)
        .bind(&order.customer_email)
        .bind(&order.customer_phone)
        .bind(order.subtotal)
        .bind(order.discount_amount)
        .bind(&order.discount_code)
        .bind(order.shipping_cost)
        .bind(order.total)
        .bind(order.status)
        .bind(order.created_at)
        .bind(order.confirmed_at)
        .execute(&mut *tx)
        .await?;

        for item in items {
            sqlx::query(
                r#"
                INSERT INTO order_items (
                    id, order_id, unit_id, imei, product_label, selling_price, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&order.id)
            .bind(&item.unit_id)
            .bind(&item.imei)
            .bind(&item.product_label)
            .bind(item.selling_price)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(order_id = %order.id, code = %order.code, total = order.total, "order created");

        Ok(order)
    }

    /// Gets an order by ID.
    pub async fn get_by_id(&self, order_id: &str) -> DbResult<Order> {
        sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = ?1")
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Order", order_id))
    }

    /// Gets an order by its human-readable code.
    pub async fn get_by_code(&self, code: &str) -> DbResult<Order> {
        sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE code = ?1")
            .bind(code)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Order", code))
    }

    /// Gets the frozen line items for an order.
    pub async fn get_items(&self, order_id: &str) -> DbResult<Vec<OrderItem>> {
        let items = sqlx::query_as::<_, OrderItem>(
            "SELECT * FROM order_items WHERE order_id = ?1 ORDER BY created_at, id",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Lists orders in a status, newest first.
    pub async fn list_by_status(&self, status: OrderStatus, limit: u32) -> DbResult<Vec<Order>> {
        let orders = sqlx::query_as::<_, Order>(
            "SELECT * FROM orders WHERE status = ?1 ORDER BY created_at DESC LIMIT ?2",
        )
        .bind(status)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(orders)
    }

    /// Marks a pending order completed and stamps `confirmed_at`.
    pub async fn complete(&self, order_id: &str) -> DbResult<Order> {
        self.flip(order_id, OrderStatus::Pending, OrderStatus::Completed, true)
            .await
    }

    /// Confirms a pending order: flips it to `completed` and converts its
    /// reservation into sales, all in one transaction.
    ///
    /// Either the order completes AND every unit is sold, or neither
    /// happened: a unit no longer reserved by this order rolls the flip
    /// back and the order stays `pending`. The flip doubles as the race
    /// gate against a concurrent cancel.
    pub async fn confirm_sold(
        &self,
        order_id: &str,
        unit_ids: &[String],
        channel: SoldChannel,
        role: ActorRole,
    ) -> DbResult<Order> {
        if unit_ids.is_empty() {
            return Err(CoreError::EmptyCart.into());
        }

        check_transition(StockStatus::Reserved, StockStatus::Sold, role, Some(channel))?;

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let flipped = sqlx::query(
            "UPDATE orders SET status = 'completed', confirmed_at = ?1 WHERE id = ?2 AND status = 'pending'",
        )
        .bind(now)
        .bind(order_id)
        .execute(&mut *tx)
        .await?;

        if flipped.rows_affected() == 0 {
            tx.rollback().await?;
            let current = self.get_by_id(order_id).await?;
            return Err(CoreError::InvalidState {
                entity: "order".to_string(),
                current: format!("{:?}", current.status).to_lowercase(),
                operation: "mark completed".to_string(),
            }
            .into());
        }

        if let Err(err) = unit::commit_sold_in_tx(&mut tx, order_id, unit_ids, channel, now).await
        {
            tx.rollback().await?;
            return Err(err);
        }

        tx.commit().await?;

        info!(
            order_id = %order_id,
            units = unit_ids.len(),
            channel = channel.as_str(),
            "order confirmed, reservation committed to sold"
        );

        for unit_id in unit_ids {
            unit::append_unit_log(
                &self.pool,
                unit_id,
                "status",
                Some("reserved"),
                Some("sold"),
                role,
                Some(&format!("sold by order {order_id}")),
            )
            .await;
            unit::append_unit_log(
                &self.pool,
                unit_id,
                "sold_channel",
                None,
                Some(channel.as_str()),
                role,
                None,
            )
            .await;
        }

        self.get_by_id(order_id).await
    }

    /// Marks a pending order cancelled.
    pub async fn cancel(&self, order_id: &str) -> DbResult<Order> {
        self.flip(order_id, OrderStatus::Pending, OrderStatus::Cancelled, false)
            .await
    }

    /// Marks a pending order failed (payment never arrived).
    pub async fn mark_failed(&self, order_id: &str) -> DbResult<Order> {
        self.flip(order_id, OrderStatus::Pending, OrderStatus::Failed, false)
            .await
    }

    /// Marks a completed order refunded.
    pub async fn mark_refunded(&self, order_id: &str) -> DbResult<Order> {
        self.flip(order_id, OrderStatus::Completed, OrderStatus::Refunded, false)
            .await
    }

    /// One conditional status flip. Zero rows affected means the order was
    /// not where the caller thought; the error reports where it actually is.
    async fn flip(
        &self,
        order_id: &str,
        from: OrderStatus,
        to: OrderStatus,
        stamp_confirmed: bool,
    ) -> DbResult<Order> {
        let now = Utc::now();

        let result = if stamp_confirmed {
            sqlx::query("UPDATE orders SET status = ?1, confirmed_at = ?2 WHERE id = ?3 AND status = ?4")
                .bind(to)
                .bind(now)
                .bind(order_id)
                .bind(from)
                .execute(&self.pool)
                .await?
        } else {
            sqlx::query("UPDATE orders SET status = ?1 WHERE id = ?2 AND status = ?3")
                .bind(to)
                .bind(order_id)
                .bind(from)
                .execute(&self.pool)
                .await?
        };

        if result.rows_affected() == 0 {
            let current = self.get_by_id(order_id).await?;
            return Err(CoreError::InvalidState {
                entity: "order".to_string(),
                current: format!("{:?}", current.status).to_lowercase(),
                operation: format!("mark {:?}", to).to_lowercase(),
            }
            .into());
        }

        info!(order_id = %order_id, from = ?from, to = ?to, "order status flipped");

        self.get_by_id(order_id).await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::unit::NewStockUnit;
    use gerai_core::ConditionSeverity;

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

    fn sample_order(code: &str) -> NewOrder {
        NewOrder {
            id: Uuid::new_v4().to_string(),
            code: code.to_string(),
            branch_id: "branch-1".to_string(),
            customer_name: Some("Budi".to_string()),
            customer_email: Some("budi@example.com".to_string()),
            customer_phone: None,
            subtotal: 12_000_000,
            discount_amount: 0,
            discount_code: None,
            shipping_cost: 0,
            total: 12_000_000,
        }
    }

    // Line items reference real units; order_items carries a foreign key
    // to stock_units.
    async fn seeded_items(db: &Database) -> Vec<NewOrderItem> {
        let a = seed_unit(db, "356789104835001").await;
        let b = seed_unit(db, "356789104835002").await;
        vec![
            NewOrderItem {
                unit_id: a,
                imei: "356789104835001".to_string(),
                product_label: "iPhone 13 128GB".to_string(),
                selling_price: 7_500_000,
            },
            NewOrderItem {
                unit_id: b,
                imei: "356789104835002".to_string(),
                product_label: "iPhone 12 64GB".to_string(),
                selling_price: 4_500_000,
            },
        ]
    }

    #[tokio::test]
    async fn test_create_and_fetch_with_items() {
        let db = test_db().await;
        let repo = db.orders();

        let order = repo
            .create(sample_order("WEB-TEST01"), &seeded_items(&db).await)
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Pending);

        let fetched = repo.get_by_code("WEB-TEST01").await.unwrap();
        assert_eq!(fetched.id, order.id);
        assert_eq!(fetched.total, 12_000_000);

        let items = repo.get_items(&order.id).await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].imei, "356789104835001");
    }

    #[tokio::test]
    async fn test_empty_order_rejected() {
        let db = test_db().await;
        let repo = db.orders();

        let err = repo.create(sample_order("WEB-TEST01"), &[]).await.unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::EmptyCart)));
    }

    #[tokio::test]
    async fn test_duplicate_code_rejected() {
        let db = test_db().await;
        let repo = db.orders();

        let items = seeded_items(&db).await;
        repo.create(sample_order("WEB-TEST01"), &items).await.unwrap();
        let err = repo
            .create(sample_order("WEB-TEST01"), &items)
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_complete_stamps_confirmed_at() {
        let db = test_db().await;
        let repo = db.orders();

        let order = repo
            .create(sample_order("WEB-TEST01"), &seeded_items(&db).await)
            .await
            .unwrap();
        let order = repo.complete(&order.id).await.unwrap();

        assert_eq!(order.status, OrderStatus::Completed);
        assert!(order.confirmed_at.is_some());
    }

    #[tokio::test]
    async fn test_confirm_sold_completes_order_and_sells_units() {
        let db = test_db().await;
        let repo = db.orders();

        let items = seeded_items(&db).await;
        let ids: Vec<String> = items.iter().map(|i| i.unit_id.clone()).collect();

        let order = repo.create(sample_order("WEB-TEST01"), &items).await.unwrap();
        db.units()
            .reserve_for_order(&order.id, &ids, ActorRole::AdminBranch)
            .await
            .unwrap();

        let order = repo
            .confirm_sold(&order.id, &ids, SoldChannel::Website, ActorRole::AdminBranch)
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Completed);
        assert!(order.confirmed_at.is_some());

        for id in &ids {
            let unit = db.units().get_by_id(id).await.unwrap();
            assert_eq!(unit.status, StockStatus::Sold);
            assert_eq!(unit.sold_channel, Some(SoldChannel::Website));
            assert!(unit.reservation_ref.is_none());
        }
    }

    #[tokio::test]
    async fn test_confirm_sold_rolls_back_the_flip_with_the_units() {
        let db = test_db().await;
        let repo = db.orders();

        let items = seeded_items(&db).await;
        let ids: Vec<String> = items.iter().map(|i| i.unit_id.clone()).collect();

        let order = repo.create(sample_order("WEB-TEST01"), &items).await.unwrap();
        db.units()
            .reserve_for_order(&order.id, &ids, ActorRole::AdminBranch)
            .await
            .unwrap();

        // An operator yanks one unit out of the reservation behind the
        // order's back.
        db.units()
            .transition(&ids[1], StockStatus::Available, ActorRole::SuperAdmin, None, Some("mis-scan"))
            .await
            .unwrap();

        let err = repo
            .confirm_sold(&order.id, &ids, SoldChannel::Website, ActorRole::AdminBranch)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UnitNotReserved { .. }));

        // Nothing stuck: the order is still pending and the other unit is
        // still reserved, never a completed order over unsold stock.
        let order = repo.get_by_id(&order.id).await.unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert!(order.confirmed_at.is_none());

        let unit = db.units().get_by_id(&ids[0]).await.unwrap();
        assert_eq!(unit.status, StockStatus::Reserved);
        assert_eq!(unit.sold_channel, None);
    }

    #[tokio::test]
    async fn test_terminal_orders_never_flip_again() {
        let db = test_db().await;
        let repo = db.orders();

        let order = repo
            .create(sample_order("WEB-TEST01"), &seeded_items(&db).await)
            .await
            .unwrap();
        repo.cancel(&order.id).await.unwrap();

        // A poller seeing the payment later cannot resurrect the order.
        let err = repo.complete(&order.id).await.unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::InvalidState { .. })));

        let order = repo.get_by_id(&order.id).await.unwrap();
        assert_eq!(order.status, OrderStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_refund_only_from_completed() {
        let db = test_db().await;
        let repo = db.orders();

        let order = repo
            .create(sample_order("WEB-TEST01"), &seeded_items(&db).await)
            .await
            .unwrap();

        let err = repo.mark_refunded(&order.id).await.unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::InvalidState { .. })));

        repo.complete(&order.id).await.unwrap();
        let order = repo.mark_refunded(&order.id).await.unwrap();
        assert_eq!(order.status, OrderStatus::Refunded);
    }
}
