//! # Order Repository
//!
//! Order headers and their line items.
//!
//! ## Order Structure
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Order (header)                                                         │
//! │  ├── id: "550e8400-e29b-41d4-a716-446655440000"                        │
//! │  ├── user_id: "user-42"                                                 │
//! │  ├── total_cents: 250          = Σ quantity × price_cents              │
//! │  ├── status: pending                                                   │
//! │  └── shipping_address: "123 Main St"                                   │
//! │                                                                         │
//! │  OrderItems (price snapshot, never updated)                            │
//! │  ├── Salmon Kibble × 2 @ 100 = 200                                     │
//! │  └── Liver Treats  × 1 @  50 =  50                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Header and items are written inside the checkout transaction. Only
//! `status` changes afterwards, through a compare-and-set.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use super::OrderLedger;
use crate::error::{DbError, DbResult};
use kibble_core::{NewOrder, NewOrderItem, Order, OrderItem, OrderStatus};

const ORDER_COLUMNS: &str =
    "id, user_id, total_cents, status, shipping_address, created_at, updated_at";

const ITEM_COLUMNS: &str = "id, order_id, product_id, quantity, price_cents, created_at";

/// Repository for order database operations.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    /// Creates a new OrderRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Gets an order header by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Order>> {
        let mut conn = self.pool.acquire().await?;
        self.get_order(&mut *conn, id).await
    }

    /// Gets the items of an order.
    pub async fn items(&self, order_id: &str) -> DbResult<Vec<OrderItem>> {
        let mut conn = self.pool.acquire().await?;
        self.get_items(&mut *conn, order_id).await
    }

    /// Counts all orders (for diagnostics and tests).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// Counts all order items.
    pub async fn count_items(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM order_items")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

#[async_trait]
impl OrderLedger for OrderRepository {
    async fn create_order(&self, conn: &mut SqliteConnection, order: NewOrder) -> DbResult<Order> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        debug!(order_id = %id, user_id = %order.user_id, total_cents = order.total_cents, "Creating order");

        let order = sqlx::query_as::<_, Order>(&format!(
            r#"
            INSERT INTO orders (
                id, user_id, total_cents, status, shipping_address, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(&id)
        .bind(&order.user_id)
        .bind(order.total_cents)
        .bind(OrderStatus::Pending)
        .bind(&order.shipping_address)
        .bind(now)
        .fetch_one(&mut *conn)
        .await?;

        Ok(order)
    }

    async fn create_items(
        &self,
        conn: &mut SqliteConnection,
        order_id: &str,
        items: &[NewOrderItem],
    ) -> DbResult<Vec<OrderItem>> {
        let now = Utc::now();
        let mut created = Vec::with_capacity(items.len());

        for item in items {
            let row = sqlx::query_as::<_, OrderItem>(&format!(
                r#"
                INSERT INTO order_items (
                    id, order_id, product_id, quantity, price_cents, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                RETURNING {ITEM_COLUMNS}
                "#
            ))
            .bind(Uuid::new_v4().to_string())
            .bind(order_id)
            .bind(&item.product_id)
            .bind(item.quantity)
            .bind(item.price_cents)
            .bind(now)
            .fetch_one(&mut *conn)
            .await?;

            created.push(row);
        }

        debug!(order_id = %order_id, count = created.len(), "Order items created");
        Ok(created)
    }

    async fn get_order(&self, conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(order)
    }

    async fn get_items(&self, conn: &mut SqliteConnection, order_id: &str) -> DbResult<Vec<OrderItem>> {
        let items = sqlx::query_as::<_, OrderItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = ?1 ORDER BY rowid"
        ))
        .bind(order_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(items)
    }

    async fn list_by_user(&self, conn: &mut SqliteConnection, user_id: &str) -> DbResult<Vec<Order>> {
        let orders = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = ?1 ORDER BY created_at DESC, rowid DESC"
        ))
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(orders)
    }

    async fn list_all(&self, conn: &mut SqliteConnection) -> DbResult<Vec<Order>> {
        let orders = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC, rowid DESC"
        ))
        .fetch_all(&mut *conn)
        .await?;

        Ok(orders)
    }

    async fn update_status(
        &self,
        conn: &mut SqliteConnection,
        id: &str,
        expected: OrderStatus,
        new: OrderStatus,
    ) -> DbResult<Order> {
        let order = sqlx::query_as::<_, Order>(&format!(
            r#"
            UPDATE orders
            SET status = ?3, updated_at = ?4
            WHERE id = ?1 AND status = ?2
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(expected)
        .bind(new)
        .bind(Utc::now())
        .fetch_optional(&mut *conn)
        .await?;

        match order {
            Some(order) => {
                info!(order_id = %id, from = %expected, to = %new, "Order status updated");
                Ok(order)
            }
            None => Err(DbError::TransactionFailed(format!(
                "order {id} is no longer {expected}"
            ))),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
