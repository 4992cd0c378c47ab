//! # Checkout Service
//!
//! Turns a user's cart into an order in one atomic transaction.
//!
//! ## place_order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  validate user id + address                                            │
//! │       │                                                                 │
//! │  pooled conn: CartRepository::list_by_user ── released before BEGIN    │
//! │       │                                                                 │
//! │  CheckoutPlan::from_cart ── EmptyCart / InsufficientStock (advisory)   │
//! │       │                                                                 │
//! │  BEGIN IMMEDIATE ───────────────────────────────────────────────────┐  │
//! │  │  OrderLedger::create_order      (pending, planned total)         │  │
//! │  │  OrderLedger::create_items      (price snapshots)                │  │
//! │  │  for each line:                                                  │  │
//! │  │      StockLedger::decrement_if_available                         │  │
//! │  │          Insufficient / NotFound ──► ROLLBACK, return error      │  │
//! │  │  CartRepository::clear_by_user                                   │  │
//! │  │  CatalogRepository::get_product per item                         │  │
//! │  COMMIT ── failure ──► StorageFailure, nothing persisted ───────────┘  │
//! │       │                                                                 │
//! │  OrderDetails { order, items: [{ item, product }] }                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every exit path either commits or rolls back the transaction; dropping
//! an uncommitted `Transaction` also rolls it back.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::{info, warn};

use crate::error::DbError;
use crate::pool::begin_write;
use crate::repository::{
    CartItemRepository, CartRepository, CatalogRepository, OrderLedger, OrderRepository,
    ProductRepository, StockLedger,
};
use kibble_core::validation::{validate_shipping_address, validate_user_id};
use kibble_core::{
    CheckoutPlan, CoreError, Order, OrderDetails, OrderItem, OrderLine, OrderStatus, StockDecrement,
};

pub mod error;

pub use error::{CheckoutError, CheckoutResult, ErrorCode};

/// Checkout wired to the SQLite repositories.
pub type StoreCheckout =
    CheckoutService<ProductRepository, ProductRepository, CartItemRepository, OrderRepository>;

/// The checkout orchestrator.
///
/// Generic over its four collaborators so each can be swapped
/// independently (tests wrap the SQLite ones to inject failures).
pub struct CheckoutService<C, S, K, O>
where
    C: CatalogRepository,
    S: StockLedger,
    K: CartRepository,
    O: OrderLedger,
{
    pool: SqlitePool,
    catalog: C,
    stock: S,
    carts: K,
    orders: O,
}

impl StoreCheckout {
    /// Builds a checkout service over the SQLite repositories.
    pub fn sqlite(pool: SqlitePool) -> Self {
        CheckoutService::new(
            pool.clone(),
            ProductRepository::new(pool.clone()),
            ProductRepository::new(pool.clone()),
            CartItemRepository::new(pool.clone()),
            OrderRepository::new(pool),
        )
    }
}

impl<C, S, K, O> CheckoutService<C, S, K, O>
where
    C: CatalogRepository,
    S: StockLedger,
    K: CartRepository,
    O: OrderLedger,
{
    pub fn new(pool: SqlitePool, catalog: C, stock: S, carts: K, orders: O) -> Self {
        Self {
            pool,
            catalog,
            stock,
            carts,
            orders,
        }
    }

    /// Places an order for everything in the user's cart.
    ///
    /// ## Errors
    /// * `Validation` - blank user id or shipping address
    /// * `EmptyCart` - nothing to buy; storage untouched
    /// * `InsufficientStock` - a line could not be covered; nothing persisted
    /// * `NotFound` - a cart product vanished; nothing persisted
    /// * `StorageFailure` - any storage error, including a failed commit
    #[tracing::instrument(skip(self, shipping_address))]
    pub async fn place_order(
        &self,
        user_id: &str,
        shipping_address: &str,
    ) -> CheckoutResult<OrderDetails> {
        validate_user_id(user_id)?;
        let shipping_address = validate_shipping_address(shipping_address)?;

        // Read on its own connection and give it back before BEGIN
        let lines = {
            let mut conn = self.pool.acquire().await?;
            self.carts.list_by_user(&mut *conn, user_id).await?
        };

        let plan = CheckoutPlan::from_cart(&lines)?;

        let mut tx = begin_write(&self.pool).await?;

        match self.write_order(&mut *tx, user_id, &shipping_address, &plan).await {
            Ok(details) => {
                tx.commit().await.map_err(DbError::transaction)?;

                info!(
                    order_id = %details.order.id,
                    user_id = %user_id,
                    total_cents = details.order.total_cents,
                    lines = details.items.len(),
                    units = plan.unit_count(),
                    "Order placed"
                );
                Ok(details)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "Rollback failed; transaction dropped");
                }
                warn!(user_id = %user_id, error = %err, "Checkout rolled back");
                Err(err)
            }
        }
    }

    /// Steps inside the transaction. Any `Err` means the caller rolls back.
    async fn write_order(
        &self,
        conn: &mut SqliteConnection,
        user_id: &str,
        shipping_address: &str,
        plan: &CheckoutPlan,
    ) -> CheckoutResult<OrderDetails> {
        let order = self
            .orders
            .create_order(&mut *conn, plan.new_order(user_id, shipping_address))
            .await?;

        let items = self
            .orders
            .create_items(&mut *conn, &order.id, &plan.new_items())
            .await?;

        for planned in &plan.items {
            match self
                .stock
                .decrement_if_available(&mut *conn, &planned.product_id, planned.quantity)
                .await?
            {
                StockDecrement::Applied { .. } => {}
                StockDecrement::Insufficient { available } => {
                    return Err(planned.insufficient_stock(available).into());
                }
                StockDecrement::NotFound => {
                    return Err(CoreError::ProductNotFound(planned.product_id.clone()).into());
                }
            }
        }

        self.carts.clear_by_user(&mut *conn, user_id).await?;

        let items = self.attach_products(&mut *conn, items).await?;
        Ok(OrderDetails { order, items })
    }

    /// Moves an order to `new_status`.
    ///
    /// ## Errors
    /// * `InvalidStatus` - not one of the five states; storage untouched
    /// * `NotFound` - no such order
    /// * `InvalidTransition` - the state machine forbids the move
    ///
    /// Setting the status an order already has returns it unchanged.
    #[tracing::instrument(skip(self))]
    pub async fn update_order_status(
        &self,
        order_id: &str,
        new_status: &str,
    ) -> CheckoutResult<OrderDetails> {
        let new_status: OrderStatus = new_status.parse()?;

        let mut tx = begin_write(&self.pool).await?;

        let current = self
            .orders
            .get_order(&mut *tx, order_id)
            .await?
            .ok_or_else(|| CoreError::OrderNotFound(order_id.to_string()))?;

        current.status.transition_to(new_status)?;

        let order = if current.status == new_status {
            current
        } else {
            self.orders
                .update_status(&mut *tx, order_id, current.status, new_status)
                .await?
        };

        let details = self.load_details(&mut *tx, order).await?;
        tx.commit().await.map_err(DbError::transaction)?;

        Ok(details)
    }

    /// One of the user's orders. Another user's order is `NotFound`.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, user_id: &str, order_id: &str) -> CheckoutResult<OrderDetails> {
        let mut conn = self.pool.acquire().await?;

        let order = self
            .orders
            .get_order(&mut *conn, order_id)
            .await?
            .filter(|order| order.user_id == user_id)
            .ok_or_else(|| CoreError::OrderNotFound(order_id.to_string()))?;

        self.load_details(&mut *conn, order).await
    }

    /// The user's orders, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn list_orders(&self, user_id: &str) -> CheckoutResult<Vec<OrderDetails>> {
        let mut conn = self.pool.acquire().await?;
        let orders = self.orders.list_by_user(&mut *conn, user_id).await?;
        self.load_all_details(&mut *conn, orders).await
    }

    /// Every order, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn list_all_orders(&self) -> CheckoutResult<Vec<OrderDetails>> {
        let mut conn = self.pool.acquire().await?;
        let orders = self.orders.list_all(&mut *conn).await?;
        self.load_all_details(&mut *conn, orders).await
    }

    async fn load_all_details(
        &self,
        conn: &mut SqliteConnection,
        orders: Vec<Order>,
    ) -> CheckoutResult<Vec<OrderDetails>> {
        let mut details = Vec::with_capacity(orders.len());
        for order in orders {
            details.push(self.load_details(&mut *conn, order).await?);
        }
        Ok(details)
    }

    async fn load_details(
        &self,
        conn: &mut SqliteConnection,
        order: Order,
    ) -> CheckoutResult<OrderDetails> {
        let items = self.orders.get_items(&mut *conn, &order.id).await?;
        let items = self.attach_products(&mut *conn, items).await?;
        Ok(OrderDetails { order, items })
    }

    /// Pairs each item with its product. Prices stay as snapshotted.
    async fn attach_products(
        &self,
        conn: &mut SqliteConnection,
        items: Vec<OrderItem>,
    ) -> CheckoutResult<Vec<OrderLine>> {
        let mut lines = Vec::with_capacity(items.len());
        for item in items {
            let product = self
                .catalog
                .get_product(&mut *conn, &item.product_id)
                .await?
                .ok_or_else(|| CoreError::ProductNotFound(item.product_id.clone()))?;
            lines.push(OrderLine { item, product });
        }
        Ok(lines)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
