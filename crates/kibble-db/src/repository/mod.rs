//! # Repository Module
//!
//! The four storage interfaces the checkout orchestrator consumes, and
//! their SQLite implementations.
//!
//! ## Connection Passing
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Every trait method takes `&mut SqliteConnection`.                     │
//! │                                                                         │
//! │  CheckoutService                                                       │
//! │       │                                                                 │
//! │       ├── pool.acquire()  ──► &mut *conn   plain reads (cart listing)  │
//! │       │                                                                 │
//! │       └── begin_write()   ──► &mut *tx     one atomic scope:           │
//! │              ├── OrderLedger::create_order                             │
//! │              ├── OrderLedger::create_items                             │
//! │              ├── StockLedger::decrement_if_available  (per line)       │
//! │              ├── CartRepository::clear_by_user                         │
//! │              └── commit  /  rollback on any Err                        │
//! │                                                                         │
//! │  The repository never opens its own transaction inside a trait        │
//! │  method, so the caller owns the atomic scope.                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`ProductRepository`] - [`CatalogRepository`] + [`StockLedger`]
//! - [`CartItemRepository`] - [`CartRepository`] + cart maintenance
//! - [`OrderRepository`] - [`OrderLedger`]

use async_trait::async_trait;
use sqlx::SqliteConnection;

use crate::error::DbResult;
use kibble_core::{CartLine, NewOrder, NewOrderItem, Order, OrderItem, OrderStatus, Product, StockDecrement};

pub mod cart;
pub mod order;
pub mod product;

pub use cart::CartItemRepository;
pub use order::OrderRepository;
pub use product::ProductRepository;

/// Product lookups.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// `None` when no product has this id.
    async fn get_product(&self, conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Product>>;
}

/// Atomic stock mutation.
#[async_trait]
pub trait StockLedger: Send + Sync {
    /// Lowers stock by `quantity` only if at least that much is on hand,
    /// as one indivisible statement.
    async fn decrement_if_available(
        &self,
        conn: &mut SqliteConnection,
        product_id: &str,
        quantity: i64,
    ) -> DbResult<StockDecrement>;
}

/// Cart lines as seen by checkout.
#[async_trait]
pub trait CartRepository: Send + Sync {
    /// The user's lines in insertion order, each joined with its product.
    async fn list_by_user(&self, conn: &mut SqliteConnection, user_id: &str) -> DbResult<Vec<CartLine>>;

    /// Deletes every line for the user. Returns rows removed.
    async fn clear_by_user(&self, conn: &mut SqliteConnection, user_id: &str) -> DbResult<u64>;
}

/// Order header and item persistence.
#[async_trait]
pub trait OrderLedger: Send + Sync {
    /// Inserts a `pending` order header.
    async fn create_order(&self, conn: &mut SqliteConnection, order: NewOrder) -> DbResult<Order>;

    /// Inserts the order's items with their price snapshots.
    async fn create_items(
        &self,
        conn: &mut SqliteConnection,
        order_id: &str,
        items: &[NewOrderItem],
    ) -> DbResult<Vec<OrderItem>>;

    async fn get_order(&self, conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Order>>;

    async fn get_items(&self, conn: &mut SqliteConnection, order_id: &str) -> DbResult<Vec<OrderItem>>;

    /// Newest first.
    async fn list_by_user(&self, conn: &mut SqliteConnection, user_id: &str) -> DbResult<Vec<Order>>;

    /// Newest first.
    async fn list_all(&self, conn: &mut SqliteConnection) -> DbResult<Vec<Order>>;

    /// Compare-and-set: writes `new` only while the stored status is still `expected`.
    async fn update_status(
        &self,
        conn: &mut SqliteConnection,
        id: &str,
        expected: OrderStatus,
        new: OrderStatus,
    ) -> DbResult<Order>;
}
