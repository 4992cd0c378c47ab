//! # Domain Types
//!
//! Core domain types used throughout the storefront checkout.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │    CartLine     │   │     Order       │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │◄──│  product (join) │   │  id (UUID)      │       │
//! │  │  name           │   │  user_id        │   │  user_id        │       │
//! │  │  price_cents    │   │  quantity ≥ 1   │   │  total_cents    │       │
//! │  │  stock ≥ 0      │   └─────────────────┘   │  status         │       │
//! │  └─────────────────┘                         └────────┬────────┘       │
//! │           ▲                                           │ 1..n           │
//! │           │            ┌─────────────────┐            ▼                │
//! │           └────────────│   OrderItem     │◄───────────┘                │
//! │                        │  price_cents    │  ← snapshot, never updated  │
//! │                        └─────────────────┘                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::CoreError;
use crate::money::Money;

// =============================================================================
// Product
// =============================================================================

/// A product in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Display name, used in stock error messages.
    pub name: String,

    pub description: Option<String>,

    pub brand: Option<String>,

    /// Current catalog price in cents. Mutable over time.
    pub price_cents: i64,

    /// Units on hand. Never negative.
    pub stock: i64,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the current catalog price as Money.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// Checks if the on-hand stock covers `quantity`.
    ///
    /// Advisory only: the authoritative check is the conditional decrement.
    #[inline]
    pub fn has_stock_for(&self, quantity: i64) -> bool {
        self.stock >= quantity
    }
}

// =============================================================================
// Cart Line
// =============================================================================

/// One (user, product, quantity) pending-purchase row, joined with the
/// product's current price and stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CartLine {
    pub id: String,
    pub user_id: String,
    pub product_id: String,
    pub quantity: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    /// Product as it is right now (live join, not a snapshot).
    pub product: Product,
}

impl CartLine {
    /// Quantity × current catalog price.
    #[inline]
    pub fn line_total(&self) -> Money {
        self.product.price().multiply_quantity(self.quantity)
    }
}

// =============================================================================
// Order Status
// =============================================================================

/// The status of an order.
///
/// ## State Machine
/// ```text
/// pending ──► processing ──► shipped ──► delivered
///    │             │
///    └─────────────┴──► cancelled
/// ```
///
/// Only the admin status update moves an order; nothing is time-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Order placed, awaiting fulfilment.
    Pending,
    /// Being picked and packed.
    Processing,
    /// Handed to the carrier.
    Shipped,
    /// Received by the customer (terminal).
    Delivered,
    /// Cancelled before shipping (terminal).
    Cancelled,
}

impl OrderStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Pending,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    /// Returns the stored / wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Returns true if an admin may move an order from `self` to `next`.
    ///
    /// Re-asserting the current status is allowed (no-op update).
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;

        if *self == next {
            return true;
        }
        if self.is_terminal() {
            return false;
        }

        matches!(
            (self, next),
            (Pending, Processing)
                | (Processing, Shipped)
                | (Shipped, Delivered)
                | (Pending, Cancelled)
                | (Processing, Cancelled)
        )
    }

    /// Checks a move to `next`, returning `next` when it is allowed.
    pub fn transition_to(&self, next: OrderStatus) -> Result<OrderStatus, CoreError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(CoreError::InvalidStatusTransition { from: *self, to: next })
        }
    }

    /// Returns true if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Pending
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parses the exact lowercase names; anything else is `InvalidOrderStatus`.
impl FromStr for OrderStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| CoreError::InvalidOrderStatus(s.to_string()))
    }
}

// =============================================================================
// Order
// =============================================================================

/// An order header. Immutable once created except for `status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Order {
    pub id: String,
    pub user_id: String,
    /// Σ(item.quantity × item.price_cents) at checkout time.
    pub total_cents: i64,
    pub status: OrderStatus,
    pub shipping_address: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Order {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

/// Header fields supplied when an order is created.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: String,
    pub total_cents: i64,
    pub shipping_address: String,
}

// =============================================================================
// Order Item
// =============================================================================

/// A line item in an order.
///
/// `price_cents` is a snapshot of the catalog price at checkout and is never
/// recomputed from the catalog afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    pub product_id: String,
    pub quantity: i64,
    /// Unit price in cents at time of checkout (frozen).
    pub price_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl OrderItem {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// quantity × snapshot price.
    #[inline]
    pub fn line_total(&self) -> Money {
        self.price().multiply_quantity(self.quantity)
    }
}

/// Item fields supplied when order items are created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderItem {
    pub product_id: String,
    pub quantity: i64,
    pub price_cents: i64,
}

// =============================================================================
// Enriched Order
// =============================================================================

/// An order item together with the product it refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderLine {
    pub item: OrderItem,
    pub product: Product,
}

/// An order with its items and their products, as returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderDetails {
    pub order: Order,
    pub items: Vec<OrderLine>,
}

impl OrderDetails {
    /// Σ(item.quantity × item.price) over the stored items.
    pub fn items_total(&self) -> Money {
        self.items.iter().map(|line| line.item.line_total()).sum()
    }
}

// =============================================================================
// Stock Decrement Outcome
// =============================================================================

/// Result of a conditional stock decrement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockDecrement {
    /// Stock covered the quantity and was reduced.
    Applied { remaining: i64 },
    /// Stock was below the requested quantity; nothing changed.
    Insufficient { available: i64 },
    /// No product with that ID.
    NotFound,
}

// =============================================================================
// Unit Tests
// =============================================================================
