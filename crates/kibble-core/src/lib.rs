//! # kibble-core: Pure Business Logic for the Kibble Storefront
//!
//! This crate contains the domain model of the storefront checkout as pure
//! functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Kibble Storefront Architecture                      │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              Request layer (HTTP, auth) - external              │   │
//! │  │        POST /orders, PUT /admin/orders/{id}/status, ...         │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               kibble-db::CheckoutService                        │   │
//! │  │        place_order, update_order_status, list_orders            │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ uses                                   │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ kibble-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │ checkout  │  │ validation│  │   │
//! │  │   │  Product  │  │   Money   │  │   Plan    │  │   rules   │  │   │
//! │  │   │  Order    │  │           │  │ pre-check │  │  checks   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, CartLine, Order, OrderItem, OrderStatus)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`checkout`] - Cart-to-order planning: totals and price snapshots
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use kibble_core::money::Money;
//!
//! let price = Money::from_cents(100);
//! let line_total = price.checked_multiply_quantity(2).unwrap();
//! assert_eq!(line_total.cents(), 200);
//! ```

pub mod checkout;
pub mod error;
pub mod money;
pub mod types;
pub mod validation;

pub use checkout::{CheckoutPlan, PlannedItem};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum quantity of a single product in one cart line.
///
/// ## Business Reason
/// Prevents accidental over-ordering (e.g., typing 1000 instead of 10).
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Maximum length of a shipping address.
pub const MAX_SHIPPING_ADDRESS_LEN: usize = 500;
