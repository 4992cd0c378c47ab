//! # Checkout Planning
//!
//! Turns a user's cart lines into the exact rows a checkout will write.
//!
//! ## Where This Sits
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  CheckoutService::place_order (kibble-db)                               │
//! │                                                                         │
//! │  1. list cart lines ──────────────┐                                     │
//! │                                   ▼                                     │
//! │  2. CheckoutPlan::from_cart ← THIS MODULE (pure)                        │
//! │     ├── empty?            → EmptyCart                                   │
//! │     ├── stock < quantity? → InsufficientStock   (advisory pre-check)    │
//! │     ├── snapshot price per line                                         │
//! │     └── total = Σ quantity × price                                      │
//! │                                   │                                     │
//! │  3-6. transaction: order, items, conditional decrements, clear cart     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The pre-check reads stock as it was when the cart was loaded. It only
//! saves a doomed transaction; the conditional decrement is what prevents
//! overselling.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{CartLine, NewOrder, NewOrderItem};

/// One cart line frozen for checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedItem {
    pub product_id: String,
    /// Kept for `InsufficientStock` messages raised by the decrement.
    pub product_name: String,
    pub quantity: i64,
    /// Catalog price captured when the plan was built.
    pub unit_price: Money,
}

impl PlannedItem {
    #[inline]
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply_quantity(self.quantity)
    }

    /// The order item row this line becomes.
    pub fn to_new_item(&self) -> NewOrderItem {
        NewOrderItem {
            product_id: self.product_id.clone(),
            quantity: self.quantity,
            price_cents: self.unit_price.cents(),
        }
    }

    /// Error to report when the stock ledger refuses this line.
    pub fn insufficient_stock(&self, available: i64) -> CoreError {
        CoreError::InsufficientStock {
            product_name: self.product_name.clone(),
            available,
            requested: self.quantity,
        }
    }
}

/// Everything a checkout will persist, computed before the transaction opens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutPlan {
    pub items: Vec<PlannedItem>,
    pub total: Money,
}

impl CheckoutPlan {
    /// Builds a plan from cart lines (in cart order).
    ///
    /// ## Errors
    /// - `EmptyCart` when `lines` is empty
    /// - `Validation` when a line has a non-positive quantity
    /// - `InsufficientStock` for the first line whose product stock is short
    /// - `AmountOverflow` when the total does not fit in i64 cents
    ///
    /// ```rust,ignore
    /// let plan = CheckoutPlan::from_cart(&lines)?;
    /// assert_eq!(plan.total, plan.items.iter().map(|i| i.line_total()).sum());
    /// ```
    pub fn from_cart(lines: &[CartLine]) -> CoreResult<Self> {
        if lines.is_empty() {
            return Err(CoreError::EmptyCart);
        }

        let mut items = Vec::with_capacity(lines.len());
        let mut total = Money::zero();

        for line in lines {
            if line.quantity <= 0 {
                return Err(ValidationError::MustBePositive {
                    field: "quantity".to_string(),
                }
                .into());
            }

            if !line.product.has_stock_for(line.quantity) {
                return Err(CoreError::InsufficientStock {
                    product_name: line.product.name.clone(),
                    available: line.product.stock,
                    requested: line.quantity,
                });
            }

            let unit_price = line.product.price();
            let line_total = unit_price
                .checked_multiply_quantity(line.quantity)
                .ok_or(CoreError::AmountOverflow)?;
            total = total.checked_add(line_total).ok_or(CoreError::AmountOverflow)?;

            items.push(PlannedItem {
                product_id: line.product_id.clone(),
                product_name: line.product.name.clone(),
                quantity: line.quantity,
                unit_price,
            });
        }

        Ok(CheckoutPlan { items, total })
    }

    /// The order header row for this plan. Status is always `pending`.
    pub fn new_order(&self, user_id: &str, shipping_address: &str) -> NewOrder {
        NewOrder {
            user_id: user_id.to_string(),
            total_cents: self.total.cents(),
            shipping_address: shipping_address.to_string(),
        }
    }

    /// The order item rows for this plan, in cart order.
    pub fn new_items(&self) -> Vec<NewOrderItem> {
        self.items.iter().map(PlannedItem::to_new_item).collect()
    }

    /// Total units across all lines.
    pub fn unit_count(&self) -> i64 {
        self.items.iter().map(|i| i.quantity).sum()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
