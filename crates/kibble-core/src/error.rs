//! # Error Types
//!
//! Domain-specific error types for kibble-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  kibble-core errors (this file)                                        │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  kibble-db errors (separate crate)                                     │
//! │  ├── DbError          - Storage failures                               │
//! │  └── CheckoutError    - What the request layer sees                    │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError ─┐                                  │
//! │                          DbError ───┴─► CheckoutError → HTTP response  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use crate::types::OrderStatus;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Checkout was requested for a user with no cart lines.
    #[error("Cart is empty")]
    EmptyCart,

    /// Not enough stock to cover a cart line.
    ///
    /// ## When This Occurs
    /// - Advisory pre-check: cart quantity exceeds the stock read with the cart
    /// - Conditional decrement: another checkout took the units first
    ///
    /// ## User Workflow
    /// ```text
    /// Checkout (Salmon Kibble qty: 10)
    ///      │
    ///      ▼
    /// stock = 3
    ///      │
    ///      ▼
    /// InsufficientStock { product_name: "Salmon Kibble", available: 3, requested: 10 }
    ///      │
    ///      ▼
    /// UI shows: "Insufficient stock for product: Salmon Kibble"
    /// ```
    #[error("Insufficient stock for product: {product_name} (available {available}, requested {requested})")]
    InsufficientStock {
        product_name: String,
        available: i64,
        requested: i64,
    },

    /// Product cannot be found.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Order cannot be found (or belongs to another user).
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// Status string is not one of the five order states.
    #[error("Invalid status: {0}")]
    InvalidOrderStatus(String),

    /// Status is valid but the order cannot move there from its current state.
    #[error("Order cannot move from {from} to {to}")]
    InvalidStatusTransition { from: OrderStatus, to: OrderStatus },

    /// Order total does not fit in an i64 amount of cents.
    #[error("Order total overflows")]
    AmountOverflow,

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when request input doesn't meet requirements.
/// Raised before any storage is touched.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_stock_message_names_product() {
        let err = CoreError::InsufficientStock {
            product_name: "productC".to_string(),
            available: 3,
            requested: 10,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for product: productC (available 3, requested 10)"
        );
    }

    #[test]
    fn test_transition_message() {
        let err = CoreError::InvalidStatusTransition {
            from: OrderStatus::Delivered,
            to: OrderStatus::Pending,
        };
        assert_eq!(err.to_string(), "Order cannot move from delivered to pending");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "shipping_address".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
        assert_eq!(
            core_err.to_string(),
            "Validation error: shipping_address is required"
        );
    }
}
