//! # Checkout Error Type
//!
//! The caller-facing error for every checkout, order and cart operation.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  ValidationError ──────────────────────┐                               │
//! │  CoreError (EmptyCart, InsufficientStock, InvalidOrderStatus, …) ──┐   │
//! │  DbError (any storage or transaction failure) ───────────────────┐ │   │
//! │                                                                  ▼ ▼   │
//! │                                                       CheckoutError    │
//! │                                                                  │     │
//! │                                                                  ▼     │
//! │                                           request layer: code + message│
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A `StorageFailure` raised inside the checkout transaction is only
//! returned after the transaction has been rolled back.

use serde::Serialize;
use thiserror::Error;

use crate::error::DbError;
use kibble_core::{CoreError, OrderStatus, ValidationError};

/// Checkout, order and cart errors.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Malformed request (blank address, bad quantity, …).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Missing product, cart line or order.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A cart line asks for more than is on hand.
    #[error("Insufficient stock for product: {product_name}")]
    InsufficientStock {
        product_name: String,
        available: i64,
        requested: i64,
    },

    /// Checkout of a cart with no lines.
    #[error("Cart is empty")]
    EmptyCart,

    /// Status string outside the five order states.
    #[error("Invalid status: {0}")]
    InvalidStatus(String),

    /// Valid status the order cannot move to from where it is.
    #[error("Order cannot move from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// Any transaction or I/O failure, including a failed commit.
    #[error("Storage failure: {0}")]
    StorageFailure(#[from] DbError),
}

/// Machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ValidationError,
    NotFound,
    InsufficientStock,
    EmptyCart,
    InvalidStatus,
    InvalidTransition,
    StorageFailure,
}

impl CheckoutError {
    /// Creates a not found error.
    pub fn not_found(entity: &str, id: &str) -> Self {
        CheckoutError::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            CheckoutError::Validation(_) => ErrorCode::ValidationError,
            CheckoutError::NotFound { .. } => ErrorCode::NotFound,
            CheckoutError::InsufficientStock { .. } => ErrorCode::InsufficientStock,
            CheckoutError::EmptyCart => ErrorCode::EmptyCart,
            CheckoutError::InvalidStatus(_) => ErrorCode::InvalidStatus,
            CheckoutError::InvalidTransition { .. } => ErrorCode::InvalidTransition,
            CheckoutError::StorageFailure(_) => ErrorCode::StorageFailure,
        }
    }

    /// True when retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CheckoutError::StorageFailure(_) | CheckoutError::InsufficientStock { .. }
        )
    }
}

/// Converts core errors to checkout errors.
impl From<CoreError> for CheckoutError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::EmptyCart => CheckoutError::EmptyCart,
            CoreError::InsufficientStock {
                product_name,
                available,
                requested,
            } => CheckoutError::InsufficientStock {
                product_name,
                available,
                requested,
            },
            CoreError::ProductNotFound(id) => CheckoutError::not_found("Product", &id),
            CoreError::OrderNotFound(id) => CheckoutError::not_found("Order", &id),
            CoreError::InvalidOrderStatus(status) => CheckoutError::InvalidStatus(status),
            CoreError::InvalidStatusTransition { from, to } => {
                CheckoutError::InvalidTransition { from, to }
            }
            CoreError::AmountOverflow => CheckoutError::Validation(ValidationError::OutOfRange {
                field: "total".to_string(),
                min: 0,
                max: i64::MAX,
            }),
            CoreError::Validation(e) => CheckoutError::Validation(e),
        }
    }
}

impl From<sqlx::Error> for CheckoutError {
    fn from(err: sqlx::Error) -> Self {
        CheckoutError::StorageFailure(err.into())
    }
}

/// Result type for checkout operations.
pub type CheckoutResult<T> = Result<T, CheckoutError>;
