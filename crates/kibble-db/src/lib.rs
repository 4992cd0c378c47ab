//! # kibble-db: Storage and Checkout for the Kibble Storefront
//!
//! SQLite persistence (via sqlx) and the checkout orchestrator that turns
//! a cart into an order without overselling.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Kibble Storefront Data Flow                        │
//! │                                                                         │
//! │  Request layer (auth, routing; not in this repo)                       │
//! │       │  place_order(user_id, address)                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     kibble-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────┐    ┌──────────────┐  │   │
//! │  │   │CheckoutService│───►│  Repositories  │    │  Migrations  │  │   │
//! │  │   │ (checkout/)   │    │ ProductRepo    │    │  (embedded)  │  │   │
//! │  │   └───────┬───────┘    │ CartItemRepo   │    │ 001_init.sql │  │   │
//! │  │           │            │ OrderRepo      │    └──────────────┘  │   │
//! │  │           ▼            └────────────────┘                      │   │
//! │  │   ┌───────────────┐                                            │   │
//! │  │   │   Database    │  SqlitePool, WAL, busy_timeout             │   │
//! │  │   │   (pool.rs)   │                                            │   │
//! │  │   └───────────────┘                                            │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite database file (KIBBLE_DATABASE_PATH)                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`config`] - Environment-based configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository traits and SQLite implementations
//! - [`checkout`] - The checkout orchestrator and its error type
//!
//! ## Usage
//!
//! ```rust,ignore
//! use kibble_db::{Database, StoreConfig};
//!
//! let config = StoreConfig::load()?;
//! let db = Database::new(config.db_config()).await?;
//!
//! db.carts().add_item("user-1", &product_id, 2).await?;
//! let order = db.checkout().place_order("user-1", "123 Main St").await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod checkout;
pub mod config;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use checkout::{CheckoutError, CheckoutResult, CheckoutService, ErrorCode, StoreCheckout};
pub use config::{ConfigError, StoreConfig};
pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::{
    CartItemRepository, CartRepository, CatalogRepository, OrderLedger, OrderRepository,
    ProductRepository, StockLedger,
};
