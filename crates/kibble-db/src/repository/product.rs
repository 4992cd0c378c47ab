//! # Product Repository
//!
//! Catalog reads and the conditional stock decrement.
//!
//! ## Conditional Decrement
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Stock Decrement Strategy                             │
//! │                                                                         │
//! │  ❌ WRONG: read, compare in Rust, then write                           │
//! │     SELECT stock FROM products WHERE id = ?      -- both see 1         │
//! │     UPDATE products SET stock = stock - 1        -- both write → -1    │
//! │                                                                         │
//! │  ✅ CORRECT: guard and write in one statement                          │
//! │     UPDATE products SET stock = stock - ?2                             │
//! │     WHERE id = ?1 AND stock >= ?2                                      │
//! │     RETURNING stock                                                    │
//! │                                                                         │
//! │  Row returned  → Applied { remaining }                                 │
//! │  No row        → SELECT stock only to say why:                         │
//! │                    row exists → Insufficient { available }             │
//! │                    no row     → NotFound                               │
//! │                                                                         │
//! │  SQLite allows one writer at a time, so the guard is evaluated         │
//! │  against the latest committed stock. CHECK (stock >= 0) backs it up.   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use super::{CatalogRepository, StockLedger};
use crate::error::{DbError, DbResult};
use kibble_core::validation::{validate_price_cents, validate_product_name, validate_stock};
use kibble_core::{Product, StockDecrement};

pub(crate) const PRODUCT_COLUMNS: &str =
    "id, name, description, brand, price_cents, stock, created_at, updated_at";

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = ProductRepository::new(pool);
///
/// let product = repo.insert(&new_product("Salmon Kibble 1kg", 1299, 40)).await?;
/// let fetched = repo.get_by_id(&product.id).await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Gets a product by its ID.
    ///
    /// ## Returns
    /// * `Ok(Some(Product))` - Product found
    /// * `Ok(None)` - Product not found
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let mut conn = self.pool.acquire().await?;
        self.get_product(&mut *conn, id).await
    }

    /// Inserts a new product.
    ///
    /// ## Returns
    /// * `Ok(Product)` - Inserted product
    /// * `Err(DbError::InvalidArgument)` - Empty name, negative price or stock
    /// * `Err(DbError::UniqueViolation)` - ID already exists
    pub async fn insert(&self, product: &Product) -> DbResult<Product> {
        validate_product_name(&product.name)
            .and_then(|_| validate_price_cents(product.price_cents))
            .and_then(|_| validate_stock(product.stock))
            .map_err(|e| DbError::InvalidArgument(e.to_string()))?;

        debug!(id = %product.id, name = %product.name, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, name, description, brand,
                price_cents, stock, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(&product.brand)
        .bind(product.price_cents)
        .bind(product.stock)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(product.clone())
    }

    /// Changes the catalog price.
    ///
    /// Orders already placed keep the price they were checked out at.
    pub async fn update_price(&self, id: &str, price_cents: i64) -> DbResult<Product> {
        validate_price_cents(price_cents).map_err(|e| DbError::InvalidArgument(e.to_string()))?;

        debug!(id = %id, price_cents, "Updating price");

        let product = sqlx::query_as::<_, Product>(&format!(
            "UPDATE products SET price_cents = ?2, updated_at = ?3 WHERE id = ?1 RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(id)
        .bind(price_cents)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        product.ok_or_else(|| DbError::not_found("Product", id))
    }

    /// Pool-backed form of [`StockLedger::decrement_if_available`].
    pub async fn decrement_stock(&self, id: &str, quantity: i64) -> DbResult<StockDecrement> {
        let mut conn = self.pool.acquire().await?;
        self.decrement_if_available(&mut *conn, id, quantity).await
    }

    /// Counts total products (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

#[async_trait]
impl CatalogRepository for ProductRepository {
    async fn get_product(&self, conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(product)
    }
}

#[async_trait]
impl StockLedger for ProductRepository {
    async fn decrement_if_available(
        &self,
        conn: &mut SqliteConnection,
        product_id: &str,
        quantity: i64,
    ) -> DbResult<StockDecrement> {
        if quantity <= 0 {
            return Err(DbError::InvalidArgument(format!(
                "decrement quantity must be positive, got {quantity}"
            )));
        }

        let remaining: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE products
            SET
                stock = stock - ?2,
                updated_at = ?3
            WHERE id = ?1 AND stock >= ?2
            RETURNING stock
            "#,
        )
        .bind(product_id)
        .bind(quantity)
        .bind(Utc::now())
        .fetch_optional(&mut *conn)
        .await?;

        if let Some(remaining) = remaining {
            debug!(product_id = %product_id, quantity, remaining, "Stock decremented");
            return Ok(StockDecrement::Applied { remaining });
        }

        // Guard failed; classify only
        let available: Option<i64> = sqlx::query_scalar("SELECT stock FROM products WHERE id = ?1")
            .bind(product_id)
            .fetch_optional(&mut *conn)
            .await?;

        let outcome = match available {
            Some(available) => StockDecrement::Insufficient { available },
            None => StockDecrement::NotFound,
        };
        debug!(product_id = %product_id, quantity, ?outcome, "Stock decrement refused");

        Ok(outcome)
    }
}

/// Builds an unsaved product with a fresh ID and timestamps.
///
/// ```rust,ignore
/// let product = repo.insert(&new_product("Tuna Pate 85g", 129, 200)).await?;
/// ```
pub fn new_product(name: &str, price_cents: i64, stock: i64) -> Product {
    let now = Utc::now();
    Product {
        id: generate_product_id(),
        name: name.to_string(),
        description: None,
        brand: None,
        price_cents,
        stock,
        created_at: now,
        updated_at: now,
    }
}

/// Helper to generate a new product ID.
pub fn generate_product_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================
