//! # Cart Repository
//!
//! Cart lines per user, joined with their product's current price and stock.
//!
//! ## Cart Lifecycle
//! ```text
//! add_item(user, product, 2) ──► INSERT (user, product, 2)
//! add_item(user, product, 1) ──► same row, quantity 3
//! update_quantity(user, line, 5)
//! remove_item(user, line)
//!        │
//!        ▼
//! checkout: list_by_user (pooled read), clear_by_user (inside the order transaction)
//! ```
//!
//! Stock checks made here are advisory. The cart never reserves units;
//! only the checkout decrement does.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use super::product::ProductRepository;
use super::{CartRepository, CatalogRepository};
use crate::checkout::{CheckoutError, CheckoutResult};
use crate::error::{DbError, DbResult};
use crate::pool::begin_write;
use kibble_core::validation::{validate_quantity, validate_user_id};
use kibble_core::{CartLine, CoreError, Money, Product};

const CART_LINE_SELECT: &str = r#"
    SELECT
        c.id,
        c.user_id,
        c.product_id,
        c.quantity,
        c.created_at,
        p.name AS product_name,
        p.description AS product_description,
        p.brand AS product_brand,
        p.price_cents AS product_price_cents,
        p.stock AS product_stock,
        p.created_at AS product_created_at,
        p.updated_at AS product_updated_at
    FROM carts c
    INNER JOIN products p ON p.id = c.product_id
"#;

/// Repository for cart lines.
#[derive(Debug, Clone)]
pub struct CartItemRepository {
    pool: SqlitePool,
}

impl CartItemRepository {
    /// Creates a new CartItemRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CartItemRepository { pool }
    }

    /// Pool-backed form of [`CartRepository::list_by_user`].
    pub async fn list(&self, user_id: &str) -> DbResult<Vec<CartLine>> {
        let mut conn = self.pool.acquire().await?;
        self.list_by_user(&mut *conn, user_id).await
    }

    /// Pool-backed form of [`CartRepository::clear_by_user`].
    pub async fn clear(&self, user_id: &str) -> DbResult<u64> {
        let mut conn = self.pool.acquire().await?;
        self.clear_by_user(&mut *conn, user_id).await
    }

    /// Adds `quantity` units of a product to the user's cart.
    ///
    /// An existing line for the same product is incremented rather than
    /// duplicated.
    ///
    /// ## Errors
    /// * `Validation` - bad user id or quantity
    /// * `NotFound` - unknown product
    /// * `InsufficientStock` - resulting quantity exceeds current stock
    pub async fn add_item(
        &self,
        user_id: &str,
        product_id: &str,
        quantity: i64,
    ) -> CheckoutResult<CartLine> {
        validate_user_id(user_id)?;
        validate_quantity(quantity)?;

        let mut tx = begin_write(&self.pool).await?;

        let product = ProductRepository::new(self.pool.clone())
            .get_product(&mut *tx, product_id)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()))?;

        let existing: Option<i64> = sqlx::query_scalar(
            "SELECT quantity FROM carts WHERE user_id = ?1 AND product_id = ?2",
        )
        .bind(user_id)
        .bind(product_id)
        .fetch_optional(&mut *tx)
        .await?;

        let total_quantity = existing.unwrap_or(0) + quantity;
        validate_quantity(total_quantity)?;
        check_stock(&product, total_quantity)?;

        let line_id: String = sqlx::query_scalar(
            r#"
            INSERT INTO carts (id, user_id, product_id, quantity, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT (user_id, product_id)
            DO UPDATE SET quantity = carts.quantity + excluded.quantity
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(user_id)
        .bind(product_id)
        .bind(quantity)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        let line = fetch_line(&mut *tx, user_id, &line_id)
            .await?
            .ok_or_else(|| CheckoutError::not_found("CartItem", &line_id))?;

        tx.commit().await.map_err(DbError::transaction)?;

        debug!(user_id = %user_id, product_id = %product_id, quantity = line.quantity, "Cart line saved");
        Ok(line)
    }

    /// Sets the quantity of one of the user's cart lines.
    ///
    /// ## Errors
    /// * `NotFound` - no such line for this user
    /// * `InsufficientStock` - quantity exceeds current stock
    pub async fn update_quantity(
        &self,
        user_id: &str,
        cart_item_id: &str,
        quantity: i64,
    ) -> CheckoutResult<CartLine> {
        validate_user_id(user_id)?;
        validate_quantity(quantity)?;

        let mut tx = begin_write(&self.pool).await?;

        let mut line = fetch_line(&mut *tx, user_id, cart_item_id)
            .await?
            .ok_or_else(|| CheckoutError::not_found("CartItem", cart_item_id))?;

        check_stock(&line.product, quantity)?;

        sqlx::query("UPDATE carts SET quantity = ?3 WHERE id = ?1 AND user_id = ?2")
            .bind(cart_item_id)
            .bind(user_id)
            .bind(quantity)
            .execute(&mut *tx)
            .await?;

        tx.commit().await.map_err(DbError::transaction)?;

        line.quantity = quantity;
        Ok(line)
    }

    /// Removes one of the user's cart lines.
    ///
    /// A line owned by another user is reported as `NotFound`.
    pub async fn remove_item(&self, user_id: &str, cart_item_id: &str) -> CheckoutResult<()> {
        let result = sqlx::query("DELETE FROM carts WHERE id = ?1 AND user_id = ?2")
            .bind(cart_item_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(CheckoutError::not_found("CartItem", cart_item_id));
        }

        debug!(user_id = %user_id, cart_item_id = %cart_item_id, "Cart line removed");
        Ok(())
    }

    /// Σ quantity × current catalog price over the user's cart.
    pub async fn cart_total(&self, user_id: &str) -> CheckoutResult<Money> {
        let lines = self.list(user_id).await?;

        lines.iter().try_fold(Money::zero(), |total, line| {
            line.product
                .price()
                .checked_multiply_quantity(line.quantity)
                .and_then(|line_total| total.checked_add(line_total))
                .ok_or_else(|| CoreError::AmountOverflow.into())
        })
    }
}

#[async_trait]
impl CartRepository for CartItemRepository {
    async fn list_by_user(&self, conn: &mut SqliteConnection, user_id: &str) -> DbResult<Vec<CartLine>> {
        let rows = sqlx::query(&format!("{CART_LINE_SELECT} WHERE c.user_id = ?1 ORDER BY c.rowid"))
            .bind(user_id)
            .fetch_all(&mut *conn)
            .await?;

        let lines = rows
            .iter()
            .map(row_to_cart_line)
            .collect::<Result<Vec<_>, _>>()?;

        debug!(user_id = %user_id, count = lines.len(), "Loaded cart");
        Ok(lines)
    }

    async fn clear_by_user(&self, conn: &mut SqliteConnection, user_id: &str) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM carts WHERE user_id = ?1")
            .bind(user_id)
            .execute(&mut *conn)
            .await?;

        info!(user_id = %user_id, removed = result.rows_affected(), "Cart cleared");
        Ok(result.rows_affected())
    }
}

async fn fetch_line(
    conn: &mut SqliteConnection,
    user_id: &str,
    line_id: &str,
) -> DbResult<Option<CartLine>> {
    let row = sqlx::query(&format!("{CART_LINE_SELECT} WHERE c.id = ?1 AND c.user_id = ?2"))
        .bind(line_id)
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(row.as_ref().map(row_to_cart_line).transpose()?)
}

fn check_stock(product: &Product, quantity: i64) -> Result<(), CoreError> {
    if product.has_stock_for(quantity) {
        return Ok(());
    }

    Err(CoreError::InsufficientStock {
        product_name: product.name.clone(),
        available: product.stock,
        requested: quantity,
    })
}

fn row_to_cart_line(row: &SqliteRow) -> Result<CartLine, sqlx::Error> {
    let product_id: String = row.try_get("product_id")?;

    Ok(CartLine {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        quantity: row.try_get("quantity")?,
        created_at: row.try_get("created_at")?,
        product: Product {
            id: product_id.clone(),
            name: row.try_get("product_name")?,
            description: row.try_get("product_description")?,
            brand: row.try_get("product_brand")?,
            price_cents: row.try_get("product_price_cents")?,
            stock: row.try_get("product_stock")?,
            created_at: row.try_get("product_created_at")?,
            updated_at: row.try_get("product_updated_at")?,
        },
        product_id,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
