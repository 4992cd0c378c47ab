//! Integration tests for the checkout transaction.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use sqlx::SqliteConnection;
use tempfile::TempDir;

use kibble_core::{NewOrder, NewOrderItem, Order, OrderItem, OrderStatus, Product, StockDecrement};
use kibble_db::repository::product::new_product;
use kibble_db::{
    CartItemRepository, CheckoutError, CheckoutService, Database, DbConfig, DbError, DbResult,
    OrderLedger, OrderRepository, ProductRepository, StockLedger,
};

// =============================================================================
// Harness
// =============================================================================

struct TestHarness {
    db: Database,
    _dir: Option<TempDir>,
}

impl TestHarness {
    async fn in_memory() -> Self {
        Self {
            db: Database::new(DbConfig::in_memory()).await.unwrap(),
            _dir: None,
        }
    }

    /// File-backed WAL database with several connections, for races.
    async fn on_disk(max_connections: u32) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = DbConfig::new(dir.path().join("kibble.db"))
            .max_connections(max_connections)
            .busy_timeout(Duration::from_secs(10));

        Self {
            db: Database::new(config).await.unwrap(),
            _dir: Some(dir),
        }
    }

    async fn product(&self, name: &str, price_cents: i64, stock: i64) -> Product {
        self.db
            .products()
            .insert(&new_product(name, price_cents, stock))
            .await
            .unwrap()
    }

    async fn add(&self, user_id: &str, product: &Product, quantity: i64) {
        self.db
            .carts()
            .add_item(user_id, &product.id, quantity)
            .await
            .unwrap();
    }

    async fn stock(&self, product: &Product) -> i64 {
        self.db
            .products()
            .get_by_id(&product.id)
            .await
            .unwrap()
            .unwrap()
            .stock
    }

    async fn order_rows(&self) -> (i64, i64) {
        (
            self.db.orders().count().await.unwrap(),
            self.db.orders().count_items().await.unwrap(),
        )
    }
}

// =============================================================================
// Fault injection
// =============================================================================

enum Fault {
    Insufficient,
    Storage,
}

/// Delegates to the SQLite stock ledger but fails the `fail_on`-th call (1-based).
struct FailingStock {
    inner: ProductRepository,
    fail_on: usize,
    fault: Fault,
    calls: AtomicUsize,
}

#[async_trait]
impl StockLedger for FailingStock {
    async fn decrement_if_available(
        &self,
        conn: &mut SqliteConnection,
        product_id: &str,
        quantity: i64,
    ) -> DbResult<StockDecrement> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call == self.fail_on {
            return match self.fault {
                Fault::Insufficient => Ok(StockDecrement::Insufficient { available: 0 }),
                Fault::Storage => Err(DbError::QueryFailed("disk I/O error".to_string())),
            };
        }
        self.inner.decrement_if_available(conn, product_id, quantity).await
    }
}

enum ItemFault {
    /// `create_items` returns an error.
    Reject,
    /// Items are written with foreign keys deferred plus one row pointing at
    /// a product that does not exist, so COMMIT itself fails.
    DanglingAtCommit,
}

/// Order ledger whose `create_items` misbehaves according to `fault`.
struct FailingItems {
    inner: OrderRepository,
    fault: ItemFault,
}

#[async_trait]
impl OrderLedger for FailingItems {
    async fn create_order(&self, conn: &mut SqliteConnection, order: NewOrder) -> DbResult<Order> {
        self.inner.create_order(conn, order).await
    }

    async fn create_items(
        &self,
        conn: &mut SqliteConnection,
        order_id: &str,
        items: &[NewOrderItem],
    ) -> DbResult<Vec<OrderItem>> {
        match self.fault {
            ItemFault::Reject => Err(DbError::QueryFailed("database is locked".to_string())),
            ItemFault::DanglingAtCommit => {
                sqlx::query("PRAGMA defer_foreign_keys = ON")
                    .execute(&mut *conn)
                    .await?;
                let created = self.inner.create_items(&mut *conn, order_id, items).await?;
                sqlx::query(
                    "INSERT INTO order_items (id, order_id, product_id, quantity, price_cents, created_at) \
                     VALUES ('dangling-item', ?1, 'no-such-product', 1, 0, '2026-01-01T00:00:00Z')",
                )
                .bind(order_id)
                .execute(&mut *conn)
                .await?;
                Ok(created)
            }
        }
    }

    async fn get_order(&self, conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Order>> {
        self.inner.get_order(conn, id).await
    }

    async fn get_items(&self, conn: &mut SqliteConnection, order_id: &str) -> DbResult<Vec<OrderItem>> {
        self.inner.get_items(conn, order_id).await
    }

    async fn list_by_user(&self, conn: &mut SqliteConnection, user_id: &str) -> DbResult<Vec<Order>> {
        self.inner.list_by_user(conn, user_id).await
    }

    async fn list_all(&self, conn: &mut SqliteConnection) -> DbResult<Vec<Order>> {
        self.inner.list_all(conn).await
    }

    async fn update_status(
        &self,
        conn: &mut SqliteConnection,
        id: &str,
        expected: OrderStatus,
        new: OrderStatus,
    ) -> DbResult<Order> {
        self.inner.update_status(conn, id, expected, new).await
    }
}

fn checkout_with_stock(
    db: &Database,
    stock: FailingStock,
) -> CheckoutService<ProductRepository, FailingStock, CartItemRepository, OrderRepository> {
    CheckoutService::new(
        db.pool().clone(),
        db.products(),
        stock,
        db.carts(),
        db.orders(),
    )
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn test_two_line_checkout_totals_and_stock() {
    let h = TestHarness::in_memory().await;
    let a = h.product("productA", 100, 5).await;
    let b = h.product("productB", 50, 1).await;
    h.add("user-1", &a, 2).await;
    h.add("user-1", &b, 1).await;

    let details = h
        .db
        .checkout()
        .place_order("user-1", "123 Main St")
        .await
        .unwrap();

    assert_eq!(details.order.total_cents, 250);
    assert_eq!(details.order.status, OrderStatus::Pending);
    assert_eq!(details.order.shipping_address, "123 Main St");
    assert_eq!(h.stock(&a).await, 3);
    assert_eq!(h.stock(&b).await, 0);
    assert!(h.db.carts().list("user-1").await.unwrap().is_empty());

    let lines: Vec<_> = details
        .items
        .iter()
        .map(|l| (l.product.name.as_str(), l.item.quantity, l.item.price_cents))
        .collect();
    assert_eq!(lines, vec![("productA", 2, 100), ("productB", 1, 50)]);
}

#[tokio::test]
async fn test_total_equals_sum_of_items() {
    let h = TestHarness::in_memory().await;
    let products = [
        h.product("Salmon Kibble", 1299, 20).await,
        h.product("Tuna Pate", 129, 200).await,
        h.product("Catnip", 0, 3).await,
    ];
    h.add("user-1", &products[0], 3).await;
    h.add("user-1", &products[1], 24).await;
    h.add("user-1", &products[2], 1).await;

    let details = h.db.checkout().place_order("user-1", "5 Elm Rd").await.unwrap();

    let sum: i64 = details
        .items
        .iter()
        .map(|l| l.item.quantity * l.item.price_cents)
        .sum();
    assert_eq!(details.order.total_cents, sum);
    assert_eq!(details.items_total(), details.order.total());

    // Stored rows agree with the returned ones
    let stored = h.db.orders().items(&details.order.id).await.unwrap();
    let stored_sum: i64 = stored.iter().map(|i| i.quantity * i.price_cents).sum();
    assert_eq!(stored_sum, details.order.total_cents);
}

#[tokio::test]
async fn test_insufficient_stock_names_product_and_changes_nothing() {
    let h = TestHarness::in_memory().await;
    let c = h.product("productC", 100, 3).await;
    // Cart add only checks stock advisorily, so write the line directly
    sqlx::query(
        "INSERT INTO carts (id, user_id, product_id, quantity, created_at) VALUES ('line-1', 'user-1', ?1, 10, '2026-01-01T00:00:00Z')",
    )
    .bind(&c.id)
    .execute(h.db.pool())
    .await
    .unwrap();

    let err = h
        .db
        .checkout()
        .place_order("user-1", "123 Main St")
        .await
        .unwrap_err();

    match err {
        CheckoutError::InsufficientStock {
            ref product_name,
            available,
            requested,
        } => {
            assert_eq!(product_name, "productC");
            assert_eq!(available, 3);
            assert_eq!(requested, 10);
        }
        other => panic!("expected InsufficientStock, got {other:?}"),
    }
    assert_eq!(err.to_string(), "Insufficient stock for product: productC");

    assert_eq!(h.stock(&c).await, 3);
    assert_eq!(h.order_rows().await, (0, 0));
    assert_eq!(h.db.carts().list("user-1").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_empty_cart_creates_nothing() {
    let h = TestHarness::in_memory().await;
    let a = h.product("productA", 100, 5).await;
    h.add("someone-else", &a, 1).await;

    let err = h
        .db
        .checkout()
        .place_order("user-1", "123 Main St")
        .await
        .unwrap_err();

    assert!(matches!(err, CheckoutError::EmptyCart));
    assert_eq!(h.order_rows().await, (0, 0));
    assert_eq!(h.stock(&a).await, 5);
}

#[tokio::test]
async fn test_cart_empty_after_checkout_and_second_checkout_is_empty_cart() {
    let h = TestHarness::in_memory().await;
    let a = h.product("productA", 100, 5).await;
    h.add("user-1", &a, 1).await;

    let checkout = h.db.checkout();
    checkout.place_order("user-1", "123 Main St").await.unwrap();

    assert!(h.db.carts().list("user-1").await.unwrap().is_empty());
    assert!(matches!(
        checkout.place_order("user-1", "123 Main St").await,
        Err(CheckoutError::EmptyCart)
    ));
    assert_eq!(h.order_rows().await, (1, 1));
}

// =============================================================================
// Rollback
// =============================================================================

async fn three_line_cart(h: &TestHarness) -> [Product; 3] {
    let products = [
        h.product("line-1", 100, 10).await,
        h.product("line-2", 200, 10).await,
        h.product("line-3", 300, 10).await,
    ];
    for p in &products {
        h.add("user-1", p, 2).await;
    }
    products
}

async fn assert_untouched(h: &TestHarness, products: &[Product]) {
    assert_eq!(h.order_rows().await, (0, 0));
    for p in products {
        assert_eq!(h.stock(p).await, 10, "stock of {} changed", p.name);
    }
    assert_eq!(h.db.carts().list("user-1").await.unwrap().len(), products.len());
}

#[tokio::test]
async fn test_kth_line_insufficient_rolls_back_everything() {
    for k in 1..=3 {
        let h = TestHarness::in_memory().await;
        let products = three_line_cart(&h).await;

        let checkout = checkout_with_stock(
            &h.db,
            FailingStock {
                inner: h.db.products(),
                fail_on: k,
                fault: Fault::Insufficient,
                calls: AtomicUsize::new(0),
            },
        );

        let err = checkout.place_order("user-1", "123 Main St").await.unwrap_err();
        match err {
            CheckoutError::InsufficientStock { product_name, .. } => {
                assert_eq!(product_name, format!("line-{k}"));
            }
            other => panic!("expected InsufficientStock, got {other:?}"),
        }

        assert_untouched(&h, &products).await;
    }
}

#[tokio::test]
async fn test_kth_line_storage_failure_rolls_back_everything() {
    let h = TestHarness::in_memory().await;
    let products = three_line_cart(&h).await;

    let checkout = checkout_with_stock(
        &h.db,
        FailingStock {
            inner: h.db.products(),
            fail_on: 3,
            fault: Fault::Storage,
            calls: AtomicUsize::new(0),
        },
    );

    let err = checkout.place_order("user-1", "123 Main St").await.unwrap_err();
    assert!(matches!(err, CheckoutError::StorageFailure(_)));

    assert_untouched(&h, &products).await;
}

#[tokio::test]
async fn test_item_write_failure_rolls_back_header() {
    let h = TestHarness::in_memory().await;
    let products = three_line_cart(&h).await;

    let checkout = CheckoutService::new(
        h.db.pool().clone(),
        h.db.products(),
        h.db.products(),
        h.db.carts(),
        FailingItems {
            inner: h.db.orders(),
            fault: ItemFault::Reject,
        },
    );

    let err = checkout.place_order("user-1", "123 Main St").await.unwrap_err();
    assert!(matches!(err, CheckoutError::StorageFailure(_)));

    assert_untouched(&h, &products).await;
}

#[tokio::test]
async fn test_commit_failure_is_storage_failure_and_rolls_back() {
    let h = TestHarness::in_memory().await;
    let products = three_line_cart(&h).await;

    let checkout = CheckoutService::new(
        h.db.pool().clone(),
        h.db.products(),
        h.db.products(),
        h.db.carts(),
        FailingItems {
            inner: h.db.orders(),
            fault: ItemFault::DanglingAtCommit,
        },
    );

    // Every step inside the transaction succeeds; only COMMIT is refused
    let err = checkout.place_order("user-1", "123 Main St").await.unwrap_err();
    assert!(
        matches!(err, CheckoutError::StorageFailure(DbError::TransactionFailed(_))),
        "got {err:?}"
    );
    assert!(err.is_retryable());

    assert_untouched(&h, &products).await;

    // The connection is usable again and the real ledger still works
    let placed = h.db.checkout().place_order("user-1", "123 Main St").await.unwrap();
    assert_eq!(placed.items.len(), 3);
    assert_eq!(h.order_rows().await, (1, 3));
}

#[tokio::test]
async fn test_vanished_product_is_not_found_and_rolls_back() {
    let h = TestHarness::in_memory().await;
    let products = three_line_cart(&h).await;

    // The pre-check passes, then the second product's row disappears
    struct VanishingStock {
        inner: ProductRepository,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl StockLedger for VanishingStock {
        async fn decrement_if_available(
            &self,
            conn: &mut SqliteConnection,
            product_id: &str,
            quantity: i64,
        ) -> DbResult<StockDecrement> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 1 {
                return Ok(StockDecrement::NotFound);
            }
            self.inner.decrement_if_available(conn, product_id, quantity).await
        }
    }

    let checkout = CheckoutService::new(
        h.db.pool().clone(),
        h.db.products(),
        VanishingStock {
            inner: h.db.products(),
            calls: AtomicUsize::new(0),
        },
        h.db.carts(),
        h.db.orders(),
    );

    let err = checkout.place_order("user-1", "123 Main St").await.unwrap_err();
    assert!(matches!(err, CheckoutError::NotFound { ref entity, .. } if entity == "Product"));

    assert_untouched(&h, &products).await;
}

// =============================================================================
// Status updates
// =============================================================================

#[tokio::test]
async fn test_unknown_status_is_rejected_and_order_unchanged() {
    let h = TestHarness::in_memory().await;
    let a = h.product("productA", 100, 5).await;
    h.add("user-1", &a, 1).await;
    let checkout = h.db.checkout();
    let placed = checkout.place_order("user-1", "123 Main St").await.unwrap();

    let err = checkout
        .update_order_status(&placed.order.id, "archived")
        .await
        .unwrap_err();
    assert!(matches!(err, CheckoutError::InvalidStatus(ref s) if s == "archived"));

    let stored = h.db.orders().get_by_id(&placed.order.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Pending);
    assert_eq!(stored.updated_at, placed.order.updated_at);
}

#[tokio::test]
async fn test_cancel_from_pending_and_processing() {
    let h = TestHarness::in_memory().await;
    let a = h.product("productA", 100, 5).await;
    let checkout = h.db.checkout();

    h.add("user-1", &a, 1).await;
    let first = checkout.place_order("user-1", "1 First St").await.unwrap();
    h.add("user-1", &a, 1).await;
    let second = checkout.place_order("user-1", "1 First St").await.unwrap();

    let cancelled = checkout
        .update_order_status(&first.order.id, "cancelled")
        .await
        .unwrap();
    assert_eq!(cancelled.order.status, OrderStatus::Cancelled);

    checkout
        .update_order_status(&second.order.id, "processing")
        .await
        .unwrap();
    let cancelled = checkout
        .update_order_status(&second.order.id, "cancelled")
        .await
        .unwrap();
    assert_eq!(cancelled.order.status, OrderStatus::Cancelled);

    // Total and address survive status changes
    assert_eq!(cancelled.order.total_cents, second.order.total_cents);
    assert_eq!(cancelled.order.shipping_address, "1 First St");
}

// =============================================================================
// Price snapshot
// =============================================================================

#[tokio::test]
async fn test_price_change_does_not_touch_placed_orders() {
    let h = TestHarness::in_memory().await;
    let a = h.product("productA", 100, 5).await;
    h.add("user-1", &a, 2).await;
    let checkout = h.db.checkout();
    let placed = checkout.place_order("user-1", "123 Main St").await.unwrap();

    h.db.products().update_price(&a.id, 999).await.unwrap();

    let fetched = checkout.get_order("user-1", &placed.order.id).await.unwrap();
    assert_eq!(fetched.order.total_cents, 200);
    assert_eq!(fetched.items[0].item.price_cents, 100);
    // The joined product shows the live catalog price
    assert_eq!(fetched.items[0].product.price_cents, 999);
    assert_eq!(fetched.items_total().cents(), 200);
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_two_users_race_for_last_unit() {
    let h = TestHarness::on_disk(4).await;
    let last = h.product("Last Bag of Kibble", 1299, 1).await;
    h.add("alice", &last, 1).await;
    h.add("bob", &last, 1).await;

    let spawn = |user: &'static str| {
        let db = h.db.clone();
        tokio::spawn(async move { db.checkout().place_order(user, "1 Race Way").await })
    };
    let (alice, bob) = tokio::join!(spawn("alice"), spawn("bob"));
    let results = [alice.unwrap(), bob.unwrap()];

    let successes = results.iter().filter(|r| r.is_ok()).count();
    let shortages = results
        .iter()
        .filter(|r| matches!(r, Err(CheckoutError::InsufficientStock { .. })))
        .count();

    assert_eq!(successes, 1, "results: {results:?}");
    assert_eq!(shortages, 1, "results: {results:?}");
    assert_eq!(h.stock(&last).await, 0);
    assert_eq!(h.order_rows().await, (1, 1));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_many_buyers_never_oversell() {
    let h = TestHarness::on_disk(6).await;
    let scarce = h.product("Limited Treats", 450, 3).await;

    let users: Vec<String> = (0..8).map(|i| format!("buyer-{i}")).collect();
    for user in &users {
        h.add(user, &scarce, 1).await;
    }

    let handles: Vec<_> = users
        .iter()
        .cloned()
        .map(|user| {
            let db = h.db.clone();
            tokio::spawn(async move { db.checkout().place_order(&user, "9 Queue St").await })
        })
        .collect();

    let mut successes = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(CheckoutError::InsufficientStock { .. }) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    assert_eq!(successes, 3);
    assert_eq!(h.stock(&scarce).await, 0);
    assert_eq!(h.order_rows().await, (3, 3));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_status_updates_on_distinct_orders() {
    let h = TestHarness::on_disk(8).await;
    let kibble = h.product("Salmon Kibble", 1299, 100).await;
    let checkout = h.db.checkout();

    let mut order_ids = Vec::new();
    for i in 0..32 {
        let user = format!("user-{i}");
        h.add(&user, &kibble, 1).await;
        let placed = checkout.place_order(&user, "7 Depot Rd").await.unwrap();
        order_ids.push(placed.order.id);
    }

    let handles: Vec<_> = order_ids
        .iter()
        .cloned()
        .map(|id| {
            let db = h.db.clone();
            tokio::spawn(async move { db.checkout().update_order_status(&id, "processing").await })
        })
        .collect();

    for handle in handles {
        let details = handle.await.unwrap().unwrap();
        assert_eq!(details.order.status, OrderStatus::Processing);
    }

    for order in h.db.checkout().list_all_orders().await.unwrap() {
        assert_eq!(order.order.status, OrderStatus::Processing);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_cart_adds_all_land() {
    let h = TestHarness::on_disk(8).await;
    let treats = h.product("Dental Chews", 650, 999).await;

    // Distinct users, then one user hammering the same line
    let users: Vec<String> = (0..16)
        .map(|i| format!("shopper-{i}"))
        .chain((0..16).map(|_| "regular".to_string()))
        .collect();

    let handles: Vec<_> = users
        .into_iter()
        .map(|user| {
            let db = h.db.clone();
            let product_id = treats.id.clone();
            tokio::spawn(async move { db.carts().add_item(&user, &product_id, 1).await })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    for i in 0..16 {
        let lines = h.db.carts().list(&format!("shopper-{i}")).await.unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].quantity, 1);
    }
    let regular = h.db.carts().list("regular").await.unwrap();
    assert_eq!(regular.len(), 1);
    assert_eq!(regular[0].quantity, 16);
}
