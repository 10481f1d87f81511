//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p store --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;

use chrono::Utc;
use common::{BuyerId, OrderId, ProductId, SellerId};
use domain::{Cart, Money, Order, OrderItem, OrderNumber, OrderState, ShippingDetails};
use sqlx::PgPool;
use store::{MarketStore, PostgresMarketStore, ProductRecord, StoreError};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            // Create a temporary pool just for migrations
            let temp_pool = PgPool::connect(&connection_string).await.unwrap();

            // Run migrations using raw_sql to execute multiple statements
            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_marketplace_tables.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();

            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and cleared tables
async fn get_test_store() -> PostgresMarketStore {
    let info = get_container_info().await;

    // Create a fresh pool for each test to avoid connection issues
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    // Clear tables for test isolation
    sqlx::query(
        "TRUNCATE TABLE order_items, orders, cart_items, carts, order_counters, products",
    )
    .execute(&pool)
    .await
    .unwrap();

    PostgresMarketStore::new(pool)
}

fn test_product(stock: u32, price_cents: i64) -> ProductRecord {
    ProductRecord {
        id: ProductId::new(),
        name: "Widget".to_string(),
        image: Some("widget.jpg".to_string()),
        seller_id: SellerId::new(),
        seller_name: "Acme".to_string(),
        price: Money::from_cents(price_cents),
        discount_price: None,
        stock,
        sellable: true,
    }
}

fn snapshot(product: &ProductRecord, quantity: u32) -> OrderItem {
    OrderItem::new(
        product.id,
        product.name.clone(),
        product.image.clone(),
        product.seller_id,
        product.seller_name.clone(),
        quantity,
        product.effective_price(),
    )
}

fn test_order(buyer: BuyerId, sequence: u32, items: Vec<OrderItem>) -> Order {
    Order::create(
        OrderId::new(),
        buyer,
        OrderNumber::new(Utc::now().date_naive(), sequence),
        items,
        ShippingDetails {
            address: "123 Main St".to_string(),
            phone: "555-0100".to_string(),
            payment_method: "card".to_string(),
        },
        Some("leave at the door".to_string()),
        Utc::now(),
    )
    .unwrap()
}

#[tokio::test]
async fn product_roundtrip() {
    let store = get_test_store().await;
    let mut product = test_product(10, 2599);
    product.discount_price = Some(Money::from_cents(1999));
    store.upsert_product(&product).await.unwrap();

    let loaded = store.get_product(product.id).await.unwrap().unwrap();
    assert_eq!(loaded, product);
    assert_eq!(loaded.effective_price(), Money::from_cents(1999));

    assert!(store.get_product(ProductId::new()).await.unwrap().is_none());
}

#[tokio::test]
async fn cart_roundtrip() {
    let store = get_test_store().await;
    let buyer = BuyerId::new();

    assert!(store.get_cart(buyer).await.unwrap().is_none());

    let first = ProductId::new();
    let second = ProductId::new();
    let mut cart = Cart::new(buyer, Utc::now());
    cart.add_item(first, 2, Money::from_cents(1000), Utc::now())
        .unwrap();
    cart.add_item(second, 1, Money::from_cents(500), Utc::now())
        .unwrap();
    store.save_cart(&cart).await.unwrap();

    let loaded = store.get_cart(buyer).await.unwrap().unwrap();
    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded.total(), Money::from_cents(2500));
    // Lines come back in the order they were added.
    let ids: Vec<_> = loaded.items().map(|i| i.product_id).collect();
    assert_eq!(ids, vec![first, second]);

    // Saving again replaces the items wholesale.
    cart.clear(Utc::now());
    store.save_cart(&cart).await.unwrap();
    let loaded = store.get_cart(buyer).await.unwrap().unwrap();
    assert!(loaded.is_empty());
}

#[tokio::test]
async fn sequence_starts_at_one_per_day() {
    let store = get_test_store().await;
    let today = Utc::now().date_naive();

    assert_eq!(store.next_order_sequence(today).await.unwrap(), 1);
    assert_eq!(store.next_order_sequence(today).await.unwrap(), 2);
    assert_eq!(store.next_order_sequence(today).await.unwrap(), 3);

    let tomorrow = today.succ_opt().unwrap();
    assert_eq!(store.next_order_sequence(tomorrow).await.unwrap(), 1);
}

#[tokio::test]
async fn concurrent_sequences_are_distinct() {
    let store = get_test_store().await;
    let today = Utc::now().date_naive();

    let mut handles = Vec::new();
    for _ in 0..20 {
        let store = store.clone();
        handles.push(tokio::spawn(
            async move { store.next_order_sequence(today).await },
        ));
    }

    let mut seen = std::collections::HashSet::new();
    for handle in handles {
        let seq = handle.await.unwrap().unwrap();
        assert!(seen.insert(seq), "duplicate sequence {seq}");
    }
    assert_eq!(seen.len(), 20);
}

#[tokio::test]
async fn commit_checkout_roundtrip() {
    let store = get_test_store().await;
    let product = test_product(10, 1000);
    store.upsert_product(&product).await.unwrap();

    let buyer = BuyerId::new();
    let mut cart = Cart::new(buyer, Utc::now());
    cart.add_item(product.id, 3, product.effective_price(), Utc::now())
        .unwrap();
    store.save_cart(&cart).await.unwrap();

    let order = test_order(buyer, 1, vec![snapshot(&product, 3)]);
    let levels = store.commit_checkout(&order).await.unwrap();

    assert_eq!(levels.len(), 1);
    assert_eq!(levels[0].remaining, 7);

    let loaded = store.get_order(order.id()).await.unwrap().unwrap();
    assert_eq!(loaded.order_number(), order.order_number());
    assert_eq!(loaded.total(), Money::from_cents(3000));
    assert_eq!(loaded.state(), OrderState::Pending);
    assert_eq!(loaded.items().len(), 1);
    assert_eq!(loaded.items()[0].product_name, "Widget");
    assert_eq!(loaded.notes(), Some("leave at the door"));

    // Stock decremented and cart emptied.
    let reloaded = store.get_product(product.id).await.unwrap().unwrap();
    assert_eq!(reloaded.stock, 7);
    assert!(store.get_cart(buyer).await.unwrap().unwrap().is_empty());
}

#[tokio::test]
async fn commit_checkout_is_all_or_nothing() {
    let store = get_test_store().await;
    let in_stock = test_product(5, 1000);
    let sold_out = test_product(0, 500);
    store.upsert_product(&in_stock).await.unwrap();
    store.upsert_product(&sold_out).await.unwrap();

    let order = test_order(
        BuyerId::new(),
        1,
        vec![snapshot(&in_stock, 3), snapshot(&sold_out, 1)],
    );
    let result = store.commit_checkout(&order).await;

    match result {
        Err(StoreError::InsufficientStock {
            product_id,
            available,
            requested,
        }) => {
            assert_eq!(product_id, sold_out.id);
            assert_eq!(available, 0);
            assert_eq!(requested, 1);
        }
        other => panic!("expected InsufficientStock, got {other:?}"),
    }

    // The first item's decrement was rolled back.
    let reloaded = store.get_product(in_stock.id).await.unwrap().unwrap();
    assert_eq!(reloaded.stock, 5);
    assert!(store.get_order(order.id()).await.unwrap().is_none());
}

#[tokio::test]
async fn commit_checkout_missing_product() {
    let store = get_test_store().await;
    let ghost = test_product(5, 1000);
    // Never inserted.

    let order = test_order(BuyerId::new(), 1, vec![snapshot(&ghost, 1)]);
    let result = store.commit_checkout(&order).await;
    assert!(matches!(result, Err(StoreError::ProductNotFound(id)) if id == ghost.id));
}

#[tokio::test]
async fn duplicate_order_number_rejected() {
    let store = get_test_store().await;
    let product = test_product(10, 1000);
    store.upsert_product(&product).await.unwrap();

    let first = test_order(BuyerId::new(), 1, vec![snapshot(&product, 1)]);
    store.commit_checkout(&first).await.unwrap();

    let second = test_order(BuyerId::new(), 1, vec![snapshot(&product, 1)]);
    let result = store.commit_checkout(&second).await;
    assert!(matches!(result, Err(StoreError::DuplicateOrderNumber(_))));

    // The duplicate's stock decrement was rolled back.
    let reloaded = store.get_product(product.id).await.unwrap().unwrap();
    assert_eq!(reloaded.stock, 9);
}

#[tokio::test]
async fn concurrent_commits_never_oversell() {
    let store = get_test_store().await;
    let product = test_product(3, 1000);
    store.upsert_product(&product).await.unwrap();

    let mut handles = Vec::new();
    for i in 0..8u32 {
        let store = store.clone();
        let product = product.clone();
        handles.push(tokio::spawn(async move {
            let order = test_order(BuyerId::new(), i + 1, vec![snapshot(&product, 1)]);
            store.commit_checkout(&order).await
        }));
    }

    let mut successes = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(StoreError::InsufficientStock { .. }) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    assert_eq!(successes, 3);
    let reloaded = store.get_product(product.id).await.unwrap().unwrap();
    assert_eq!(reloaded.stock, 0);
}

#[tokio::test]
async fn cancellation_restores_stock_once() {
    let store = get_test_store().await;
    let product = test_product(5, 1000);
    store.upsert_product(&product).await.unwrap();

    let mut order = test_order(BuyerId::new(), 1, vec![snapshot(&product, 2)]);
    store.commit_checkout(&order).await.unwrap();

    order.cancel("changed my mind", Utc::now()).unwrap();
    let missing = store
        .commit_cancellation(&order, OrderState::Pending)
        .await
        .unwrap();
    assert!(missing.is_empty());

    let reloaded = store.get_product(product.id).await.unwrap().unwrap();
    assert_eq!(reloaded.stock, 5);

    // A second commit against the same observed state is rejected and
    // restores nothing.
    let result = store.commit_cancellation(&order, OrderState::Pending).await;
    assert!(matches!(
        result,
        Err(StoreError::StaleOrderState {
            expected: OrderState::Pending,
            actual: OrderState::Cancelled,
            ..
        })
    ));
    let reloaded = store.get_product(product.id).await.unwrap().unwrap();
    assert_eq!(reloaded.stock, 5);
}

#[tokio::test]
async fn cancellation_skips_deleted_products() {
    let store = get_test_store().await;
    let kept = test_product(5, 1000);
    let deleted = test_product(5, 500);
    store.upsert_product(&kept).await.unwrap();
    store.upsert_product(&deleted).await.unwrap();

    let mut order = test_order(
        BuyerId::new(),
        1,
        vec![snapshot(&kept, 1), snapshot(&deleted, 2)],
    );
    store.commit_checkout(&order).await.unwrap();

    sqlx::query("DELETE FROM products WHERE id = $1")
        .bind(deleted.id.as_uuid())
        .execute(store.pool())
        .await
        .unwrap();

    order.cancel("test", Utc::now()).unwrap();
    let missing = store
        .commit_cancellation(&order, OrderState::Pending)
        .await
        .unwrap();

    assert_eq!(missing, vec![deleted.id]);
    let reloaded = store.get_product(kept.id).await.unwrap().unwrap();
    assert_eq!(reloaded.stock, 5);
}

#[tokio::test]
async fn update_order_persists_lifecycle_fields() {
    let store = get_test_store().await;
    let product = test_product(10, 1000);
    store.upsert_product(&product).await.unwrap();

    let mut order = test_order(BuyerId::new(), 1, vec![snapshot(&product, 1)]);
    store.commit_checkout(&order).await.unwrap();

    order.transition(OrderState::Confirmed, Utc::now()).unwrap();
    order.append_note("payment verified", Utc::now());
    store.update_order(&order, OrderState::Pending).await.unwrap();

    let loaded = store.get_order(order.id()).await.unwrap().unwrap();
    assert_eq!(loaded.state(), OrderState::Confirmed);
    assert!(loaded.estimated_delivery_at().is_some());
    assert!(loaded.notes().unwrap().contains("payment verified"));

    order.cancel("changed my mind", Utc::now()).unwrap();
    let missing = store
        .commit_cancellation(&order, OrderState::Confirmed)
        .await
        .unwrap();
    assert!(missing.is_empty());

    let loaded = store.get_order(order.id()).await.unwrap().unwrap();
    assert_eq!(loaded.state(), OrderState::Cancelled);
    assert!(loaded.cancelled_at().is_some());
    assert_eq!(loaded.cancel_reason(), Some("changed my mind"));
}

#[tokio::test]
async fn update_missing_order_fails() {
    let store = get_test_store().await;
    let product = test_product(10, 1000);

    let order = test_order(BuyerId::new(), 1, vec![snapshot(&product, 1)]);
    let result = store.update_order(&order, OrderState::Pending).await;
    assert!(matches!(result, Err(StoreError::OrderNotFound(_))));
}

#[tokio::test]
async fn stale_update_does_not_overwrite() {
    let store = get_test_store().await;
    let product = test_product(10, 1000);
    store.upsert_product(&product).await.unwrap();

    let order = test_order(BuyerId::new(), 1, vec![snapshot(&product, 1)]);
    store.commit_checkout(&order).await.unwrap();

    // One copy cancels; a second copy still believes the order is Pending.
    let mut cancelled = order.clone();
    cancelled.cancel("first", Utc::now()).unwrap();
    store
        .commit_cancellation(&cancelled, OrderState::Pending)
        .await
        .unwrap();

    let mut stale = order.clone();
    stale.transition(OrderState::Confirmed, Utc::now()).unwrap();
    let result = store.update_order(&stale, OrderState::Pending).await;
    assert!(matches!(
        result,
        Err(StoreError::StaleOrderState {
            expected: OrderState::Pending,
            actual: OrderState::Cancelled,
            ..
        })
    ));

    let loaded = store.get_order(order.id()).await.unwrap().unwrap();
    assert_eq!(loaded.state(), OrderState::Cancelled);
}

#[tokio::test]
async fn buyer_listing_is_newest_first() {
    let store = get_test_store().await;
    let product = test_product(100, 1000);
    store.upsert_product(&product).await.unwrap();

    let buyer = BuyerId::new();
    for seq in 1..=3 {
        let order = test_order(buyer, seq, vec![snapshot(&product, 1)]);
        store.commit_checkout(&order).await.unwrap();
    }
    // Someone else's order is not included.
    let other = test_order(BuyerId::new(), 4, vec![snapshot(&product, 1)]);
    store.commit_checkout(&other).await.unwrap();

    let orders = store.list_orders_for_buyer(buyer).await.unwrap();
    assert_eq!(orders.len(), 3);
    for pair in orders.windows(2) {
        assert!(pair[0].created_at() >= pair[1].created_at());
    }
}

#[tokio::test]
async fn seller_listing_matches_order_items() {
    let store = get_test_store().await;
    let mine = test_product(10, 1000);
    let theirs = test_product(10, 500);
    store.upsert_product(&mine).await.unwrap();
    store.upsert_product(&theirs).await.unwrap();

    let mixed = test_order(
        BuyerId::new(),
        1,
        vec![snapshot(&mine, 1), snapshot(&theirs, 1)],
    );
    let theirs_only = test_order(BuyerId::new(), 2, vec![snapshot(&theirs, 2)]);
    store.commit_checkout(&mixed).await.unwrap();
    store.commit_checkout(&theirs_only).await.unwrap();

    let for_mine = store.list_orders_for_seller(mine.seller_id).await.unwrap();
    assert_eq!(for_mine.len(), 1);
    assert_eq!(for_mine[0].id(), mixed.id());

    let for_theirs = store
        .list_orders_for_seller(theirs.seller_id)
        .await
        .unwrap();
    assert_eq!(for_theirs.len(), 2);
}

#[tokio::test]
async fn summary_counts_and_spend() {
    let store = get_test_store().await;
    let product = test_product(100, 1000);
    store.upsert_product(&product).await.unwrap();

    let buyer = BuyerId::new();

    let pending = test_order(buyer, 1, vec![snapshot(&product, 2)]);
    store.commit_checkout(&pending).await.unwrap();

    let mut cancelled = test_order(buyer, 2, vec![snapshot(&product, 5)]);
    store.commit_checkout(&cancelled).await.unwrap();
    cancelled.cancel("test", Utc::now()).unwrap();
    store
        .commit_cancellation(&cancelled, OrderState::Pending)
        .await
        .unwrap();

    let summary = store.order_summary(buyer).await.unwrap();
    assert_eq!(summary.total_orders, 2);
    assert_eq!(summary.pending, 1);
    assert_eq!(summary.cancelled, 1);
    // Only the pending order counts toward spend.
    assert_eq!(summary.total_spent, Money::from_cents(2000));

    let empty = store.order_summary(BuyerId::new()).await.unwrap();
    assert_eq!(empty.total_orders, 0);
    assert_eq!(empty.total_spent, Money::zero());
}

#[tokio::test]
async fn order_items_preserve_position_and_snapshot() {
    let store = get_test_store().await;
    let a = test_product(10, 1000);
    let b = test_product(10, 2500);
    store.upsert_product(&a).await.unwrap();
    store.upsert_product(&b).await.unwrap();

    let order = test_order(BuyerId::new(), 1, vec![snapshot(&a, 2), snapshot(&b, 1)]);
    store.commit_checkout(&order).await.unwrap();

    // Deleting the product afterwards does not disturb the snapshot.
    sqlx::query("DELETE FROM products WHERE id = $1")
        .bind(a.id.as_uuid())
        .execute(store.pool())
        .await
        .unwrap();

    let loaded = store.get_order(order.id()).await.unwrap().unwrap();
    assert_eq!(loaded.items().len(), 2);
    assert_eq!(loaded.items()[0].product_id, a.id);
    assert_eq!(loaded.items()[0].subtotal, Money::from_cents(2000));
    assert_eq!(loaded.items()[1].product_id, b.id);
    assert_eq!(loaded.total(), Money::from_cents(4500));
}
