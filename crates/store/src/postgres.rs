use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use common::{BuyerId, OrderId, ProductId, SellerId};
use domain::{Cart, Money, Order, OrderItem, OrderNumber, OrderParts, OrderState, ShippingDetails};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    Result, StoreError,
    store::{MarketStore, OrderSummary, ProductRecord, StockLevel},
};

/// PostgreSQL-backed market store.
///
/// Stock reservation is a conditional multi-row update inside one
/// transaction (`UPDATE .. SET stock = stock - N WHERE stock >= N`,
/// checking the affected row), so two checkouts racing for the last
/// unit resolve at the database: one commits, the other observes an
/// insufficient-stock failure and rolls back entirely. Order-number
/// sequences come from an upsert on a per-date counter row, never from
/// scanning existing orders.
#[derive(Clone)]
pub struct PostgresMarketStore {
    pool: PgPool,
}

fn to_u32(value: i32, field: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| StoreError::Decode(format!("negative {field}: {value}")))
}

impl PostgresMarketStore {
    /// Creates a new PostgreSQL market store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Inserts or replaces a catalog product. Catalog management is
    /// external; this exists for seeding and tests.
    pub async fn upsert_product(&self, product: &ProductRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, image, seller_id, seller_name, price_cents,
                                  discount_price_cents, stock, sellable)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                image = EXCLUDED.image,
                seller_id = EXCLUDED.seller_id,
                seller_name = EXCLUDED.seller_name,
                price_cents = EXCLUDED.price_cents,
                discount_price_cents = EXCLUDED.discount_price_cents,
                stock = EXCLUDED.stock,
                sellable = EXCLUDED.sellable
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(&product.image)
        .bind(product.seller_id.as_uuid())
        .bind(&product.seller_name)
        .bind(product.price.cents())
        .bind(product.discount_price.map(|p| p.cents()))
        .bind(product.stock as i32)
        .bind(product.sellable)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    fn row_to_product(row: PgRow) -> Result<ProductRecord> {
        Ok(ProductRecord {
            id: ProductId::from_uuid(row.try_get::<Uuid, _>("id")?),
            name: row.try_get("name")?,
            image: row.try_get("image")?,
            seller_id: SellerId::from_uuid(row.try_get::<Uuid, _>("seller_id")?),
            seller_name: row.try_get("seller_name")?,
            price: Money::from_cents(row.try_get("price_cents")?),
            discount_price: row
                .try_get::<Option<i64>, _>("discount_price_cents")?
                .map(Money::from_cents),
            stock: to_u32(row.try_get("stock")?, "stock")?,
            sellable: row.try_get("sellable")?,
        })
    }

    fn row_to_order_item(row: PgRow) -> Result<OrderItem> {
        Ok(OrderItem {
            product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
            product_name: row.try_get("product_name")?,
            product_image: row.try_get("product_image")?,
            seller_id: SellerId::from_uuid(row.try_get::<Uuid, _>("seller_id")?),
            seller_name: row.try_get("seller_name")?,
            quantity: to_u32(row.try_get("quantity")?, "quantity")?,
            unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
            subtotal: Money::from_cents(row.try_get("subtotal_cents")?),
        })
    }

    fn row_to_order(row: PgRow, items: Vec<OrderItem>) -> Result<Order> {
        let state: String = row.try_get("state")?;
        let state: OrderState = state.parse().map_err(StoreError::Decode)?;

        Ok(Order::hydrate(OrderParts {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            buyer_id: BuyerId::from_uuid(row.try_get::<Uuid, _>("buyer_id")?),
            order_number: OrderNumber::from(row.try_get::<String, _>("order_number")?),
            items,
            total: Money::from_cents(row.try_get("total_cents")?),
            state,
            shipping: ShippingDetails {
                address: row.try_get("shipping_address")?,
                phone: row.try_get("phone")?,
                payment_method: row.try_get("payment_method")?,
            },
            notes: row.try_get("notes")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            cancelled_at: row.try_get("cancelled_at")?,
            cancel_reason: row.try_get("cancel_reason")?,
            delivered_at: row.try_get("delivered_at")?,
            estimated_delivery_at: row.try_get("estimated_delivery_at")?,
        }))
    }

    async fn items_for_order(&self, order_id: OrderId) -> Result<Vec<OrderItem>> {
        let rows = sqlx::query(
            r#"
            SELECT product_id, product_name, product_image, seller_id, seller_name,
                   quantity, unit_price_cents, subtotal_cents
            FROM order_items
            WHERE order_id = $1
            ORDER BY position ASC
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_order_item).collect()
    }

    async fn orders_from_rows(&self, rows: Vec<PgRow>) -> Result<Vec<Order>> {
        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            let id = OrderId::from_uuid(row.try_get::<Uuid, _>("id")?);
            let items = self.items_for_order(id).await?;
            orders.push(Self::row_to_order(row, items)?);
        }
        Ok(orders)
    }

    /// Builds the error for a guarded order write that matched no row:
    /// either the order is gone or its state moved under the caller.
    async fn stale_or_missing(&self, order_id: OrderId, expected: OrderState) -> Result<StoreError> {
        let actual: Option<String> = sqlx::query_scalar("SELECT state FROM orders WHERE id = $1")
            .bind(order_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        Ok(match actual {
            Some(actual) => StoreError::StaleOrderState {
                order_id,
                expected,
                actual: actual.parse().map_err(StoreError::Decode)?,
            },
            None => StoreError::OrderNotFound(order_id),
        })
    }
}

const ORDER_COLUMNS: &str = "id, buyer_id, order_number, total_cents, state, shipping_address, \
     phone, payment_method, notes, created_at, updated_at, cancelled_at, cancel_reason, \
     delivered_at, estimated_delivery_at";

#[async_trait]
impl MarketStore for PostgresMarketStore {
    async fn get_product(&self, id: ProductId) -> Result<Option<ProductRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, image, seller_id, seller_name, price_cents,
                   discount_price_cents, stock, sellable
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_product).transpose()
    }

    async fn get_cart(&self, buyer_id: BuyerId) -> Result<Option<Cart>> {
        let row = sqlx::query("SELECT created_at, updated_at FROM carts WHERE buyer_id = $1")
            .bind(buyer_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let created_at: DateTime<Utc> = row.try_get("created_at")?;
        let updated_at: DateTime<Utc> = row.try_get("updated_at")?;

        let item_rows = sqlx::query(
            r#"
            SELECT product_id, quantity, unit_price_cents
            FROM cart_items
            WHERE buyer_id = $1
            ORDER BY position ASC
            "#,
        )
        .bind(buyer_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        let mut cart = Cart::new(buyer_id, created_at);
        for row in item_rows {
            let product_id = ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?);
            let quantity = to_u32(row.try_get("quantity")?, "quantity")?;
            let unit_price = Money::from_cents(row.try_get("unit_price_cents")?);
            cart.add_item(product_id, quantity, unit_price, updated_at)
                .map_err(|e| StoreError::Decode(e.to_string()))?;
        }

        Ok(Some(cart))
    }

    async fn save_cart(&self, cart: &Cart) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO carts (buyer_id, created_at, updated_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (buyer_id) DO UPDATE SET updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(cart.buyer_id().as_uuid())
        .bind(cart.created_at())
        .bind(cart.updated_at())
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM cart_items WHERE buyer_id = $1")
            .bind(cart.buyer_id().as_uuid())
            .execute(&mut *tx)
            .await?;

        for (position, item) in cart.items().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO cart_items (buyer_id, product_id, position, quantity, unit_price_cents)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(cart.buyer_id().as_uuid())
            .bind(item.product_id.as_uuid())
            .bind(position as i32)
            .bind(item.quantity as i32)
            .bind(item.unit_price.cents())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn next_order_sequence(&self, date: NaiveDate) -> Result<u32> {
        // A single upsert-and-read; the row lock makes concurrent calls
        // for the same day queue up instead of reading a stale value.
        let seq: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO order_counters (day, last_seq)
            VALUES ($1, 1)
            ON CONFLICT (day) DO UPDATE SET last_seq = order_counters.last_seq + 1
            RETURNING last_seq
            "#,
        )
        .bind(date)
        .fetch_one(&self.pool)
        .await?;

        to_u32(seq, "last_seq")
    }

    async fn commit_checkout(&self, order: &Order) -> Result<Vec<StockLevel>> {
        let mut tx = self.pool.begin().await?;
        let mut levels = Vec::with_capacity(order.items().len());

        // Conditional decrement per item. A miss means the product is
        // either out of stock or gone; dropping the transaction rolls
        // back every decrement already applied.
        for item in order.items() {
            let remaining: Option<i32> = sqlx::query_scalar(
                r#"
                UPDATE products
                SET stock = stock - $2
                WHERE id = $1 AND stock >= $2
                RETURNING stock
                "#,
            )
            .bind(item.product_id.as_uuid())
            .bind(item.quantity as i32)
            .fetch_optional(&mut *tx)
            .await?;

            match remaining {
                Some(remaining) => levels.push(StockLevel {
                    product_id: item.product_id,
                    seller_id: item.seller_id,
                    product_name: item.product_name.clone(),
                    remaining: to_u32(remaining, "stock")?,
                }),
                None => {
                    let available: Option<i32> =
                        sqlx::query_scalar("SELECT stock FROM products WHERE id = $1")
                            .bind(item.product_id.as_uuid())
                            .fetch_optional(&mut *tx)
                            .await?;

                    return Err(match available {
                        Some(available) => StoreError::InsufficientStock {
                            product_id: item.product_id,
                            available: to_u32(available, "stock")?,
                            requested: item.quantity,
                        },
                        None => StoreError::ProductNotFound(item.product_id),
                    });
                }
            }
        }

        sqlx::query(&format!(
            r#"
            INSERT INTO orders ({ORDER_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#
        ))
        .bind(order.id().as_uuid())
        .bind(order.buyer_id().as_uuid())
        .bind(order.order_number().as_str())
        .bind(order.total().cents())
        .bind(order.state().as_str())
        .bind(&order.shipping().address)
        .bind(&order.shipping().phone)
        .bind(&order.shipping().payment_method)
        .bind(order.notes())
        .bind(order.created_at())
        .bind(order.updated_at())
        .bind(order.cancelled_at())
        .bind(order.cancel_reason())
        .bind(order.delivered_at())
        .bind(order.estimated_delivery_at())
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("orders_order_number_key")
            {
                return StoreError::DuplicateOrderNumber(
                    order.order_number().as_str().to_string(),
                );
            }
            StoreError::Database(e)
        })?;

        for (position, item) in order.items().iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_items (order_id, position, product_id, product_name,
                                         product_image, seller_id, seller_name, quantity,
                                         unit_price_cents, subtotal_cents)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                "#,
            )
            .bind(order.id().as_uuid())
            .bind(position as i32)
            .bind(item.product_id.as_uuid())
            .bind(&item.product_name)
            .bind(&item.product_image)
            .bind(item.seller_id.as_uuid())
            .bind(&item.seller_name)
            .bind(item.quantity as i32)
            .bind(item.unit_price.cents())
            .bind(item.subtotal.cents())
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("DELETE FROM cart_items WHERE buyer_id = $1")
            .bind(order.buyer_id().as_uuid())
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE carts SET updated_at = $2 WHERE buyer_id = $1")
            .bind(order.buyer_id().as_uuid())
            .bind(order.created_at())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(levels)
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let items = self.items_for_order(id).await?;
        Ok(Some(Self::row_to_order(row, items)?))
    }

    async fn update_order(&self, order: &Order, expected: OrderState) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET state = $2, notes = $3, updated_at = $4, cancelled_at = $5,
                cancel_reason = $6, delivered_at = $7, estimated_delivery_at = $8
            WHERE id = $1 AND state = $9
            "#,
        )
        .bind(order.id().as_uuid())
        .bind(order.state().as_str())
        .bind(order.notes())
        .bind(order.updated_at())
        .bind(order.cancelled_at())
        .bind(order.cancel_reason())
        .bind(order.delivered_at())
        .bind(order.estimated_delivery_at())
        .bind(expected.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.stale_or_missing(order.id(), expected).await?);
        }
        Ok(())
    }

    async fn commit_cancellation(
        &self,
        order: &Order,
        expected: OrderState,
    ) -> Result<Vec<ProductId>> {
        let mut tx = self.pool.begin().await?;

        // The state write is guarded by the state the caller observed,
        // so of two racing cancellations exactly one reaches the stock
        // restitution below.
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET state = $2, notes = $3, updated_at = $4, cancelled_at = $5, cancel_reason = $6
            WHERE id = $1 AND state = $7
            "#,
        )
        .bind(order.id().as_uuid())
        .bind(order.state().as_str())
        .bind(order.notes())
        .bind(order.updated_at())
        .bind(order.cancelled_at())
        .bind(order.cancel_reason())
        .bind(expected.as_str())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.stale_or_missing(order.id(), expected).await?);
        }

        let mut missing = Vec::new();
        for item in order.items() {
            let restored = sqlx::query("UPDATE products SET stock = stock + $2 WHERE id = $1")
                .bind(item.product_id.as_uuid())
                .bind(item.quantity as i32)
                .execute(&mut *tx)
                .await?;
            if restored.rows_affected() == 0 {
                missing.push(item.product_id);
            }
        }

        tx.commit().await?;
        Ok(missing)
    }

    async fn list_orders_for_buyer(&self, buyer_id: BuyerId) -> Result<Vec<Order>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE buyer_id = $1 ORDER BY created_at DESC"
        ))
        .bind(buyer_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        self.orders_from_rows(rows).await
    }

    async fn list_orders_for_seller(&self, seller_id: SellerId) -> Result<Vec<Order>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {ORDER_COLUMNS} FROM orders
            WHERE id IN (SELECT order_id FROM order_items WHERE seller_id = $1)
            ORDER BY created_at DESC
            "#
        ))
        .bind(seller_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        self.orders_from_rows(rows).await
    }

    async fn order_summary(&self, buyer_id: BuyerId) -> Result<OrderSummary> {
        let rows = sqlx::query(
            r#"
            SELECT state, COUNT(*) AS count, COALESCE(SUM(total_cents), 0)::BIGINT AS total
            FROM orders
            WHERE buyer_id = $1
            GROUP BY state
            "#,
        )
        .bind(buyer_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        let mut summary = OrderSummary::default();
        let mut spent = Money::zero();
        for row in rows {
            let state: String = row.try_get("state")?;
            let state: OrderState = state.parse().map_err(StoreError::Decode)?;
            let count: i64 = row.try_get("count")?;
            let count = count as u64;
            let total: i64 = row.try_get("total")?;

            summary.total_orders += count;
            match state {
                OrderState::Pending => summary.pending = count,
                OrderState::Confirmed => summary.confirmed = count,
                OrderState::Preparing => summary.preparing = count,
                OrderState::Shipped => summary.shipped = count,
                OrderState::Delivered => summary.delivered = count,
                OrderState::Cancelled => summary.cancelled = count,
            }
            if state != OrderState::Cancelled {
                spent += Money::from_cents(total);
            }
        }

        summary.total_spent = spent;
        Ok(summary)
    }
}
