use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use common::{BuyerId, OrderId, ProductId, SellerId};
use domain::{Cart, Money, Order, OrderState};
use tokio::sync::RwLock;

use crate::{
    Result, StoreError,
    store::{MarketStore, OrderSummary, ProductRecord, StockLevel},
};

#[derive(Default)]
struct State {
    products: HashMap<ProductId, ProductRecord>,
    carts: HashMap<BuyerId, Cart>,
    orders: HashMap<OrderId, Order>,
    order_numbers: HashSet<String>,
    counters: HashMap<NaiveDate, u32>,
}

/// In-memory market store for testing and local development.
///
/// All mutating operations take the single write lock, so the
/// linearizability contract of [`MarketStore`] holds trivially: a
/// checkout commit or cancellation observes and mutates stock in one
/// critical section.
#[derive(Clone, Default)]
pub struct InMemoryMarketStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryMarketStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a catalog product. The catalog is external to
    /// the checkout engine, so this is a seeding helper, not part of the
    /// `MarketStore` trait.
    pub async fn upsert_product(&self, product: ProductRecord) {
        self.state.write().await.products.insert(product.id, product);
    }

    /// Removes a product, simulating catalog deletion mid-lifecycle.
    pub async fn delete_product(&self, id: ProductId) {
        self.state.write().await.products.remove(&id);
    }

    /// Returns a product's current stock, if the product exists.
    pub async fn product_stock(&self, id: ProductId) -> Option<u32> {
        self.state.read().await.products.get(&id).map(|p| p.stock)
    }

    /// Returns the number of stored orders.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }
}

#[async_trait]
impl MarketStore for InMemoryMarketStore {
    async fn get_product(&self, id: ProductId) -> Result<Option<ProductRecord>> {
        Ok(self.state.read().await.products.get(&id).cloned())
    }

    async fn get_cart(&self, buyer_id: BuyerId) -> Result<Option<Cart>> {
        Ok(self.state.read().await.carts.get(&buyer_id).cloned())
    }

    async fn save_cart(&self, cart: &Cart) -> Result<()> {
        self.state
            .write()
            .await
            .carts
            .insert(cart.buyer_id(), cart.clone());
        Ok(())
    }

    async fn next_order_sequence(&self, date: NaiveDate) -> Result<u32> {
        let mut state = self.state.write().await;
        let counter = state.counters.entry(date).or_insert(0);
        *counter += 1;
        Ok(*counter)
    }

    async fn commit_checkout(&self, order: &Order) -> Result<Vec<StockLevel>> {
        let mut state = self.state.write().await;

        // Validate everything before mutating anything, so a failure on
        // the third item leaves the first two untouched.
        for item in order.items() {
            let product = state
                .products
                .get(&item.product_id)
                .ok_or(StoreError::ProductNotFound(item.product_id))?;
            if product.stock < item.quantity {
                return Err(StoreError::InsufficientStock {
                    product_id: item.product_id,
                    available: product.stock,
                    requested: item.quantity,
                });
            }
        }

        let number = order.order_number().as_str().to_string();
        if !state.order_numbers.insert(number.clone()) {
            return Err(StoreError::DuplicateOrderNumber(number));
        }

        let mut levels = Vec::with_capacity(order.items().len());
        for item in order.items() {
            // Presence was checked above under the same lock.
            if let Some(product) = state.products.get_mut(&item.product_id) {
                product.stock -= item.quantity;
                levels.push(StockLevel {
                    product_id: item.product_id,
                    seller_id: item.seller_id,
                    product_name: item.product_name.clone(),
                    remaining: product.stock,
                });
            }
        }

        state.orders.insert(order.id(), order.clone());

        if let Some(cart) = state.carts.get_mut(&order.buyer_id()) {
            cart.clear(Utc::now());
        }

        Ok(levels)
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.state.read().await.orders.get(&id).cloned())
    }

    async fn update_order(&self, order: &Order, expected: OrderState) -> Result<()> {
        let mut state = self.state.write().await;
        let current = state
            .orders
            .get(&order.id())
            .ok_or(StoreError::OrderNotFound(order.id()))?;
        if current.state() != expected {
            return Err(StoreError::StaleOrderState {
                order_id: order.id(),
                expected,
                actual: current.state(),
            });
        }
        state.orders.insert(order.id(), order.clone());
        Ok(())
    }

    async fn commit_cancellation(
        &self,
        order: &Order,
        expected: OrderState,
    ) -> Result<Vec<ProductId>> {
        let mut state = self.state.write().await;
        let current = state
            .orders
            .get(&order.id())
            .ok_or(StoreError::OrderNotFound(order.id()))?;
        if current.state() != expected {
            return Err(StoreError::StaleOrderState {
                order_id: order.id(),
                expected,
                actual: current.state(),
            });
        }

        state.orders.insert(order.id(), order.clone());

        let mut missing = Vec::new();
        for item in order.items() {
            match state.products.get_mut(&item.product_id) {
                Some(product) => product.stock += item.quantity,
                None => missing.push(item.product_id),
            }
        }
        Ok(missing)
    }

    async fn list_orders_for_buyer(&self, buyer_id: BuyerId) -> Result<Vec<Order>> {
        let state = self.state.read().await;
        let mut orders: Vec<_> = state
            .orders
            .values()
            .filter(|o| o.buyer_id() == buyer_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        Ok(orders)
    }

    async fn list_orders_for_seller(&self, seller_id: SellerId) -> Result<Vec<Order>> {
        let state = self.state.read().await;
        let mut orders: Vec<_> = state
            .orders
            .values()
            .filter(|o| o.has_seller(seller_id))
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        Ok(orders)
    }

    async fn order_summary(&self, buyer_id: BuyerId) -> Result<OrderSummary> {
        let state = self.state.read().await;
        let mut summary = OrderSummary::default();
        let mut spent = Money::zero();

        for order in state.orders.values().filter(|o| o.buyer_id() == buyer_id) {
            summary.total_orders += 1;
            match order.state() {
                OrderState::Pending => summary.pending += 1,
                OrderState::Confirmed => summary.confirmed += 1,
                OrderState::Preparing => summary.preparing += 1,
                OrderState::Shipped => summary.shipped += 1,
                OrderState::Delivered => summary.delivered += 1,
                OrderState::Cancelled => summary.cancelled += 1,
            }
            if order.state() != OrderState::Cancelled {
                spent += order.total();
            }
        }

        summary.total_spent = spent;
        Ok(summary)
    }
}
