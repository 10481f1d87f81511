//! The `MarketStore` trait and its record types.

use async_trait::async_trait;
use chrono::NaiveDate;
use common::{BuyerId, OrderId, ProductId, SellerId};
use domain::{Cart, Money, Order, OrderState};

use crate::error::Result;

/// A read-only view of a catalog product.
///
/// The catalog itself (CRUD, moderation, images) lives outside this
/// system; the checkout engine only reads these fields and mutates
/// `stock` through the atomic primitives on [`MarketStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductRecord {
    pub id: ProductId,
    pub name: String,
    pub image: Option<String>,
    pub seller_id: SellerId,
    pub seller_name: String,
    pub price: Money,
    pub discount_price: Option<Money>,
    pub stock: u32,
    /// False while the product is unpublished or blocked by moderation.
    pub sellable: bool,
}

impl ProductRecord {
    /// The price a buyer actually pays: the discount price when present.
    pub fn effective_price(&self) -> Money {
        self.discount_price.unwrap_or(self.price)
    }
}

/// Post-decrement stock level for one product, reported by
/// [`MarketStore::commit_checkout`] so the caller can raise low-stock
/// warnings without a second read.
#[derive(Debug, Clone)]
pub struct StockLevel {
    pub product_id: ProductId,
    pub seller_id: SellerId,
    pub product_name: String,
    pub remaining: u32,
}

/// Per-state order counts and lifetime spend for one buyer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderSummary {
    pub pending: u64,
    pub confirmed: u64,
    pub preparing: u64,
    pub shipped: u64,
    pub delivered: u64,
    pub cancelled: u64,
    pub total_orders: u64,
    /// Sum of order totals, cancelled orders excluded.
    pub total_spent: Money,
}

/// Gateway to all persisted marketplace state.
///
/// Implementations must make [`commit_checkout`](Self::commit_checkout),
/// [`commit_cancellation`](Self::commit_cancellation), and
/// [`next_order_sequence`](Self::next_order_sequence) linearizable:
/// concurrent checkouts contending for the same product's last unit must
/// resolve so that exactly one succeeds, concurrent cancellations of the
/// same order must restore stock exactly once, and concurrent checkouts
/// on the same day must never receive the same sequence value.
#[async_trait]
pub trait MarketStore: Send + Sync {
    /// Reads a product from the catalog.
    async fn get_product(&self, id: ProductId) -> Result<Option<ProductRecord>>;

    /// Loads a buyer's cart, if one has been created.
    async fn get_cart(&self, buyer_id: BuyerId) -> Result<Option<Cart>>;

    /// Persists a cart wholesale (items replaced).
    async fn save_cart(&self, cart: &Cart) -> Result<()>;

    /// Atomically increments and returns the order sequence for a
    /// calendar day. The first call for a day returns 1.
    async fn next_order_sequence(&self, date: NaiveDate) -> Result<u32>;

    /// Commits a checkout as a single atomic unit: conditionally
    /// decrements stock for every item in the order, inserts the order,
    /// and clears the buyer's cart.
    ///
    /// If any item's requested quantity exceeds current stock the whole
    /// commit fails with `InsufficientStock` naming the offending
    /// product, and no state changes take effect: no partial orders, no
    /// partial decrements.
    ///
    /// Returns the post-decrement stock level for each product.
    async fn commit_checkout(&self, order: &Order) -> Result<Vec<StockLevel>>;

    /// Loads an order by id.
    async fn get_order(&self, id: OrderId) -> Result<Option<Order>>;

    /// Persists lifecycle changes to an existing order (state, notes,
    /// transition timestamps), but only while the persisted state still
    /// matches `expected`. A mismatch fails with `StaleOrderState` and
    /// writes nothing, so a copy loaded before a concurrent transition
    /// can never overwrite it. The item list and total never change.
    async fn update_order(&self, order: &Order, expected: OrderState) -> Result<()>;

    /// Commits a cancellation as a single atomic unit: writes the
    /// cancelled order (guarded by `expected`, like
    /// [`update_order`](Self::update_order)) and adds every item's
    /// quantity back to product stock.
    ///
    /// Two callers racing to cancel the same order resolve here: one
    /// commits, the other fails with `StaleOrderState`, so stock is
    /// restored exactly once. Items whose product was deleted since the
    /// order was placed are skipped and their ids returned.
    async fn commit_cancellation(
        &self,
        order: &Order,
        expected: OrderState,
    ) -> Result<Vec<ProductId>>;

    /// Lists a buyer's orders, most recent first.
    async fn list_orders_for_buyer(&self, buyer_id: BuyerId) -> Result<Vec<Order>>;

    /// Lists orders containing at least one item sold by the seller,
    /// most recent first.
    async fn list_orders_for_seller(&self, seller_id: SellerId) -> Result<Vec<Order>>;

    /// Computes per-state counts and lifetime spend for a buyer.
    async fn order_summary(&self, buyer_id: BuyerId) -> Result<OrderSummary>;
}
