//! Cart operations validated against the live catalog.

use chrono::Utc;
use common::{BuyerId, ProductId};
use domain::Cart;
use store::MarketStore;

use crate::error::{CheckoutError, Result};

/// Manages a buyer's cart.
///
/// Every quantity change is validated against the product's *live*
/// stock, but none of these operations reserve anything: cart contents
/// are a request, and the checkout coordinator re-validates and commits
/// the reservation atomically. A cart is created lazily on the first
/// add and only ever mutated by its owning buyer.
#[derive(Clone)]
pub struct CartService<S> {
    store: S,
}

impl<S: MarketStore> CartService<S> {
    /// Creates a new cart service.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns the buyer's cart, or an empty one if none exists yet.
    pub async fn get_cart(&self, buyer_id: BuyerId) -> Result<Cart> {
        Ok(self
            .store
            .get_cart(buyer_id)
            .await?
            .unwrap_or_else(|| Cart::new(buyer_id, Utc::now())))
    }

    /// Adds a product to the buyer's cart, merging with an existing line.
    ///
    /// Validates that the product exists, is sellable, and has enough
    /// live stock to cover the quantity already in the cart plus the
    /// new request. The effective unit price (discount price when
    /// present) is snapshotted on first add.
    #[tracing::instrument(skip(self))]
    pub async fn add_item(
        &self,
        buyer_id: BuyerId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<Cart> {
        let product = self
            .store
            .get_product(product_id)
            .await?
            .ok_or(CheckoutError::ProductNotFound(product_id))?;

        if !product.sellable {
            return Err(CheckoutError::ProductUnavailable(product_id));
        }

        let mut cart = self.get_cart(buyer_id).await?;

        let requested = cart.quantity_of(product_id) + quantity;
        if product.stock < requested {
            return Err(CheckoutError::InsufficientStock {
                product_id,
                available: product.stock,
                requested,
            });
        }

        cart.add_item(product_id, quantity, product.effective_price(), Utc::now())?;
        self.store.save_cart(&cart).await?;

        tracing::debug!(%buyer_id, %product_id, quantity, "item added to cart");
        Ok(cart)
    }

    /// Sets the quantity of an existing cart line.
    #[tracing::instrument(skip(self))]
    pub async fn update_quantity(
        &self,
        buyer_id: BuyerId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<Cart> {
        let mut cart = self.get_cart(buyer_id).await?;

        let product = self
            .store
            .get_product(product_id)
            .await?
            .ok_or(CheckoutError::ProductNotFound(product_id))?;

        if quantity >= 1 && product.stock < quantity {
            return Err(CheckoutError::InsufficientStock {
                product_id,
                available: product.stock,
                requested: quantity,
            });
        }

        cart.update_quantity(product_id, quantity, Utc::now())?;
        self.store.save_cart(&cart).await?;
        Ok(cart)
    }

    /// Removes a line from the buyer's cart.
    #[tracing::instrument(skip(self))]
    pub async fn remove_item(&self, buyer_id: BuyerId, product_id: ProductId) -> Result<Cart> {
        let mut cart = self.get_cart(buyer_id).await?;
        cart.remove_item(product_id, Utc::now())?;
        self.store.save_cart(&cart).await?;
        Ok(cart)
    }

    /// Removes every line from the buyer's cart.
    #[tracing::instrument(skip(self))]
    pub async fn clear(&self, buyer_id: BuyerId) -> Result<Cart> {
        let mut cart = self.get_cart(buyer_id).await?;
        cart.clear(Utc::now());
        self.store.save_cart(&cart).await?;
        Ok(cart)
    }
}
