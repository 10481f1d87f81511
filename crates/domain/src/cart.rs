//! Cart aggregate.

use chrono::{DateTime, Utc};
use common::{BuyerId, ProductId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::money::Money;

/// Errors that can occur during cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// Quantity must be at least 1.
    #[error("Invalid quantity: {quantity} (must be at least 1)")]
    InvalidQuantity { quantity: u32 },

    /// The product is not in the cart.
    #[error("Product not in cart: {product_id}")]
    ItemNotFound { product_id: ProductId },
}

/// An item in a buyer's cart.
///
/// The unit price is captured when the item is first added, so the cart
/// total stays stable even if the live product price changes afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    /// The product this item refers to.
    pub product_id: ProductId,

    /// Quantity requested (always >= 1).
    pub quantity: u32,

    /// Unit price snapshotted at add-time.
    pub unit_price: Money,
}

impl CartItem {
    /// Returns the line subtotal (quantity * unit price).
    pub fn subtotal(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// A buyer's mutable pre-purchase selection.
///
/// A cart holds at most one item per product; adding the same product
/// again merges by summing quantities. Lines keep their insertion order,
/// which becomes the display order of the resulting order's items. Cart
/// contents are a *request*, not a reservation: nothing here touches
/// product stock. Stock is only validated against live values by the
/// service layer, and only reserved at checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cart {
    buyer_id: BuyerId,
    items: Vec<CartItem>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Cart {
    /// Creates an empty cart for a buyer.
    pub fn new(buyer_id: BuyerId, now: DateTime<Utc>) -> Self {
        Self {
            buyer_id,
            items: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns the owning buyer.
    pub fn buyer_id(&self) -> BuyerId {
        self.buyer_id
    }

    /// Returns the quantity currently in the cart for a product (0 if absent).
    pub fn quantity_of(&self, product_id: ProductId) -> u32 {
        self.items
            .iter()
            .find(|i| i.product_id == product_id)
            .map_or(0, |i| i.quantity)
    }

    /// Adds a product to the cart, merging with an existing line if present.
    ///
    /// On merge the quantity is summed and the original snapshotted unit
    /// price is kept; the line stays in its original position. New
    /// products append at the end.
    pub fn add_item(
        &mut self,
        product_id: ProductId,
        quantity: u32,
        unit_price: Money,
        now: DateTime<Utc>,
    ) -> Result<(), CartError> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity { quantity });
        }

        match self.items.iter_mut().find(|i| i.product_id == product_id) {
            Some(item) => item.quantity += quantity,
            None => self.items.push(CartItem {
                product_id,
                quantity,
                unit_price,
            }),
        }
        self.updated_at = now;
        Ok(())
    }

    /// Sets the quantity of an existing line.
    pub fn update_quantity(
        &mut self,
        product_id: ProductId,
        quantity: u32,
        now: DateTime<Utc>,
    ) -> Result<(), CartError> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity { quantity });
        }

        let item = self
            .items
            .iter_mut()
            .find(|i| i.product_id == product_id)
            .ok_or(CartError::ItemNotFound { product_id })?;
        item.quantity = quantity;
        self.updated_at = now;
        Ok(())
    }

    /// Removes a line from the cart.
    pub fn remove_item(
        &mut self,
        product_id: ProductId,
        now: DateTime<Utc>,
    ) -> Result<(), CartError> {
        let position = self
            .items
            .iter()
            .position(|i| i.product_id == product_id)
            .ok_or(CartError::ItemNotFound { product_id })?;
        self.items.remove(position);
        self.updated_at = now;
        Ok(())
    }

    /// Removes every line. The cart itself survives (it is cleared after
    /// a successful checkout, not deleted).
    pub fn clear(&mut self, now: DateTime<Utc>) {
        self.items.clear();
        self.updated_at = now;
    }

    /// Returns the items in insertion order.
    pub fn items(&self) -> impl Iterator<Item = &CartItem> {
        self.items.iter()
    }

    /// Returns the number of distinct product lines.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if the cart has no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the total quantity across all lines.
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    /// Returns the cart total (sum of line subtotals).
    pub fn total(&self) -> Money {
        self.items.iter().map(CartItem::subtotal).sum()
    }

    /// Returns when the cart was created.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns when the cart was last modified.
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}
