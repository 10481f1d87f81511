//! Value objects for the order domain.

use common::{ProductId, SellerId};
use serde::{Deserialize, Serialize};

use crate::money::Money;

/// A frozen line-item snapshot inside an order.
///
/// Product attributes (name, image, seller, price) are copied out of the
/// live catalog at checkout and never re-derived afterwards: the product
/// may be repriced, renamed, or deleted, but the order stays a faithful
/// historical record of what was bought.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    /// The product identifier (the product itself may no longer exist).
    pub product_id: ProductId,

    /// Product display name at purchase time.
    pub product_name: String,

    /// Product image reference at purchase time, if it had one.
    pub product_image: Option<String>,

    /// The seller the product belonged to.
    pub seller_id: SellerId,

    /// Seller display name at purchase time.
    pub seller_name: String,

    /// Quantity purchased.
    pub quantity: u32,

    /// Unit price at purchase time.
    pub unit_price: Money,

    /// Line subtotal (quantity * unit price), fixed at creation.
    pub subtotal: Money,
}

impl OrderItem {
    /// Creates a snapshot line item, computing the subtotal.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        product_id: ProductId,
        product_name: impl Into<String>,
        product_image: Option<String>,
        seller_id: SellerId,
        seller_name: impl Into<String>,
        quantity: u32,
        unit_price: Money,
    ) -> Self {
        Self {
            product_id,
            product_name: product_name.into(),
            product_image,
            seller_id,
            seller_name: seller_name.into(),
            quantity,
            unit_price,
            subtotal: unit_price.multiply(quantity),
        }
    }
}

/// Shipping and payment details captured at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingDetails {
    /// Delivery address.
    pub address: String,

    /// Contact phone number.
    pub phone: String,

    /// Payment method label (e.g. "cash on delivery"). The system records
    /// the label only; payment processing is out of scope.
    pub payment_method: String,
}
