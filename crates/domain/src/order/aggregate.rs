//! Order aggregate implementation.

use chrono::{DateTime, Duration, Utc};
use common::{BuyerId, OrderId, SellerId};
use serde::{Deserialize, Serialize};

use crate::money::Money;

use super::{OrderError, OrderItem, OrderNumber, OrderState, ShippingDetails};

/// Default estimated delivery window applied when an order is confirmed
/// without an explicit estimate.
const DEFAULT_DELIVERY_DAYS: i64 = 3;

/// All fields of a persisted order, used to rebuild the aggregate from
/// the store without re-running creation validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderParts {
    pub id: OrderId,
    pub buyer_id: BuyerId,
    pub order_number: OrderNumber,
    pub items: Vec<OrderItem>,
    pub total: Money,
    pub state: OrderState,
    pub shipping: ShippingDetails,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancel_reason: Option<String>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub estimated_delivery_at: Option<DateTime<Utc>>,
}

/// An immutable-after-creation record of a completed checkout.
///
/// The item list and total are fixed when the order is created; only the
/// lifecycle state, notes, and the timestamps defined by transitions ever
/// change afterwards. Items keep their insertion order for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    buyer_id: BuyerId,
    order_number: OrderNumber,
    items: Vec<OrderItem>,
    total: Money,
    state: OrderState,
    shipping: ShippingDetails,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    cancelled_at: Option<DateTime<Utc>>,
    cancel_reason: Option<String>,
    delivered_at: Option<DateTime<Utc>>,
    estimated_delivery_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Creates a new pending order from checkout snapshots.
    ///
    /// Fails if the item list is empty or any item has a zero quantity.
    /// The total is computed here from the item subtotals and never
    /// edited independently afterwards.
    pub fn create(
        id: OrderId,
        buyer_id: BuyerId,
        order_number: OrderNumber,
        items: Vec<OrderItem>,
        shipping: ShippingDetails,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Self, OrderError> {
        if items.is_empty() {
            return Err(OrderError::NoItems);
        }
        if let Some(item) = items.iter().find(|i| i.quantity == 0) {
            return Err(OrderError::InvalidQuantity {
                quantity: item.quantity,
            });
        }

        let total = items.iter().map(|i| i.subtotal).sum();

        Ok(Self {
            id,
            buyer_id,
            order_number,
            items,
            total,
            state: OrderState::Pending,
            shipping,
            notes,
            created_at: now,
            updated_at: now,
            cancelled_at: None,
            cancel_reason: None,
            delivered_at: None,
            estimated_delivery_at: None,
        })
    }

    /// Rebuilds an order from persisted state.
    pub fn hydrate(parts: OrderParts) -> Self {
        Self {
            id: parts.id,
            buyer_id: parts.buyer_id,
            order_number: parts.order_number,
            items: parts.items,
            total: parts.total,
            state: parts.state,
            shipping: parts.shipping,
            notes: parts.notes,
            created_at: parts.created_at,
            updated_at: parts.updated_at,
            cancelled_at: parts.cancelled_at,
            cancel_reason: parts.cancel_reason,
            delivered_at: parts.delivered_at,
            estimated_delivery_at: parts.estimated_delivery_at,
        }
    }
}

// Query methods
impl Order {
    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn buyer_id(&self) -> BuyerId {
        self.buyer_id
    }

    pub fn order_number(&self) -> &OrderNumber {
        &self.order_number
    }

    /// Returns the items in display (insertion) order.
    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    /// Returns the order total (sum of item subtotals).
    pub fn total(&self) -> Money {
        self.total
    }

    pub fn state(&self) -> OrderState {
        self.state
    }

    pub fn shipping(&self) -> &ShippingDetails {
        &self.shipping
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn cancelled_at(&self) -> Option<DateTime<Utc>> {
        self.cancelled_at
    }

    pub fn cancel_reason(&self) -> Option<&str> {
        self.cancel_reason.as_deref()
    }

    pub fn delivered_at(&self) -> Option<DateTime<Utc>> {
        self.delivered_at
    }

    pub fn estimated_delivery_at(&self) -> Option<DateTime<Utc>> {
        self.estimated_delivery_at
    }

    /// Returns the total quantity across all items.
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    /// Returns the distinct sellers with at least one item in this order.
    pub fn seller_ids(&self) -> Vec<SellerId> {
        let mut sellers: Vec<SellerId> = Vec::new();
        for item in &self.items {
            if !sellers.contains(&item.seller_id) {
                sellers.push(item.seller_id);
            }
        }
        sellers
    }

    /// Returns true if the order contains an item sold by the seller.
    pub fn has_seller(&self, seller_id: SellerId) -> bool {
        self.items.iter().any(|i| i.seller_id == seller_id)
    }

    /// Returns true if the order can still be cancelled.
    pub fn can_cancel(&self) -> bool {
        self.state.can_cancel()
    }

    /// Returns true if the order is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

// Command methods
impl Order {
    /// Moves the order to a new lifecycle state.
    ///
    /// Fails with `IllegalTransition` if the pair is not in the legal
    /// table (which includes every transition out of a terminal state).
    /// Reaching `Delivered` stamps the delivery timestamp; reaching
    /// `Confirmed` fills in a default delivery estimate when none was set.
    /// Callers cancelling an order should prefer [`Order::cancel`], which
    /// also records the reason.
    pub fn transition(&mut self, target: OrderState, now: DateTime<Utc>) -> Result<(), OrderError> {
        if !self.state.can_transition_to(target) {
            return Err(OrderError::IllegalTransition {
                from: self.state,
                to: target,
            });
        }

        self.state = target;
        self.updated_at = now;

        match target {
            OrderState::Confirmed => {
                if self.estimated_delivery_at.is_none() {
                    self.estimated_delivery_at = Some(now + Duration::days(DEFAULT_DELIVERY_DAYS));
                }
            }
            OrderState::Delivered => {
                self.delivered_at = Some(now);
            }
            OrderState::Cancelled => {
                self.cancelled_at = Some(now);
            }
            _ => {}
        }

        Ok(())
    }

    /// Cancels the order, recording when and why.
    ///
    /// Only `Pending` and `Confirmed` orders can be cancelled. Stock
    /// restitution is the service layer's job; the aggregate only tracks
    /// the state change.
    pub fn cancel(&mut self, reason: impl Into<String>, now: DateTime<Utc>) -> Result<(), OrderError> {
        if !self.can_cancel() {
            return Err(OrderError::NotCancellable { state: self.state });
        }

        self.state = OrderState::Cancelled;
        self.cancelled_at = Some(now);
        self.cancel_reason = Some(reason.into());
        self.updated_at = now;
        Ok(())
    }

    /// Appends a timestamped line to the order's note log.
    pub fn append_note(&mut self, note: &str, now: DateTime<Utc>) {
        let line = format!("[{}] {}", now.format("%Y-%m-%d %H:%M:%S UTC"), note);
        match &mut self.notes {
            Some(existing) => {
                existing.push('\n');
                existing.push_str(&line);
            }
            None => self.notes = Some(line),
        }
        self.updated_at = now;
    }

    /// Sets the estimated delivery date (seller/operator supplied).
    ///
    /// Rejected once the order is `Delivered` or `Cancelled`: terminal
    /// orders only carry the timestamps their own transitions stamped.
    pub fn set_estimated_delivery(
        &mut self,
        estimate: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), OrderError> {
        if self.is_terminal() {
            return Err(OrderError::Finalized { state: self.state });
        }

        self.estimated_delivery_at = Some(estimate);
        self.updated_at = now;
        Ok(())
    }
}
