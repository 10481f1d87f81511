//! Notification sink trait and in-memory implementation.
//!
//! Notification delivery (push, email) is an external subsystem. The
//! services only ever call [`NotificationSink::emit`] and treat failures
//! as best-effort: an emission error is logged and suppressed, never
//! propagated into the surrounding transaction.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::{OrderId, ProductId};
use domain::{Money, OrderState};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// An event to be delivered to a buyer or seller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum Notification {
    /// Checkout succeeded (to the buyer).
    OrderCreated {
        order_id: OrderId,
        order_number: String,
        total: Money,
    },

    /// An order containing the seller's products was placed.
    NewSale {
        order_id: OrderId,
        order_number: String,
    },

    /// A product's stock dropped below the warning threshold (to its seller).
    LowStock {
        product_id: ProductId,
        product_name: String,
        remaining: u32,
    },

    /// An order moved to a new lifecycle state (to the buyer).
    StatusChanged {
        order_id: OrderId,
        order_number: String,
        state: OrderState,
        message: String,
    },

    /// An order was cancelled (to the buyer).
    OrderCancelled {
        order_id: OrderId,
        order_number: String,
        reason: String,
    },
}

impl Notification {
    /// Short human-readable heading for the notification.
    pub fn title(&self) -> &'static str {
        match self {
            Notification::OrderCreated { .. } => "Order placed",
            Notification::NewSale { .. } => "New sale",
            Notification::LowStock { .. } => "Low stock warning",
            Notification::StatusChanged { .. } => "Order update",
            Notification::OrderCancelled { .. } => "Order cancelled",
        }
    }

    /// Human-readable body text.
    pub fn body(&self) -> String {
        match self {
            Notification::OrderCreated {
                order_number,
                total,
                ..
            } => format!("Your order {order_number} for {total} has been placed"),
            Notification::NewSale { order_number, .. } => {
                format!("You have a new sale in order {order_number}")
            }
            Notification::LowStock {
                product_name,
                remaining,
                ..
            } => format!("Only {remaining} units of {product_name} left in stock"),
            Notification::StatusChanged { message, .. } => message.clone(),
            Notification::OrderCancelled {
                order_number,
                reason,
                ..
            } => format!("Order {order_number} was cancelled: {reason}"),
        }
    }

    /// Client navigation target associated with the notification.
    pub fn link(&self) -> String {
        match self {
            Notification::OrderCreated { order_id, .. }
            | Notification::NewSale { order_id, .. }
            | Notification::StatusChanged { order_id, .. }
            | Notification::OrderCancelled { order_id, .. } => format!("/orders/{order_id}"),
            Notification::LowStock { product_id, .. } => format!("/products/{product_id}"),
        }
    }
}

/// Emission failure. Callers log these and move on.
#[derive(Debug, Error)]
#[error("Notification delivery failed: {0}")]
pub struct NotificationError(pub String);

/// Fire-and-forget boundary to the notification subsystem.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Delivers a notification to a recipient (buyer or seller).
    async fn emit(&self, recipient: Uuid, notification: Notification)
    -> Result<(), NotificationError>;
}

#[derive(Debug, Default)]
struct SinkState {
    sent: Vec<(Uuid, Notification)>,
    fail_on_emit: bool,
}

/// In-memory notification sink that records emissions for inspection.
#[derive(Debug, Clone, Default)]
pub struct InMemoryNotificationSink {
    state: Arc<RwLock<SinkState>>,
}

impl InMemoryNotificationSink {
    /// Creates a new empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the sink to fail every emit call.
    pub fn set_fail_on_emit(&self, fail: bool) {
        self.state.write().unwrap().fail_on_emit = fail;
    }

    /// Returns every notification emitted so far.
    pub fn sent(&self) -> Vec<(Uuid, Notification)> {
        self.state.read().unwrap().sent.clone()
    }

    /// Returns the notifications delivered to one recipient.
    pub fn sent_to(&self, recipient: Uuid) -> Vec<Notification> {
        self.state
            .read()
            .unwrap()
            .sent
            .iter()
            .filter(|(r, _)| *r == recipient)
            .map(|(_, n)| n.clone())
            .collect()
    }

    /// Returns the number of emitted notifications.
    pub fn count(&self) -> usize {
        self.state.read().unwrap().sent.len()
    }
}

#[async_trait]
impl NotificationSink for InMemoryNotificationSink {
    async fn emit(
        &self,
        recipient: Uuid,
        notification: Notification,
    ) -> Result<(), NotificationError> {
        let mut state = self.state.write().unwrap();
        if state.fail_on_emit {
            return Err(NotificationError("sink unavailable".to_string()));
        }
        state.sent.push((recipient, notification));
        Ok(())
    }
}
