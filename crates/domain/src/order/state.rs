//! Order lifecycle state machine.

use serde::{Deserialize, Serialize};

/// The state of an order in its fulfillment lifecycle.
///
/// State transitions:
/// ```text
/// Pending ──► Confirmed ──► Preparing ──► Shipped ──► Delivered
///    │            │
///    └────────────┴──► Cancelled
/// ```
///
/// `Delivered` and `Cancelled` are terminal. Cancellation is only
/// reachable while the seller has not started preparing the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderState {
    /// Freshly checked out, awaiting seller confirmation.
    #[default]
    Pending,

    /// Confirmed by the seller. Still cancellable by the buyer.
    Confirmed,

    /// The seller is preparing the order. No longer cancellable.
    Preparing,

    /// Handed to the carrier.
    Shipped,

    /// Delivered to the buyer (terminal state).
    Delivered,

    /// Cancelled, stock returned to products (terminal state).
    Cancelled,
}

impl OrderState {
    /// Returns true if the transition to `target` is in the legal table.
    ///
    /// Terminal states allow no transitions at all.
    pub fn can_transition_to(&self, target: OrderState) -> bool {
        use OrderState::*;

        match self {
            Pending => matches!(target, Confirmed | Cancelled),
            Confirmed => matches!(target, Preparing | Cancelled),
            Preparing => matches!(target, Shipped),
            Shipped => matches!(target, Delivered),
            Delivered | Cancelled => false,
        }
    }

    /// Returns true if the order can still be cancelled.
    pub fn can_cancel(&self) -> bool {
        matches!(self, OrderState::Pending | OrderState::Confirmed)
    }

    /// Returns true if this is a terminal state (no further transitions).
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderState::Delivered | OrderState::Cancelled)
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderState::Pending => "Pending",
            OrderState::Confirmed => "Confirmed",
            OrderState::Preparing => "Preparing",
            OrderState::Shipped => "Shipped",
            OrderState::Delivered => "Delivered",
            OrderState::Cancelled => "Cancelled",
        }
    }

    /// Returns a buyer-facing description used in status notifications.
    pub fn description(&self) -> &'static str {
        match self {
            OrderState::Pending => "Your order has been received and is awaiting confirmation",
            OrderState::Confirmed => "Your order has been confirmed by the seller",
            OrderState::Preparing => "Your order is being prepared",
            OrderState::Shipped => "Your order is on its way",
            OrderState::Delivered => "Your order has been delivered",
            OrderState::Cancelled => "Your order has been cancelled",
        }
    }
}

impl std::fmt::Display for OrderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OrderState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(OrderState::Pending),
            "Confirmed" => Ok(OrderState::Confirmed),
            "Preparing" => Ok(OrderState::Preparing),
            "Shipped" => Ok(OrderState::Shipped),
            "Delivered" => Ok(OrderState::Delivered),
            "Cancelled" => Ok(OrderState::Cancelled),
            other => Err(format!("unknown order state: {other}")),
        }
    }
}
