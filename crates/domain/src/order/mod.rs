//! Order aggregate and related types.

mod aggregate;
mod number;
mod state;
mod value_objects;

pub use aggregate::{Order, OrderParts};
pub use number::OrderNumber;
pub use state::OrderState;
pub use value_objects::{OrderItem, ShippingDetails};

use thiserror::Error;

/// Errors that can occur during order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    /// The requested state change is not in the transition table.
    #[error("Illegal transition: cannot move from {from} to {to}")]
    IllegalTransition { from: OrderState, to: OrderState },

    /// The order is past the point where cancellation is allowed.
    #[error("Order cannot be cancelled in its current state: {state}")]
    NotCancellable { state: OrderState },

    /// The order reached a terminal state and accepts no further edits.
    #[error("Order is {state} and can no longer be modified")]
    Finalized { state: OrderState },

    /// An order must contain at least one item.
    #[error("Order has no items")]
    NoItems,

    /// Item quantity must be at least 1.
    #[error("Invalid quantity: {quantity} (must be at least 1)")]
    InvalidQuantity { quantity: u32 },
}
