//! Domain layer for the marketplace checkout engine.
//!
//! This crate provides the core domain types:
//! - `Cart` aggregate with add/update/remove/clear operations
//! - `Order` aggregate with an immutable item snapshot and lifecycle state machine
//! - `Money` value type (cents-based, no floating point)
//! - `OrderNumber` date-scoped order identifiers
//!
//! Everything here is pure: no I/O, no async, no clock reads. Timestamps
//! are passed in by callers so the aggregates stay deterministic.

pub mod cart;
pub mod money;
pub mod order;

pub use cart::{Cart, CartError, CartItem};
pub use money::Money;
pub use order::{
    Order, OrderError, OrderItem, OrderNumber, OrderParts, OrderState, ShippingDetails,
};
