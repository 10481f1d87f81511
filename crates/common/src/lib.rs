//! Shared types for the marketplace backend.

mod types;

pub use types::{BuyerId, OrderId, ProductId, SellerId};
