//! Persistence layer for the marketplace checkout engine.
//!
//! The [`MarketStore`] trait is the single gateway to shared state:
//! catalog reads, the two atomic stock primitives (checkout reservation
//! and cancellation release), the per-date order-number counter, cart
//! persistence, and order persistence/queries.
//!
//! Two implementations are provided:
//! - [`InMemoryMarketStore`] for tests and local development
//! - [`PostgresMarketStore`] backed by sqlx, where the stock check and
//!   decrement are a single conditional multi-row update inside one
//!   transaction

mod error;
mod memory;
mod postgres;
mod store;

pub use error::{Result, StoreError};
pub use memory::InMemoryMarketStore;
pub use postgres::PostgresMarketStore;
pub use store::{MarketStore, OrderSummary, ProductRecord, StockLevel};
