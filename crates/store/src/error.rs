use common::{OrderId, ProductId};
use domain::OrderState;
use thiserror::Error;

/// Errors that can occur when interacting with the market store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A referenced product does not exist.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// A referenced order does not exist.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// A conditional stock decrement affected no rows: the product's
    /// available quantity is below the requested amount. Also surfaced
    /// when a concurrent checkout won a race for the last units.
    #[error("Insufficient stock for product {product_id}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: ProductId,
        available: u32,
        requested: u32,
    },

    /// An order number collided with an existing one.
    #[error("Order number already taken: {0}")]
    DuplicateOrderNumber(String),

    /// A guarded order write lost a race: the persisted state no longer
    /// matches the one the caller loaded.
    #[error("Order {order_id} changed concurrently: expected state {expected}, found {actual}")]
    StaleOrderState {
        order_id: OrderId,
        expected: OrderState,
        actual: OrderState,
    },

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A persisted value could not be decoded.
    #[error("Corrupt stored value: {0}")]
    Decode(String),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
