//! Service-level error taxonomy.

use common::{OrderId, ProductId};
use domain::{CartError, OrderError};
use store::StoreError;
use thiserror::Error;

/// Errors surfaced by the checkout and lifecycle services.
///
/// Every validation or invariant failure is returned as a typed variant
/// so callers can map them to stable user-facing messages. Losing a
/// stock race surfaces as [`CheckoutError::InsufficientStock`] and is
/// retryable by the caller; the server never retries on its own, since
/// that could reorder which buyer wins contested stock.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// A referenced product does not exist (it may have been deleted
    /// since it was added to the cart).
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// The product exists but is not in a sellable state.
    #[error("Product is not available for purchase: {0}")]
    ProductUnavailable(ProductId),

    /// A referenced order does not exist.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// The caller does not own the entity it tried to act on.
    #[error("You do not have permission to access this order")]
    Forbidden,

    /// Checkout on a cart with no items.
    #[error("Cart is empty. Add products before checking out.")]
    EmptyCart,

    /// Requested quantity exceeds the product's available stock.
    #[error("Insufficient stock for {product_id}: only {available} left, requested {requested}")]
    InsufficientStock {
        product_id: ProductId,
        available: u32,
        requested: u32,
    },

    /// A race was lost: an order-number collision, or a concurrent
    /// lifecycle write that moved the order first.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Cart domain error (invalid quantity, missing line).
    #[error(transparent)]
    Cart(#[from] CartError),

    /// Order domain error (illegal transition, not cancellable).
    #[error(transparent)]
    Order(#[from] OrderError),

    /// Underlying store failure.
    #[error("Store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for CheckoutError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ProductNotFound(id) => CheckoutError::ProductNotFound(id),
            StoreError::OrderNotFound(id) => CheckoutError::OrderNotFound(id),
            StoreError::InsufficientStock {
                product_id,
                available,
                requested,
            } => CheckoutError::InsufficientStock {
                product_id,
                available,
                requested,
            },
            StoreError::DuplicateOrderNumber(number) => {
                CheckoutError::Conflict(format!("order number already taken: {number}"))
            }
            StoreError::StaleOrderState {
                expected, actual, ..
            } => CheckoutError::Conflict(format!(
                "order changed concurrently: expected {expected}, found {actual}"
            )),
            other => CheckoutError::Store(other),
        }
    }
}

/// Result type for service operations.
pub type Result<T> = std::result::Result<T, CheckoutError>;
