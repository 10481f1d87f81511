//! HTTP route handlers.

pub mod cart;
pub mod health;
pub mod metrics;
pub mod orders;

use axum::http::HeaderMap;
use checkout::{CartService, CheckoutCoordinator, InMemoryNotificationSink, OrderLifecycleService};
use store::MarketStore;
use uuid::Uuid;

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S: MarketStore> {
    pub carts: CartService<S>,
    pub checkout: CheckoutCoordinator<S, InMemoryNotificationSink>,
    pub lifecycle: OrderLifecycleService<S, InMemoryNotificationSink>,
}

/// Reads the caller's identity from the `x-user-id` header.
///
/// Authentication itself happens upstream; the API trusts this header
/// as the resolved identity of the buyer or seller making the call.
pub fn caller_id(headers: &HeaderMap) -> Result<Uuid, ApiError> {
    let value = headers
        .get("x-user-id")
        .ok_or_else(|| ApiError::Unauthorized("Missing x-user-id header".to_string()))?;
    let value = value
        .to_str()
        .map_err(|_| ApiError::Unauthorized("Invalid x-user-id header".to_string()))?;
    Uuid::parse_str(value)
        .map_err(|e| ApiError::Unauthorized(format!("Invalid x-user-id header: {e}")))
}
