//! Checkout orchestration and order lifecycle services.
//!
//! This crate is the transactional heart of the marketplace:
//! - [`CartService`] — cart mutations validated against the live catalog
//! - [`CheckoutCoordinator`] — the atomic cart-to-order conversion
//! - [`OrderLifecycleService`] — guarded state transitions, cancellation
//!   with stock restitution, and order queries
//! - [`NotificationSink`] — the fire-and-forget boundary to the external
//!   notification subsystem

pub mod cart_service;
pub mod coordinator;
pub mod error;
pub mod lifecycle;
pub mod services;

pub use cart_service::CartService;
pub use coordinator::{CheckoutCoordinator, LOW_STOCK_THRESHOLD};
pub use error::{CheckoutError, Result};
pub use lifecycle::OrderLifecycleService;
pub use services::notifications::{
    InMemoryNotificationSink, Notification, NotificationError, NotificationSink,
};
