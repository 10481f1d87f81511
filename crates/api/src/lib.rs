//! HTTP API server with observability for the marketplace checkout engine.
//!
//! Provides REST endpoints for cart management, checkout, and the order
//! lifecycle, with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post, put};
use checkout::{CartService, CheckoutCoordinator, InMemoryNotificationSink, OrderLifecycleService};
use metrics_exporter_prometheus::PrometheusHandle;
use store::{InMemoryMarketStore, MarketStore};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: MarketStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/cart", get(routes::cart::get::<S>))
        .route("/cart", delete(routes::cart::clear::<S>))
        .route("/cart/items", post(routes::cart::add_item::<S>))
        .route(
            "/cart/items/{product_id}",
            put(routes::cart::update_quantity::<S>),
        )
        .route(
            "/cart/items/{product_id}",
            delete(routes::cart::remove_item::<S>),
        )
        .route("/checkout", post(routes::orders::checkout::<S>))
        .route("/orders", get(routes::orders::list::<S>))
        .route("/orders/summary", get(routes::orders::summary::<S>))
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route("/orders/{id}/status", put(routes::orders::update_status::<S>))
        .route("/orders/{id}/cancel", post(routes::orders::cancel::<S>))
        .route(
            "/orders/{id}/delivery-estimate",
            put(routes::orders::set_delivery_estimate::<S>),
        )
        .route("/seller/orders", get(routes::orders::list_for_seller::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates application state over a store, with an in-memory
/// notification sink standing in for the external delivery subsystem.
pub fn create_state<S: MarketStore + Clone + 'static>(store: S) -> Arc<AppState<S>> {
    let sink = InMemoryNotificationSink::new();
    Arc::new(AppState {
        carts: CartService::new(store.clone()),
        checkout: CheckoutCoordinator::new(store.clone(), sink.clone()),
        lifecycle: OrderLifecycleService::new(store, sink),
    })
}

/// Creates application state backed by the in-memory store, for local
/// development and tests.
pub fn create_default_state() -> (Arc<AppState<InMemoryMarketStore>>, InMemoryMarketStore) {
    let store = InMemoryMarketStore::new();
    (create_state(store.clone()), store)
}
