//! Checkout and order lifecycle endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use chrono::{DateTime, Utc};
use common::{BuyerId, OrderId, SellerId};
use domain::{Order, OrderState, ShippingDetails};
use serde::{Deserialize, Serialize};
use store::{MarketStore, OrderSummary};
use uuid::Uuid;

use crate::error::ApiError;

use super::{AppState, caller_id};

// -- Request types --

#[derive(Deserialize)]
pub struct CheckoutRequest {
    pub shipping_address: String,
    pub phone: String,
    pub payment_method: String,
    pub notes: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub state: OrderState,
    pub note: Option<String>,
}

#[derive(Deserialize)]
pub struct CancelRequest {
    pub reason: Option<String>,
}

#[derive(Deserialize)]
pub struct DeliveryEstimateRequest {
    pub estimated_delivery_at: DateTime<Utc>,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderItemResponse {
    pub product_id: String,
    pub product_name: String,
    pub product_image: Option<String>,
    pub seller_id: String,
    pub seller_name: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
    pub subtotal_cents: i64,
}

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub buyer_id: String,
    pub order_number: String,
    pub state: String,
    pub state_description: String,
    pub items: Vec<OrderItemResponse>,
    pub total_cents: i64,
    pub shipping_address: String,
    pub phone: String,
    pub payment_method: String,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub cancelled_at: Option<String>,
    pub cancel_reason: Option<String>,
    pub delivered_at: Option<String>,
    pub estimated_delivery_at: Option<String>,
}

impl OrderResponse {
    fn from_order(order: &Order) -> Self {
        Self {
            id: order.id().to_string(),
            buyer_id: order.buyer_id().to_string(),
            order_number: order.order_number().to_string(),
            state: order.state().to_string(),
            state_description: order.state().description().to_string(),
            items: order
                .items()
                .iter()
                .map(|item| OrderItemResponse {
                    product_id: item.product_id.to_string(),
                    product_name: item.product_name.clone(),
                    product_image: item.product_image.clone(),
                    seller_id: item.seller_id.to_string(),
                    seller_name: item.seller_name.clone(),
                    quantity: item.quantity,
                    unit_price_cents: item.unit_price.cents(),
                    subtotal_cents: item.subtotal.cents(),
                })
                .collect(),
            total_cents: order.total().cents(),
            shipping_address: order.shipping().address.clone(),
            phone: order.shipping().phone.clone(),
            payment_method: order.shipping().payment_method.clone(),
            notes: order.notes().map(String::from),
            created_at: order.created_at().to_rfc3339(),
            updated_at: order.updated_at().to_rfc3339(),
            cancelled_at: order.cancelled_at().map(|t| t.to_rfc3339()),
            cancel_reason: order.cancel_reason().map(String::from),
            delivered_at: order.delivered_at().map(|t| t.to_rfc3339()),
            estimated_delivery_at: order.estimated_delivery_at().map(|t| t.to_rfc3339()),
        }
    }
}

#[derive(Serialize)]
pub struct SummaryResponse {
    pub pending: u64,
    pub confirmed: u64,
    pub preparing: u64,
    pub shipped: u64,
    pub delivered: u64,
    pub cancelled: u64,
    pub total_orders: u64,
    pub total_spent_cents: i64,
}

impl SummaryResponse {
    fn from_summary(summary: &OrderSummary) -> Self {
        Self {
            pending: summary.pending,
            confirmed: summary.confirmed,
            preparing: summary.preparing,
            shipped: summary.shipped,
            delivered: summary.delivered,
            cancelled: summary.cancelled,
            total_orders: summary.total_orders,
            total_spent_cents: summary.total_spent.cents(),
        }
    }
}

// -- Handlers --

/// POST /checkout — convert the caller's cart into an order.
#[tracing::instrument(skip(state, headers, req))]
pub async fn checkout<S: MarketStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Json(req): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let buyer = BuyerId::from_uuid(caller_id(&headers)?);
    let shipping = ShippingDetails {
        address: req.shipping_address,
        phone: req.phone,
        payment_method: req.payment_method,
    };

    let order = state.checkout.checkout(buyer, shipping, req.notes).await?;
    Ok((StatusCode::CREATED, Json(OrderResponse::from_order(&order))))
}

/// GET /orders — the caller's orders, most recent first.
#[tracing::instrument(skip(state, headers))]
pub async fn list<S: MarketStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let buyer = BuyerId::from_uuid(caller_id(&headers)?);
    let orders = state.lifecycle.list_for_buyer(buyer).await?;
    Ok(Json(orders.iter().map(OrderResponse::from_order).collect()))
}

/// GET /orders/summary — per-state counts and lifetime spend.
#[tracing::instrument(skip(state, headers))]
pub async fn summary<S: MarketStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
) -> Result<Json<SummaryResponse>, ApiError> {
    let buyer = BuyerId::from_uuid(caller_id(&headers)?);
    let summary = state.lifecycle.summary(buyer).await?;
    Ok(Json(SummaryResponse::from_summary(&summary)))
}

/// GET /orders/:id — load one of the caller's orders.
#[tracing::instrument(skip(state, headers))]
pub async fn get<S: MarketStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<OrderResponse>, ApiError> {
    let buyer = BuyerId::from_uuid(caller_id(&headers)?);
    let order = state
        .lifecycle
        .get_order(OrderId::from_uuid(id), buyer)
        .await?;
    Ok(Json(OrderResponse::from_order(&order)))
}

/// PUT /orders/:id/status — move an order to a new lifecycle state.
#[tracing::instrument(skip(state, headers, req))]
pub async fn update_status<S: MarketStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let actor = caller_id(&headers)?;
    let order = state
        .lifecycle
        .update_status(OrderId::from_uuid(id), actor, req.state, req.note)
        .await?;
    Ok(Json(OrderResponse::from_order(&order)))
}

/// POST /orders/:id/cancel — cancel one of the caller's orders.
#[tracing::instrument(skip(state, headers, req))]
pub async fn cancel<S: MarketStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(req): Json<CancelRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let buyer = BuyerId::from_uuid(caller_id(&headers)?);
    let order = state
        .lifecycle
        .cancel(OrderId::from_uuid(id), buyer, req.reason)
        .await?;
    Ok(Json(OrderResponse::from_order(&order)))
}

/// PUT /orders/:id/delivery-estimate — record a delivery estimate.
#[tracing::instrument(skip(state, headers, req))]
pub async fn set_delivery_estimate<S: MarketStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(req): Json<DeliveryEstimateRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let actor = caller_id(&headers)?;
    let order = state
        .lifecycle
        .set_estimated_delivery(OrderId::from_uuid(id), actor, req.estimated_delivery_at)
        .await?;
    Ok(Json(OrderResponse::from_order(&order)))
}

/// GET /seller/orders — orders containing the caller's products.
#[tracing::instrument(skip(state, headers))]
pub async fn list_for_seller<S: MarketStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let seller = SellerId::from_uuid(caller_id(&headers)?);
    let orders = state.lifecycle.list_for_seller(seller).await?;
    Ok(Json(orders.iter().map(OrderResponse::from_order).collect()))
}
