//! Cart endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use common::{BuyerId, ProductId};
use domain::Cart;
use serde::{Deserialize, Serialize};
use store::MarketStore;
use uuid::Uuid;

use crate::error::ApiError;

use super::{AppState, caller_id};

// -- Request types --

#[derive(Deserialize)]
pub struct AddItemRequest {
    pub product_id: Uuid,
    pub quantity: u32,
}

#[derive(Deserialize)]
pub struct UpdateQuantityRequest {
    pub quantity: u32,
}

// -- Response types --

#[derive(Serialize)]
pub struct CartItemResponse {
    pub product_id: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
    pub subtotal_cents: i64,
}

#[derive(Serialize)]
pub struct CartResponse {
    pub buyer_id: String,
    pub items: Vec<CartItemResponse>,
    pub item_count: u32,
    pub total_cents: i64,
}

impl CartResponse {
    fn from_cart(cart: &Cart) -> Self {
        Self {
            buyer_id: cart.buyer_id().to_string(),
            items: cart
                .items()
                .map(|item| CartItemResponse {
                    product_id: item.product_id.to_string(),
                    quantity: item.quantity,
                    unit_price_cents: item.unit_price.cents(),
                    subtotal_cents: item.subtotal().cents(),
                })
                .collect(),
            item_count: cart.item_count(),
            total_cents: cart.total().cents(),
        }
    }
}

// -- Handlers --

/// GET /cart — the caller's cart (empty if none exists yet).
#[tracing::instrument(skip(state, headers))]
pub async fn get<S: MarketStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
) -> Result<Json<CartResponse>, ApiError> {
    let buyer = BuyerId::from_uuid(caller_id(&headers)?);
    let cart = state.carts.get_cart(buyer).await?;
    Ok(Json(CartResponse::from_cart(&cart)))
}

/// POST /cart/items — add a product to the caller's cart.
#[tracing::instrument(skip(state, headers, req))]
pub async fn add_item<S: MarketStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Json(req): Json<AddItemRequest>,
) -> Result<Json<CartResponse>, ApiError> {
    let buyer = BuyerId::from_uuid(caller_id(&headers)?);
    let cart = state
        .carts
        .add_item(buyer, ProductId::from_uuid(req.product_id), req.quantity)
        .await?;
    Ok(Json(CartResponse::from_cart(&cart)))
}

/// PUT /cart/items/:product_id — set a line's quantity.
#[tracing::instrument(skip(state, headers, req))]
pub async fn update_quantity<S: MarketStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Path(product_id): Path<Uuid>,
    Json(req): Json<UpdateQuantityRequest>,
) -> Result<Json<CartResponse>, ApiError> {
    let buyer = BuyerId::from_uuid(caller_id(&headers)?);
    let cart = state
        .carts
        .update_quantity(buyer, ProductId::from_uuid(product_id), req.quantity)
        .await?;
    Ok(Json(CartResponse::from_cart(&cart)))
}

/// DELETE /cart/items/:product_id — remove a line from the cart.
#[tracing::instrument(skip(state, headers))]
pub async fn remove_item<S: MarketStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Path(product_id): Path<Uuid>,
) -> Result<Json<CartResponse>, ApiError> {
    let buyer = BuyerId::from_uuid(caller_id(&headers)?);
    let cart = state
        .carts
        .remove_item(buyer, ProductId::from_uuid(product_id))
        .await?;
    Ok(Json(CartResponse::from_cart(&cart)))
}

/// DELETE /cart — remove every line from the cart.
#[tracing::instrument(skip(state, headers))]
pub async fn clear<S: MarketStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
) -> Result<Json<CartResponse>, ApiError> {
    let buyer = BuyerId::from_uuid(caller_id(&headers)?);
    let cart = state.carts.clear(buyer).await?;
    Ok(Json(CartResponse::from_cart(&cart)))
}
