//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use checkout::CheckoutError;
use domain::{CartError, OrderError};

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Missing or unparseable identity header.
    Unauthorized(String),
    /// Checkout or lifecycle service error.
    Checkout(CheckoutError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Checkout(err) => checkout_error_to_response(err),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn checkout_error_to_response(err: CheckoutError) -> (StatusCode, String) {
    let status = match &err {
        CheckoutError::ProductNotFound(_) | CheckoutError::OrderNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        CheckoutError::Forbidden => StatusCode::FORBIDDEN,
        CheckoutError::EmptyCart | CheckoutError::ProductUnavailable(_) => StatusCode::BAD_REQUEST,
        // A lost stock or order-number race is retryable by the client.
        CheckoutError::InsufficientStock { .. } | CheckoutError::Conflict(_) => {
            StatusCode::CONFLICT
        }
        CheckoutError::Cart(cart_err) => match cart_err {
            CartError::ItemNotFound { .. } => StatusCode::NOT_FOUND,
            CartError::InvalidQuantity { .. } => StatusCode::BAD_REQUEST,
        },
        CheckoutError::Order(order_err) => match order_err {
            OrderError::IllegalTransition { .. }
            | OrderError::NotCancellable { .. }
            | OrderError::Finalized { .. } => StatusCode::CONFLICT,
            OrderError::NoItems | OrderError::InvalidQuantity { .. } => StatusCode::BAD_REQUEST,
        },
        CheckoutError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!(error = %err, "store failure");
    }
    (status, err.to_string())
}

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        ApiError::Checkout(err)
    }
}
