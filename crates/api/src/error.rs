//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::{CartError, CheckoutError, OrderError};
use store::StoreError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Bad request from the client.
    BadRequest(String),
    /// The caller may not perform this action.
    Forbidden(String),
    /// Resource not found.
    NotFound(String),
    /// Lifecycle guard violation, inventory shortage, or lost race.
    Conflict(String),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match &err {
            StoreError::Conflict { .. } => ApiError::Conflict(err.to_string()),
            StoreError::InsufficientStock { .. } => ApiError::Conflict(err.to_string()),
            StoreError::DuplicateIdempotencyKey { .. } => ApiError::Conflict(err.to_string()),
            StoreError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            StoreError::Database(_) | StoreError::Migration(_) | StoreError::Corrupt(_) => {
                ApiError::Internal(err.to_string())
            }
        }
    }
}

impl From<CartError> for ApiError {
    fn from(err: CartError) -> Self {
        match err {
            CartError::OutOfStock { .. } => ApiError::Conflict(err.to_string()),
            CartError::ProductNotFound { .. } | CartError::ItemNotFound { .. } => {
                ApiError::NotFound(err.to_string())
            }
            CartError::InvalidQuantity { .. } => ApiError::BadRequest(err.to_string()),
            CartError::Store(inner) => inner.into(),
        }
    }
}

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        match err {
            CheckoutError::Validation(_)
            | CheckoutError::EmptySelection
            | CheckoutError::PaymentProofMissing
            | CheckoutError::InvalidProof(_) => ApiError::BadRequest(err.to_string()),
            CheckoutError::ProductUnavailable { .. } => ApiError::NotFound(err.to_string()),
            CheckoutError::InsufficientStock { .. } => ApiError::Conflict(err.to_string()),
            CheckoutError::Store(inner) => inner.into(),
        }
    }
}

impl From<OrderError> for ApiError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::NotFound => ApiError::NotFound(err.to_string()),
            OrderError::InvalidStateTransition { .. } => ApiError::Conflict(err.to_string()),
            OrderError::Forbidden { .. } => ApiError::Forbidden(err.to_string()),
            OrderError::Store(inner) => inner.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use common::{OrderStatus, ProductId};

    use super::*;

    #[test]
    fn lifecycle_guard_maps_to_conflict() {
        let err = OrderError::InvalidStateTransition {
            current: OrderStatus::Delivered,
            action: "request cancellation",
        };
        assert!(matches!(ApiError::from(err), ApiError::Conflict(_)));
    }

    #[test]
    fn insufficient_stock_maps_to_conflict() {
        let err = CheckoutError::InsufficientStock {
            product_id: ProductId::new(),
        };
        assert!(matches!(ApiError::from(err), ApiError::Conflict(_)));
    }

    #[test]
    fn wrong_actor_maps_to_forbidden() {
        let err = OrderError::Forbidden {
            action: "decide payment",
        };
        assert!(matches!(ApiError::from(err), ApiError::Forbidden(_)));
    }
}
