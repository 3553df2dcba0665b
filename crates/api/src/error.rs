//! API error types with HTTP response mapping.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::{CartError, DomainError, InventoryError, OrderError};

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// The acting customer could not be identified.
    Unauthorized,
    /// The request body could not be read as the expected JSON.
    InvalidBody(JsonRejection),
    /// Domain logic error.
    Domain(DomainError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthenticated".to_string()),
            ApiError::InvalidBody(rejection) => (rejection.status(), rejection.body_text()),
            ApiError::Domain(err) => domain_error_to_response(err),
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn domain_error_to_response(err: DomainError) -> (StatusCode, String) {
    let status = match &err {
        DomainError::Storage(e) => {
            tracing::error!(error = %e, "internal server error");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            );
        }
        DomainError::Inventory(InventoryError::InsufficientStock { .. }) => StatusCode::CONFLICT,
        DomainError::Inventory(InventoryError::ProductNotFound(_)) => StatusCode::NOT_FOUND,
        DomainError::Cart(cart_err) => match cart_err {
            CartError::InvalidQuantity { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            CartError::CartNotFound
            | CartError::CartItemNotFound
            | CartError::ProductNotFound(_)
            | CartError::ShopNotFound(_) => StatusCode::NOT_FOUND,
        },
        DomainError::Order(order_err) => match order_err {
            OrderError::EmptyCart | OrderError::InvalidDelivery { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            OrderError::OrderNotFound => StatusCode::NOT_FOUND,
            OrderError::OrderNotCancellable { .. } => StatusCode::CONFLICT,
            OrderError::OrderNumberCollision => StatusCode::SERVICE_UNAVAILABLE,
        },
        DomainError::Import(_) => StatusCode::UNPROCESSABLE_ENTITY,
    };
    (status, err.to_string())
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidBody(rejection)
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}
