//! Checkout and order endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{OrderId, ShopId};
use domain::{DeliveryDetails, OrderDetails};
use serde::Deserialize;
use storage::Store;

use super::customer::Customer;
use super::json::JsonBody;
use crate::AppState;
use crate::error::ApiError;

/// Checkout request: which shop's cart to order, and where to deliver.
#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub shop_id: ShopId,
    #[serde(flatten)]
    pub delivery: DeliveryDetails,
}

/// GET /orders: the customer's orders, newest first.
pub async fn list<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Customer(customer): Customer,
) -> Result<Json<Vec<OrderDetails>>, ApiError> {
    Ok(Json(state.orders.list_orders(customer).await?))
}

/// POST /orders: place an order from the customer's cart for a shop.
#[tracing::instrument(skip(state, req))]
pub async fn create<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Customer(customer): Customer,
    JsonBody(req): JsonBody<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderDetails>), ApiError> {
    let cart = state.carts.find_cart(customer, req.shop_id).await?;
    let order = state
        .orders
        .place_order(customer, cart.cart.id, req.delivery)
        .await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// GET /orders/{id}: one of the customer's orders.
pub async fn get<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Customer(customer): Customer,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderDetails>, ApiError> {
    Ok(Json(state.orders.get_order(customer, id).await?))
}

/// POST /orders/{id}/cancel: cancel and restore stock.
#[tracing::instrument(skip(state))]
pub async fn cancel<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Customer(customer): Customer,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderDetails>, ApiError> {
    Ok(Json(state.orders.cancel_order(customer, id).await?))
}
