//! Cart endpoints. All of them act on the calling customer's carts.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::{CartItemId, ProductId, ShopId};
use domain::CartView;
use serde::Deserialize;
use storage::Store;

use super::customer::Customer;
use super::json::JsonBody;
use crate::AppState;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub product_id: ProductId,
    pub quantity: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub quantity: u32,
}

/// GET /carts: every cart of the customer.
pub async fn list<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Customer(customer): Customer,
) -> Result<Json<Vec<CartView>>, ApiError> {
    Ok(Json(state.carts.carts(customer).await?))
}

/// GET /carts/{shop_id}: the cart for one shop, created on first access.
pub async fn show<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Customer(customer): Customer,
    Path(shop_id): Path<ShopId>,
) -> Result<Json<CartView>, ApiError> {
    Ok(Json(state.carts.cart_for_shop(customer, shop_id).await?))
}

/// POST /carts/items: add a product to the cart of its shop.
#[tracing::instrument(skip(state))]
pub async fn add<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Customer(customer): Customer,
    JsonBody(req): JsonBody<AddItemRequest>,
) -> Result<Json<CartView>, ApiError> {
    let view = state
        .carts
        .add_item(customer, req.product_id, req.quantity)
        .await?;
    Ok(Json(view))
}

/// PATCH /carts/items/{item_id}: set a line's quantity.
#[tracing::instrument(skip(state))]
pub async fn update<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Customer(customer): Customer,
    Path(item_id): Path<CartItemId>,
    JsonBody(req): JsonBody<UpdateItemRequest>,
) -> Result<Json<CartView>, ApiError> {
    let view = state
        .carts
        .update_item_quantity(customer, item_id, req.quantity)
        .await?;
    Ok(Json(view))
}

/// DELETE /carts/items/{item_id}: remove a line.
#[tracing::instrument(skip(state))]
pub async fn remove<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Customer(customer): Customer,
    Path(item_id): Path<CartItemId>,
) -> Result<Json<CartView>, ApiError> {
    Ok(Json(state.carts.remove_item(customer, item_id).await?))
}

/// DELETE /carts/{shop_id}: remove every line, keeping the cart.
#[tracing::instrument(skip(state))]
pub async fn clear<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Customer(customer): Customer,
    Path(shop_id): Path<ShopId>,
) -> Result<Json<CartView>, ApiError> {
    Ok(Json(state.carts.clear(customer, shop_id).await?))
}
