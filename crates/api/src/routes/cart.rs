//! Cart endpoints.
//!
//! Every mutation responds with the refreshed cart view so the client
//! never needs a follow-up read.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use common::{CartItemId, ProductId};
use domain::CartView;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;
use crate::extract::Caller;
use crate::AppState;

#[derive(Deserialize)]
pub struct AddToCartRequest {
    pub product_id: Uuid,
    /// Defaults to 1 when omitted.
    pub quantity: Option<u32>,
}

#[derive(Deserialize)]
pub struct UpdateCartItemRequest {
    pub quantity: u32,
}

/// GET /cart — the caller's cart grouped by shop.
#[tracing::instrument(skip(state))]
pub async fn view(
    State(state): State<Arc<AppState>>,
    Caller(user_id): Caller,
) -> Result<Json<CartView>, ApiError> {
    Ok(Json(state.cart.view(user_id).await?))
}

/// POST /cart — add a product (or increment its row).
#[tracing::instrument(skip(state, req))]
pub async fn add(
    State(state): State<Arc<AppState>>,
    Caller(user_id): Caller,
    Json(req): Json<AddToCartRequest>,
) -> Result<(StatusCode, Json<CartView>), ApiError> {
    let product_id = ProductId::from_uuid(req.product_id);
    state
        .cart
        .add_item(user_id, product_id, req.quantity.unwrap_or(1))
        .await?;
    Ok((StatusCode::CREATED, Json(state.cart.view(user_id).await?)))
}

/// PATCH /cart/{id} — set a row's quantity; below 1 removes it.
#[tracing::instrument(skip(state, req))]
pub async fn update(
    State(state): State<Arc<AppState>>,
    Caller(user_id): Caller,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateCartItemRequest>,
) -> Result<Json<CartView>, ApiError> {
    state
        .cart
        .update_quantity(user_id, CartItemId::from_uuid(id), req.quantity)
        .await?;
    Ok(Json(state.cart.view(user_id).await?))
}

/// DELETE /cart/{id} — remove a row; removing a missing row succeeds.
#[tracing::instrument(skip(state))]
pub async fn remove(
    State(state): State<Arc<AppState>>,
    Caller(user_id): Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<CartView>, ApiError> {
    state
        .cart
        .remove_item(user_id, CartItemId::from_uuid(id))
        .await?;
    Ok(Json(state.cart.view(user_id).await?))
}
