//! Order endpoints: checkout, queries, and lifecycle transitions.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use common::{CartItemId, OrderId, OrderStatus, Party, ShopId};
use domain::{PaymentProof, PlaceOrder};
use serde::{Deserialize, Serialize};
use store::{Order, OrderItem};
use uuid::Uuid;

use crate::error::ApiError;
use crate::extract::Caller;
use crate::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct PlaceOrderRequest {
    pub shop_id: Option<Uuid>,
    pub selected_items: Vec<Uuid>,
    pub recipient: String,
    pub telephone: String,
    pub address: String,
    #[serde(default)]
    pub note: String,
    pub proof_of_payment: Option<PaymentProof>,
    pub idempotency_key: String,
}

#[derive(Deserialize)]
pub struct CancelRequestBody {
    pub by: Option<Party>,
}

#[derive(Deserialize)]
pub struct PaymentDecisionRequest {
    pub accepted: bool,
}

#[derive(Deserialize)]
pub struct ShippingStatusRequest {
    pub status: OrderStatus,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderCreatedResponse {
    pub order_id: String,
}

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub buyer_id: String,
    pub shop_id: String,
    pub recipient: String,
    pub telephone: String,
    pub address: String,
    pub note: String,
    pub total_price: i64,
    pub proof_reference: String,
    pub status: String,
    pub cancel_by: Option<String>,
    pub created_at: String,
}

#[derive(Serialize)]
pub struct OrderItemResponse {
    pub product_id: String,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: i64,
}

#[derive(Serialize)]
pub struct OrderDetailResponse {
    #[serde(flatten)]
    pub order: OrderResponse,
    pub items: Vec<OrderItemResponse>,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id.to_string(),
            buyer_id: order.buyer_id.to_string(),
            shop_id: order.shop_id.to_string(),
            recipient: order.recipient,
            telephone: order.telephone,
            address: order.address,
            note: order.note,
            total_price: order.total_price.amount(),
            proof_reference: order.proof_reference,
            status: order.status.to_string(),
            cancel_by: order.cancel_by.map(|p| p.to_string()),
            created_at: order.created_at.to_rfc3339(),
        }
    }
}

impl From<OrderItem> for OrderItemResponse {
    fn from(item: OrderItem) -> Self {
        Self {
            product_id: item.product_id.to_string(),
            product_name: item.product_name,
            quantity: item.quantity,
            unit_price: item.unit_price.amount(),
        }
    }
}

// -- Handlers --

/// POST /orders — materialize selected cart items into an order.
#[tracing::instrument(skip(state, req))]
pub async fn create(
    State(state): State<Arc<AppState>>,
    Caller(user_id): Caller,
    Json(req): Json<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<OrderCreatedResponse>), ApiError> {
    let cmd = PlaceOrder {
        shop_id: req.shop_id.map(ShopId::from_uuid),
        selected_items: req
            .selected_items
            .into_iter()
            .map(CartItemId::from_uuid)
            .collect(),
        recipient: req.recipient,
        telephone: req.telephone,
        address: req.address,
        note: req.note,
        proof: req.proof_of_payment,
        idempotency_key: req.idempotency_key,
    };

    let order = state.checkout.place_order(user_id, cmd).await?;
    Ok((
        StatusCode::CREATED,
        Json(OrderCreatedResponse {
            order_id: order.id.to_string(),
        }),
    ))
}

/// GET /orders — the caller's orders still in flight.
#[tracing::instrument(skip(state))]
pub async fn list_active(
    State(state): State<Arc<AppState>>,
    Caller(user_id): Caller,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let orders = state.orders.active_for_buyer(user_id).await?;
    Ok(Json(orders.into_iter().map(OrderResponse::from).collect()))
}

/// GET /orders/history — the caller's delivered and cancelled orders.
#[tracing::instrument(skip(state))]
pub async fn list_history(
    State(state): State<Arc<AppState>>,
    Caller(user_id): Caller,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let orders = state.orders.history_for_buyer(user_id).await?;
    Ok(Json(orders.into_iter().map(OrderResponse::from).collect()))
}

/// GET /sales — orders still in flight across the shops the caller owns.
#[tracing::instrument(skip(state))]
pub async fn list_sales(
    State(state): State<Arc<AppState>>,
    Caller(user_id): Caller,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let orders = state.orders.sales_for_seller(user_id).await?;
    Ok(Json(orders.into_iter().map(OrderResponse::from).collect()))
}

/// GET /orders/{id} — full detail with snapshotted items.
#[tracing::instrument(skip(state))]
pub async fn detail(
    State(state): State<Arc<AppState>>,
    Caller(user_id): Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<OrderDetailResponse>, ApiError> {
    let detail = state
        .orders
        .detail(user_id, OrderId::from_uuid(id))
        .await?;
    Ok(Json(OrderDetailResponse {
        order: detail.order.into(),
        items: detail.items.into_iter().map(OrderItemResponse::from).collect(),
    }))
}

/// POST /orders/{id}/cancel-request — open a cancellation request.
///
/// The body is optional; when present, the declared party must match
/// the caller's derived side of the order.
#[tracing::instrument(skip(state, body))]
pub async fn cancel_request(
    State(state): State<Arc<AppState>>,
    Caller(user_id): Caller,
    Path(id): Path<Uuid>,
    body: axum::body::Bytes,
) -> Result<Json<OrderResponse>, ApiError> {
    let declared = if body.is_empty() {
        None
    } else {
        let parsed: CancelRequestBody = serde_json::from_slice(&body)
            .map_err(|err| ApiError::BadRequest(format!("invalid request body: {err}")))?;
        parsed.by
    };
    let order = state
        .orders
        .request_cancel(user_id, OrderId::from_uuid(id), declared)
        .await?;
    Ok(Json(order.into()))
}

/// POST /orders/{id}/cancel-approve — counterparty accepts.
#[tracing::instrument(skip(state))]
pub async fn cancel_approve(
    State(state): State<Arc<AppState>>,
    Caller(user_id): Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = state
        .orders
        .approve_cancel(user_id, OrderId::from_uuid(id))
        .await?;
    Ok(Json(order.into()))
}

/// POST /orders/{id}/cancel-deny — counterparty refuses.
#[tracing::instrument(skip(state))]
pub async fn cancel_deny(
    State(state): State<Arc<AppState>>,
    Caller(user_id): Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = state
        .orders
        .deny_cancel(user_id, OrderId::from_uuid(id))
        .await?;
    Ok(Json(order.into()))
}

/// POST /orders/{id}/payment-decision — seller reviews the proof.
#[tracing::instrument(skip(state, req))]
pub async fn payment_decision(
    State(state): State<Arc<AppState>>,
    Caller(user_id): Caller,
    Path(id): Path<Uuid>,
    Json(req): Json<PaymentDecisionRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = state
        .orders
        .decide_payment(user_id, OrderId::from_uuid(id), req.accepted)
        .await?;
    Ok(Json(order.into()))
}

/// PATCH /orders/{id}/shipping-status — seller advances the shipment.
#[tracing::instrument(skip(state, req))]
pub async fn shipping_status(
    State(state): State<Arc<AppState>>,
    Caller(user_id): Caller,
    Path(id): Path<Uuid>,
    Json(req): Json<ShippingStatusRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = state
        .orders
        .advance_shipping(user_id, OrderId::from_uuid(id), req.status)
        .await?;
    Ok(Json(order.into()))
}
