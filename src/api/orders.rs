//! HTTP handlers
//!
//! Thin request/response mapping over the lifecycle service. Listing fails
//! open (an empty page beats a dead admin screen); every mutating endpoint
//! fails closed.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::json;
use tracing::error;
use uuid::Uuid;

use super::dto::{
    CancelRequest, CreateOrderRequest, ListParams, OrderListResponse, PaymentRequest,
    ShipmentRequest, UpdateOrderRequest,
};
use super::AppState;
use crate::domain::Order;
use crate::error::AppError;
use crate::store::ListQuery;

const DEFAULT_PAGE: u32 = 20;
const MAX_PAGE: u32 = 100;

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy", "service": "atelier-orders" }))
}

pub async fn list_orders(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Json<OrderListResponse> {
    let limit = params.limit.unwrap_or(DEFAULT_PAGE).min(MAX_PAGE);
    let offset = params.offset.unwrap_or(0);
    let query = ListQuery {
        status: params.status,
        limit,
        offset,
    };
    match state
        .service
        .list_orders(query, params.mark_viewed.unwrap_or(false))
        .await
    {
        Ok(page) => Json(page.into()),
        Err(err) => {
            error!(error = %err, "order listing failed, returning empty page");
            Json(OrderListResponse::empty(limit, offset))
        }
    }
}

pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(state.service.get_order(id).await?))
}

pub async fn create_order(
    State(state): State<AppState>,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Order>), AppError> {
    let order = state.service.create_order(payload).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn update_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(patch): Json<UpdateOrderRequest>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(state.service.update_order(id, patch).await?))
}

pub async fn confirm_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(state.service.confirm_order(id).await?))
}

pub async fn cancel_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<CancelRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.service.cancel_order(id, body.reason).await?;
    Ok(Json(json!({ "ok": true })))
}

pub async fn add_payment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<PaymentRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.service.add_payment(id, payload).await?;
    Ok(Json(json!({ "ok": true })))
}

pub async fn create_shipment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ShipmentRequest>,
) -> Result<Json<crate::domain::Shipment>, AppError> {
    let order = state.service.create_shipment(id, payload).await?;
    // add_shipment always appends, so the last entry is the one just made.
    let shipment = order
        .shipments
        .last()
        .cloned()
        .ok_or(AppError::NotFound(id))?;
    Ok(Json(shipment))
}

pub async fn expire_reservations(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let expired = state.service.expire_reservations().await?;
    Ok(Json(json!({ "expired": expired })))
}
