//! Order handlers

use std::time::Instant;

use axum::body::Bytes;
use axum::extract::{Path, State};
use chrono::Utc;
use medsupply_types::{
    CancelOrderRequest, CreateOrderRequest, ListQuery, OrderData, OrderPage, StatsData,
    UpdateOrderStatusRequest,
};
use tracing::instrument;

use super::shared::{created, ok, record_op_duration, Reply};
use crate::error::{ApiError, ApiResult};
use crate::extractors::{AdminUser, AuthUser, JsonBody, QueryParams};
use crate::state::AppState;

/// `POST /api/orders`
#[instrument(skip_all, fields(user_id = %caller.user_id))]
pub async fn create_order(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    JsonBody(req): JsonBody<CreateOrderRequest>,
) -> ApiResult<Reply<OrderData>> {
    let start = Instant::now();
    let result = state
        .services
        .orders
        .create(&caller, req, Utc::now())
        .await;
    record_op_duration("create_order", start, result.is_ok());

    Ok(created("Order created successfully", OrderData { order: result? }))
}

/// `GET /api/orders/my-orders`
pub async fn my_orders(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    QueryParams(query): QueryParams<ListQuery>,
) -> ApiResult<Reply<OrderPage>> {
    let page = state.services.orders.list(&caller, &query).await?;
    Ok(ok("Orders retrieved successfully", page))
}

/// `GET /api/orders/{id}`
pub async fn get_order(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Reply<OrderData>> {
    let order = state.services.orders.get(&caller, &id).await?;
    Ok(ok("Order retrieved successfully", OrderData { order }))
}

/// `PATCH /api/orders/{id}/status`
#[instrument(skip_all, fields(admin_id = %admin.user_id, order = %id))]
pub async fn update_order_status(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<UpdateOrderStatusRequest>,
) -> ApiResult<Reply<OrderData>> {
    let start = Instant::now();
    let result = state
        .services
        .orders
        .update_status(&id, req, Utc::now())
        .await;
    record_op_duration("update_order_status", start, result.is_ok());

    let order = result?;
    tracing::info!(admin = %admin.user_id, order_number = %order.order_number, "Admin updated order");
    Ok(ok("Order status updated successfully", OrderData { order }))
}

/// `PATCH /api/orders/{id}/cancel`
///
/// The body is optional; an empty request cancels with the default reason.
#[instrument(skip_all, fields(user_id = %caller.user_id, order = %id))]
pub async fn cancel_order(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<Reply<OrderData>> {
    let req: CancelOrderRequest = if body.iter().all(u8::is_ascii_whitespace) {
        CancelOrderRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::BadRequest(format!("Invalid request body: {e}")))?
    };
    let start = Instant::now();
    let result = state
        .services
        .orders
        .cancel(&caller, &id, req, Utc::now())
        .await;
    record_op_duration("cancel_order", start, result.is_ok());

    Ok(ok("Order cancelled successfully", OrderData { order: result? }))
}

/// `GET /api/orders/stats/overview`
pub async fn order_stats(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
) -> ApiResult<Reply<StatsData>> {
    let stats = state.services.orders.stats().await?;
    Ok(ok("Order statistics retrieved successfully", StatsData { stats }))
}
