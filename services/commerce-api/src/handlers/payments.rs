//! Payment handlers

use std::time::Instant;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use chrono::Utc;
use medsupply_types::{
    CreatePaymentRequest, ListQuery, PaymentData, PaymentPage, ReconcileReport,
    UpdatePaymentStatusRequest,
};
use tracing::instrument;

use super::shared::{created_or_replayed, ok, record_op_duration, Reply};
use crate::error::ApiResult;
use crate::extractors::{idempotency_key, AdminUser, AuthUser, JsonBody, QueryParams};
use crate::state::AppState;

/// `POST /api/payments`
#[instrument(skip_all, fields(user_id = %caller.user_id, plan = req.payment_type.as_str()))]
pub async fn create_payment(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    headers: HeaderMap,
    JsonBody(req): JsonBody<CreatePaymentRequest>,
) -> ApiResult<Reply<PaymentData>> {
    let start = Instant::now();
    let result = state
        .services
        .payments
        .create(&caller, req, idempotency_key(&headers), Utc::now())
        .await;
    record_op_duration("create_payment", start, result.is_ok());

    let recorded = result?;
    Ok(created_or_replayed(
        recorded.replayed,
        "Payment created successfully",
        PaymentData {
            payment: recorded.value,
        },
    ))
}

/// `GET /api/payments/my-payments`
pub async fn my_payments(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    QueryParams(query): QueryParams<ListQuery>,
) -> ApiResult<Reply<PaymentPage>> {
    let page = state.services.payments.list(&caller, &query).await?;
    Ok(ok("Payments retrieved successfully", page))
}

/// `GET /api/payments/{id}`
pub async fn get_payment(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Reply<PaymentData>> {
    let payment = state.services.payments.get(&caller, &id).await?;
    Ok(ok("Payment retrieved successfully", PaymentData { payment }))
}

/// `PATCH /api/payments/{id}/status`
#[instrument(skip_all, fields(admin_id = %admin.user_id, payment = %id))]
pub async fn update_payment_status(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<UpdatePaymentStatusRequest>,
) -> ApiResult<Reply<PaymentData>> {
    let start = Instant::now();
    let result = state
        .services
        .payments
        .update_status(&id, req, Utc::now())
        .await;
    record_op_duration("update_payment_status", start, result.is_ok());

    let payment = result?;
    tracing::info!(admin = %admin.user_id, transaction_id = %payment.transaction_id, "Admin updated payment");
    Ok(ok("Payment status updated successfully", PaymentData { payment }))
}

/// `POST /api/payments/reconcile`
#[instrument(skip_all)]
pub async fn reconcile_payments(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
) -> ApiResult<Reply<ReconcileReport>> {
    let start = Instant::now();
    let result = state.services.payments.reconcile(Utc::now()).await;
    record_op_duration("reconcile_payments", start, result.is_ok());

    let payments = result?;
    Ok(ok(
        "Reconciliation complete",
        ReconcileReport {
            flagged: payments.len(),
            payments,
        },
    ))
}
