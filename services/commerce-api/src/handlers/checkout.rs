//! Unified checkout handler

use std::time::Instant;

use axum::extract::State;
use axum::http::HeaderMap;
use chrono::Utc;
use medsupply_types::{CheckoutReceipt, CheckoutRequest};
use tracing::instrument;

use super::shared::{created_or_replayed, record_op_duration, Reply};
use crate::error::ApiResult;
use crate::extractors::{idempotency_key, AuthUser, JsonBody};
use crate::state::AppState;

/// `POST /api/checkout`: payment and order in one transaction
#[instrument(skip_all, fields(user_id = %caller.user_id))]
pub async fn checkout(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    headers: HeaderMap,
    JsonBody(req): JsonBody<CheckoutRequest>,
) -> ApiResult<Reply<CheckoutReceipt>> {
    let start = Instant::now();
    let result = state
        .services
        .checkout
        .checkout(&caller, req, idempotency_key(&headers), Utc::now())
        .await;
    record_op_duration("checkout", start, result.is_ok());

    let recorded = result?;
    Ok(created_or_replayed(
        recorded.replayed,
        "Checkout completed successfully",
        recorded.value,
    ))
}
