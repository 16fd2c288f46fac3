//! Shared handler utilities
//!
//! Response helpers and metrics used across handlers.

use std::time::Instant;

use axum::http::StatusCode;
use axum::Json;
use medsupply_types::ApiResponse;
use serde::Serialize;

// ============================================================================
// Responses
// ============================================================================

/// Success envelope with an explicit status
pub type Reply<T> = (StatusCode, Json<ApiResponse<T>>);

pub fn ok<T: Serialize>(message: &str, data: T) -> Reply<T> {
    (StatusCode::OK, Json(ApiResponse::success(message, data)))
}

pub fn created<T: Serialize>(message: &str, data: T) -> Reply<T> {
    (StatusCode::CREATED, Json(ApiResponse::success(message, data)))
}

/// 201 for a fresh write, 200 when an idempotency key replayed an earlier one
pub fn created_or_replayed<T: Serialize>(replayed: bool, message: &str, data: T) -> Reply<T> {
    if replayed {
        ok(message, data)
    } else {
        created(message, data)
    }
}

// ============================================================================
// Metrics Helpers
// ============================================================================

/// Record operation duration with result label.
///
/// Labels: operation, result (ok/err)
#[inline]
pub fn record_op_duration(operation: &'static str, start: Instant, success: bool) {
    let result = if success { "ok" } else { "err" };
    metrics::histogram!(
        "commerce_operation_duration_seconds",
        "operation" => operation,
        "result" => result
    )
    .record(start.elapsed().as_secs_f64());
}
