//! Error types for the Commerce API service.
//!
//! Every failure is rendered as the standard envelope
//! `{success: false, message, errors?}`.

use std::sync::atomic::{AtomicBool, Ordering};

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use medsupply_auth_core::AuthError;
use medsupply_checkout_core::CheckoutError;
use medsupply_types::{ApiResponse, FieldError};

static EXPOSE_INTERNAL_ERRORS: AtomicBool = AtomicBool::new(false);

/// Show internal error details in responses (development only)
pub fn expose_internal_errors(expose: bool) {
    EXPOSE_INTERNAL_ERRORS.store(expose, Ordering::Relaxed);
}

/// API error type
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Authentication required")]
    Unauthorized(#[from] AuthError),

    #[error("Admin access required")]
    AdminRequired,

    #[error("Checkout error")]
    Checkout(#[from] CheckoutError),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(e) => {
                StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::UNAUTHORIZED)
            }
            Self::AdminRequired => StatusCode::FORBIDDEN,
            Self::Checkout(e) => {
                StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Unauthorized(e) => e.error_code(),
            Self::AdminRequired => "FORBIDDEN",
            Self::Checkout(e) => e.error_code(),
        }
    }

    fn public_message(&self) -> String {
        match self {
            Self::Unauthorized(AuthError::AccountDisabled) => "Account is disabled".to_string(),
            Self::Unauthorized(e) if e.status_code() < 500 => "Authentication required".to_string(),
            Self::Checkout(CheckoutError::Validation(_)) => "Validation failed".to_string(),
            Self::Checkout(CheckoutError::Forbidden) => "Access denied".to_string(),
            Self::Checkout(CheckoutError::NotFound(what)) => format!("{what} not found"),
            Self::Checkout(e) if e.status_code() < 500 => e.to_string(),
            _ if EXPOSE_INTERNAL_ERRORS.load(Ordering::Relaxed) => self.detail(),
            _ => "Internal server error".to_string(),
        }
    }

    fn detail(&self) -> String {
        match self {
            Self::Checkout(e) => e.to_string(),
            Self::Unauthorized(e) => e.to_string(),
            other => other.to_string(),
        }
    }

    fn field_errors(self) -> Option<Vec<FieldError>> {
        match self {
            Self::Checkout(CheckoutError::Validation(errors)) => Some(errors),
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!(error = ?self, code = self.error_code(), "Internal API error");
        } else {
            tracing::debug!(error = %self.detail(), code = self.error_code(), "Request rejected");
        }

        let mut body = ApiResponse::failure(self.public_message());
        if let Some(errors) = self.field_errors() {
            body = body.with_errors(errors);
        }
        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
