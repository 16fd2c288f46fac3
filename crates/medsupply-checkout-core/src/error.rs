//! Checkout errors

use medsupply_types::FieldError;
use thiserror::Error;

/// Failure reported by a checkout backend
#[derive(Error, Debug, Clone)]
pub enum BackendError {
    /// The server answered with an error envelope
    #[error("{message} (HTTP {status})")]
    Rejected {
        status: u16,
        message: String,
        errors: Vec<FieldError>,
    },

    /// The request never got a usable answer
    #[error("transport error: {0}")]
    Transport(String),
}

/// Checkout errors
#[derive(Error, Debug)]
pub enum CheckoutError {
    /// Malformed, missing or inconsistent input
    #[error("validation failed")]
    Validation(Vec<FieldError>),

    /// Caller is neither the owner nor an admin
    #[error("access denied")]
    Forbidden,

    /// Record not found
    #[error("{0} not found")]
    NotFound(&'static str),

    /// The record's current state does not allow the operation
    #[error("{0}")]
    InvalidState(String),

    /// The record changed between read and write
    #[error("{0} was modified concurrently")]
    Conflict(&'static str),

    /// Could not find a free identifier after repeated collisions
    #[error("could not allocate a unique {0}")]
    IdsExhausted(&'static str),

    /// Payment was recorded but the order was not
    #[error("payment {transaction_id} was recorded but the order failed: {source}")]
    PartialFailure {
        transaction_id: String,
        #[source]
        source: BackendError,
    },

    /// Backend call failed before anything was recorded
    #[error("checkout backend error: {0}")]
    Backend(#[from] BackendError),

    /// Database error
    #[error("database error: {0}")]
    Database(#[from] medsupply_db::DbError),
}

impl CheckoutError {
    /// Single-field validation failure
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        Self::Validation(vec![medsupply_types::validation::field_error(field, message)])
    }

    /// Get HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) | Self::InvalidState(_) => 400,
            Self::Forbidden => 403,
            Self::NotFound(_) => 404,
            Self::Conflict(_) => 409,
            Self::Backend(BackendError::Rejected { status, .. }) => *status,
            Self::Backend(BackendError::Transport(_)) | Self::PartialFailure { .. } => 502,
            Self::IdsExhausted(_) | Self::Database(_) => 500,
        }
    }

    /// Get error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Forbidden => "FORBIDDEN",
            Self::NotFound(_) => "NOT_FOUND",
            Self::InvalidState(_) => "INVALID_STATE_TRANSITION",
            Self::Conflict(_) => "CONFLICT",
            Self::PartialFailure { .. } => "PARTIAL_FAILURE",
            Self::Backend(_) => "BACKEND_ERROR",
            Self::IdsExhausted(_) | Self::Database(_) => "INTERNAL_ERROR",
        }
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
