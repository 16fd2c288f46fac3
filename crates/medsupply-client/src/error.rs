//! Client errors
//!
//! Maps HTTP statuses and the API's error envelope onto typed errors.

use medsupply_checkout_core::BackendError;
use medsupply_types::FieldError;
use thiserror::Error;

/// Client errors for commerce API calls
#[derive(Error, Debug)]
pub enum ClientError {
    /// Failed to reach the server
    #[error("connection error: {message}")]
    Connection { message: String, retryable: bool },

    /// Request timeout
    #[error("request timed out")]
    Timeout,

    /// 400 with field errors
    #[error("invalid request: {message}")]
    InvalidArgument {
        message: String,
        errors: Vec<FieldError>,
    },

    /// 400 without field errors: the record's state forbids the change
    #[error("failed precondition: {0}")]
    FailedPrecondition(String),

    /// 401
    #[error("authentication required: {0}")]
    Unauthenticated(String),

    /// 403
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// 404
    #[error("not found: {0}")]
    NotFound(String),

    /// 409
    #[error("conflict: {0}")]
    Conflict(String),

    /// 503
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// Any other 5xx
    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Response body did not match the expected shape
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl ClientError {
    /// Returns true if this error is retryable.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection { retryable, .. } => *retryable,
            Self::Timeout | Self::Unavailable(_) => true,
            Self::Server { status, .. } => matches!(status, 502 | 504),
            _ => false,
        }
    }

    /// HTTP status this error came from, if any
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::InvalidArgument { .. } | Self::FailedPrecondition(_) => Some(400),
            Self::Unauthenticated(_) => Some(401),
            Self::PermissionDenied(_) => Some(403),
            Self::NotFound(_) => Some(404),
            Self::Conflict(_) => Some(409),
            Self::Unavailable(_) => Some(503),
            Self::Server { status, .. } => Some(*status),
            Self::Connection { .. } | Self::Timeout | Self::Config(_) | Self::Serialization(_) => {
                None
            }
        }
    }

    /// Build from a non-success status and the decoded error envelope
    pub fn from_response(status: u16, message: String, errors: Vec<FieldError>) -> Self {
        match status {
            400 if !errors.is_empty() => Self::InvalidArgument { message, errors },
            400 | 422 => Self::FailedPrecondition(message),
            401 => Self::Unauthenticated(message),
            403 => Self::PermissionDenied(message),
            404 => Self::NotFound(message),
            409 => Self::Conflict(message),
            503 => Self::Unavailable(message),
            status => Self::Server { status, message },
        }
    }

    /// Field errors carried by a validation failure
    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            Self::InvalidArgument { errors, .. } => errors,
            _ => &[],
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Serialization(err.to_string())
        } else {
            Self::Connection {
                message: err.to_string(),
                retryable: err.is_connect(),
            }
        }
    }
}

impl From<ClientError> for BackendError {
    fn from(err: ClientError) -> Self {
        match err.status() {
            Some(status) => {
                let errors = err.field_errors().to_vec();
                BackendError::Rejected {
                    status,
                    message: err.to_string(),
                    errors,
                }
            }
            None => BackendError::Transport(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(ClientError::Timeout.is_retryable());
        assert!(ClientError::Unavailable("down".into()).is_retryable());
        assert!(ClientError::Server {
            status: 502,
            message: "bad gateway".into()
        }
        .is_retryable());
    }

    #[test]
    fn test_non_retryable_errors() {
        assert!(!ClientError::NotFound("order".into()).is_retryable());
        assert!(!ClientError::Conflict("order".into()).is_retryable());
        assert!(!ClientError::Server {
            status: 500,
            message: "boom".into()
        }
        .is_retryable());
    }

    #[test]
    fn test_from_response_splits_400() {
        let with_fields = ClientError::from_response(
            400,
            "Validation failed".into(),
            vec![FieldError {
                field: "total".into(),
                message: "Expected 117.50".into(),
            }],
        );
        assert_eq!(with_fields.field_errors().len(), 1);

        let state = ClientError::from_response(400, "Only pending orders".into(), vec![]);
        assert!(matches!(state, ClientError::FailedPrecondition(_)));
    }

    #[test]
    fn test_into_backend_error() {
        let err: BackendError = ClientError::PermissionDenied("no".into()).into();
        assert!(matches!(err, BackendError::Rejected { status: 403, .. }));

        let err: BackendError = ClientError::Timeout.into();
        assert!(matches!(err, BackendError::Transport(_)));
    }
}
