//! Auth errors

use thiserror::Error;

/// Authentication errors
#[derive(Error, Debug)]
pub enum AuthError {
    /// No session cookie or bearer token
    #[error("authentication required")]
    MissingCredentials,

    /// Invalid token (malformed, bad signature, etc.)
    #[error("invalid token")]
    InvalidToken,

    /// Token has expired
    #[error("token expired")]
    TokenExpired,

    /// Token names a user that does not exist
    #[error("user not found")]
    UserNotFound,

    /// User exists but is deactivated
    #[error("account disabled")]
    AccountDisabled,

    /// Database error
    #[error("database error: {0}")]
    Database(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::MissingCredentials
            | Self::InvalidToken
            | Self::TokenExpired
            | Self::UserNotFound
            | Self::AccountDisabled => 401,
            Self::Database(_) | Self::Configuration(_) | Self::Internal(_) => 500,
        }
    }

    /// Get error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::MissingCredentials => "UNAUTHORIZED",
            Self::InvalidToken => "INVALID_TOKEN",
            Self::TokenExpired => "TOKEN_EXPIRED",
            Self::UserNotFound => "USER_NOT_FOUND",
            Self::AccountDisabled => "ACCOUNT_DISABLED",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<medsupply_db::DbError> for AuthError {
    fn from(err: medsupply_db::DbError) -> Self {
        tracing::error!("Database error: {}", err);
        Self::Database(err.to_string())
    }
}

impl From<crate::crypto::KeyError> for AuthError {
    fn from(err: crate::crypto::KeyError) -> Self {
        Self::Configuration(err.to_string())
    }
}
