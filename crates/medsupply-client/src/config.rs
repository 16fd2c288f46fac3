//! Client configuration

use std::time::Duration;

use thiserror::Error;

use crate::retry::RetryConfig;

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid base url `{0}`: must start with http:// or https://")]
    InvalidBaseUrl(String),

    #[error("request timeout must be greater than zero")]
    ZeroTimeout,
}

/// Client configuration
#[derive(Clone)]
pub struct ClientConfig {
    base_url: String,
    request_timeout: Duration,
    session_token: Option<String>,
    retry: RetryConfig,
}

impl ClientConfig {
    /// Create a configuration for the API at `base_url`
    pub fn new(base_url: impl Into<String>) -> Result<Self, ConfigError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::InvalidBaseUrl(base_url));
        }
        Ok(Self {
            base_url,
            request_timeout: Duration::from_secs(30),
            session_token: None,
            retry: RetryConfig::default(),
        })
    }

    /// Set the per-request timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Result<Self, ConfigError> {
        if timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        self.request_timeout = timeout;
        Ok(self)
    }

    /// Send this session token as a bearer credential
    #[must_use]
    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }

    /// Retry settings for read requests
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn session_token(&self) -> Option<&str> {
        self.session_token.as_deref()
    }

    pub fn retry(&self) -> &RetryConfig {
        &self.retry
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("request_timeout", &self.request_timeout)
            .field("session_token", &self.session_token.as_ref().map(|_| "[REDACTED]"))
            .field("retry", &self.retry)
            .finish()
    }
}
