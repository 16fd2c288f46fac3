//! Configuration types for session auth

use std::time::Duration;

/// Default cookie carrying the session token
pub const DEFAULT_COOKIE_NAME: &str = "medsupply_session";

/// Session auth configuration
#[derive(Clone)]
pub struct AuthConfig {
    /// HMAC secret for session signing, at least 32 bytes
    pub session_secret: String,
    /// Session duration
    pub session_duration: Duration,
    /// Name of the session cookie
    pub cookie_name: String,
}

impl AuthConfig {
    /// Create a new auth config with a 24 hour session
    pub fn new(session_secret: impl Into<String>) -> Self {
        Self {
            session_secret: session_secret.into(),
            session_duration: Duration::from_secs(24 * 60 * 60),
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
        }
    }

    /// Set session duration
    pub fn with_session_duration(mut self, duration: Duration) -> Self {
        self.session_duration = duration;
        self
    }

    /// Set the cookie name
    pub fn with_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = name.into();
        self
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("session_secret", &"[REDACTED]")
            .field("session_duration", &self.session_duration)
            .field("cookie_name", &self.cookie_name)
            .finish()
    }
}
