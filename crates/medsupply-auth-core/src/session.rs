//! Signed session tokens
//!
//! Token format: `base64url(json payload) "." base64url(hmac-sha256)`, the
//! MAC computed over the encoded payload. Sent either as the session cookie
//! or as an `Authorization: Bearer` token.

use std::time::Duration;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Utc};
use medsupply_types::UserId;
use serde::{Deserialize, Serialize};

use crate::crypto::SigningKey;
use crate::AuthError;

/// Session token payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionPayload {
    /// User ID
    pub user_id: String,
    /// Issue timestamp (milliseconds)
    pub issued: i64,
    /// Expiration timestamp (milliseconds)
    pub expires: i64,
}

impl SessionPayload {
    /// Create a payload valid for `duration` from `now`
    pub fn new(user_id: UserId, now: DateTime<Utc>, duration: Duration) -> Self {
        let issued = now.timestamp_millis();
        let lifetime = i64::try_from(duration.as_millis()).unwrap_or(i64::MAX);
        Self {
            user_id: user_id.to_string(),
            issued,
            expires: issued.saturating_add(lifetime),
        }
    }

    /// Check if the session is expired at `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now.timestamp_millis() > self.expires
    }

    /// Get the user ID
    pub fn user_id(&self) -> Option<UserId> {
        UserId::parse(&self.user_id).ok()
    }
}

/// Issues and verifies session tokens
#[derive(Clone)]
pub struct SessionSigner {
    key: SigningKey,
    session_duration: Duration,
}

impl SessionSigner {
    /// Create a new signer
    ///
    /// # Errors
    /// Fails if `secret` is shorter than 32 bytes.
    pub fn new(secret: impl AsRef<[u8]>, session_duration: Duration) -> Result<Self, AuthError> {
        Ok(Self {
            key: SigningKey::new(secret)?,
            session_duration,
        })
    }

    /// Issue a token for `user_id` starting now
    pub fn issue(&self, user_id: UserId) -> Result<String, AuthError> {
        self.issue_at(user_id, Utc::now())
    }

    /// Issue a token for `user_id` starting at `now`
    pub fn issue_at(&self, user_id: UserId, now: DateTime<Utc>) -> Result<String, AuthError> {
        let payload = SessionPayload::new(user_id, now, self.session_duration);
        self.sign_payload(&payload)
    }

    /// Verify a token's signature and expiry
    pub fn verify(&self, token: &str) -> Result<SessionPayload, AuthError> {
        self.verify_at(token, Utc::now())
    }

    /// Verify a token against an explicit clock
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<SessionPayload, AuthError> {
        let (payload_b64, signature) = token.rsplit_once('.').ok_or(AuthError::InvalidToken)?;
        if payload_b64.is_empty() || signature.is_empty() {
            return Err(AuthError::InvalidToken);
        }

        let tag = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| AuthError::InvalidToken)?;
        if !self.key.verify(payload_b64.as_bytes(), &tag) {
            tracing::debug!("Session signature mismatch");
            return Err(AuthError::InvalidToken);
        }

        let payload_json = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| AuthError::InvalidToken)?;
        let payload: SessionPayload =
            serde_json::from_slice(&payload_json).map_err(|_| AuthError::InvalidToken)?;

        if payload.is_expired_at(now) {
            return Err(AuthError::TokenExpired);
        }

        Ok(payload)
    }

    /// Session lifetime
    pub fn session_duration(&self) -> Duration {
        self.session_duration
    }

    fn sign_payload(&self, payload: &SessionPayload) -> Result<String, AuthError> {
        let payload_json = serde_json::to_vec(payload).map_err(|e| {
            tracing::error!("Failed to serialize payload: {}", e);
            AuthError::Internal("Failed to create session".to_string())
        })?;

        let payload_b64 = URL_SAFE_NO_PAD.encode(&payload_json);
        let tag = URL_SAFE_NO_PAD.encode(self.key.sign(payload_b64.as_bytes()));

        Ok(format!("{payload_b64}.{tag}"))
    }

}

impl std::fmt::Debug for SessionSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionSigner")
            .field("session_duration", &self.session_duration)
            .finish_non_exhaustive()
    }
}
