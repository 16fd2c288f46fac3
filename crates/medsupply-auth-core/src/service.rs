//! Resolve a session token to an active caller

use std::sync::Arc;

use medsupply_db::UserRepository;
use medsupply_types::{Caller, UserId};

use crate::config::AuthConfig;
use crate::session::SessionSigner;
use crate::AuthError;

/// Verifies tokens and loads the user behind them
#[derive(Clone)]
pub struct SessionAuthenticator {
    signer: SessionSigner,
    users: Arc<dyn UserRepository>,
    cookie_name: String,
}

impl SessionAuthenticator {
    pub fn new(config: &AuthConfig, users: Arc<dyn UserRepository>) -> Result<Self, AuthError> {
        Ok(Self {
            signer: SessionSigner::new(&config.session_secret, config.session_duration)?,
            users,
            cookie_name: config.cookie_name.clone(),
        })
    }

    /// Name of the session cookie
    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    pub fn signer(&self) -> &SessionSigner {
        &self.signer
    }

    /// Issue a session token for an existing user
    pub fn issue(&self, user_id: UserId) -> Result<String, AuthError> {
        self.signer.issue(user_id)
    }

    /// Verify `token` and return the caller it identifies.
    ///
    /// The user must exist and be active.
    pub async fn authenticate(&self, token: &str) -> Result<Caller, AuthError> {
        let payload = self.signer.verify(token)?;
        let user_id = payload.user_id().ok_or(AuthError::InvalidToken)?;

        let user = self
            .users
            .find_by_id(user_id.0)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if !user.is_active {
            tracing::warn!(user_id = %user_id, "Rejected session for inactive user");
            return Err(AuthError::AccountDisabled);
        }

        user.caller().map_err(|e| {
            tracing::error!(user_id = %user_id, "Bad user row: {}", e);
            AuthError::Internal("Failed to load user".to_string())
        })
    }
}

impl std::fmt::Debug for SessionAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionAuthenticator")
            .field("cookie_name", &self.cookie_name)
            .finish_non_exhaustive()
    }
}
