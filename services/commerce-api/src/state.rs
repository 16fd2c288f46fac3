//! Application state for the Commerce API service.

use std::sync::Arc;

use medsupply_auth_core::{AuthError, SessionAuthenticator};
use medsupply_checkout_core::CommerceServices;
use medsupply_db::Repositories;

use crate::config::Config;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Order, payment and checkout services
    pub services: CommerceServices,
    /// Session token verification
    pub auth: Arc<SessionAuthenticator>,
    /// Database repositories (readiness checks)
    pub repos: Repositories,
    /// Configuration
    pub config: Arc<Config>,
}

impl AppState {
    /// Create new application state
    pub fn new(repos: Repositories, config: Config) -> Result<Self, AuthError> {
        let auth = SessionAuthenticator::new(&config.auth, repos.users.clone())?;
        let services = CommerceServices::new(&repos, config.checkout.clone());
        Ok(Self {
            services,
            auth: Arc::new(auth),
            repos,
            config: Arc::new(config),
        })
    }

    /// Get request timeout from config
    pub fn request_timeout(&self) -> std::time::Duration {
        self.config.request_timeout
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
