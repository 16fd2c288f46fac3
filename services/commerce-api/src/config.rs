//! Configuration for the Commerce API service.

use std::time::Duration;

use medsupply_auth_core::{AuthConfig, SigningKey, DEFAULT_COOKIE_NAME};
use medsupply_checkout_core::CheckoutConfig;

/// Deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    /// Internal error details are only shown in development
    pub fn is_development(self) -> bool {
        self == Self::Development
    }
}

/// Commerce API configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub http_port: u16,
    /// Database URL
    pub database_url: String,
    /// Maximum database connections
    pub db_max_connections: u32,
    /// Session auth configuration
    pub auth: AuthConfig,
    /// Checkout rules
    pub checkout: CheckoutConfig,
    /// Request timeout
    pub request_timeout: Duration,
    /// Metrics enabled
    pub metrics_enabled: bool,
    pub app_env: AppEnv,
    /// Allowed CORS origin, `None` for any
    pub cors_origin: Option<String>,
}

impl Config {
    /// Defaults for everything except the database and session secret
    pub fn new(database_url: impl Into<String>, auth: AuthConfig) -> Self {
        Self {
            http_port: 5000,
            database_url: database_url.into(),
            db_max_connections: 10,
            auth,
            checkout: CheckoutConfig::default(),
            request_timeout: Duration::from_secs(30),
            metrics_enabled: true,
            app_env: AppEnv::Production,
            cors_origin: None,
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parse<T: std::str::FromStr>(
            get: &impl Fn(&str) -> Option<String>,
            key: &'static str,
            default: T,
        ) -> Result<T, ConfigError> {
            match get(key) {
                Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(key)),
                None => Ok(default),
            }
        }

        // Database
        let database_url = get("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let db_max_connections = parse(&get, "DB_MAX_CONNECTIONS", 10u32)?;

        // Server
        let http_port = parse(&get, "HTTP_PORT", 5000u16)?;
        let request_timeout_secs = parse(&get, "REQUEST_TIMEOUT_SECS", 30u64)?;
        let metrics_enabled = parse(&get, "METRICS_ENABLED", true)?;
        let app_env = match get("APP_ENV").as_deref().map(str::trim) {
            None | Some("production") => AppEnv::Production,
            Some("development") => AppEnv::Development,
            Some(_) => return Err(ConfigError::Invalid("APP_ENV")),
        };
        let cors_origin = get("CORS_ORIGIN").filter(|origin| origin.trim() != "*");

        // Sessions
        let session_secret =
            get("SESSION_SECRET").ok_or(ConfigError::Missing("SESSION_SECRET"))?;
        if session_secret.len() < SigningKey::MIN_LEN {
            return Err(ConfigError::SecretTooShort(SigningKey::MIN_LEN));
        }
        let session_hours = parse(&get, "SESSION_DURATION_HOURS", 24u64)?;
        let cookie_name =
            get("SESSION_COOKIE_NAME").unwrap_or_else(|| DEFAULT_COOKIE_NAME.to_string());
        let auth = AuthConfig::new(session_secret)
            .with_session_duration(Duration::from_secs(session_hours * 3600))
            .with_cookie_name(cookie_name);

        // Checkout rules
        let checkout = CheckoutConfig::default()
            .with_strict_totals(parse(&get, "STRICT_TOTALS", true)?)
            .with_id_attempts(parse(&get, "ORDER_NUMBER_ATTEMPTS", 5u32)?)
            .with_reconcile_after(Duration::from_secs(
                parse(&get, "RECONCILE_AFTER_MINUTES", 15u64)? * 60,
            ));

        Ok(Self {
            http_port,
            database_url,
            db_max_connections,
            auth,
            checkout,
            request_timeout: Duration::from_secs(request_timeout_secs),
            metrics_enabled,
            app_env,
            cors_origin,
        })
    }
}

/// Configuration error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("SESSION_SECRET must be at least {0} bytes")]
    SecretTooShort(usize),
}
