//! MedSupply Auth Core - Session authentication
//!
//! Signs and verifies session tokens and resolves them to an active caller.

pub mod config;
pub mod crypto;
pub mod error;
pub mod service;
pub mod session;

pub use config::{AuthConfig, DEFAULT_COOKIE_NAME};
pub use crypto::{KeyError, SigningKey};
pub use error::AuthError;
pub use service::SessionAuthenticator;
pub use session::{SessionPayload, SessionSigner};
