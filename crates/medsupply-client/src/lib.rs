//! MedSupply Client - HTTP SDK for the commerce API
//!
//! [`HttpBackend`] speaks the JSON envelope of the commerce API and
//! implements [`medsupply_checkout_core::CheckoutBackend`], so a storefront
//! can drive a `CheckoutOrchestrator` against a live server.

pub mod config;
pub mod error;
pub mod http;
pub mod retry;

pub use config::{ClientConfig, ConfigError};
pub use error::ClientError;
pub use http::{HttpBackend, IDEMPOTENCY_HEADER};
pub use retry::{with_retry, RetryConfig};
