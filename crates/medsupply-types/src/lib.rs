//! MedSupply Types - Shared domain types
//!
//! This crate contains the domain types used across the commerce services:
//! - User identity and callers
//! - Orders, order items, shipping and tracking
//! - Payments, payment plans and payment methods
//! - Checkout pricing arithmetic
//! - Request DTOs with their validation rules
//! - The JSON response envelope and pagination

pub mod api;
pub mod checkout;
pub mod error;
pub mod ids;
pub mod money;
pub mod order;
pub mod payment;
pub mod requests;
pub mod user;
pub mod validation;

pub use api::*;
pub use checkout::*;
pub use error::*;
pub use ids::*;
pub use money::*;
pub use order::*;
pub use payment::*;
pub use requests::*;
pub use user::*;
