//! REST API handlers

pub mod checkout;
pub mod health;
pub mod orders;
pub mod payments;
pub mod shared;

pub use checkout::*;
pub use health::*;
pub use orders::*;
pub use payments::*;
