//! Common error types

use thiserror::Error;

/// Error parsing one of the string-backed domain enums
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid {kind}: {value}")]
pub struct ParseEnumError {
    /// Which enum was being parsed
    pub kind: &'static str,
    /// The rejected input
    pub value: String,
}

impl ParseEnumError {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Cart subtotal too large to price
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("order subtotal exceeds {max}")]
pub struct AmountOverflow {
    pub max: rust_decimal::Decimal,
}

/// Error constructing an installment percentage
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("installment percentage must be one of 50, 60, 70, 80, 90 (got {0})")]
pub struct InvalidInstallment(pub u8);
