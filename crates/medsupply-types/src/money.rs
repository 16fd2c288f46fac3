//! Checkout pricing arithmetic
//!
//! Amounts are `Decimal` values rounded to two places, half away from zero.
//! The delivery fee and tax rates are fixed for every order.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::error::{AmountOverflow, InvalidInstallment};
use crate::order::OrderItem;

/// Delivery fee rate applied to the subtotal (5 %)
pub const DELIVERY_FEE_RATE: Decimal = Decimal::from_parts(5, 0, 0, false, 2);

/// Tax rate applied to the subtotal (12.5 %)
pub const TAX_RATE: Decimal = Decimal::from_parts(125, 0, 0, false, 3);

/// Default settlement currency
pub const DEFAULT_CURRENCY: &str = "GHS";

/// Tolerance used when comparing client-submitted amounts against server math
pub const AMOUNT_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Largest unit price accepted on a cart line
pub const MAX_UNIT_PRICE: Decimal = Decimal::from_parts(1_000_000, 0, 0, false, 0);

/// Largest quantity accepted on a cart line
pub const MAX_LINE_QUANTITY: u32 = 10_000;

/// Largest cart subtotal the pricing rules accept
pub const MAX_SUBTOTAL: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);

/// Round to two decimal places, half away from zero
pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Derived order totals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    pub subtotal: Decimal,
    pub delivery_fee: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

impl Totals {
    /// Compute fee, tax and total from a subtotal
    pub fn from_subtotal(subtotal: Decimal) -> Self {
        let subtotal = round2(subtotal);
        let delivery_fee = round2(subtotal * DELIVERY_FEE_RATE);
        let tax = round2(subtotal * TAX_RATE);
        Self {
            subtotal,
            delivery_fee,
            tax,
            total: subtotal + delivery_fee + tax,
        }
    }

    /// Compute totals for a list of cart lines.
    ///
    /// Fails instead of overflowing when the subtotal exceeds [`MAX_SUBTOTAL`].
    pub fn from_items(items: &[OrderItem]) -> Result<Self, AmountOverflow> {
        let subtotal = items
            .iter()
            .try_fold(Decimal::ZERO, |acc, item| {
                item.line_total().and_then(|line| acc.checked_add(line))
            })
            .filter(|subtotal| *subtotal <= MAX_SUBTOTAL)
            .ok_or(AmountOverflow { max: MAX_SUBTOTAL })?;
        Ok(Self::from_subtotal(subtotal))
    }

    /// Names of the fields in `claimed` that differ from `self` by more than
    /// [`AMOUNT_TOLERANCE`]
    pub fn mismatches(&self, claimed: &Totals) -> Vec<&'static str> {
        let pairs = [
            ("subtotal", self.subtotal, claimed.subtotal),
            ("deliveryFee", self.delivery_fee, claimed.delivery_fee),
            ("tax", self.tax, claimed.tax),
            ("total", self.total, claimed.total),
        ];
        pairs
            .into_iter()
            .filter(|(_, expected, actual)| (*expected - *actual).abs() > AMOUNT_TOLERANCE)
            .map(|(name, _, _)| name)
            .collect()
    }
}

/// Deposit percentage for installment payments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct InstallmentPercentage(u8);

impl InstallmentPercentage {
    pub const ALLOWED: [u8; 5] = [50, 60, 70, 80, 90];

    pub fn value(self) -> u8 {
        self.0
    }

    /// Split `total` into the amount paid now and the balance left
    pub fn split(self, total: Decimal) -> (Decimal, Decimal) {
        let paid = round2(total * Decimal::from(self.0) / Decimal::ONE_HUNDRED);
        (paid, total - paid)
    }
}

impl TryFrom<u8> for InstallmentPercentage {
    type Error = InvalidInstallment;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if Self::ALLOWED.contains(&value) {
            Ok(Self(value))
        } else {
            Err(InvalidInstallment(value))
        }
    }
}

impl From<InstallmentPercentage> for u8 {
    fn from(p: InstallmentPercentage) -> Self {
        p.0
    }
}

impl std::fmt::Display for InstallmentPercentage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}%", self.0)
    }
}
