//! Record identifiers and business-number generation
//!
//! Records are keyed by UUIDs internally. Orders and payments additionally
//! carry a human-facing business identifier:
//!
//! - order number: `ORD` + `YYMMDD` + six random `[0-9A-Z]` characters
//! - transaction id: `TXN_` + base36(epoch milliseconds) + `_` + six random
//!   `[0-9A-Z]` characters

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const BASE36_UPPER: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Length of the random suffix on order numbers and transaction ids
pub const RANDOM_TOKEN_LEN: usize = 6;

/// Generate a random uppercase base36 token
pub fn random_token<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..RANDOM_TOKEN_LEN)
        .map(|_| BASE36_UPPER[rng.random_range(0..BASE36_UPPER.len())] as char)
        .collect()
}

/// Lowercase base36 rendering of an unsigned integer
pub fn to_base36(mut n: u64) -> String {
    if n == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while n > 0 {
        digits.push(BASE36_UPPER[(n % 36) as usize].to_ascii_lowercase());
        n /= 36;
    }
    digits.iter().rev().map(|&b| b as char).collect()
}

fn is_token(s: &str) -> bool {
    s.len() == RANDOM_TOKEN_LEN
        && s
            .bytes()
            .all(|b| b.is_ascii_digit() || b.is_ascii_uppercase())
}

/// Order record ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub Uuid);

impl OrderId {
    /// Create a new order ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for OrderId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for OrderId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Payment record ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentId(pub Uuid);

impl PaymentId {
    /// Create a new payment ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PaymentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PaymentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for PaymentId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Public order number, e.g. `ORD240315K3J9QZ`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderNumber(pub String);

impl OrderNumber {
    pub const PREFIX: &'static str = "ORD";

    /// Generate an order number for the given date using the thread RNG
    pub fn generate(now: DateTime<Utc>) -> Self {
        Self::generate_with(now, &mut rand::rng())
    }

    /// Generate an order number with a caller-supplied RNG
    pub fn generate_with<R: Rng + ?Sized>(now: DateTime<Utc>, rng: &mut R) -> Self {
        Self(format!(
            "{}{}{}",
            Self::PREFIX,
            now.format("%y%m%d"),
            random_token(rng)
        ))
    }

    /// Check the `ORD\d{6}[A-Z0-9]{6}` shape
    pub fn is_well_formed(s: &str) -> bool {
        let Some(rest) = s.strip_prefix(Self::PREFIX) else {
            return false;
        };
        rest.len() == 6 + RANDOM_TOKEN_LEN
            && rest[..6].bytes().all(|b| b.is_ascii_digit())
            && is_token(&rest[6..])
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Public payment transaction id, e.g. `TXN_lt9x2k1c_8QF2ZD`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(pub String);

impl TransactionId {
    pub const PREFIX: &'static str = "TXN_";

    /// Generate a transaction id for the given instant using the thread RNG
    pub fn generate(now: DateTime<Utc>) -> Self {
        Self::generate_with(now, &mut rand::rng())
    }

    /// Generate a transaction id with a caller-supplied RNG
    pub fn generate_with<R: Rng + ?Sized>(now: DateTime<Utc>, rng: &mut R) -> Self {
        let millis = u64::try_from(now.timestamp_millis()).unwrap_or_default();
        Self(format!(
            "{}{}_{}",
            Self::PREFIX,
            to_base36(millis),
            random_token(rng)
        ))
    }

    /// Check the `TXN_[0-9a-z]+_[A-Z0-9]{6}` shape
    pub fn is_well_formed(s: &str) -> bool {
        let Some(rest) = s.strip_prefix(Self::PREFIX) else {
            return false;
        };
        let Some((stamp, token)) = rest.split_once('_') else {
            return false;
        };
        !stamp.is_empty()
            && stamp
                .bytes()
                .all(|b| b.is_ascii_digit() || b.is_ascii_lowercase())
            && is_token(token)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    #[test]
    fn test_to_base36() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
        assert_eq!(to_base36(1_700_000_000_000), "loyw3v28");
    }

    #[test]
    fn test_order_number_date_prefix() {
        let now = Utc.with_ymd_and_hms(2024, 3, 5, 10, 0, 0).unwrap();
        let number = OrderNumber::generate(now);
        assert!(number.as_str().starts_with("ORD240305"));
        assert!(OrderNumber::is_well_formed(number.as_str()));
    }

    #[test]
    fn test_order_number_shape_rejects() {
        assert!(!OrderNumber::is_well_formed("ORD240305abcdef"));
        assert!(!OrderNumber::is_well_formed("ORX240305ABCDEF"));
        assert!(!OrderNumber::is_well_formed("ORD2403ABCDEF"));
        assert!(!OrderNumber::is_well_formed("ORD240305ABCDEFG"));
    }

    #[test]
    fn test_transaction_id_shape() {
        let now = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        let txn = TransactionId::generate(now);
        assert!(txn.as_str().starts_with("TXN_loyw3v28_"));
        assert!(TransactionId::is_well_formed(txn.as_str()));
        assert!(!TransactionId::is_well_formed("TXN_LOYW3V28_ABCDEF"));
        assert!(!TransactionId::is_well_formed("TXN__ABCDEF"));
        assert!(!TransactionId::is_well_formed("TXN_abc_abcdef"));
    }

    proptest! {
        #[test]
        fn prop_order_numbers_well_formed(secs in 0i64..4_102_444_800i64) {
            let now = Utc.timestamp_opt(secs, 0).unwrap();
            let number = OrderNumber::generate(now);
            prop_assert!(OrderNumber::is_well_formed(number.as_str()), "{}", number);
        }

        #[test]
        fn prop_transaction_ids_well_formed(millis in 0i64..4_102_444_800_000i64) {
            let now = Utc.timestamp_millis_opt(millis).unwrap();
            let txn = TransactionId::generate(now);
            prop_assert!(TransactionId::is_well_formed(txn.as_str()), "{}", txn);
        }
    }
}
