//! Identifier sources

use chrono::{DateTime, Utc};
use medsupply_types::{OrderNumber, TransactionId};

/// Produces public business identifiers
pub trait IdSource: Send + Sync {
    fn order_number(&self, now: DateTime<Utc>) -> OrderNumber;
    fn transaction_id(&self, now: DateTime<Utc>) -> TransactionId;
}

/// Thread RNG backed identifiers
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomIds;

impl IdSource for RandomIds {
    fn order_number(&self, now: DateTime<Utc>) -> OrderNumber {
        OrderNumber::generate(now)
    }

    fn transaction_id(&self, now: DateTime<Utc>) -> TransactionId {
        TransactionId::generate(now)
    }
}
