//! Checkout configuration

use std::time::Duration;

use medsupply_types::DEFAULT_CURRENCY;

/// Checkout service configuration
#[derive(Debug, Clone)]
pub struct CheckoutConfig {
    /// Reject client totals that disagree with the recomputed ones
    pub strict_totals: bool,
    /// Attempts at a fresh order number or transaction id before giving up
    pub id_attempts: u32,
    /// Age after which an unlinked payment is flagged for review
    pub reconcile_after: Duration,
    /// Maximum payments flagged per reconciliation pass
    pub reconcile_batch: i64,
    /// Currency used when a request does not name one
    pub default_currency: String,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            strict_totals: true,
            id_attempts: 5,
            reconcile_after: Duration::from_secs(15 * 60),
            reconcile_batch: 500,
            default_currency: DEFAULT_CURRENCY.to_string(),
        }
    }
}

impl CheckoutConfig {
    /// Set strict total checking
    pub fn with_strict_totals(mut self, strict: bool) -> Self {
        self.strict_totals = strict;
        self
    }

    /// Set identifier generation attempts (at least one)
    pub fn with_id_attempts(mut self, attempts: u32) -> Self {
        self.id_attempts = attempts.max(1);
        self
    }

    /// Set the reconciliation age threshold
    pub fn with_reconcile_after(mut self, after: Duration) -> Self {
        self.reconcile_after = after;
        self
    }
}
