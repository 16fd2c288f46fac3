//! Payment service

use std::sync::Arc;

use chrono::{DateTime, Utc};
use medsupply_db::{
    CreatePayment, PaymentRepository, PaymentRow, PaymentStatusChange, Repositories,
    IDEMPOTENCY_KEY, TRANSACTION_ID_KEY,
};
use medsupply_types::{
    items_summary, round2, Caller, CreatePaymentRequest, ListQuery, PageInfo, Payment,
    PaymentMetadata, PaymentPage, PaymentStatus, Totals, UpdatePaymentStatusRequest,
    AMOUNT_TOLERANCE,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::ids::IdSource;
use crate::{CheckoutConfig, CheckoutError};

/// A write that may have been answered from an earlier identical request
#[derive(Debug, Clone)]
pub struct Recorded<T> {
    pub value: T,
    /// True when the idempotency key matched an existing record
    pub replayed: bool,
}

impl<T> Recorded<T> {
    pub fn fresh(value: T) -> Self {
        Self {
            value,
            replayed: false,
        }
    }

    pub fn replayed(value: T) -> Self {
        Self {
            value,
            replayed: true,
        }
    }
}

/// Validate an idempotency key from a header or body
pub(crate) fn check_idempotency_key(key: Option<String>) -> Result<Option<String>, CheckoutError> {
    match key.map(|k| k.trim().to_string()) {
        None => Ok(None),
        Some(k) if (8..=128).contains(&k.len()) => Ok(Some(k)),
        Some(_) => Err(CheckoutError::invalid(
            "idempotencyKey",
            "Idempotency key must be 8 to 128 characters",
        )),
    }
}

/// Records payments and manages their status
pub struct PaymentService {
    payments: Arc<dyn PaymentRepository>,
    ids: Arc<dyn IdSource>,
    config: CheckoutConfig,
}

impl PaymentService {
    pub fn new(repos: &Repositories, ids: Arc<dyn IdSource>, config: CheckoutConfig) -> Self {
        Self {
            payments: repos.payments.clone(),
            ids,
            config,
        }
    }

    /// Record a payment for the caller.
    ///
    /// `idempotency_key` (usually the `Idempotency-Key` header) takes
    /// precedence over the key in the body.
    pub async fn create(
        &self,
        caller: &Caller,
        req: CreatePaymentRequest,
        idempotency_key: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Recorded<Payment>, CheckoutError> {
        let key = check_idempotency_key(idempotency_key.or_else(|| req.idempotency_key.clone()))?;
        if let Some(key) = key.as_deref() {
            if let Some(existing) = self.by_idempotency_key(caller, key).await? {
                return Ok(Recorded::replayed(existing));
            }
        }

        req.check().map_err(CheckoutError::Validation)?;
        let selection = req.selection().map_err(CheckoutError::Validation)?;
        let totals = Totals::from_items(&req.metadata.items)
            .map_err(|e| CheckoutError::invalid("metadata.items", e.to_string()))?;
        let quote = selection.quote(&totals);

        let amount = if self.config.strict_totals {
            if (req.amount - quote.amount).abs() > AMOUNT_TOLERANCE {
                return Err(CheckoutError::invalid(
                    "amount",
                    format!("Expected {} for this plan and these items", quote.amount),
                ));
            }
            quote.amount
        } else {
            round2(req.amount)
        };

        let metadata = PaymentMetadata {
            order_id: req.metadata.order_id.clone(),
            plan: quote.plan.clone(),
            shipping_details: req.metadata.shipping_details.clone(),
            items: req.metadata.items.clone(),
            items_summary: req
                .metadata
                .items_summary
                .clone()
                .unwrap_or_else(|| items_summary(&req.metadata.items)),
            order_details: None,
            needs_review: false,
        };

        let mut attempts = 0;
        let row = loop {
            attempts += 1;
            let payment = CreatePayment {
                id: Uuid::new_v4(),
                transaction_id: self.ids.transaction_id(now).0,
                user_id: caller.user_id.0,
                amount,
                currency: req.currency.clone(),
                payment_type: req.payment_type,
                payment_method: req.payment_method.sanitize(),
                status: quote.status,
                description: req.description.clone(),
                metadata: metadata.clone(),
                idempotency_key: key.clone(),
                created_at: now,
            };
            match self.payments.create(payment).await {
                Ok(row) => break row,
                Err(e) if e.is_unique_violation_of(TRANSACTION_ID_KEY) => {
                    warn!(attempts, "Transaction id collision, retrying");
                    if attempts >= self.config.id_attempts {
                        return Err(CheckoutError::IdsExhausted("transaction id"));
                    }
                }
                Err(e) if e.is_unique_violation_of(IDEMPOTENCY_KEY) => {
                    // A concurrent request with the same key won the insert
                    let key = key.as_deref().unwrap_or_default();
                    return match self.by_idempotency_key(caller, key).await? {
                        Some(existing) => Ok(Recorded::replayed(existing)),
                        None => Err(e.into()),
                    };
                }
                Err(e) => return Err(e.into()),
            }
        };
        let payment = Payment::try_from(row)?;

        metrics::counter!("commerce_payments_created_total", "plan" => payment.payment_type.as_str())
            .increment(1);
        info!(
            transaction_id = %payment.transaction_id,
            user_id = %payment.user_id,
            amount = %payment.amount,
            status = %payment.status,
            "Payment recorded"
        );
        Ok(Recorded::fresh(payment))
    }

    pub(crate) async fn by_idempotency_key(
        &self,
        caller: &Caller,
        key: &str,
    ) -> Result<Option<Payment>, CheckoutError> {
        let row = self
            .payments
            .find_by_idempotency_key(caller.user_id.0, key)
            .await?;
        Ok(row.map(Payment::try_from).transpose()?)
    }

    /// Fetch by UUID or transaction id, applying the owner-or-admin rule
    pub async fn get(&self, caller: &Caller, id: &str) -> Result<Payment, CheckoutError> {
        let payment = self.find(id).await?;
        if !caller.can_access(payment.user_id) {
            return Err(CheckoutError::Forbidden);
        }
        Ok(payment)
    }

    async fn find(&self, id: &str) -> Result<Payment, CheckoutError> {
        let row: Option<PaymentRow> = match Uuid::parse_str(id) {
            Ok(uuid) => self.payments.find_by_id(uuid).await?,
            Err(_) => self.payments.find_by_transaction_id(id).await?,
        };
        let row = row.ok_or(CheckoutError::NotFound("Payment"))?;
        Ok(Payment::try_from(row)?)
    }

    /// The caller's own payments, newest first
    pub async fn list(
        &self,
        caller: &Caller,
        query: &ListQuery,
    ) -> Result<PaymentPage, CheckoutError> {
        let status = query
            .status_filter::<PaymentStatus>()
            .map_err(CheckoutError::Validation)?
            .map(PaymentStatus::as_str);
        let pagination = query.pagination().normalized();

        let rows = self
            .payments
            .list_for_user(
                caller.user_id.0,
                status,
                pagination.limit() as i64,
                pagination.offset() as i64,
            )
            .await?;
        let total = self.payments.count_for_user(caller.user_id.0, status).await?;

        let payments = rows
            .into_iter()
            .map(Payment::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(PaymentPage {
            payments,
            pagination: PageInfo::new(total.max(0) as u64, &pagination),
        })
    }

    /// Admin status change. `metadata` is kept as the gateway response.
    pub async fn update_status(
        &self,
        id: &str,
        req: UpdatePaymentStatusRequest,
        now: DateTime<Utc>,
    ) -> Result<Payment, CheckoutError> {
        req.check().map_err(CheckoutError::Validation)?;
        let payment = self.find(id).await?;
        let from = payment.status;
        let to = req.status;

        if !from.can_transition_to(to) {
            return Err(CheckoutError::InvalidState(format!(
                "Cannot change payment status from {from} to {to}"
            )));
        }

        let refund_amount = if to == PaymentStatus::Refunded {
            let refund = round2(req.refund_amount.unwrap_or(payment.amount));
            if refund > payment.amount {
                return Err(CheckoutError::invalid(
                    "refundAmount",
                    format!("Refund cannot exceed the payment amount of {}", payment.amount),
                ));
            }
            Some(refund)
        } else {
            None
        };

        let change = PaymentStatusChange {
            expected: from,
            status: to,
            refund_amount,
            refund_reason: req.refund_reason,
            gateway_response: req.metadata,
            updated_at: now,
        };
        let row = self
            .payments
            .update_status(payment.id.0, change)
            .await?
            .ok_or(CheckoutError::Conflict("Payment"))?;

        info!(transaction_id = %payment.transaction_id, %from, %to, "Payment status updated");
        Ok(Payment::try_from(row)?)
    }

    /// Flag payments that never got an order. Returns the flagged payments.
    pub async fn reconcile(&self, now: DateTime<Utc>) -> Result<Vec<Payment>, CheckoutError> {
        let threshold = chrono::Duration::from_std(self.config.reconcile_after)
            .unwrap_or_else(|_| chrono::Duration::minutes(15));
        let before = now - threshold;

        let stale = self
            .payments
            .find_unlinked(before, self.config.reconcile_batch)
            .await?;
        if stale.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = stale.iter().map(|p| p.id).collect();
        let flagged = self.payments.flag_for_review(&ids, now).await?;
        for payment in &flagged {
            warn!(
                transaction_id = %payment.transaction_id,
                created_at = %payment.created_at,
                "Payment has no order, flagged for review"
            );
        }
        flagged
            .into_iter()
            .map(|row| Payment::try_from(row).map_err(CheckoutError::from))
            .collect()
    }
}

impl std::fmt::Debug for PaymentService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentService")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
