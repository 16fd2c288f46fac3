//! Repository traits
//!
//! Define async repository interfaces for database operations.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::DbResult;
use crate::models::*;

/// Read-only view of the accounts table. Accounts are provisioned by the
/// identity service; this crate only resolves sessions to them.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<UserRow>>;
}

/// Order repository trait
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Insert an order. Fails with `UniqueViolation(ORDER_NUMBER_KEY)` when
    /// the order number is taken.
    async fn create(&self, order: CreateOrder) -> DbResult<OrderRow>;

    /// Find an order by ID
    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<OrderRow>>;

    /// Find an order by its public order number
    async fn find_by_order_number(&self, order_number: &str) -> DbResult<Option<OrderRow>>;

    /// Newest first page of a user's orders, optionally filtered by status
    async fn list_for_user(
        &self,
        user_id: Uuid,
        status: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> DbResult<Vec<OrderRow>>;

    /// Count a user's orders, optionally filtered by status
    async fn count_for_user(&self, user_id: Uuid, status: Option<&str>) -> DbResult<i64>;

    /// Apply a status change if the order still has `change.expected`.
    ///
    /// Returns `None` when the order is missing or its status moved on.
    async fn update_status(&self, id: Uuid, change: OrderStatusChange)
        -> DbResult<Option<OrderRow>>;

    /// Dashboard aggregates over all orders
    async fn stats(&self) -> DbResult<OrderStatsRow>;
}

/// Payment repository trait
#[async_trait]
pub trait PaymentRepository: Send + Sync {
    /// Insert a payment. Fails with `UniqueViolation` on a taken transaction
    /// id or a reused idempotency key.
    async fn create(&self, payment: CreatePayment) -> DbResult<PaymentRow>;

    /// Find a payment by ID
    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<PaymentRow>>;

    /// Find a payment by transaction ID
    async fn find_by_transaction_id(&self, transaction_id: &str)
        -> DbResult<Option<PaymentRow>>;

    /// Find the payment a user created with an idempotency key
    async fn find_by_idempotency_key(
        &self,
        user_id: Uuid,
        key: &str,
    ) -> DbResult<Option<PaymentRow>>;

    /// Newest first page of a user's payments, optionally filtered by status
    async fn list_for_user(
        &self,
        user_id: Uuid,
        status: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> DbResult<Vec<PaymentRow>>;

    /// Count a user's payments, optionally filtered by status
    async fn count_for_user(&self, user_id: Uuid, status: Option<&str>) -> DbResult<i64>;

    /// Record the order a payment paid for. Returns `None` when the payment
    /// is missing or already linked.
    async fn link_order(&self, link: LinkOrder) -> DbResult<Option<PaymentRow>>;

    /// Apply a status change if the payment still has `change.expected`
    async fn update_status(
        &self,
        id: Uuid,
        change: PaymentStatusChange,
    ) -> DbResult<Option<PaymentRow>>;

    /// Live payments created before `before` that have no linked order and
    /// are not yet flagged
    async fn find_unlinked(&self, before: DateTime<Utc>, limit: i64) -> DbResult<Vec<PaymentRow>>;

    /// Set `metadata.needsReview` on the given payments
    async fn flag_for_review(&self, ids: &[Uuid], now: DateTime<Utc>)
        -> DbResult<Vec<PaymentRow>>;
}

/// Writes a payment and its order as one unit
#[async_trait]
pub trait CheckoutRepository: Send + Sync {
    /// Insert both records or neither. The payment is expected to already
    /// carry the order link.
    async fn create_checkout(
        &self,
        payment: CreatePayment,
        order: CreateOrder,
    ) -> DbResult<(PaymentRow, OrderRow)>;

    /// Insert `order` and link it onto an existing unlinked payment in one
    /// unit. Returns `None`, writing nothing, when the payment is missing or
    /// already linked.
    async fn create_linked_order(
        &self,
        order: CreateOrder,
        link: LinkOrder,
    ) -> DbResult<Option<(OrderRow, PaymentRow)>>;
}

/// Storage liveness probe
#[async_trait]
pub trait HealthCheck: Send + Sync {
    async fn ping(&self) -> DbResult<()>;
}

/// All repositories bundled together
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub orders: Arc<dyn OrderRepository>,
    pub payments: Arc<dyn PaymentRepository>,
    pub checkouts: Arc<dyn CheckoutRepository>,
    pub health: Arc<dyn HealthCheck>,
}

impl std::fmt::Debug for Repositories {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repositories").finish_non_exhaustive()
    }
}
