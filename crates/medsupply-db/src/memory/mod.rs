//! In-memory repositories for tests
//!
//! Mirrors the unique constraints and compare-and-set semantics of the
//! Postgres implementation so service tests exercise the same failure paths.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use medsupply_types::{OrderStatus, PaymentStatus};

use crate::error::{
    DbError, DbResult, IDEMPOTENCY_KEY, ORDER_NUMBER_KEY, TRANSACTION_ID_KEY,
};
use crate::models::*;
use crate::repo::*;

/// One store backing every repository trait
#[derive(Default)]
pub struct MemoryStore {
    users: DashMap<Uuid, UserRow>,
    orders: DashMap<Uuid, OrderRow>,
    order_numbers: DashMap<String, Uuid>,
    payments: DashMap<Uuid, PaymentRow>,
    transaction_ids: DashMap<String, Uuid>,
    idempotency_keys: DashMap<(Uuid, String), Uuid>,
    /// Serialises multi-record writes
    write_lock: Mutex<()>,
    fail_order_writes: AtomicBool,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Expose this store through the repository bundle
    pub fn repositories(self: &Arc<Self>) -> Repositories {
        Repositories {
            users: self.clone(),
            orders: self.clone(),
            payments: self.clone(),
            checkouts: self.clone(),
            health: self.clone(),
        }
    }

    /// Insert a test user directly
    pub fn insert_user(&self, email: &str, role: &str, is_active: bool) -> UserRow {
        let now = Utc::now();
        let row = UserRow {
            id: Uuid::new_v4(),
            email: email.to_string(),
            name: email.split('@').next().unwrap_or(email).to_string(),
            role: role.to_string(),
            is_active,
            created_at: now,
            updated_at: now,
        };
        self.users.insert(row.id, row.clone());
        row
    }

    /// Make every following order insert fail with a storage error
    pub fn fail_order_writes(&self, fail: bool) {
        self.fail_order_writes.store(fail, Ordering::SeqCst);
    }

    /// Make the health probe fail
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Backdate a payment, for reconciliation tests
    pub fn set_payment_created_at(&self, id: Uuid, created_at: DateTime<Utc>) {
        if let Some(mut payment) = self.payments.get_mut(&id) {
            payment.created_at = created_at;
        }
    }

    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    pub fn payment_count(&self) -> usize {
        self.payments.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn injected_failure() -> DbError {
        DbError::Sqlx(sqlx::Error::Protocol("injected order write failure".into()))
    }

    fn check_order(&self, order: &CreateOrder) -> DbResult<()> {
        if self.fail_order_writes.load(Ordering::SeqCst) {
            return Err(Self::injected_failure());
        }
        if self.order_numbers.contains_key(&order.order_number) {
            return Err(DbError::UniqueViolation(Some(ORDER_NUMBER_KEY.to_string())));
        }
        Ok(())
    }

    fn check_payment(&self, payment: &CreatePayment) -> DbResult<()> {
        if self.transaction_ids.contains_key(&payment.transaction_id) {
            return Err(DbError::UniqueViolation(Some(TRANSACTION_ID_KEY.to_string())));
        }
        if let Some(key) = &payment.idempotency_key {
            if self
                .idempotency_keys
                .contains_key(&(payment.user_id, key.clone()))
            {
                return Err(DbError::UniqueViolation(Some(IDEMPOTENCY_KEY.to_string())));
            }
        }
        Ok(())
    }

    fn put_order(&self, order: CreateOrder) -> OrderRow {
        let row = OrderRow::from(order);
        self.order_numbers.insert(row.order_number.clone(), row.id);
        self.orders.insert(row.id, row.clone());
        row
    }

    // The entry guard holds the shard lock across the check and the write
    fn link_unlinked(&self, link: &LinkOrder) -> Option<PaymentRow> {
        let mut payment = self.payments.get_mut(&link.payment_id)?;
        if payment.metadata.0.order_details.is_some() {
            return None;
        }
        link.apply(&mut payment);
        Some(payment.clone())
    }

    fn put_payment(&self, payment: CreatePayment) -> PaymentRow {
        let row = PaymentRow::from(payment);
        self.transaction_ids.insert(row.transaction_id.clone(), row.id);
        if let Some(key) = &row.idempotency_key {
            self.idempotency_keys.insert((row.user_id, key.clone()), row.id);
        }
        self.payments.insert(row.id, row.clone());
        row
    }
}

fn page<T: Clone>(
    mut rows: Vec<T>,
    created_at: impl Fn(&T) -> DateTime<Utc>,
    limit: i64,
    offset: i64,
) -> Vec<T> {
    rows.sort_by_key(|row| std::cmp::Reverse(created_at(row)));
    rows.into_iter()
        .skip(usize::try_from(offset).unwrap_or(0))
        .take(usize::try_from(limit).unwrap_or(0))
        .collect()
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<UserRow>> {
        Ok(self.users.get(&id).map(|r| r.value().clone()))
    }
}

#[async_trait]
impl OrderRepository for MemoryStore {
    async fn create(&self, order: CreateOrder) -> DbResult<OrderRow> {
        let _guard = self.lock();
        self.check_order(&order)?;
        Ok(self.put_order(order))
    }

    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<OrderRow>> {
        Ok(self.orders.get(&id).map(|r| r.value().clone()))
    }

    async fn find_by_order_number(&self, order_number: &str) -> DbResult<Option<OrderRow>> {
        Ok(self
            .order_numbers
            .get(order_number)
            .and_then(|id| self.orders.get(id.value()).map(|r| r.value().clone())))
    }

    async fn list_for_user(
        &self,
        user_id: Uuid,
        status: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> DbResult<Vec<OrderRow>> {
        let rows = self
            .orders
            .iter()
            .filter(|o| o.user_id == user_id && status.is_none_or(|s| o.status == s))
            .map(|o| o.value().clone())
            .collect();
        Ok(page(rows, |o: &OrderRow| o.created_at, limit, offset))
    }

    async fn count_for_user(&self, user_id: Uuid, status: Option<&str>) -> DbResult<i64> {
        let count = self
            .orders
            .iter()
            .filter(|o| o.user_id == user_id && status.is_none_or(|s| o.status == s))
            .count();
        Ok(count as i64)
    }

    async fn update_status(
        &self,
        id: Uuid,
        change: OrderStatusChange,
    ) -> DbResult<Option<OrderRow>> {
        let Some(mut order) = self.orders.get_mut(&id) else {
            return Ok(None);
        };
        if order.status != change.expected.as_str() {
            return Ok(None);
        }
        change.apply(&mut order);
        Ok(Some(order.clone()))
    }

    async fn stats(&self) -> DbResult<OrderStatsRow> {
        let mut stats = OrderStatsRow::default();
        for order in self.orders.iter() {
            stats.total_orders += 1;
            let Ok(status) = order.status.parse::<OrderStatus>() else {
                continue;
            };
            match status {
                OrderStatus::Pending => stats.pending += 1,
                OrderStatus::Processing => stats.processing += 1,
                OrderStatus::Shipped => stats.shipped += 1,
                OrderStatus::Delivered => stats.delivered += 1,
                OrderStatus::Cancelled => stats.cancelled += 1,
                OrderStatus::Refunded => stats.refunded += 1,
            }
            if !matches!(status, OrderStatus::Cancelled | OrderStatus::Refunded) {
                stats.revenue += order.total;
                stats.revenue_orders += 1;
            }
        }
        Ok(stats)
    }
}

#[async_trait]
impl PaymentRepository for MemoryStore {
    async fn create(&self, payment: CreatePayment) -> DbResult<PaymentRow> {
        let _guard = self.lock();
        self.check_payment(&payment)?;
        Ok(self.put_payment(payment))
    }

    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<PaymentRow>> {
        Ok(self.payments.get(&id).map(|r| r.value().clone()))
    }

    async fn find_by_transaction_id(
        &self,
        transaction_id: &str,
    ) -> DbResult<Option<PaymentRow>> {
        Ok(self
            .transaction_ids
            .get(transaction_id)
            .and_then(|id| self.payments.get(id.value()).map(|r| r.value().clone())))
    }

    async fn find_by_idempotency_key(
        &self,
        user_id: Uuid,
        key: &str,
    ) -> DbResult<Option<PaymentRow>> {
        Ok(self
            .idempotency_keys
            .get(&(user_id, key.to_string()))
            .and_then(|id| self.payments.get(id.value()).map(|r| r.value().clone())))
    }

    async fn list_for_user(
        &self,
        user_id: Uuid,
        status: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> DbResult<Vec<PaymentRow>> {
        let rows = self
            .payments
            .iter()
            .filter(|p| p.user_id == user_id && status.is_none_or(|s| p.status == s))
            .map(|p| p.value().clone())
            .collect();
        Ok(page(rows, |p: &PaymentRow| p.created_at, limit, offset))
    }

    async fn count_for_user(&self, user_id: Uuid, status: Option<&str>) -> DbResult<i64> {
        let count = self
            .payments
            .iter()
            .filter(|p| p.user_id == user_id && status.is_none_or(|s| p.status == s))
            .count();
        Ok(count as i64)
    }

    async fn link_order(&self, link: LinkOrder) -> DbResult<Option<PaymentRow>> {
        Ok(self.link_unlinked(&link))
    }

    async fn update_status(
        &self,
        id: Uuid,
        change: PaymentStatusChange,
    ) -> DbResult<Option<PaymentRow>> {
        let Some(mut payment) = self.payments.get_mut(&id) else {
            return Ok(None);
        };
        if payment.status != change.expected.as_str() {
            return Ok(None);
        }
        change.apply(&mut payment);
        Ok(Some(payment.clone()))
    }

    async fn find_unlinked(
        &self,
        before: DateTime<Utc>,
        limit: i64,
    ) -> DbResult<Vec<PaymentRow>> {
        let live = |status: &str| {
            !matches!(
                status.parse::<PaymentStatus>(),
                Ok(PaymentStatus::Failed | PaymentStatus::Cancelled | PaymentStatus::Refunded)
            )
        };
        let mut rows: Vec<PaymentRow> = self
            .payments
            .iter()
            .filter(|p| {
                p.created_at < before
                    && live(&p.status)
                    && p.metadata.0.order_details.is_none()
                    && !p.metadata.0.needs_review
            })
            .map(|p| p.value().clone())
            .collect();
        rows.sort_by_key(|p| p.created_at);
        rows.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(rows)
    }

    async fn flag_for_review(
        &self,
        ids: &[Uuid],
        now: DateTime<Utc>,
    ) -> DbResult<Vec<PaymentRow>> {
        let mut flagged = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(mut payment) = self.payments.get_mut(id) {
                payment.metadata.0.needs_review = true;
                payment.updated_at = now;
                flagged.push(payment.clone());
            }
        }
        Ok(flagged)
    }
}

#[async_trait]
impl CheckoutRepository for MemoryStore {
    async fn create_checkout(
        &self,
        payment: CreatePayment,
        order: CreateOrder,
    ) -> DbResult<(PaymentRow, OrderRow)> {
        let _guard = self.lock();
        // Validate both before writing either
        self.check_payment(&payment)?;
        self.check_order(&order)?;
        let payment = self.put_payment(payment);
        let order = self.put_order(order);
        Ok((payment, order))
    }

    async fn create_linked_order(
        &self,
        order: CreateOrder,
        link: LinkOrder,
    ) -> DbResult<Option<(OrderRow, PaymentRow)>> {
        let _guard = self.lock();
        self.check_order(&order)?;
        let Some(payment) = self.link_unlinked(&link) else {
            return Ok(None);
        };
        let order = self.put_order(order);
        Ok(Some((order, payment)))
    }
}

#[async_trait]
impl HealthCheck for MemoryStore {
    async fn ping(&self) -> DbResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(DbError::Sqlx(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}
