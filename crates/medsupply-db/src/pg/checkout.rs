//! Single-transaction checkout writer

use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::DbResult;
use crate::models::{CreateOrder, CreatePayment, LinkOrder, OrderRow, PaymentRow};
use crate::repo::{CheckoutRepository, HealthCheck};

use super::order::insert_order;
use super::payment::{insert_payment, link_unlinked};

/// PostgreSQL checkout repository
#[derive(Clone)]
pub struct PgCheckoutRepository {
    pool: PgPool,
}

impl PgCheckoutRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CheckoutRepository for PgCheckoutRepository {
    async fn create_checkout(
        &self,
        payment: CreatePayment,
        order: CreateOrder,
    ) -> DbResult<(PaymentRow, OrderRow)> {
        let mut tx = self.pool.begin().await?;

        // Dropping `tx` on an early return rolls both inserts back
        let payment = insert_payment(&mut *tx, &payment).await?;
        let order = insert_order(&mut *tx, &order).await?;

        tx.commit().await?;
        Ok((payment, order))
    }

    async fn create_linked_order(
        &self,
        order: CreateOrder,
        link: LinkOrder,
    ) -> DbResult<Option<(OrderRow, PaymentRow)>> {
        let mut tx = self.pool.begin().await?;

        // The guarded link takes the payment row lock before the order exists
        let Some(payment) = link_unlinked(&mut *tx, &link).await? else {
            tx.rollback().await?;
            return Ok(None);
        };
        let order = insert_order(&mut *tx, &order).await?;

        tx.commit().await?;
        Ok(Some((order, payment)))
    }
}

#[async_trait]
impl HealthCheck for PgCheckoutRepository {
    async fn ping(&self) -> DbResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
