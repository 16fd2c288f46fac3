//! PostgreSQL payment repository implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::error::DbResult;
use crate::models::{CreatePayment, LinkOrder, PaymentRow, PaymentStatusChange, PAYMENT_COLUMNS};
use crate::repo::PaymentRepository;

/// PostgreSQL payment repository
#[derive(Clone)]
pub struct PgPaymentRepository {
    pool: PgPool,
}

impl PgPaymentRepository {
    /// Create a new payment repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

pub(crate) async fn insert_payment<'e, E: PgExecutor<'e>>(
    executor: E,
    payment: &CreatePayment,
) -> DbResult<PaymentRow> {
    let sql = format!(
        r#"
        INSERT INTO payments (id, transaction_id, user_id, amount, currency, payment_type,
                              payment_method, status, description, metadata, idempotency_key,
                              created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $12)
        RETURNING {PAYMENT_COLUMNS}
        "#
    );

    let row = sqlx::query_as::<_, PaymentRow>(&sql)
        .bind(payment.id)
        .bind(&payment.transaction_id)
        .bind(payment.user_id)
        .bind(payment.amount)
        .bind(&payment.currency)
        .bind(payment.payment_type.as_str())
        .bind(Json(&payment.payment_method))
        .bind(payment.status.as_str())
        .bind(&payment.description)
        .bind(Json(&payment.metadata))
        .bind(&payment.idempotency_key)
        .bind(payment.created_at)
        .fetch_one(executor)
        .await?;

    Ok(row)
}

/// Write the order link unless the payment already carries one.
///
/// Under concurrent links the losing `UPDATE` re-reads the committed row,
/// fails the guard and returns no row.
pub(crate) async fn link_unlinked<'e, E: PgExecutor<'e>>(
    executor: E,
    link: &LinkOrder,
) -> DbResult<Option<PaymentRow>> {
    let sql = format!(
        r#"
        UPDATE payments
        SET metadata = jsonb_set(
                jsonb_set(metadata, '{{orderDetails}}', $2::jsonb),
                '{{orderId}}', to_jsonb($3::text)),
            updated_at = $4
        WHERE id = $1
          AND (metadata->'orderDetails' IS NULL OR metadata->'orderDetails' = 'null'::jsonb)
        RETURNING {PAYMENT_COLUMNS}
        "#
    );
    let payment = sqlx::query_as::<_, PaymentRow>(&sql)
        .bind(link.payment_id)
        .bind(Json(&link.link))
        .bind(link.link.order_number.as_str())
        .bind(link.link.linked_at)
        .fetch_optional(executor)
        .await?;

    Ok(payment)
}

#[async_trait]
impl PaymentRepository for PgPaymentRepository {
    async fn create(&self, payment: CreatePayment) -> DbResult<PaymentRow> {
        insert_payment(&self.pool, &payment).await
    }

    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<PaymentRow>> {
        let sql = format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1");
        let payment = sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(payment)
    }

    async fn find_by_transaction_id(
        &self,
        transaction_id: &str,
    ) -> DbResult<Option<PaymentRow>> {
        let sql = format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE transaction_id = $1");
        let payment = sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(transaction_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(payment)
    }

    async fn find_by_idempotency_key(
        &self,
        user_id: Uuid,
        key: &str,
    ) -> DbResult<Option<PaymentRow>> {
        let sql = format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE user_id = $1 AND idempotency_key = $2"
        );
        let payment = sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(user_id)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(payment)
    }

    async fn list_for_user(
        &self,
        user_id: Uuid,
        status: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> DbResult<Vec<PaymentRow>> {
        let sql = format!(
            r#"
            SELECT {PAYMENT_COLUMNS}
            FROM payments
            WHERE user_id = $1 AND ($2::text IS NULL OR status = $2)
            ORDER BY created_at DESC, id
            LIMIT $3 OFFSET $4
            "#
        );
        let payments = sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(user_id)
            .bind(status)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        Ok(payments)
    }

    async fn count_for_user(&self, user_id: Uuid, status: Option<&str>) -> DbResult<i64> {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*)
            FROM payments
            WHERE user_id = $1 AND ($2::text IS NULL OR status = $2)
            "#,
        )
        .bind(user_id)
        .bind(status)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn link_order(&self, link: LinkOrder) -> DbResult<Option<PaymentRow>> {
        link_unlinked(&self.pool, &link).await
    }

    async fn update_status(
        &self,
        id: Uuid,
        change: PaymentStatusChange,
    ) -> DbResult<Option<PaymentRow>> {
        let sql = format!(
            r#"
            UPDATE payments
            SET status = $3,
                refund_amount = COALESCE($4, refund_amount),
                refund_reason = COALESCE($5, refund_reason),
                gateway_response = COALESCE($6, gateway_response),
                updated_at = $7
            WHERE id = $1 AND status = $2
            RETURNING {PAYMENT_COLUMNS}
            "#
        );
        let payment = sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(id)
            .bind(change.expected.as_str())
            .bind(change.status.as_str())
            .bind(change.refund_amount)
            .bind(&change.refund_reason)
            .bind(change.gateway_response.as_ref().map(Json))
            .bind(change.updated_at)
            .fetch_optional(&self.pool)
            .await?;

        Ok(payment)
    }

    async fn find_unlinked(
        &self,
        before: DateTime<Utc>,
        limit: i64,
    ) -> DbResult<Vec<PaymentRow>> {
        let sql = format!(
            r#"
            SELECT {PAYMENT_COLUMNS}
            FROM payments
            WHERE created_at < $1
              AND status NOT IN ('failed', 'cancelled', 'refunded')
              AND COALESCE(metadata -> 'orderDetails', 'null'::jsonb) = 'null'::jsonb
              AND NOT COALESCE((metadata ->> 'needsReview')::boolean, FALSE)
            ORDER BY created_at
            LIMIT $2
            "#
        );
        let payments = sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(before)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(payments)
    }

    async fn flag_for_review(
        &self,
        ids: &[Uuid],
        now: DateTime<Utc>,
    ) -> DbResult<Vec<PaymentRow>> {
        let sql = format!(
            r#"
            UPDATE payments
            SET metadata = jsonb_set(metadata, '{{needsReview}}', 'true'::jsonb),
                updated_at = $2
            WHERE id = ANY($1)
            RETURNING {PAYMENT_COLUMNS}
            "#
        );
        let payments = sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(ids)
            .bind(now)
            .fetch_all(&self.pool)
            .await?;

        Ok(payments)
    }
}
