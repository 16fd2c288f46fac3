//! PostgreSQL order repository implementation

use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::error::DbResult;
use crate::models::{CreateOrder, OrderRow, OrderStatsRow, OrderStatusChange, ORDER_COLUMNS};
use crate::repo::OrderRepository;

/// PostgreSQL order repository
#[derive(Clone)]
pub struct PgOrderRepository {
    pool: PgPool,
}

impl PgOrderRepository {
    /// Create a new order repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

pub(crate) async fn insert_order<'e, E: PgExecutor<'e>>(
    executor: E,
    order: &CreateOrder,
) -> DbResult<OrderRow> {
    let sql = format!(
        r#"
        INSERT INTO orders (id, order_number, user_id, items, subtotal, delivery_fee, tax,
                            total, currency, shipping_details, payment_details, tracking,
                            status, notes, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $15)
        RETURNING {ORDER_COLUMNS}
        "#
    );

    let row = sqlx::query_as::<_, OrderRow>(&sql)
        .bind(order.id)
        .bind(&order.order_number)
        .bind(order.user_id)
        .bind(Json(&order.items))
        .bind(order.totals.subtotal)
        .bind(order.totals.delivery_fee)
        .bind(order.totals.tax)
        .bind(order.totals.total)
        .bind(&order.currency)
        .bind(Json(&order.shipping_details))
        .bind(Json(&order.payment_details))
        .bind(Json(&order.tracking))
        .bind(order.status.as_str())
        .bind(&order.notes)
        .bind(order.created_at)
        .fetch_one(executor)
        .await?;

    Ok(row)
}

#[async_trait]
impl OrderRepository for PgOrderRepository {
    async fn create(&self, order: CreateOrder) -> DbResult<OrderRow> {
        insert_order(&self.pool, &order).await
    }

    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<OrderRow>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
        let order = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(order)
    }

    async fn find_by_order_number(&self, order_number: &str) -> DbResult<Option<OrderRow>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE order_number = $1");
        let order = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(order_number)
            .fetch_optional(&self.pool)
            .await?;

        Ok(order)
    }

    async fn list_for_user(
        &self,
        user_id: Uuid,
        status: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> DbResult<Vec<OrderRow>> {
        let sql = format!(
            r#"
            SELECT {ORDER_COLUMNS}
            FROM orders
            WHERE user_id = $1 AND ($2::text IS NULL OR status = $2)
            ORDER BY created_at DESC, id
            LIMIT $3 OFFSET $4
            "#
        );
        let orders = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(user_id)
            .bind(status)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        Ok(orders)
    }

    async fn count_for_user(&self, user_id: Uuid, status: Option<&str>) -> DbResult<i64> {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*)
            FROM orders
            WHERE user_id = $1 AND ($2::text IS NULL OR status = $2)
            "#,
        )
        .bind(user_id)
        .bind(status)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn update_status(
        &self,
        id: Uuid,
        change: OrderStatusChange,
    ) -> DbResult<Option<OrderRow>> {
        // tracking is appended, never replaced
        let sql = format!(
            r#"
            UPDATE orders
            SET status = $3,
                tracking = tracking || $4::jsonb,
                delivered_at = COALESCE($5, delivered_at),
                cancelled_at = COALESCE($6, cancelled_at),
                cancelled_reason = COALESCE($7, cancelled_reason),
                estimated_delivery = COALESCE($8, estimated_delivery),
                updated_at = $9
            WHERE id = $1 AND status = $2
            RETURNING {ORDER_COLUMNS}
            "#
        );
        let order = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(id)
            .bind(change.expected.as_str())
            .bind(change.status.as_str())
            .bind(Json(&change.tracking))
            .bind(change.delivered_at)
            .bind(change.cancelled_at)
            .bind(&change.cancelled_reason)
            .bind(change.estimated_delivery)
            .bind(change.updated_at)
            .fetch_optional(&self.pool)
            .await?;

        Ok(order)
    }

    async fn stats(&self) -> DbResult<OrderStatsRow> {
        let stats = sqlx::query_as::<_, OrderStatsRow>(
            r#"
            SELECT
                COUNT(*) AS total_orders,
                COUNT(*) FILTER (WHERE status = 'pending') AS pending,
                COUNT(*) FILTER (WHERE status = 'processing') AS processing,
                COUNT(*) FILTER (WHERE status = 'shipped') AS shipped,
                COUNT(*) FILTER (WHERE status = 'delivered') AS delivered,
                COUNT(*) FILTER (WHERE status = 'cancelled') AS cancelled,
                COUNT(*) FILTER (WHERE status = 'refunded') AS refunded,
                COALESCE(SUM(total) FILTER (WHERE status NOT IN ('cancelled', 'refunded')), 0)
                    AS revenue,
                COUNT(*) FILTER (WHERE status NOT IN ('cancelled', 'refunded'))
                    AS revenue_orders
            FROM orders
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(stats)
    }
}
