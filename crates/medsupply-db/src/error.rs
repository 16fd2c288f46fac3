//! Database errors

use thiserror::Error;

/// Database errors
#[derive(Error, Debug)]
pub enum DbError {
    /// SQLx error
    #[error("database error: {0}")]
    Sqlx(sqlx::Error),

    /// Record not found
    #[error("record not found")]
    NotFound,

    /// A unique constraint rejected the write
    #[error("unique constraint violated: {}", .0.as_deref().unwrap_or("unknown"))]
    UniqueViolation(Option<String>),

    /// A stored value could not be turned back into a domain type
    #[error("corrupt row: {0}")]
    Decode(String),

    /// Migration failure
    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

impl DbError {
    /// Whether this error is a unique violation on `constraint`
    pub fn is_unique_violation_of(&self, constraint: &str) -> bool {
        matches!(self, Self::UniqueViolation(Some(name)) if name == constraint)
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => Self::NotFound,
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                Self::UniqueViolation(db.constraint().map(str::to_string))
            }
            _ => Self::Sqlx(err),
        }
    }
}

/// Result alias for repository calls
pub type DbResult<T> = Result<T, DbError>;

/// Unique constraint on `orders.order_number`
pub const ORDER_NUMBER_KEY: &str = "orders_order_number_key";

/// Unique constraint on `payments.transaction_id`
pub const TRANSACTION_ID_KEY: &str = "payments_transaction_id_key";

/// Unique constraint on `(payments.user_id, payments.idempotency_key)`
pub const IDEMPOTENCY_KEY: &str = "payments_user_idempotency_key";
