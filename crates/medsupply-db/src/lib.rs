//! MedSupply DB - Database abstractions
//!
//! SQLx-based persistence for orders, payments and the local user
//! projection.
//!
//! # Example
//!
//! ```rust,ignore
//! use medsupply_db::{create_pool, run_migrations, Repositories};
//!
//! let pool = create_pool("postgres://localhost/medsupply").await?;
//! run_migrations(&pool).await?;
//! let repos = Repositories::postgres(pool);
//!
//! let order = repos.orders.find_by_order_number("ORD240315K3J9QZ").await?;
//! ```

pub mod error;
#[cfg(any(test, feature = "test-utils"))]
pub mod memory;
pub mod models;
pub mod pg;
pub mod pool;
pub mod repo;

pub use error::{DbError, DbResult, IDEMPOTENCY_KEY, ORDER_NUMBER_KEY, TRANSACTION_ID_KEY};
pub use models::*;
pub use pool::{create_pool, create_pool_with_options, run_migrations, DbPool, PoolOptions};
pub use repo::*;
