//! API response envelope and pagination

use serde::{Deserialize, Serialize};

use crate::order::{Order, OrderStats};
use crate::payment::Payment;

/// Standard response envelope: `{success, message, data?, errors?}`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct ApiResponse<T> {
    /// Whether the request succeeded
    pub success: bool,
    /// Human-readable outcome
    pub message: String,
    /// Response data (if successful)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Field-level errors (validation failures only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldError>>,
}

impl<T> ApiResponse<T> {
    /// Create a successful response
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
            errors: None,
        }
    }
}

impl ApiResponse<()> {
    /// Create a failure response without field errors
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
            errors: None,
        }
    }

    /// Attach field errors to a failure
    pub fn with_errors(mut self, errors: Vec<FieldError>) -> Self {
        self.errors = Some(errors);
        self
    }
}

/// One invalid input field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Path of the field in the request body, e.g. `items[0].quantity`
    pub field: String,
    pub message: String,
}

pub const DEFAULT_PAGE_LIMIT: u32 = 10;
pub const MAX_PAGE_LIMIT: u32 = 100;

/// Pagination parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// Page number (1-indexed)
    #[serde(default = "default_page")]
    pub page: u32,
    /// Items per page
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    DEFAULT_PAGE_LIMIT
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

impl Pagination {
    pub fn new(page: u32, limit: u32) -> Self {
        Self { page, limit }.normalized()
    }

    /// Clamp page to at least 1 and limit to `1..=MAX_PAGE_LIMIT`
    pub fn normalized(self) -> Self {
        Self {
            page: self.page.max(1),
            limit: self.limit.clamp(1, MAX_PAGE_LIMIT),
        }
    }

    /// Get the offset for database queries
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }

    /// Get the limit for database queries
    pub fn limit(&self) -> u64 {
        u64::from(self.limit.min(MAX_PAGE_LIMIT))
    }
}

/// Pagination block of a list response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    /// `ceil(total / limit)`
    pub pages: u64,
}

impl PageInfo {
    pub fn new(total: u64, pagination: &Pagination) -> Self {
        let limit = u64::from(pagination.limit.max(1));
        Self {
            total,
            page: pagination.page,
            limit: pagination.limit,
            pages: total.div_ceil(limit),
        }
    }
}

/// `GET /api/orders/my-orders` payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderPage {
    pub orders: Vec<Order>,
    pub pagination: PageInfo,
}

/// `GET /api/payments/my-payments` payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentPage {
    pub payments: Vec<Payment>,
    pub pagination: PageInfo,
}

/// Result of a unified checkout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutReceipt {
    pub payment: Payment,
    pub order: Order,
}

/// `{payment}` payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentData {
    pub payment: Payment,
}

/// `{order}` payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderData {
    pub order: Order,
}

/// `GET /api/orders/stats/overview` payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsData {
    pub stats: OrderStats,
}

/// `POST /api/payments/reconcile` payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub flagged: usize,
    pub payments: Vec<Payment>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status
    pub status: HealthStatus,
    /// Service version
    pub version: String,
    /// Component health checks
    #[serde(skip_serializing_if = "Option::is_none")]
    pub components: Option<Vec<ComponentHealth>>,
}

/// Health status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

/// Component health check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
