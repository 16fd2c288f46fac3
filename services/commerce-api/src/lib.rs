//! MedSupply Commerce API
//!
//! REST service for the checkout, order and payment flow.
//!
//! ## REST Endpoints
//!
//! - `POST /api/payments` - Record a payment
//! - `GET /api/payments/my-payments` - List own payments
//! - `GET /api/payments/{id}` - Get payment by UUID or transaction id
//! - `PATCH /api/payments/{id}/status` - Change payment status (admin)
//! - `POST /api/payments/reconcile` - Flag payments without orders (admin)
//! - `POST /api/orders` - Place an order
//! - `GET /api/orders/my-orders` - List own orders
//! - `GET /api/orders/stats/overview` - Order statistics (admin)
//! - `GET /api/orders/{id}` - Get order by UUID or order number
//! - `PATCH /api/orders/{id}/status` - Change order status (admin)
//! - `PATCH /api/orders/{id}/cancel` - Cancel a pending order
//! - `POST /api/checkout` - Payment and order in one transaction
//!
//! ## Health Endpoints
//!
//! - `GET /health` - Liveness probe
//! - `GET /ready` - Readiness probe
//! - `GET /metrics` - Prometheus metrics

pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod state;

use axum::http::HeaderValue;
use axum::routing::{get, patch, post};
use axum::Router;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use tower::ServiceBuilder;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

pub use config::{AppEnv, Config, ConfigError};
pub use error::{ApiError, ApiResult};
pub use state::AppState;

use crate::handlers::{health, ready};

/// Build the HTTP router
pub fn build_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let request_timeout = state.request_timeout();
    error::expose_internal_errors(state.config.app_env.is_development());

    let payments = Router::new()
        .route("/", post(handlers::create_payment))
        .route("/my-payments", get(handlers::my_payments))
        .route("/reconcile", post(handlers::reconcile_payments))
        .route("/{id}", get(handlers::get_payment))
        .route("/{id}/status", patch(handlers::update_payment_status));

    let orders = Router::new()
        .route("/", post(handlers::create_order))
        .route("/my-orders", get(handlers::my_orders))
        .route("/stats/overview", get(handlers::order_stats))
        .route("/{id}", get(handlers::get_order))
        .route("/{id}/status", patch(handlers::update_order_status))
        .route("/{id}/cancel", patch(handlers::cancel_order));

    let api = Router::new()
        .nest("/payments", payments)
        .nest("/orders", orders)
        .route("/checkout", post(handlers::checkout));

    // Health routes (no timeout - must always respond quickly)
    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready));

    // Metrics route (no timeout)
    let metrics_route = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    let cors = match state.config.cors_origin.as_deref() {
        None => CorsLayer::new().allow_origin(Any),
        Some(origin) => match origin.parse::<HeaderValue>() {
            Ok(origin) => CorsLayer::new()
                .allow_origin(AllowOrigin::exact(origin))
                .allow_credentials(true),
            Err(_) => {
                tracing::warn!(origin, "Invalid CORS_ORIGIN, allowing any origin");
                CorsLayer::new().allow_origin(Any)
            }
        },
    };

    // Outermost first
    let middleware = ServiceBuilder::new()
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(
            cors.allow_methods(AllowMethods::mirror_request())
                .allow_headers(AllowHeaders::mirror_request()),
        )
        .layer(TimeoutLayer::new(request_timeout));

    Router::new()
        .nest("/api", api)
        .layer(middleware)
        .merge(health_routes)
        .merge(metrics_route)
        .with_state(state)
}

/// Install the Prometheus recorder and describe the service metrics
pub fn setup_metrics() -> anyhow::Result<PrometheusHandle> {
    // Most operations are a couple of queries; checkout is one transaction
    let latency_buckets = &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.2, 0.5, 1.0, 2.5];

    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("commerce_operation_duration_seconds".to_string()),
            latency_buckets,
        )?
        .install_recorder()?;

    metrics::describe_counter!("commerce_orders_created_total", "Total orders created");
    metrics::describe_counter!(
        "commerce_payments_created_total",
        "Total payments recorded by plan"
    );
    metrics::describe_counter!(
        "commerce_orders_cancelled_total",
        "Total orders cancelled by customers or admins"
    );
    metrics::describe_histogram!(
        "commerce_operation_duration_seconds",
        "Commerce operation latency in seconds by operation and result"
    );

    Ok(handle)
}
