//! HTTP client for the commerce API

use async_trait::async_trait;
use medsupply_checkout_core::{BackendError, CheckoutBackend};
use medsupply_types::{
    ApiResponse, CancelOrderRequest, CheckoutReceipt, CheckoutRequest, CreateOrderRequest,
    CreatePaymentRequest, ListQuery, Order, OrderData, OrderPage, Payment, PaymentData,
    PaymentPage,
};
use reqwest::{header, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::retry::with_retry;
use crate::{ClientConfig, ClientError};

/// Header carrying a client-chosen idempotency key
pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// Commerce API client
#[derive(Debug, Clone)]
pub struct HttpBackend {
    http: reqwest::Client,
    config: ClientConfig,
}

impl HttpBackend {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.http.request(method, self.config.url(path));
        match self.config.session_token() {
            Some(token) => builder.header(header::AUTHORIZATION, format!("Bearer {token}")),
            None => builder,
        }
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ClientError> {
        let response = builder.send().await?;
        decode(response).await
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: Option<&ListQuery>,
    ) -> Result<T, ClientError> {
        with_retry(self.config.retry(), || {
            let mut builder = self.request(Method::GET, path);
            if let Some(query) = query {
                builder = builder.query(query);
            }
            self.send(builder)
        })
        .await
    }

    async fn write<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &B,
        idempotency_key: Option<&str>,
    ) -> Result<T, ClientError> {
        let mut builder = self.request(method, path).json(body);
        if let Some(key) = idempotency_key {
            builder = builder.header(IDEMPOTENCY_HEADER, key);
        }
        self.send(builder).await
    }

    /// `POST /api/payments`
    pub async fn create_payment(&self, req: &CreatePaymentRequest) -> Result<Payment, ClientError> {
        let data: PaymentData = self
            .write(Method::POST, "/api/payments", req, req.idempotency_key.as_deref())
            .await?;
        Ok(data.payment)
    }

    /// `POST /api/orders`
    pub async fn create_order(&self, req: &CreateOrderRequest) -> Result<Order, ClientError> {
        let data: OrderData = self.write(Method::POST, "/api/orders", req, None).await?;
        Ok(data.order)
    }

    /// `POST /api/checkout`
    pub async fn checkout(&self, req: &CheckoutRequest) -> Result<CheckoutReceipt, ClientError> {
        self.write(Method::POST, "/api/checkout", req, req.idempotency_key.as_deref())
            .await
    }

    /// `GET /api/orders/:id`, by UUID or order number
    pub async fn get_order(&self, id: &str) -> Result<Order, ClientError> {
        let data: OrderData = self.get(&format!("/api/orders/{id}"), None).await?;
        Ok(data.order)
    }

    /// `GET /api/payments/:id`, by UUID or transaction id
    pub async fn get_payment(&self, id: &str) -> Result<Payment, ClientError> {
        let data: PaymentData = self.get(&format!("/api/payments/{id}"), None).await?;
        Ok(data.payment)
    }

    /// `GET /api/orders/my-orders`
    pub async fn my_orders(&self, query: &ListQuery) -> Result<OrderPage, ClientError> {
        self.get("/api/orders/my-orders", Some(query)).await
    }

    /// `GET /api/payments/my-payments`
    pub async fn my_payments(&self, query: &ListQuery) -> Result<PaymentPage, ClientError> {
        self.get("/api/payments/my-payments", Some(query)).await
    }

    /// `PATCH /api/orders/:id/cancel`
    pub async fn cancel_order(
        &self,
        id: &str,
        req: &CancelOrderRequest,
    ) -> Result<Order, ClientError> {
        let data: OrderData = self
            .write(Method::PATCH, &format!("/api/orders/{id}/cancel"), req, None)
            .await?;
        Ok(data.order)
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let status = response.status();
    let bytes = response.bytes().await?;

    if status.is_success() {
        let envelope: ApiResponse<T> = serde_json::from_slice(&bytes)
            .map_err(|e| ClientError::Serialization(e.to_string()))?;
        return envelope
            .data
            .ok_or_else(|| ClientError::Serialization("response has no data".to_string()));
    }

    debug!(status = status.as_u16(), "API returned an error");
    let (message, errors) = match serde_json::from_slice::<ApiResponse<serde_json::Value>>(&bytes) {
        Ok(envelope) => (envelope.message, envelope.errors.unwrap_or_default()),
        Err(_) => (
            status
                .canonical_reason()
                .unwrap_or("unexpected response")
                .to_string(),
            Vec::new(),
        ),
    };
    Err(ClientError::from_response(status.as_u16(), message, errors))
}

#[async_trait]
impl CheckoutBackend for HttpBackend {
    async fn create_payment(&self, req: &CreatePaymentRequest) -> Result<Payment, BackendError> {
        Ok(HttpBackend::create_payment(self, req).await?)
    }

    async fn create_order(&self, req: &CreateOrderRequest) -> Result<Order, BackendError> {
        Ok(HttpBackend::create_order(self, req).await?)
    }
}
