//! # Payment Processor Client
//!
//! The two calls the storefront needs from the hosted checkout:
//!
//! ```text
//! checkout ──► create_preference(order) ──► { id, init_point }
//!                                                   │
//!                      shopper pays on init_point ◄─┘
//!                                   │
//! webhook / return ──► get_payment(id) ──► { status, external_reference }
//!                                                     (= order id)
//! ```
//!
//! Lookups are retried with exponential backoff on network errors, 429 and
//! 5xx. Preference creation is not retried: a duplicate preference is worse
//! than a failed checkout the shopper can resubmit.

use std::time::Duration;

use async_trait::async_trait;
use backoff::ExponentialBackoff;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::ProcessorSettings;
use tienda_core::{Order, PaymentStatus};

/// Currency of every preference.
pub const CURRENCY: &str = "ARS";

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("Payment processor access token is not configured")]
    NotConfigured,

    #[error("Payment processor request failed: {0}")]
    Request(String),

    #[error("Payment processor returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Payment not found: {0}")]
    NotFound(String),

    #[error("Unexpected payment processor response: {0}")]
    Decode(String),
}

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreferenceItem {
    pub title: String,
    pub quantity: i64,
    /// Decimal currency units.
    pub unit_price: f64,
    pub currency_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreferencePayer {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackUrls {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending: Option<String>,
}

/// Body of `POST /checkout/preferences`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreferenceRequest {
    pub items: Vec<PreferenceItem>,
    pub payer: PreferencePayer,
    /// Our order id, echoed back on every payment.
    pub external_reference: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub back_urls: Option<BackUrls>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_return: Option<String>,
}

impl PreferenceRequest {
    /// One summary item for the whole order, so coupon discounts are
    /// already reflected in the charged amount.
    pub fn for_order(order: &Order, settings: &ProcessorSettings) -> Self {
        let back_urls = settings.success_url.as_ref().map(|success| BackUrls {
            success: Some(success.clone()),
            failure: settings.failure_url.clone(),
            pending: settings.pending_url.clone(),
        });

        PreferenceRequest {
            items: vec![PreferenceItem {
                title: format!("Pedido {}", order.order_number),
                quantity: 1,
                unit_price: order.total_cents as f64 / 100.0,
                currency_id: CURRENCY.to_string(),
            }],
            payer: PreferencePayer {
                name: order.customer.name.clone(),
                email: order.customer.email.clone(),
            },
            external_reference: order.id.clone(),
            notification_url: settings.notification_url.clone(),
            auto_return: back_urls.as_ref().map(|_| "approved".to_string()),
            back_urls,
        }
    }
}

/// A created checkout preference.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Preference {
    pub id: String,
    /// Hosted checkout URL the shopper is redirected to.
    pub init_point: String,
}

/// A payment as reported by the processor.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProcessorPayment {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub status_detail: Option<String>,
    #[serde(default)]
    pub external_reference: Option<String>,
}

impl ProcessorPayment {
    pub fn payment_status(&self) -> PaymentStatus {
        PaymentStatus::from_processor(&self.status)
    }
}

pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(i64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(text) => text,
        Id::Number(number) => number.to_string(),
    })
}

// =============================================================================
// Trait
// =============================================================================

#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    async fn create_preference(&self, request: &PreferenceRequest) -> Result<Preference, ProcessorError>;

    async fn get_payment(&self, payment_id: &str) -> Result<ProcessorPayment, ProcessorError>;
}

// =============================================================================
// HTTP Client
// =============================================================================

pub struct HttpProcessorClient {
    client: reqwest::Client,
    base_url: String,
    access_token: Option<SecretString>,
    max_retry: Duration,
}

impl HttpProcessorClient {
    pub fn new(settings: &ProcessorSettings) -> Result<Self, ProcessorError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| ProcessorError::Request(e.to_string()))?;

        Ok(HttpProcessorClient {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            access_token: settings.access_token.clone(),
            max_retry: Duration::from_secs(settings.max_retry_secs),
        })
    }

    fn token(&self) -> Result<String, ProcessorError> {
        self.access_token
            .as_ref()
            .map(|token| token.expose_secret().to_string())
            .ok_or(ProcessorError::NotConfigured)
    }

    fn create_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: Duration::from_millis(250),
            max_interval: Duration::from_secs(4),
            multiplier: 2.0,
            max_elapsed_time: Some(self.max_retry),
            ..Default::default()
        }
    }
}

async fn error_body(response: reqwest::Response) -> ProcessorError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    ProcessorError::Status { status, body }
}

#[async_trait]
impl PaymentProcessor for HttpProcessorClient {
    async fn create_preference(&self, request: &PreferenceRequest) -> Result<Preference, ProcessorError> {
        let token = self.token()?;
        let url = format!("{}/checkout/preferences", self.base_url);
        debug!(external_reference = %request.external_reference, "Creating checkout preference");

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(request)
            .send()
            .await
            .map_err(|e| ProcessorError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(error_body(response).await);
        }

        response
            .json::<Preference>()
            .await
            .map_err(|e| ProcessorError::Decode(e.to_string()))
    }

    async fn get_payment(&self, payment_id: &str) -> Result<ProcessorPayment, ProcessorError> {
        let token = self.token()?;
        let url = format!("{}/v1/payments/{}", self.base_url, payment_id);

        backoff::future::retry(self.create_backoff(), || {
            let client = self.client.clone();
            let url = url.clone();
            let token = token.clone();
            let payment_id = payment_id.to_string();
            async move {
                let response = client
                    .get(&url)
                    .bearer_auth(token)
                    .send()
                    .await
                    .map_err(|e| {
                        warn!(error = %e, "Payment lookup failed, retrying");
                        backoff::Error::transient(ProcessorError::Request(e.to_string()))
                    })?;

                let status = response.status();
                if status == StatusCode::NOT_FOUND {
                    return Err(backoff::Error::permanent(ProcessorError::NotFound(payment_id)));
                }
                if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
                    warn!(status = status.as_u16(), "Payment lookup failed, retrying");
                    return Err(backoff::Error::transient(error_body(response).await));
                }
                if !status.is_success() {
                    return Err(backoff::Error::permanent(error_body(response).await));
                }

                response
                    .json::<ProcessorPayment>()
                    .await
                    .map_err(|e| backoff::Error::permanent(ProcessorError::Decode(e.to_string())))
            }
        })
        .await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
