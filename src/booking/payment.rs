// Payment collaborator
//
// The booking flow hands amount, currency and customer identity to a gateway and
// stamps the returned transaction id onto the reservation as an opaque string.

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::engine::round_for_display;

/// Customer identity sent with a payment intent
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentCustomer {
    pub name: String,
    pub email: String,
    pub phone: String,
}

/// Payment intent request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentRequest {
    pub amount: Decimal,
    pub currency: String,
    pub customer: PaymentCustomer,
    /// Caller reference shown on the gateway side
    pub description: String,
}

/// Gateway answer for an accepted payment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentReceipt {
    /// None when no intent was created
    pub transaction_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaymentError {
    /// The gateway refused the payment; carries its message
    #[error("{0}")]
    Declined(String),

    /// Transport failure or unexpected gateway response
    #[error("Payment gateway error: {0}")]
    Gateway(String),
}

/// Payment gateway boundary
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_payment_intent(&self, request: &PaymentRequest) -> Result<PaymentReceipt, PaymentError>;

    /// Whether accepted payments confirm the reservation immediately
    fn collects_payment(&self) -> bool {
        true
    }
}

/// Gateway used when no payment provider is configured
#[derive(Debug, Clone, Default)]
pub struct PayOnSiteGateway;

#[async_trait]
impl PaymentGateway for PayOnSiteGateway {
    async fn create_payment_intent(&self, request: &PaymentRequest) -> Result<PaymentReceipt, PaymentError> {
        debug!("Pay on site: no intent for {} {}", request.amount, request.currency);
        Ok(PaymentReceipt { transaction_id: None })
    }

    fn collects_payment(&self) -> bool {
        false
    }
}

#[derive(Debug, Serialize)]
struct IntentBody<'a> {
    amount: String,
    currency: &'a str,
    customer: &'a PaymentCustomer,
    description: &'a str,
}

impl<'a> From<&'a PaymentRequest> for IntentBody<'a> {
    fn from(request: &'a PaymentRequest) -> Self {
        Self {
            amount: round_for_display(request.amount).to_string(),
            currency: &request.currency,
            customer: &request.customer,
            description: &request.description,
        }
    }
}

#[derive(Debug, Deserialize)]
struct IntentResponse {
    success: bool,
    #[serde(default)]
    transaction_id: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// JSON-over-HTTP payment gateway client
#[derive(Debug, Clone)]
pub struct HttpPaymentGateway {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpPaymentGateway {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Result<Self, PaymentError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PaymentError::Gateway(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn create_payment_intent(&self, request: &PaymentRequest) -> Result<PaymentReceipt, PaymentError> {
        let url = format!("{}/payment-intents", self.base_url);
        let body = IntentBody::from(request);

        debug!("Requesting payment intent of {} {}", body.amount, body.currency);

        let mut builder = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| PaymentError::Gateway(e.to_string()))?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .map_err(|e| PaymentError::Gateway(e.to_string()))?;

        if status.is_server_error() {
            error!("Payment gateway error: {} - {}", status, response_text);
            return Err(PaymentError::Gateway(format!("HTTP {}", status)));
        }

        let intent: IntentResponse = serde_json::from_str(&response_text).map_err(|e| {
            error!("Failed to parse payment gateway response: {}", e);
            PaymentError::Gateway(format!("unreadable response (HTTP {})", status))
        })?;

        if !status.is_success() || !intent.success {
            let message = intent
                .message
                .unwrap_or_else(|| "Payment was declined".to_string());
            return Err(PaymentError::Declined(message));
        }

        info!("Payment intent accepted: {:?}", intent.transaction_id);
        Ok(PaymentReceipt {
            transaction_id: intent.transaction_id,
        })
    }
}
