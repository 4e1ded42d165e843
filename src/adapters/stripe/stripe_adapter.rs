//! Stripe payment provider adapter.
//!
//! Implements the `PaymentProvider` port against the Stripe REST API
//! using form-encoded requests.
//!
//! # Security
//!
//! Secrets are handled via `secrecy::SecretString` and sent only as HTTP
//! basic auth; they never appear in logs.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::ports::{
    CheckoutMode, CheckoutSession, CreateCheckoutRequest, CreateCustomerRequest, Customer,
    PaymentError, PaymentProvider,
};

/// Stripe API configuration.
#[derive(Clone)]
pub struct StripeConfig {
    /// Stripe secret API key (sk_live_... or sk_test_...).
    api_key: SecretString,

    /// Base URL for the Stripe API (default: https://api.stripe.com).
    api_base_url: String,
}

impl StripeConfig {
    /// Create a new Stripe configuration.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::new(api_key.into()),
            api_base_url: "https://api.stripe.com".to_string(),
        }
    }

    /// Set a custom API base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }
}

/// Stripe payment provider adapter.
pub struct StripePaymentAdapter {
    config: StripeConfig,
    http_client: reqwest::Client,
}

/// Customer object returned by the Stripe API.
#[derive(Debug, Deserialize)]
struct StripeCustomerResponse {
    id: String,
    email: Option<String>,
}

/// Checkout session object returned by the Stripe API.
#[derive(Debug, Deserialize)]
struct StripeCheckoutSessionResponse {
    id: String,
    url: Option<String>,
}

impl StripePaymentAdapter {
    /// Create a new Stripe adapter with the given configuration.
    pub fn new(config: StripeConfig) -> Self {
        Self {
            config,
            http_client: reqwest::Client::new(),
        }
    }

    async fn post_form<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        params: &[(String, String)],
        operation: &'static str,
    ) -> Result<T, PaymentError> {
        let url = format!("{}{}", self.config.api_base_url, path);

        let response = self
            .http_client
            .post(&url)
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .form(params)
            .send()
            .await
            .map_err(|e| PaymentError::network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!(operation, %status, error = %error_text, "Stripe API call failed");
            return Err(PaymentError::provider(format!(
                "Stripe API error ({}): {}",
                status, error_text
            )));
        }

        response.json().await.map_err(|e| {
            PaymentError::provider(format!("Failed to parse Stripe response: {}", e))
        })
    }
}

#[async_trait]
impl PaymentProvider for StripePaymentAdapter {
    async fn create_customer(
        &self,
        request: CreateCustomerRequest,
    ) -> Result<Customer, PaymentError> {
        let params = vec![
            ("email".to_string(), request.email.clone()),
            ("metadata[user_id]".to_string(), request.user_id.to_string()),
        ];

        let customer: StripeCustomerResponse = self
            .post_form("/v1/customers", &params, "create_customer")
            .await?;

        Ok(Customer {
            id: customer.id,
            email: customer.email.unwrap_or(request.email),
        })
    }

    async fn create_checkout_session(
        &self,
        request: CreateCheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        let mut params = vec![
            ("customer".to_string(), request.customer_id.clone()),
            ("mode".to_string(), request.mode.as_str().to_string()),
            ("line_items[0][price]".to_string(), request.price_ref.clone()),
            ("line_items[0][quantity]".to_string(), "1".to_string()),
            ("success_url".to_string(), request.success_url.clone()),
            ("cancel_url".to_string(), request.cancel_url.clone()),
        ];

        for (key, value) in &request.metadata {
            params.push((format!("metadata[{}]", key), value.clone()));
            // Propagate onto the subscription object so lifecycle events
            // carry the same context.
            if request.mode == CheckoutMode::Subscription {
                params.push((format!("subscription_data[metadata][{}]", key), value.clone()));
            }
        }

        let session: StripeCheckoutSessionResponse = self
            .post_form("/v1/checkout/sessions", &params, "create_checkout_session")
            .await?;

        let url = session.url.ok_or_else(|| {
            PaymentError::provider("Checkout session response carried no URL")
        })?;

        Ok(CheckoutSession {
            id: session.id,
            url,
        })
    }
}
