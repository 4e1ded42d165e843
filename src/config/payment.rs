//! Payment configuration

use serde::Deserialize;

use super::error::ValidationError;

/// Payment configuration (Stripe)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymentConfig {
    /// Provider secret API key
    pub api_key: String,

    /// Webhook signing secret
    pub webhook_secret: String,

    /// Public application URL used to build post-checkout redirect targets
    pub app_url: String,

    /// Whether charge.refunded events revoke purchase access.
    ///
    /// Refund policy is a business decision; the handler ships disabled.
    #[serde(default)]
    pub refunds_enabled: bool,
}

impl PaymentConfig {
    /// Check if using provider test mode
    pub fn is_test_mode(&self) -> bool {
        self.api_key.starts_with("sk_test_")
    }

    /// Check if using provider live mode
    pub fn is_live_mode(&self) -> bool {
        self.api_key.starts_with("sk_live_")
    }

    /// Validate payment configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.api_key.is_empty() {
            return Err(ValidationError::MissingRequired("PAYMENT_API_KEY"));
        }
        if self.webhook_secret.is_empty() {
            return Err(ValidationError::MissingRequired("PAYMENT_WEBHOOK_SECRET"));
        }
        if self.app_url.is_empty() {
            return Err(ValidationError::MissingRequired("PAYMENT_APP_URL"));
        }

        // Verify key prefixes for safety
        if !self.api_key.starts_with("sk_") {
            return Err(ValidationError::InvalidProviderKey);
        }
        if !self.webhook_secret.starts_with("whsec_") {
            return Err(ValidationError::InvalidWebhookSecret);
        }
        if !self.app_url.starts_with("http://") && !self.app_url.starts_with("https://") {
            return Err(ValidationError::InvalidAppUrl);
        }

        Ok(())
    }
}
