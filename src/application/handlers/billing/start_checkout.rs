//! StartCheckoutHandler - Command handler for starting a checkout session.

use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::billing::{AudienceSpace, BillingError};
use crate::domain::foundation::{ProductId, Timestamp, UserId};
use crate::ports::{
    CheckoutMode, CreateCheckoutRequest, CreateCustomerRequest, PaymentProvider, PendingCheckout,
    PendingCheckoutRepository, ProductRepository, UserRepository,
};

/// Command to start a checkout session.
#[derive(Debug, Clone)]
pub struct StartCheckoutCommand {
    /// Authenticated purchasing user.
    pub user_id: UserId,
    /// Product being bought.
    pub product_id: ProductId,
    /// Provider price reference the client intends to pay.
    pub price_ref: String,
    /// One-time or recurring.
    pub is_subscription: bool,
    /// Audience space the client is buying in.
    pub space: AudienceSpace,
}

/// Result of starting a checkout.
#[derive(Debug, Clone)]
pub struct CheckoutStarted {
    /// Provider-hosted checkout URL to redirect the user to.
    pub url: String,
}

/// Redirect targets appended to the checkout session, built from the
/// public application URL.
#[derive(Debug, Clone)]
pub struct CheckoutRedirects {
    pub success_url: String,
    pub cancel_url: String,
}

impl CheckoutRedirects {
    /// Builds the standard redirect pair from the public app URL.
    pub fn from_app_url(app_url: &str) -> Self {
        let base = app_url.trim_end_matches('/');
        Self {
            success_url: format!("{}/checkout/success?session_id={{CHECKOUT_SESSION_ID}}", base),
            cancel_url: format!("{}/checkout/cancelled", base),
        }
    }
}

/// Handler for starting checkout sessions.
///
/// The provider customer is created and its id persisted *before* the
/// session is requested. A crash in between leaves a harmless orphan
/// customer rather than a session we cannot attribute.
pub struct StartCheckoutHandler {
    users: Arc<dyn UserRepository>,
    products: Arc<dyn ProductRepository>,
    pending: Arc<dyn PendingCheckoutRepository>,
    payment_provider: Arc<dyn PaymentProvider>,
    redirects: CheckoutRedirects,
}

impl StartCheckoutHandler {
    pub fn new(
        users: Arc<dyn UserRepository>,
        products: Arc<dyn ProductRepository>,
        pending: Arc<dyn PendingCheckoutRepository>,
        payment_provider: Arc<dyn PaymentProvider>,
        redirects: CheckoutRedirects,
    ) -> Self {
        Self {
            users,
            products,
            pending,
            payment_provider,
            redirects,
        }
    }

    pub async fn handle(
        &self,
        cmd: StartCheckoutCommand,
    ) -> Result<CheckoutStarted, BillingError> {
        // 1. Load and validate the account and product.
        let account = self
            .users
            .find_by_id(&cmd.user_id)
            .await?
            .ok_or(BillingError::UserNotFound(cmd.user_id))?;

        if account.is_disabled() {
            return Err(BillingError::validation("user", "account is disabled"));
        }

        let product = self
            .products
            .find_by_id(&cmd.product_id)
            .await?
            .ok_or(BillingError::ProductNotFound(cmd.product_id))?;

        if !product.active {
            return Err(BillingError::ProductInactive(product.id));
        }

        if product.price_ref != cmd.price_ref {
            return Err(BillingError::PriceMismatch);
        }

        if product.space != cmd.space {
            return Err(BillingError::validation(
                "space",
                "space does not match the product",
            ));
        }

        if product.kind.is_recurring() != cmd.is_subscription {
            return Err(BillingError::validation(
                "is_subscription",
                "checkout mode does not match the product kind",
            ));
        }

        // 2. Ensure a provider customer exists, persisting the linkage
        //    before the session is requested.
        let customer_id = match &account.customer_id {
            Some(id) => id.clone(),
            None => {
                let customer = self
                    .payment_provider
                    .create_customer(CreateCustomerRequest {
                        user_id: account.id,
                        email: account.email.clone(),
                    })
                    .await
                    .map_err(|e| {
                        tracing::error!(user_id = %account.id, error = %e, "Customer creation failed");
                        BillingError::payment_failed(e.to_string())
                    })?;

                self.users.link_customer(&account.id, &customer.id).await?;
                customer.id
            }
        };

        // 3. Request the session, tagged with reconciliation metadata.
        let mut metadata = HashMap::new();
        metadata.insert("user_id".to_string(), cmd.user_id.to_string());
        metadata.insert("product_id".to_string(), cmd.product_id.to_string());
        metadata.insert("space".to_string(), cmd.space.as_str().to_string());

        let mode = if cmd.is_subscription {
            CheckoutMode::Subscription
        } else {
            CheckoutMode::Payment
        };

        let session = self
            .payment_provider
            .create_checkout_session(CreateCheckoutRequest {
                customer_id,
                price_ref: cmd.price_ref.clone(),
                mode,
                metadata,
                success_url: self.redirects.success_url.clone(),
                cancel_url: self.redirects.cancel_url.clone(),
            })
            .await
            .map_err(|e| {
                tracing::error!(user_id = %cmd.user_id, error = %e, "Checkout session creation failed");
                BillingError::payment_failed(e.to_string())
            })?;

        // 4. Persist the session linkage so completion can reconcile even
        //    if the provider drops the metadata.
        self.pending
            .save(&PendingCheckout {
                session_id: session.id.clone(),
                user_id: cmd.user_id,
                product_id: cmd.product_id,
                space: cmd.space,
                is_subscription: cmd.is_subscription,
                created_at: Timestamp::now(),
            })
            .await?;

        tracing::info!(
            user_id = %cmd.user_id,
            product_id = %cmd.product_id,
            session_id = %session.id,
            "Checkout session created"
        );

        Ok(CheckoutStarted { url: session.url })
    }
}
