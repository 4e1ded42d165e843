//! Axum router configuration for billing endpoints.

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{
    check_entitlement, create_checkout, handle_payment_webhook, list_purchases, BillingAppState,
};

/// Create the billing API router.
///
/// # Routes
///
/// ## User Endpoints (require authentication)
/// - `POST /checkout` - Start a checkout flow
/// - `GET /entitlements/:product_id` - Check if a product is unlocked
/// - `GET /purchases` - The user's own purchase facts
pub fn billing_routes() -> Router<BillingAppState> {
    Router::new()
        .route("/checkout", post(create_checkout))
        .route("/entitlements/:product_id", get(check_entitlement))
        .route("/purchases", get(list_purchases))
}

/// Create the payment webhook router.
///
/// Separate from the user routes because webhooks carry no session auth;
/// the signature is the authentication.
///
/// # Routes
/// - `POST /payments` - Handle provider webhook deliveries
pub fn webhook_routes() -> Router<BillingAppState> {
    Router::new().route("/payments", post(handle_payment_webhook))
}
