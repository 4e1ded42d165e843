//! HTTP handlers for billing endpoints.
//!
//! These handlers connect Axum routes to application layer command/query
//! handlers.

use std::sync::Arc;

use axum::extract::{Json, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::application::handlers::billing::{
    CheckEntitlementHandler, CheckEntitlementQuery, CheckoutRedirects, ListPurchasesHandler,
    ListPurchasesQuery, ProcessPaymentWebhookCommand, ProcessPaymentWebhookHandler,
    StartCheckoutCommand, StartCheckoutHandler,
};
use crate::domain::billing::BillingError;
use crate::domain::foundation::UserId;
use crate::ports::{
    PaymentProvider, PendingCheckoutRepository, ProductRepository, PurchaseRepository,
    SubscriptionRepository, UserRepository,
};

use super::dto::{
    CheckoutResponse, CreateCheckoutRequest, EntitlementResponse, ErrorResponse, PurchaseView,
    PurchasesResponse,
};

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Shared application state containing all dependencies.
///
/// Cloned per request; dependencies are Arc-wrapped for cheap sharing.
#[derive(Clone)]
pub struct BillingAppState {
    pub users: Arc<dyn UserRepository>,
    pub products: Arc<dyn ProductRepository>,
    pub purchases: Arc<dyn PurchaseRepository>,
    pub subscriptions: Arc<dyn SubscriptionRepository>,
    pub pending_checkouts: Arc<dyn PendingCheckoutRepository>,
    pub payment_provider: Arc<dyn PaymentProvider>,
    /// Built once at startup; owns the verifier and the idempotent
    /// processor with its handler registry.
    pub webhook_handler: Arc<ProcessPaymentWebhookHandler>,
    pub redirects: CheckoutRedirects,
}

impl BillingAppState {
    /// Create handlers on demand from the shared state.
    pub fn start_checkout_handler(&self) -> StartCheckoutHandler {
        StartCheckoutHandler::new(
            self.users.clone(),
            self.products.clone(),
            self.pending_checkouts.clone(),
            self.payment_provider.clone(),
            self.redirects.clone(),
        )
    }

    pub fn check_entitlement_handler(&self) -> CheckEntitlementHandler {
        CheckEntitlementHandler::new(
            self.users.clone(),
            self.products.clone(),
            self.purchases.clone(),
            self.subscriptions.clone(),
        )
    }

    pub fn list_purchases_handler(&self) -> ListPurchasesHandler {
        ListPurchasesHandler::new(self.purchases.clone())
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// User Context
// ════════════════════════════════════════════════════════════════════════════════

/// Authenticated user context extracted from the request.
///
/// Session auth is an external collaborator; the gateway in front of this
/// service resolves the session and forwards the user id in a header.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
}

/// Rejection type for AuthenticatedUser extraction.
pub struct AuthenticationRequired;

impl IntoResponse for AuthenticationRequired {
    fn into_response(self) -> axum::response::Response {
        let error = ErrorResponse::new("AUTHENTICATION_REQUIRED", "Authentication is required");
        (StatusCode::UNAUTHORIZED, Json(error)).into_response()
    }
}

#[async_trait::async_trait]
impl<S> axum::extract::FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AuthenticationRequired;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get("X-User-Id")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok())
            .ok_or(AuthenticationRequired)?;

        Ok(AuthenticatedUser { user_id })
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Command Handlers (POST endpoints)
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/billing/checkout - Start a checkout flow.
pub async fn create_checkout(
    State(state): State<BillingAppState>,
    user: AuthenticatedUser,
    Json(request): Json<CreateCheckoutRequest>,
) -> Result<impl IntoResponse, BillingApiError> {
    let product_id = request
        .product_id
        .parse()
        .map_err(|_| BillingError::validation("productId", "must be a valid UUID"))?;

    let handler = state.start_checkout_handler();
    let cmd = StartCheckoutCommand {
        user_id: user.user_id,
        product_id,
        price_ref: request.price_id,
        is_subscription: request.is_subscription,
        space: request.space,
    };

    let result = handler.handle(cmd).await?;

    Ok((StatusCode::CREATED, Json(CheckoutResponse { url: result.url })))
}

/// POST /api/webhooks/payments - Handle provider webhook deliveries.
///
/// No session auth: the signature is the authentication. The body must
/// stay raw bytes; signatures are computed over the exact payload.
pub async fn handle_payment_webhook(
    State(state): State<BillingAppState>,
    headers: axum::http::HeaderMap,
    body: axum::body::Bytes,
) -> axum::response::Response {
    let Some(signature) = headers
        .get("Stripe-Signature")
        .and_then(|v| v.to_str().ok())
    else {
        let error = ErrorResponse::new("MISSING_SIGNATURE", "Missing signature header");
        return (StatusCode::BAD_REQUEST, Json(error)).into_response();
    };

    let cmd = ProcessPaymentWebhookCommand {
        payload: body.to_vec(),
        signature: signature.to_string(),
    };

    match state.webhook_handler.handle(cmd).await {
        Ok(_) => StatusCode::OK.into_response(),
        Err(err) => {
            // The status code decides whether the provider redelivers;
            // bodies are for operators reading logs, not for the sender.
            let status = err.status_code();
            if status.is_server_error() {
                tracing::error!(error = %err, "Webhook processing failed; requesting redelivery");
            } else if !status.is_success() {
                tracing::warn!(error = %err, "Webhook rejected");
            }
            status.into_response()
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Query Handlers (GET endpoints)
// ════════════════════════════════════════════════════════════════════════════════

/// GET /api/billing/entitlements/:product_id - Is the product unlocked.
pub async fn check_entitlement(
    State(state): State<BillingAppState>,
    user: AuthenticatedUser,
    Path(product_id): Path<String>,
) -> Result<impl IntoResponse, BillingApiError> {
    let product_id = product_id
        .parse()
        .map_err(|_| BillingError::validation("product_id", "must be a valid UUID"))?;

    let handler = state.check_entitlement_handler();
    let answer = handler
        .handle(CheckEntitlementQuery {
            user_id: user.user_id,
            product_id,
        })
        .await?;

    Ok(Json(EntitlementResponse {
        unlocked: answer.unlocked,
    }))
}

/// GET /api/billing/purchases - The purchasing user's own purchase facts.
pub async fn list_purchases(
    State(state): State<BillingAppState>,
    user: AuthenticatedUser,
) -> Result<impl IntoResponse, BillingApiError> {
    let handler = state.list_purchases_handler();
    let purchases = handler
        .handle(ListPurchasesQuery {
            user_id: user.user_id,
        })
        .await?;

    Ok(Json(PurchasesResponse {
        purchases: purchases.into_iter().map(PurchaseView::from).collect(),
    }))
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// API error type that converts billing errors to HTTP responses.
pub struct BillingApiError(BillingError);

impl From<BillingError> for BillingApiError {
    fn from(err: BillingError) -> Self {
        Self(err)
    }
}

impl IntoResponse for BillingApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, error_code) = match &self.0 {
            BillingError::ProductNotFound(_) => (StatusCode::NOT_FOUND, "PRODUCT_NOT_FOUND"),
            BillingError::UserNotFound(_) => (StatusCode::NOT_FOUND, "USER_NOT_FOUND"),
            BillingError::ProductInactive(_) => (StatusCode::CONFLICT, "PRODUCT_INACTIVE"),
            BillingError::PriceMismatch => (StatusCode::BAD_REQUEST, "PRICE_MISMATCH"),
            BillingError::PaymentFailed { .. } => {
                (StatusCode::BAD_GATEWAY, "PAYMENT_FAILED")
            }
            BillingError::InvalidWebhookSignature => {
                (StatusCode::UNAUTHORIZED, "INVALID_WEBHOOK_SIGNATURE")
            }
            BillingError::ValidationFailed { .. } => {
                (StatusCode::BAD_REQUEST, "VALIDATION_FAILED")
            }
            BillingError::Infrastructure(message) => {
                tracing::error!(error = %message, "Request failed on infrastructure");
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        };

        let body = ErrorResponse::new(error_code, self.0.message());
        (status, Json(body)).into_response()
    }
}
