//! Clubroom backend entry point.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use http::HeaderValue;
use sqlx::postgres::PgPoolOptions;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use clubroom::adapters::http::billing::{billing_routes, webhook_routes, BillingAppState};
use clubroom::adapters::postgres::{
    PostgresPendingCheckoutRepository, PostgresProductRepository, PostgresPurchaseRepository,
    PostgresSubscriptionRepository, PostgresUserRepository, PostgresWebhookEventRepository,
};
use clubroom::adapters::stripe::{StripeConfig, StripePaymentAdapter};
use clubroom::application::handlers::billing::{
    CheckoutCompletedHandler, CheckoutRedirects, ProcessPaymentWebhookHandler, RefundHandler,
    SubscriptionLifecycleHandler,
};
use clubroom::config::AppConfig;
use clubroom::domain::billing::{StripeWebhookVerifier, WebhookEventHandler};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    config.validate()?;

    init_tracing(&config);

    tracing::info!(
        environment = ?config.server.environment,
        test_mode = config.payment.is_test_mode(),
        "Starting clubroom backend"
    );

    let pool = PgPoolOptions::new()
        .min_connections(config.database.min_connections)
        .max_connections(config.database.max_connections)
        .acquire_timeout(config.database.acquire_timeout())
        .connect(&config.database.url)
        .await?;

    if config.database.run_migrations {
        tracing::info!("Running database migrations");
        sqlx::migrate!("./migrations").run(&pool).await?;
    }

    let state = build_state(&config, pool);

    let origins = config
        .server
        .cors_origins_list()
        .iter()
        .map(|origin| origin.parse::<HeaderValue>())
        .collect::<Result<Vec<_>, _>>()?;
    let cors = CorsLayer::new().allow_origin(AllowOrigin::list(origins));

    let app = Router::new()
        .nest("/api/billing", billing_routes())
        .nest("/api/webhooks", webhook_routes())
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(Duration::from_secs(
                    config.server.request_timeout_secs,
                )))
                .layer(cors),
        );

    let addr = config.server.socket_addr()?;
    tracing::info!(%addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.server.log_level.clone()));

    if config.is_production() {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

fn build_state(config: &AppConfig, pool: sqlx::PgPool) -> BillingAppState {
    let users = Arc::new(PostgresUserRepository::new(pool.clone()));
    let products = Arc::new(PostgresProductRepository::new(pool.clone()));
    let purchases = Arc::new(PostgresPurchaseRepository::new(pool.clone()));
    let subscriptions = Arc::new(PostgresSubscriptionRepository::new(pool.clone()));
    let pending_checkouts = Arc::new(PostgresPendingCheckoutRepository::new(pool.clone()));
    let webhook_events = Arc::new(PostgresWebhookEventRepository::new(pool));

    let payment_provider = Arc::new(StripePaymentAdapter::new(StripeConfig::new(
        config.payment.api_key.clone(),
    )));

    let handlers: Vec<Arc<dyn WebhookEventHandler>> = vec![
        Arc::new(CheckoutCompletedHandler::new(
            users.clone(),
            products.clone(),
            purchases.clone(),
            pending_checkouts.clone(),
        )),
        Arc::new(SubscriptionLifecycleHandler::new(
            users.clone(),
            subscriptions.clone(),
        )),
        Arc::new(RefundHandler::new(
            purchases.clone(),
            config.payment.refunds_enabled,
        )),
    ];

    let webhook_handler = Arc::new(ProcessPaymentWebhookHandler::new(
        StripeWebhookVerifier::new(config.payment.webhook_secret.clone()),
        webhook_events,
        handlers,
    ));

    BillingAppState {
        users,
        products,
        purchases,
        subscriptions,
        pending_checkouts,
        payment_provider,
        webhook_handler,
        redirects: CheckoutRedirects::from_app_url(&config.payment.app_url),
    }
}
