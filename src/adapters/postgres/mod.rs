//! PostgreSQL adapters - sqlx implementations of the repository ports.

mod pending_checkout_repository;
mod product_repository;
mod purchase_repository;
mod subscription_repository;
mod user_repository;
mod webhook_event_repository;

pub use pending_checkout_repository::PostgresPendingCheckoutRepository;
pub use product_repository::PostgresProductRepository;
pub use purchase_repository::PostgresPurchaseRepository;
pub use subscription_repository::PostgresSubscriptionRepository;
pub use user_repository::PostgresUserRepository;
pub use webhook_event_repository::PostgresWebhookEventRepository;
