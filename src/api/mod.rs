//! HTTP surface: the checkout facade and the gateway notify endpoints.

pub mod checkout;
pub mod notify;

use crate::services::{CheckoutService, NotifyIngest};
use crate::store::PaymentStore;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

/// Route paths, shared with the services that hand them to the gateways
/// as callback URLs.
pub mod routes {
    pub const CHECKOUT: &str = "/payments/checkout/{token}";
    pub const CREATE_PAYMENT: &str = "/payments";
    pub const ALIPAY_ASYNC_NOTIFY: &str = "/payments/notify/alipay";
    pub const ALIPAY_SYNC_NOTIFY: &str = "/payments/notify/alipay/return";
    pub const ALLPAY_ASYNC_NOTIFY: &str = "/payments/notify/allpay";
    pub const ALLPAY_SYNC_NOTIFY: &str = "/payments/notify/allpay/result";
    /// `/{payment_token}` is appended per payment
    pub const PAYPAL_RETURN_PREFIX: &str = "/payments/notify/paypal";
}

pub struct AppState {
    pub checkout: Arc<CheckoutService>,
    pub ingest: Arc<NotifyIngest>,
    pub store: Arc<dyn PaymentStore>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(routes::CREATE_PAYMENT, post(checkout::create_payment))
        .route(routes::CHECKOUT, get(checkout::build_checkout))
        .route(routes::ALIPAY_ASYNC_NOTIFY, post(notify::alipay_async))
        .route(routes::ALIPAY_SYNC_NOTIFY, get(notify::alipay_sync))
        .route(routes::ALLPAY_ASYNC_NOTIFY, post(notify::allpay_async))
        .route(routes::ALLPAY_SYNC_NOTIFY, post(notify::allpay_sync))
        .route(
            &format!("{}/{{payment_token}}", routes::PAYPAL_RETURN_PREFIX),
            get(notify::paypal_return),
        )
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
