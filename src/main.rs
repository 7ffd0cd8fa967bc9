use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use cnpay_backend::api::{self, AppState};
use cnpay_backend::config::AppConfig;
use cnpay_backend::logging::init_tracing;
use cnpay_backend::middleware::logging::UuidRequestId;
use cnpay_backend::payments::providers::{AlipayProvider, AllpayProvider, PaypalProvider};
use cnpay_backend::services::{CheckoutService, ExpressCheckout, NotifyIngest};
use cnpay_backend::store::memory::{InMemoryCashFlowAudit, InMemoryPaymentStore};
use cnpay_backend::store::{CashFlowAudit, PaymentStore};
use dotenv::dotenv;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    dotenv().ok();

    let config = AppConfig::from_env().context("loading configuration")?;
    config.validate().context("validating configuration")?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        host = %config.server.host,
        port = config.server.port,
        "starting payment gateway backend"
    );

    // gateway adapters
    let alipay = Arc::new(AlipayProvider::from_env().context("configuring alipay provider")?);
    let allpay = Arc::new(AllpayProvider::from_env());
    let paypal = Arc::new(PaypalProvider::from_env().context("configuring paypal provider")?);

    // collaborator-owned state; the dev server keeps it in memory
    let store: Arc<dyn PaymentStore> = Arc::new(InMemoryPaymentStore::new());
    let audit: Arc<dyn CashFlowAudit> = Arc::new(InMemoryCashFlowAudit::new());

    let express = Arc::new(ExpressCheckout::new(
        paypal,
        store.clone(),
        audit.clone(),
        config.routes.clone(),
    ));
    let checkout = Arc::new(CheckoutService::new(
        store.clone(),
        alipay.clone(),
        allpay.clone(),
        express.clone(),
        config.routes.clone(),
    ));
    let ingest = Arc::new(NotifyIngest::new(
        store.clone(),
        audit,
        alipay,
        allpay,
        express,
        config.routes.clone(),
    ));

    let state = Arc::new(AppState {
        checkout,
        ingest,
        store,
    });

    let app = api::router(state).layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
            .layer(TraceLayer::new_for_http())
            .layer(PropagateRequestIdLayer::x_request_id()),
    );

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("parsing bind address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("binding listener")?;
    info!(%addr, "listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("serving")?;

    Ok(())
}
