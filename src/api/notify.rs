//! Gateway notify endpoints.
//!
//! Source metadata (device string, client IP) is captured here for the
//! audit trail. The raw body/query string is passed through untouched so
//! the audit record preserves exactly what the gateway sent.

use crate::api::AppState;
use crate::payments::types::{GatewayParams, SourceMeta};
use crate::payments::utils::parse_form_body;
use crate::services::NotifyOutcome;
use axum::extract::{ConnectInfo, Path, RawQuery, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Redirect, Response};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

fn source_meta(headers: &HeaderMap, addr: &SocketAddr) -> SourceMeta {
    let device = headers
        .get(http::header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    // honor the proxy chain's first hop when present
    let ip = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .unwrap_or_else(|| addr.ip().to_string());
    SourceMeta { device, ip }
}

fn form_params(body: &str) -> GatewayParams {
    parse_form_body(body).into_iter().collect()
}

fn respond(outcome: NotifyOutcome) -> Response {
    match outcome {
        NotifyOutcome::Text(body) => body.into_response(),
        NotifyOutcome::Redirect(target) => Redirect::to(&target).into_response(),
    }
}

/// POST /payments/notify/alipay
pub async fn alipay_async(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: String,
) -> Response {
    info!("received alipay async notify");
    let meta = source_meta(&headers, &addr);
    let params = form_params(&body);
    respond(state.ingest.alipay_async_notify(&body, &params, &meta).await)
}

/// GET /payments/notify/alipay/return
pub async fn alipay_sync(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> Response {
    info!("received alipay sync notify");
    let meta = source_meta(&headers, &addr);
    let raw = query.unwrap_or_default();
    let params = form_params(&raw);
    respond(state.ingest.alipay_sync_notify(&raw, &params, &meta).await)
}

/// POST /payments/notify/allpay
pub async fn allpay_async(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: String,
) -> Response {
    info!("received allpay async notify");
    let meta = source_meta(&headers, &addr);
    let params = form_params(&body);
    respond(state.ingest.allpay_async_notify(&body, &params, &meta).await)
}

/// POST /payments/notify/allpay/result
pub async fn allpay_sync(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: String,
) -> Response {
    info!("received allpay order result");
    let meta = source_meta(&headers, &addr);
    let params = form_params(&body);
    respond(state.ingest.allpay_sync_notify(&body, &params, &meta).await)
}

/// GET /payments/notify/paypal/{payment_token}
pub async fn paypal_return(
    State(state): State<Arc<AppState>>,
    Path(payment_token): Path<String>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> Response {
    info!(payment_token = %payment_token, "received express checkout return");
    let meta = source_meta(&headers, &addr);
    let raw = query.unwrap_or_default();
    let params = form_params(&raw);
    respond(
        state
            .ingest
            .paypal_return(&payment_token, &raw, &params, &meta)
            .await,
    )
}
