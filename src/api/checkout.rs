//! Checkout endpoints: open a payment record, then build the gateway
//! artifact for it.

use crate::api::AppState;
use crate::error::AppError;
use crate::payments::types::{
    BillingContact, CheckoutArtifact, DeviceKind, Money, ProviderName, PurchasedItem, SourceMeta,
};
use crate::store::NewPayment;
use axum::extract::{ConnectInfo, Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CreatePaymentRequest {
    pub variant: ProviderName,
    /// merchant trade number; generated when absent
    pub trade_no: Option<String>,
    pub total: Money,
    pub items: Vec<PurchasedItem>,
    pub billing: BillingContact,
}

#[derive(Debug, Serialize)]
pub struct CreatePaymentResponse {
    pub token: String,
    pub trade_no: String,
}

/// POST /payments
pub async fn create_payment(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreatePaymentRequest>,
) -> Result<Json<CreatePaymentResponse>, AppError> {
    request.total.validate_positive("total")?;

    let trade_no = request
        .trade_no
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| format!("CN{}", Uuid::new_v4().simple()));

    let record = state
        .store
        .create(NewPayment {
            trade_no,
            variant: request.variant,
            total: request.total,
            items: request.items,
            billing: request.billing,
        })
        .await?;

    info!(trade_no = %record.trade_no, variant = %record.variant, "payment record opened");
    Ok(Json(CreatePaymentResponse {
        token: record.token,
        trade_no: record.trade_no,
    }))
}

/// GET /payments/checkout/{token}
///
/// Returns the redirect URL or form field set for the payment's
/// provider. 409 when a gateway session was already opened for this
/// payment.
pub async fn build_checkout(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Result<Json<CheckoutArtifact>, AppError> {
    let user_agent = headers
        .get(http::header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let device = DeviceKind::from_user_agent(user_agent);
    let meta = SourceMeta {
        device: user_agent.to_string(),
        ip: addr.ip().to_string(),
    };

    let artifact = state.checkout.build(&token, device, &meta).await?;
    match artifact {
        Some(artifact) => Ok(Json(artifact)),
        None => Err(AppError::Conflict(
            "a gateway session is already open for this payment".to_string(),
        )),
    }
}
