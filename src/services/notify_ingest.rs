//! Inbound notify handling.
//!
//! Every callback is audited raw before anything else, including forged
//! ones; verification then decides between a state transition and the
//! provider's negative acknowledgement. The gateway contract requires a
//! well-formed response even on rejection, so nothing in here faults:
//! malformed payloads and backend failures all degrade to the negative
//! acknowledgement or a cancel redirect.
//!
//! These endpoints carry no caller identity at all; they are
//! machine-to-machine, and authenticity derives solely from signature
//! (or token) verification.

use crate::config::RoutesConfig;
use crate::payments::provider::GatewayProvider;
use crate::payments::providers::{AlipayProvider, AllpayProvider};
use crate::payments::types::{GatewayParams, SourceMeta};
use crate::services::express_checkout::ExpressCheckout;
use crate::store::{CashFlowAudit, PaymentRecord, PaymentStore, StoreResult};
use std::sync::Arc;
use tracing::{error, warn};
use uuid::Uuid;

/// Response owed to the notifying party: a plain-text body for
/// server-to-server notifies, a redirect for browser returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyOutcome {
    Text(String),
    Redirect(String),
}

const ALIPAY_ACK_OK: &str = "success";
const ALIPAY_ACK_FAIL: &str = "fail";
const ALLPAY_ACK_OK: &str = "1|OK";
const ALLPAY_ACK_FAIL: &str = "0|ErrorMessage";

/// Trade statuses that count as paid on the direct-pay gateway.
const ALIPAY_PAID_STATUSES: [&str; 2] = ["TRADE_SUCCESS", "TRADE_FINISHED"];

/// Return codes that count as paid on the checkout-fields gateway.
const ALLPAY_PAID_CODES: [i64; 2] = [1, 800];

pub struct NotifyIngest {
    store: Arc<dyn PaymentStore>,
    audit: Arc<dyn CashFlowAudit>,
    alipay: Arc<AlipayProvider>,
    allpay: Arc<AllpayProvider>,
    express: Arc<ExpressCheckout>,
    routes: RoutesConfig,
}

impl NotifyIngest {
    pub fn new(
        store: Arc<dyn PaymentStore>,
        audit: Arc<dyn CashFlowAudit>,
        alipay: Arc<AlipayProvider>,
        allpay: Arc<AllpayProvider>,
        express: Arc<ExpressCheckout>,
        routes: RoutesConfig,
    ) -> Self {
        Self {
            store,
            audit,
            alipay,
            allpay,
            express,
            routes,
        }
    }

    /// The audit append that precedes everything else.
    async fn record(&self, raw_payload: &str, meta: &SourceMeta) -> StoreResult<Uuid> {
        self.audit.append(raw_payload, meta).await
    }

    /// Run a provider's verification, collapsing malformed-payload
    /// errors into a rejection.
    async fn verified(&self, provider: &dyn GatewayProvider, params: &GatewayParams) -> bool {
        match provider.verify_notify(params).await {
            Ok(valid) => {
                if !valid {
                    warn!(provider = %provider.name(), "notify verification failed, possible forgery");
                }
                valid
            }
            Err(e) => {
                warn!(provider = %provider.name(), error = %e, "notify payload rejected");
                false
            }
        }
    }

    async fn payment_for_trade_no(&self, trade_no: Option<&String>) -> Option<PaymentRecord> {
        let trade_no = trade_no?;
        match self.store.find_by_trade_no(trade_no).await {
            Ok(found) => {
                if found.is_none() {
                    warn!(trade_no = %trade_no, "notify references unknown trade number");
                }
                found
            }
            Err(e) => {
                error!(trade_no = %trade_no, error = %e, "payment lookup failed");
                None
            }
        }
    }

    /// Server-to-server direct-pay notify. Plain-text acknowledgement.
    pub async fn alipay_async_notify(
        &self,
        raw_payload: &str,
        params: &GatewayParams,
        meta: &SourceMeta,
    ) -> NotifyOutcome {
        let log_id = match self.record(raw_payload, meta).await {
            Ok(id) => id,
            Err(e) => {
                error!(error = %e, "audit write failed, rejecting notify");
                return NotifyOutcome::Text(ALIPAY_ACK_FAIL.to_string());
            }
        };

        if !self.verified(self.alipay.as_ref(), params).await {
            return NotifyOutcome::Text(ALIPAY_ACK_FAIL.to_string());
        }

        let paid = params
            .get("trade_status")
            .map(|status| ALIPAY_PAID_STATUSES.contains(&status.as_str()))
            .unwrap_or(false);
        if !paid {
            // authentic but not a paid state; report failure, change nothing
            return NotifyOutcome::Text(ALIPAY_ACK_FAIL.to_string());
        }

        let Some(payment) = self.payment_for_trade_no(params.get("out_trade_no")).await else {
            return NotifyOutcome::Text(ALIPAY_ACK_FAIL.to_string());
        };

        if let Err(e) = self
            .store
            .attach_cash_flow_log(payment.id, log_id, None)
            .await
        {
            error!(trade_no = %payment.trade_no, error = %e, "failed to attach audit log");
            return NotifyOutcome::Text(ALIPAY_ACK_FAIL.to_string());
        }
        if let Err(e) = self.store.mark_confirmed(payment.id).await {
            error!(trade_no = %payment.trade_no, error = %e, "failed to confirm payment");
            return NotifyOutcome::Text(ALIPAY_ACK_FAIL.to_string());
        }
        NotifyOutcome::Text(ALIPAY_ACK_OK.to_string())
    }

    /// Browser return from the direct-pay gateway. Redirect either way.
    pub async fn alipay_sync_notify(
        &self,
        raw_payload: &str,
        params: &GatewayParams,
        meta: &SourceMeta,
    ) -> NotifyOutcome {
        if let Err(e) = self.record(raw_payload, meta).await {
            error!(error = %e, "audit write failed on sync notify");
            return NotifyOutcome::Redirect(self.routes.cancel_path.clone());
        }

        if self.verified(self.alipay.as_ref(), params).await {
            NotifyOutcome::Redirect(self.routes.order_complete_path.clone())
        } else {
            NotifyOutcome::Redirect(self.routes.cancel_path.clone())
        }
    }

    /// Server-to-server checkout-fields notify. `1|OK` confirms receipt
    /// of a paid callback; anything else answers `0|ErrorMessage`.
    pub async fn allpay_async_notify(
        &self,
        raw_payload: &str,
        params: &GatewayParams,
        meta: &SourceMeta,
    ) -> NotifyOutcome {
        let log_id = match self.record(raw_payload, meta).await {
            Ok(id) => id,
            Err(e) => {
                error!(error = %e, "audit write failed, rejecting notify");
                return NotifyOutcome::Text(ALLPAY_ACK_FAIL.to_string());
            }
        };

        if !self.verified(self.allpay.as_ref(), params).await {
            return NotifyOutcome::Text(ALLPAY_ACK_FAIL.to_string());
        }

        let paid = params
            .get("RtnCode")
            .and_then(|code| code.parse::<i64>().ok())
            .map(|code| ALLPAY_PAID_CODES.contains(&code))
            .unwrap_or(false);
        if !paid {
            return NotifyOutcome::Text(ALLPAY_ACK_FAIL.to_string());
        }

        let Some(payment) = self
            .payment_for_trade_no(params.get("MerchantTradeNo"))
            .await
        else {
            return NotifyOutcome::Text(ALLPAY_ACK_FAIL.to_string());
        };

        let payment_date = params.get("PaymentDate").cloned();
        if let Err(e) = self
            .store
            .attach_cash_flow_log(payment.id, log_id, payment_date)
            .await
        {
            error!(trade_no = %payment.trade_no, error = %e, "failed to attach audit log");
            return NotifyOutcome::Text(ALLPAY_ACK_FAIL.to_string());
        }
        if let Err(e) = self.store.mark_confirmed(payment.id).await {
            error!(trade_no = %payment.trade_no, error = %e, "failed to confirm payment");
            return NotifyOutcome::Text(ALLPAY_ACK_FAIL.to_string());
        }
        NotifyOutcome::Text(ALLPAY_ACK_OK.to_string())
    }

    /// Browser-facing order result from the checkout-fields gateway.
    /// The status transition belongs to the async notify; this path only
    /// links the audit entry and routes the buyer. A callback that fails
    /// verification is routed to the cancel page, never silently
    /// accepted.
    pub async fn allpay_sync_notify(
        &self,
        raw_payload: &str,
        params: &GatewayParams,
        meta: &SourceMeta,
    ) -> NotifyOutcome {
        let log_id = match self.record(raw_payload, meta).await {
            Ok(id) => id,
            Err(e) => {
                error!(error = %e, "audit write failed on order result");
                return NotifyOutcome::Redirect(self.routes.cancel_path.clone());
            }
        };

        if let Some(payment) = self
            .payment_for_trade_no(params.get("MerchantTradeNo"))
            .await
        {
            if let Err(e) = self
                .store
                .attach_cash_flow_log(payment.id, log_id, None)
                .await
            {
                error!(trade_no = %payment.trade_no, error = %e, "failed to attach audit log");
            }
        }

        if self.verified(self.allpay.as_ref(), params).await {
            NotifyOutcome::Redirect(self.routes.order_complete_path.clone())
        } else {
            NotifyOutcome::Redirect(self.routes.cancel_path.clone())
        }
    }

    /// Express-checkout browser return: audit the redirect itself, then
    /// hand the token to the orchestrator for detail-fetch and capture.
    pub async fn paypal_return(
        &self,
        payment_token: &str,
        raw_payload: &str,
        query: &GatewayParams,
        meta: &SourceMeta,
    ) -> NotifyOutcome {
        let log_id = match self.record(raw_payload, meta).await {
            Ok(id) => id,
            Err(e) => {
                error!(error = %e, "audit write failed on express return");
                return NotifyOutcome::Redirect(self.routes.cancel_path.clone());
            }
        };

        let payment = match self.store.find_by_token(payment_token).await {
            Ok(Some(payment)) => payment,
            Ok(None) => {
                warn!(payment_token = %payment_token, "express return references unknown payment");
                return NotifyOutcome::Redirect(self.routes.cancel_path.clone());
            }
            Err(e) => {
                error!(error = %e, "payment lookup failed on express return");
                return NotifyOutcome::Redirect(self.routes.cancel_path.clone());
            }
        };

        if let Err(e) = self
            .store
            .attach_cash_flow_log(payment.id, log_id, None)
            .await
        {
            error!(trade_no = %payment.trade_no, error = %e, "failed to attach audit log");
        }

        match self.express.finalize(&payment, query, meta).await {
            Ok(path) => NotifyOutcome::Redirect(path),
            Err(e) => {
                error!(trade_no = %payment.trade_no, error = %e, "express finalize failed");
                NotifyOutcome::Redirect(self.routes.cancel_path.clone())
            }
        }
    }
}
