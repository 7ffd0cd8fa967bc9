//! Express-checkout orchestration.
//!
//! The purchase spans three gateway round trips split across two inbound
//! HTTP calls: `start` runs SetExpressCheckout while the buyer is still
//! on our site; `finalize` runs GetExpressCheckoutDetails and
//! DoExpressCheckoutPayment after the gateway redirects the buyer back.
//! Nothing survives in process between the two halves: the handshake
//! token is the only carrier of continuity, and it is attacker-visible,
//! so it is used strictly as a correlation key checked against the
//! gateway's own detail-fetch response, never as a credential.

use crate::api::routes;
use crate::config::RoutesConfig;
use crate::payments::error::PaymentError;
use crate::payments::providers::PaypalProvider;
use crate::payments::types::{CheckoutForm, GatewayParams, SourceMeta};
use crate::store::{CashFlowAudit, PaymentRecord, PaymentStore, StoreError};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

pub type ExpressResult<T> = Result<T, ExpressCheckoutError>;

#[derive(Debug, Error)]
pub enum ExpressCheckoutError {
    #[error(transparent)]
    Gateway(#[from] PaymentError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Session state threaded through one checkout. Created at initiate,
/// discarded once capture resolves; persisted nowhere.
#[derive(Debug, Clone)]
struct ExpressSession {
    token: String,
    payer_id: Option<String>,
    amount: String,
    currency: String,
}

pub struct ExpressCheckout {
    paypal: Arc<PaypalProvider>,
    store: Arc<dyn PaymentStore>,
    audit: Arc<dyn CashFlowAudit>,
    routes: RoutesConfig,
}

impl ExpressCheckout {
    pub fn new(
        paypal: Arc<PaypalProvider>,
        store: Arc<dyn PaymentStore>,
        audit: Arc<dyn CashFlowAudit>,
        routes: RoutesConfig,
    ) -> Self {
        Self {
            paypal,
            store,
            audit,
            routes,
        }
    }

    fn return_url(&self, payment_token: &str) -> String {
        self.routes
            .absolute(&format!("{}/{}", routes::PAYPAL_RETURN_PREFIX, payment_token))
    }

    /// First half: SetExpressCheckout. A non-success acknowledgement is
    /// terminal for the whole flow; on success the returned form
    /// redirects the buyer to the gateway login page with the token.
    pub async fn start(
        &self,
        payment: &PaymentRecord,
        meta: &SourceMeta,
    ) -> ExpressResult<CheckoutForm> {
        let amount = payment.total.whole_units()?;

        let mut params = GatewayParams::new();
        params.insert("PAYMENTREQUEST_0_AMT".to_string(), amount.clone());
        params.insert(
            "PAYMENTREQUEST_0_PAYMENTACTION".to_string(),
            "Sale".to_string(),
        );
        params.insert(
            "PAYMENTREQUEST_0_CURRENCYCODE".to_string(),
            payment.total.currency.clone(),
        );
        params.insert("RETURNURL".to_string(), self.return_url(&payment.token));
        params.insert(
            "CANCELURL".to_string(),
            self.routes.absolute(&self.routes.cancel_path),
        );
        params.insert("REQCONFIRMSHIPPING".to_string(), "0".to_string());
        params.insert("NOSHIPPING".to_string(), "1".to_string());
        params.insert("ADDROVERRIDE".to_string(), "0".to_string());
        params.insert("LOCALECODE".to_string(), "C2".to_string());
        params.insert("LANDINGPAGE".to_string(), "Billing".to_string());

        let url = self.paypal.set_express_checkout(&params)?;
        let response = self.paypal.call(&url).await?;
        self.audit.append(&response.raw, meta).await?;

        if !response.is_success() {
            return Err(PaymentError::GatewayRejected {
                step: "SetExpressCheckout".to_string(),
                ack: response.ack().to_string(),
            }
            .into());
        }

        let token = response
            .get("TOKEN")
            .ok_or_else(|| PaymentError::GatewayRejected {
                step: "SetExpressCheckout".to_string(),
                ack: "acknowledged without TOKEN".to_string(),
            })?;

        let session = ExpressSession {
            token: token.to_string(),
            payer_id: None,
            amount,
            currency: payment.total.currency.clone(),
        };
        info!(trade_no = %payment.trade_no, "express checkout initiated");

        let mut fields = GatewayParams::new();
        fields.insert("cmd".to_string(), "_express-checkout".to_string());
        fields.insert("token".to_string(), session.token);
        Ok(CheckoutForm {
            action: self.paypal.cmd_gateway().to_string(),
            fields,
        })
    }

    /// Second half, entered when the gateway redirects the buyer back
    /// with the token: detail-fetch, then capture. Every raw response is
    /// audited before the next step runs, so the negotiation trail
    /// survives a failure at any round. Returns the path to redirect the
    /// buyer to.
    pub async fn finalize(
        &self,
        payment: &PaymentRecord,
        query: &GatewayParams,
        meta: &SourceMeta,
    ) -> ExpressResult<String> {
        let Some(token) = query.get("token") else {
            warn!(trade_no = %payment.trade_no, "express return carries no token");
            return Ok(self.routes.cancel_path.clone());
        };

        let mut session = ExpressSession {
            token: token.clone(),
            payer_id: None,
            amount: payment.total.whole_units()?,
            currency: payment.total.currency.clone(),
        };

        // round two: resolve checkout details for the token
        let mut params = GatewayParams::new();
        params.insert("TOKEN".to_string(), session.token.clone());
        let url = self.paypal.get_express_checkout_details(&params)?;
        let details = self.paypal.call(&url).await?;
        let log_id = self.audit.append(&details.raw, meta).await?;
        self.store
            .attach_cash_flow_log(payment.id, log_id, None)
            .await?;

        if !details.is_success() {
            warn!(
                trade_no = %payment.trade_no,
                ack = details.ack(),
                "detail-fetch rejected, cancelling checkout"
            );
            return Ok(self.routes.cancel_path.clone());
        }

        // the gateway's own response names the payer and echoes the token
        if let Some(echoed) = details.get("TOKEN") {
            session.token = echoed.to_string();
        }
        session.payer_id = details.get("PAYERID").map(str::to_string);
        let Some(payer_id) = session.payer_id.clone() else {
            warn!(trade_no = %payment.trade_no, "detail-fetch response carries no PAYERID");
            return Ok(self.routes.cancel_path.clone());
        };

        // round three: capture
        let mut params = GatewayParams::new();
        params.insert("TOKEN".to_string(), session.token.clone());
        params.insert("PAYERID".to_string(), payer_id);
        params.insert(
            "PAYMENTREQUEST_0_PAYMENTACTION".to_string(),
            "Sale".to_string(),
        );
        params.insert("PAYMENTREQUEST_0_AMT".to_string(), session.amount.clone());
        let url = self.paypal.do_express_checkout_payment(&params)?;
        let capture = self.paypal.call(&url).await?;
        let log_id = self.audit.append(&capture.raw, meta).await?;
        self.store
            .attach_cash_flow_log(payment.id, log_id, None)
            .await?;

        if !capture.is_success() {
            warn!(
                trade_no = %payment.trade_no,
                ack = capture.ack(),
                "capture rejected, cancelling checkout"
            );
            return Ok(self.routes.cancel_path.clone());
        }

        self.store.mark_confirmed(payment.id).await?;
        info!(trade_no = %payment.trade_no, currency = %session.currency, "express checkout captured");
        Ok(self.routes.order_complete_path.clone())
    }
}
