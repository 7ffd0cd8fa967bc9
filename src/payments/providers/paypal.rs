//! PayPal express-checkout adapter (NVP API).
//!
//! Three API calls make up a purchase: `SetExpressCheckout` issues the
//! handshake token, `GetExpressCheckoutDetails` resolves the payer once
//! the buyer returns, and `DoExpressCheckoutPayment` captures. There is
//! no callback signature on this gateway; authenticity derives from
//! possession of the token, validated against the gateway's own
//! detail-fetch response. That is a protocol property, not an omission.

use crate::payments::encode::form_urlencode;
use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::provider::GatewayProvider;
use crate::payments::types::{GatewayParams, ProviderName};
use crate::payments::utils::{parse_form_body, GatewayHttp, GatewayHttpClient};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_ENDPOINT: &str = "https://api-3t.sandbox.paypal.com/nvp";
const DEFAULT_CMD_GATEWAY: &str = "https://www.paypal.com/cgi-bin/webscr";
const DEFAULT_VERSION: &str = "124";

#[derive(Debug, Clone)]
pub struct PaypalConfig {
    pub user: String,
    pub pwd: String,
    pub signature: String,
    pub version: String,
    pub endpoint: String,
    /// browser-facing gateway the buyer is redirected to with the token
    pub cmd_gateway: String,
    pub timeout_secs: u64,
}

impl Default for PaypalConfig {
    fn default() -> Self {
        Self {
            user: String::new(),
            pwd: String::new(),
            signature: String::new(),
            version: DEFAULT_VERSION.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            cmd_gateway: DEFAULT_CMD_GATEWAY.to_string(),
            timeout_secs: 30,
        }
    }
}

impl PaypalConfig {
    pub fn from_env() -> PaymentResult<Self> {
        let require = |name: &str| {
            std::env::var(name).map_err(|_| PaymentError::InvalidParameterValue {
                method: "paypal".to_string(),
                message: format!("{} environment variable is required", name),
            })
        };

        Ok(Self {
            user: require("PAYPAL_API_USER")?,
            pwd: require("PAYPAL_API_PWD")?,
            signature: require("PAYPAL_API_SIGNATURE")?,
            version: std::env::var("PAYPAL_API_VERSION")
                .unwrap_or_else(|_| DEFAULT_VERSION.to_string()),
            endpoint: std::env::var("PAYPAL_NVP_ENDPOINT")
                .unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string()),
            cmd_gateway: std::env::var("PAYPAL_CMD_GATEWAY")
                .unwrap_or_else(|_| DEFAULT_CMD_GATEWAY.to_string()),
            timeout_secs: std::env::var("PAYPAL_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(30),
        })
    }
}

/// One parsed NVP response, keeping the raw body for the audit trail.
#[derive(Debug, Clone)]
pub struct NvpResponse {
    pub raw: String,
    fields: HashMap<String, String>,
}

impl NvpResponse {
    pub fn parse(raw: String) -> Self {
        let fields = parse_form_body(&raw);
        Self { raw, fields }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn ack(&self) -> &str {
        self.get("ACK").unwrap_or("")
    }

    /// `Success` and `SuccessWithWarning` count as success; anything
    /// else (including a missing ACK) is a failure.
    pub fn is_success(&self) -> bool {
        matches!(self.ack(), "Success" | "SuccessWithWarning")
    }
}

pub struct PaypalProvider {
    config: PaypalConfig,
    http: Arc<dyn GatewayHttp>,
}

impl PaypalProvider {
    pub fn new(config: PaypalConfig, http: Arc<dyn GatewayHttp>) -> Self {
        Self { config, http }
    }

    pub fn from_env() -> PaymentResult<Self> {
        let config = PaypalConfig::from_env()?;
        let http = GatewayHttpClient::new(Duration::from_secs(config.timeout_secs))?;
        Ok(Self::new(config, Arc::new(http)))
    }

    pub fn cmd_gateway(&self) -> &str {
        &self.config.cmd_gateway
    }

    fn core_params(&self) -> GatewayParams {
        let mut params = GatewayParams::new();
        params.insert("USER".to_string(), self.config.user.clone());
        params.insert("PWD".to_string(), self.config.pwd.clone());
        params.insert("SIGNATURE".to_string(), self.config.signature.clone());
        params.insert("VERSION".to_string(), self.config.version.clone());
        params
    }

    fn check_params(
        &self,
        method: &str,
        params: &GatewayParams,
        requirements: &[&str],
    ) -> PaymentResult<()> {
        for key in requirements {
            if !params.contains_key(*key) {
                return Err(PaymentError::missing(method, key));
            }
        }
        Ok(())
    }

    fn build_express_api_url(&self, method: &str, params: &GatewayParams) -> String {
        let mut merged = self.core_params();
        merged.insert("METHOD".to_string(), method.to_string());
        merged.extend(params.clone());
        format!("{}?{}", self.config.endpoint, form_urlencode(&merged))
    }

    /// First round trip: register amount, action and the return/cancel
    /// URLs, receiving the handshake token.
    pub fn set_express_checkout(&self, params: &GatewayParams) -> PaymentResult<String> {
        self.check_params(
            "SetExpressCheckout",
            params,
            &[
                "PAYMENTREQUEST_0_AMT",
                "PAYMENTREQUEST_0_PAYMENTACTION",
                "RETURNURL",
                "CANCELURL",
                "REQCONFIRMSHIPPING",
                "NOSHIPPING",
                "ADDROVERRIDE",
            ],
        )?;
        Ok(self.build_express_api_url("SetExpressCheckout", params))
    }

    /// Second round trip, keyed by the token the buyer brought back.
    pub fn get_express_checkout_details(&self, params: &GatewayParams) -> PaymentResult<String> {
        self.check_params("GetExpressCheckoutDetails", params, &["TOKEN"])?;
        Ok(self.build_express_api_url("GetExpressCheckoutDetails", params))
    }

    /// Final round trip: capture.
    pub fn do_express_checkout_payment(&self, params: &GatewayParams) -> PaymentResult<String> {
        self.check_params(
            "DoExpressCheckoutPayment",
            params,
            &[
                "TOKEN",
                "PAYERID",
                "PAYMENTREQUEST_0_PAYMENTACTION",
                "PAYMENTREQUEST_0_AMT",
            ],
        )?;
        Ok(self.build_express_api_url("DoExpressCheckoutPayment", params))
    }

    /// One NVP round trip: GET the signed URL, parse the
    /// form-urlencoded body.
    pub async fn call(&self, url: &str) -> PaymentResult<NvpResponse> {
        let body = self.http.get_text(url).await?;
        Ok(NvpResponse::parse(body))
    }
}

#[async_trait]
impl GatewayProvider for PaypalProvider {
    fn name(&self) -> ProviderName {
        ProviderName::Paypal
    }

    /// No signature scheme on this gateway; the token carried by the
    /// redirect is validated against the detail-fetch response instead.
    async fn verify_notify(&self, _params: &GatewayParams) -> PaymentResult<bool> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoHttp;

    #[async_trait]
    impl GatewayHttp for NoHttp {
        async fn get_text(&self, _url: &str) -> PaymentResult<String> {
            panic!("no network call expected");
        }
    }

    fn provider() -> PaypalProvider {
        PaypalProvider::new(
            PaypalConfig {
                user: "merchant_api1.example.com".to_string(),
                pwd: "apipwd".to_string(),
                signature: "apisig".to_string(),
                ..PaypalConfig::default()
            },
            Arc::new(NoHttp),
        )
    }

    fn params(entries: &[(&str, &str)]) -> GatewayParams {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn set_express_checkout_requires_full_field_set() {
        let err = provider()
            .set_express_checkout(&params(&[
                ("PAYMENTREQUEST_0_AMT", "100"),
                ("PAYMENTREQUEST_0_PAYMENTACTION", "Sale"),
                ("RETURNURL", "https://shop.example.com/back"),
                ("CANCELURL", "https://shop.example.com/cancel"),
            ]))
            .expect_err("shipping flags are required");
        assert!(matches!(
            err,
            PaymentError::MissingParameter { method, field }
                if method == "SetExpressCheckout" && field == "REQCONFIRMSHIPPING"
        ));
    }

    #[test]
    fn api_url_carries_credentials_and_method() {
        let url = provider()
            .get_express_checkout_details(&params(&[("TOKEN", "EC-4P809628KK1823013")]))
            .expect("TOKEN supplied");
        assert!(url.starts_with("https://api-3t.sandbox.paypal.com/nvp?"));
        assert!(url.contains("METHOD=GetExpressCheckoutDetails"));
        assert!(url.contains("USER=merchant_api1.example.com"));
        assert!(url.contains("VERSION=124"));
        assert!(url.contains("TOKEN=EC-4P809628KK1823013"));
    }

    #[test]
    fn do_payment_requires_payer_id() {
        let err = provider()
            .do_express_checkout_payment(&params(&[
                ("TOKEN", "EC-1"),
                ("PAYMENTREQUEST_0_PAYMENTACTION", "Sale"),
                ("PAYMENTREQUEST_0_AMT", "100"),
            ]))
            .expect_err("PAYERID is required");
        assert!(matches!(
            err,
            PaymentError::MissingParameter { field, .. } if field == "PAYERID"
        ));
    }

    #[test]
    fn nvp_ack_mapping() {
        assert!(NvpResponse::parse("ACK=Success&TOKEN=EC-1".to_string()).is_success());
        assert!(NvpResponse::parse("ACK=SuccessWithWarning".to_string()).is_success());
        assert!(!NvpResponse::parse("ACK=Failure&L_ERRORCODE0=10002".to_string()).is_success());
        assert!(!NvpResponse::parse("TOKEN=EC-1".to_string()).is_success());
    }

    #[test]
    fn nvp_response_keeps_raw_body() {
        let raw = "ACK=Success&TOKEN=EC%2d1".to_string();
        let response = NvpResponse::parse(raw.clone());
        assert_eq!(response.raw, raw);
        assert_eq!(response.get("TOKEN"), Some("EC-1"));
    }
}
