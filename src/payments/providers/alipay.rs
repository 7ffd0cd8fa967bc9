//! Alipay direct-pay adapter.
//!
//! Outbound requests are signed GET URLs against the MAPI gateway, one
//! `service` name per API. Inbound notifies are verified twice: the local
//! MD5 signature must match, and the `notify_id` must be confirmed by the
//! gateway's own `notify_verify` endpoint. A local match alone is not
//! sufficient to treat a callback as authentic.

use crate::payments::encode::{direct_pay_canonical, form_urlencode};
use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::provider::GatewayProvider;
use crate::payments::sign::{digests_match, SignMethod};
use crate::payments::types::{GatewayParams, ProviderName};
use crate::payments::utils::{GatewayHttp, GatewayHttpClient};
use async_trait::async_trait;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

const DEFAULT_ENDPOINT: &str = "https://mapi.alipay.com/gateway.do";

#[derive(Debug, Clone)]
pub struct AlipayConfig {
    pub partner_id: String,
    pub seller_id: Option<String>,
    pub secret_key: String,
    pub endpoint: String,
    pub timeout_secs: u64,
}

impl Default for AlipayConfig {
    fn default() -> Self {
        Self {
            partner_id: String::new(),
            seller_id: None,
            secret_key: String::new(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout_secs: 30,
        }
    }
}

impl AlipayConfig {
    pub fn from_env() -> PaymentResult<Self> {
        let partner_id =
            std::env::var("ALIPAY_PARTNER_ID").map_err(|_| PaymentError::InvalidParameterValue {
                method: "alipay".to_string(),
                message: "ALIPAY_PARTNER_ID environment variable is required".to_string(),
            })?;
        let secret_key =
            std::env::var("ALIPAY_SECRET_KEY").map_err(|_| PaymentError::InvalidParameterValue {
                method: "alipay".to_string(),
                message: "ALIPAY_SECRET_KEY environment variable is required".to_string(),
            })?;

        Ok(Self {
            partner_id,
            seller_id: std::env::var("ALIPAY_SELLER_ID").ok(),
            secret_key,
            endpoint: std::env::var("ALIPAY_ENDPOINT")
                .unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string()),
            timeout_secs: std::env::var("ALIPAY_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(30),
        })
    }
}

pub struct AlipayProvider {
    config: AlipayConfig,
    http: Arc<dyn GatewayHttp>,
}

impl AlipayProvider {
    pub fn new(config: AlipayConfig, http: Arc<dyn GatewayHttp>) -> Self {
        Self { config, http }
    }

    pub fn from_env() -> PaymentResult<Self> {
        let config = AlipayConfig::from_env()?;
        let http = GatewayHttpClient::new(Duration::from_secs(config.timeout_secs))?;
        Ok(Self::new(config, Arc::new(http)))
    }

    /// Parameters every service call carries. `payment_type=1` is goods
    /// trade.
    fn core_params(&self) -> GatewayParams {
        let mut params = GatewayParams::new();
        params.insert("_input_charset".to_string(), "utf-8".to_string());
        params.insert("partner".to_string(), self.config.partner_id.clone());
        params.insert("payment_type".to_string(), "1".to_string());
        if let Some(seller_id) = &self.config.seller_id {
            params.insert("seller_id".to_string(), seller_id.clone());
        }
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

    /// Build a signed service URL. Caller parameters override the core
    /// set; `sign_type` defaults to MD5 when absent.
    pub fn build_service_url(&self, service: &str, params: &GatewayParams) -> PaymentResult<String> {
        let mut merged = self.core_params();
        merged.insert("service".to_string(), service.to_string());
        merged.extend(params.clone());

        let sign_method = match merged.get("sign_type") {
            Some(name) => SignMethod::from_str(name)?,
            None => {
                merged.insert("sign_type".to_string(), SignMethod::Md5.as_str().to_string());
                SignMethod::Md5
            }
        };
        let signature = sign_method.sign(&direct_pay_canonical(&merged), &self.config.secret_key);
        merged.insert("sign".to_string(), signature);

        Ok(format!("{}?{}", self.config.endpoint, form_urlencode(&merged)))
    }

    /// The `create_direct_pay_by_user` purchase service. Either
    /// `total_fee` or both `price` and `quantity` must be supplied.
    pub fn create_direct_pay_by_user_url(&self, params: &GatewayParams) -> PaymentResult<String> {
        const METHOD: &str = "create_direct_pay_by_user";
        self.check_params(METHOD, params, &["out_trade_no", "subject"])?;

        if params.get("total_fee").is_none()
            && (params.get("quantity").is_none() || params.get("price").is_none())
        {
            return Err(PaymentError::InvalidParameterValue {
                method: METHOD.to_string(),
                message: "total_fee or (price and quantity) must have one".to_string(),
            });
        }

        self.build_service_url(METHOD, params)
    }

    fn notify_verify_url(&self, notify_id: &str) -> String {
        let mut params = GatewayParams::new();
        params.insert("service".to_string(), "notify_verify".to_string());
        params.insert("partner".to_string(), self.config.partner_id.clone());
        params.insert("notify_id".to_string(), notify_id.to_string());
        format!("{}?{}", self.config.endpoint, form_urlencode(&params))
    }

    /// Remote half of notify verification: the gateway answers the
    /// literal string `true` for a notify id it actually issued.
    async fn remote_notify_check(&self, notify_id: &str) -> PaymentResult<bool> {
        let body = self.http.get_text(&self.notify_verify_url(notify_id)).await?;
        Ok(body.trim() == "true")
    }

    /// Two-step verification: local signature match, then the remote
    /// `notify_verify` round trip.
    pub async fn verify_notify(&self, params: &GatewayParams) -> PaymentResult<bool> {
        let sign_type = params
            .get("sign_type")
            .ok_or_else(|| PaymentError::missing("verify_notify", "sign_type"))?;
        let sign_method = SignMethod::from_str(sign_type)?;

        let claimed = match params.get("sign") {
            Some(sign) => sign,
            None => return Ok(false),
        };
        let computed = sign_method.sign(&direct_pay_canonical(params), &self.config.secret_key);
        if !digests_match(claimed, &computed) {
            return Ok(false);
        }

        match params.get("notify_id") {
            Some(notify_id) => self.remote_notify_check(notify_id).await,
            None => {
                warn!("notify payload passed local verification but carries no notify_id");
                Ok(false)
            }
        }
    }
}

#[async_trait]
impl GatewayProvider for AlipayProvider {
    fn name(&self) -> ProviderName {
        ProviderName::Alipay
    }

    async fn verify_notify(&self, params: &GatewayParams) -> PaymentResult<bool> {
        AlipayProvider::verify_notify(self, params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct StubHttp {
        responses: Mutex<Vec<String>>,
        calls: AtomicUsize,
    }

    impl StubHttp {
        fn returning(responses: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.iter().rev().map(|s| s.to_string()).collect()),
                calls: AtomicUsize::new(0),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl GatewayHttp for StubHttp {
        async fn get_text(&self, _url: &str) -> PaymentResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .responses
                .lock()
                .expect("stub lock")
                .pop()
                .unwrap_or_default())
        }
    }

    fn provider(http: Arc<dyn GatewayHttp>) -> AlipayProvider {
        AlipayProvider::new(
            AlipayConfig {
                partner_id: "2088000000000000".to_string(),
                seller_id: None,
                secret_key: "alipaysecret".to_string(),
                ..AlipayConfig::default()
            },
            http,
        )
    }

    fn params(entries: &[(&str, &str)]) -> GatewayParams {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn direct_pay_requires_trade_no_and_subject() {
        let provider = provider(StubHttp::returning(&[]));
        let err = provider
            .create_direct_pay_by_user_url(&params(&[("subject", "tea")]))
            .expect_err("out_trade_no is required");
        assert!(matches!(
            err,
            PaymentError::MissingParameter { field, .. } if field == "out_trade_no"
        ));
    }

    #[test]
    fn direct_pay_requires_fee_or_price_times_quantity() {
        let provider = provider(StubHttp::returning(&[]));
        let base = params(&[("out_trade_no", "1"), ("subject", "tea")]);
        assert!(matches!(
            provider.create_direct_pay_by_user_url(&base),
            Err(PaymentError::InvalidParameterValue { .. })
        ));

        let mut with_split = base.clone();
        with_split.insert("price".to_string(), "20".to_string());
        with_split.insert("quantity".to_string(), "2".to_string());
        assert!(provider.create_direct_pay_by_user_url(&with_split).is_ok());
    }

    #[test]
    fn service_url_carries_signature() {
        let provider = provider(StubHttp::returning(&[]));
        let url = provider
            .create_direct_pay_by_user_url(&params(&[
                ("out_trade_no", "20260805001"),
                ("subject", "tea"),
                ("total_fee", "100"),
            ]))
            .expect("build should succeed");
        assert!(url.starts_with("https://mapi.alipay.com/gateway.do?"));
        assert!(url.contains("service=create_direct_pay_by_user"));
        assert!(url.contains("sign_type=MD5"));
        assert!(url.contains("sign="));
    }

    #[test]
    fn unknown_sign_type_is_rejected_before_signing() {
        let provider = provider(StubHttp::returning(&[]));
        let err = provider
            .build_service_url(
                "create_direct_pay_by_user",
                &params(&[("sign_type", "RSA")]),
            )
            .expect_err("RSA is not supported");
        assert!(matches!(err, PaymentError::UnsupportedSigningMethod(_)));
    }

    fn signed_notify(extra: &[(&str, &str)]) -> GatewayParams {
        let mut notify = params(extra);
        notify.insert("sign_type".to_string(), "MD5".to_string());
        let signature = SignMethod::Md5.sign(&direct_pay_canonical(&notify), "alipaysecret");
        notify.insert("sign".to_string(), signature);
        notify
    }

    #[tokio::test]
    async fn verify_notify_requires_remote_affirmative() {
        let http = StubHttp::returning(&["true"]);
        let provider = provider(http.clone());
        let notify = signed_notify(&[
                ("notify_id", "abc123"),
                ("out_trade_no", "20260805001"),
                ("trade_status", "TRADE_SUCCESS"),
            ],
        );
        assert!(provider.verify_notify(&notify).await.expect("verification runs"));
        assert_eq!(http.call_count(), 1);
    }

    #[tokio::test]
    async fn verify_notify_remote_negative_fails() {
        let http = StubHttp::returning(&["false"]);
        let provider = provider(http.clone());
        let notify = signed_notify(&[("notify_id", "abc123")]);
        assert!(!provider.verify_notify(&notify).await.expect("verification runs"));
    }

    #[tokio::test]
    async fn tampered_signature_short_circuits_remote_check() {
        let http = StubHttp::returning(&["true"]);
        let provider = provider(http.clone());
        let mut notify = signed_notify(&[("notify_id", "abc123")]);
        notify.insert("sign".to_string(), "0badc0de".to_string());
        assert!(!provider.verify_notify(&notify).await.expect("verification runs"));
        assert_eq!(http.call_count(), 0, "no remote call on local mismatch");
    }

    #[tokio::test]
    async fn verify_notify_without_sign_type_is_malformed() {
        let provider = provider(StubHttp::returning(&[]));
        let err = provider
            .verify_notify(&params(&[("sign", "deadbeef")]))
            .await
            .expect_err("sign_type is required");
        assert!(matches!(
            err,
            PaymentError::MissingParameter { field, .. } if field == "sign_type"
        ));
    }
}
