//! AllPay (aio checkout) adapter.
//!
//! This gateway takes an HTML form POST rather than a signed URL: each
//! payment method has its own required field set, and every submission
//! carries a `CheckMacValue` computed over the HashKey/HashIV-wrapped
//! canonical string. Inbound notifies are verified by recomputing that
//! value.

use crate::payments::encode::checkout_fields_canonical;
use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::provider::GatewayProvider;
use crate::payments::sign::{check_mac_value, digests_match};
use crate::payments::types::{hash_join, GatewayParams, ProviderName};
use async_trait::async_trait;

const DEFAULT_ENDPOINT: &str = "https://payment-stage.allpay.com.tw/Cashier/AioCheckOut";

/// Published stage-environment credentials, used when no real merchant
/// credentials are configured.
const STAGE_MERCHANT_ID: &str = "2000132";
const STAGE_HASH_KEY: &str = "5294y06JbISpM5x9";
const STAGE_HASH_IV: &str = "v77hoKGq4kWxNNIS";

/// Payment methods unavailable on mobile; the mobile page pay variant
/// ignores them wholesale.
const MOBILE_IGNORED_METHODS: [&str; 7] = [
    "Credit", "WebATM", "ATM", "BARCODE", "TopUpUsed", "CVS", "Tenpay",
];

#[derive(Debug, Clone)]
pub struct AllpayConfig {
    pub merchant_id: String,
    pub hash_key: String,
    pub hash_iv: String,
    pub endpoint: String,
}

impl Default for AllpayConfig {
    fn default() -> Self {
        Self {
            merchant_id: STAGE_MERCHANT_ID.to_string(),
            hash_key: STAGE_HASH_KEY.to_string(),
            hash_iv: STAGE_HASH_IV.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
        }
    }
}

impl AllpayConfig {
    pub fn from_env() -> Self {
        Self {
            merchant_id: std::env::var("ALLPAY_MERCHANT_ID")
                .unwrap_or_else(|_| STAGE_MERCHANT_ID.to_string()),
            hash_key: std::env::var("ALLPAY_HASH_KEY")
                .unwrap_or_else(|_| STAGE_HASH_KEY.to_string()),
            hash_iv: std::env::var("ALLPAY_HASH_IV")
                .unwrap_or_else(|_| STAGE_HASH_IV.to_string()),
            endpoint: std::env::var("ALLPAY_ENDPOINT")
                .unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string()),
        }
    }
}

pub struct AllpayProvider {
    config: AllpayConfig,
}

impl AllpayProvider {
    pub fn new(config: AllpayConfig) -> Self {
        Self { config }
    }

    pub fn from_env() -> Self {
        Self::new(AllpayConfig::from_env())
    }

    /// Where the built form is POSTed to.
    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    fn core_params(&self) -> GatewayParams {
        let mut params = GatewayParams::new();
        params.insert("MerchantID".to_string(), self.config.merchant_id.clone());
        params.insert("PaymentType".to_string(), "aio".to_string());
        // notify and browser-return URLs; the checkout build overrides both
        params.insert("ReturnURL".to_string(), String::new());
        params.insert("OrderResultURL".to_string(), String::new());
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

    fn compute_check_mac_value(&self, params: &GatewayParams) -> String {
        check_mac_value(&checkout_fields_canonical(
            params,
            &self.config.hash_key,
            &self.config.hash_iv,
        ))
    }

    /// Merge the core set, attach `ChoosePayment` and `CheckMacValue`,
    /// and hand back the complete field set for the form.
    pub fn build_payment_fields(
        &self,
        method: &str,
        params: &GatewayParams,
    ) -> PaymentResult<GatewayParams> {
        self.check_params(
            "build_payment_fields",
            params,
            &[
                "MerchantTradeNo",
                "MerchantTradeDate",
                "TotalAmount",
                "TradeDesc",
                "ItemName",
            ],
        )?;

        let mut fields = self.core_params();
        fields.extend(params.clone());
        fields.insert("ChoosePayment".to_string(), method.to_string());
        let mac = self.compute_check_mac_value(&fields);
        fields.insert("CheckMacValue".to_string(), mac);
        Ok(fields)
    }

    /// Cross-border Alipay channel. Multi-item orders join each column
    /// with `#`: `AlipayItemName=A#B`, `AlipayItemCounts=1#3`, …
    pub fn create_alipay(&self, params: &GatewayParams) -> PaymentResult<GatewayParams> {
        self.check_params(
            "create_alipay",
            params,
            &[
                "AlipayItemName",
                "AlipayItemCounts",
                "AlipayItemPrice",
                "Email",
                "PhoneNo",
                "UserName",
            ],
        )?;
        self.build_payment_fields("Alipay", params)
    }

    /// Convenience-store code channel. `StoreExpireDate` is optional.
    pub fn create_cvs(&self, params: &GatewayParams) -> PaymentResult<GatewayParams> {
        self.check_params("create_cvs", params, &["ClientRedirectURL"])?;
        self.build_payment_fields("CVS", params)
    }

    /// Mobile variant: `DeviceSource=M` with the reduced method set; the
    /// gateway requires `ChoosePayment=ALL` in this mode.
    pub fn create_mobile_page_pay(&self, params: &GatewayParams) -> PaymentResult<GatewayParams> {
        let mut params = params.clone();
        params.insert("DeviceSource".to_string(), "M".to_string());
        params.insert(
            "IgnorePayment".to_string(),
            hash_join(MOBILE_IGNORED_METHODS),
        );
        self.build_payment_fields("ALL", &params)
    }

    /// Recompute `CheckMacValue` and compare against the claimed one.
    pub fn verify_mac_value(&self, params: &GatewayParams) -> PaymentResult<bool> {
        let claimed = params
            .get("CheckMacValue")
            .ok_or_else(|| PaymentError::missing("verify_mac_value", "CheckMacValue"))?;
        Ok(digests_match(claimed, &self.compute_check_mac_value(params)))
    }
}

#[async_trait]
impl GatewayProvider for AllpayProvider {
    fn name(&self) -> ProviderName {
        ProviderName::Allpay
    }

    async fn verify_notify(&self, params: &GatewayParams) -> PaymentResult<bool> {
        self.verify_mac_value(params)
    }
}
