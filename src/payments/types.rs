use crate::payments::error::PaymentError;
use bigdecimal::{BigDecimal, RoundingMode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// One outbound request or inbound callback payload. Key order is
/// irrelevant to callers; the canonical encoders own the ordering.
pub type GatewayParams = BTreeMap<String, String>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProviderName {
    Alipay,
    Allpay,
    Paypal,
}

impl ProviderName {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderName::Alipay => "alipay",
            ProviderName::Allpay => "allpay",
            ProviderName::Paypal => "paypal",
        }
    }
}

impl std::fmt::Display for ProviderName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ProviderName {
    type Err = PaymentError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "alipay" => Ok(ProviderName::Alipay),
            "allpay" => Ok(ProviderName::Allpay),
            "paypal" => Ok(ProviderName::Paypal),
            _ => Err(PaymentError::InvalidParameterValue {
                method: "provider".to_string(),
                message: format!("unsupported provider: {}", value),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Money {
    pub amount: String,
    pub currency: String,
}

impl Money {
    pub fn validate_positive(&self, field: &str) -> Result<(), PaymentError> {
        let parsed =
            BigDecimal::from_str(&self.amount).map_err(|_| PaymentError::InvalidParameterValue {
                method: field.to_string(),
                message: format!("invalid decimal amount: {}", self.amount),
            })?;
        if parsed <= BigDecimal::from(0) {
            return Err(PaymentError::InvalidParameterValue {
                method: field.to_string(),
                message: "amount must be greater than zero".to_string(),
            });
        }
        if self.currency.trim().is_empty() {
            return Err(PaymentError::InvalidParameterValue {
                method: field.to_string(),
                message: "currency is required".to_string(),
            });
        }
        Ok(())
    }

    /// Whole-unit rendering for gateways that only accept integer amounts
    /// (AllPay `TotalAmount`, the express-checkout `AMT` field). Fractions
    /// are truncated toward zero.
    pub fn whole_units(&self) -> Result<String, PaymentError> {
        let parsed =
            BigDecimal::from_str(&self.amount).map_err(|_| PaymentError::InvalidParameterValue {
                method: "amount".to_string(),
                message: format!("invalid decimal amount: {}", self.amount),
            })?;
        Ok(parsed.with_scale_round(0, RoundingMode::Down).to_string())
    }
}

/// Payment lifecycle owned by the external payment record.
///
/// The core only drives forward transitions: `Waiting -> Input` when a
/// checkout session is handed to a gateway, `-> Confirmed` when a verified
/// callback reports payment. Failure paths leave the status untouched.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Waiting,
    Input,
    Confirmed,
    Rejected,
}

/// One purchased line item. Gateways on this integration take whole-unit
/// prices, so the price is already an integer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PurchasedItem {
    pub name: String,
    pub quantity: u32,
    pub price: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingContact {
    pub email: String,
    pub phone: String,
    pub full_name: String,
}

/// Requesting user-agent class; mobile clients get the reduced
/// payment-method set on AllPay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    Desktop,
    Mobile,
}

impl DeviceKind {
    pub fn from_user_agent(user_agent: &str) -> Self {
        let ua = user_agent.to_ascii_lowercase();
        if ua.contains("mobile") || ua.contains("android") || ua.contains("iphone") {
            DeviceKind::Mobile
        } else {
            DeviceKind::Desktop
        }
    }
}

/// Source metadata captured at the inbound boundary, recorded with every
/// raw callback payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceMeta {
    pub device: String,
    pub ip: String,
}

/// A form to be auto-submitted by the end-user agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutForm {
    pub action: String,
    pub fields: GatewayParams,
}

/// The transport artifact a checkout build produces: either a signed GET
/// URL the browser is redirected to, or a form field set POSTed to the
/// gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CheckoutArtifact {
    RedirectUrl { url: String },
    Form(CheckoutForm),
}

/// Join one line-item column with the `#` separator the aggregators use
/// for multi-item fields.
pub fn hash_join<I, T>(values: I) -> String
where
    I: IntoIterator<Item = T>,
    T: ToString,
{
    values
        .into_iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("#")
}
