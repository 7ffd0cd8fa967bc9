//! Digest computation and verification for the signed gateways.

use crate::payments::error::{PaymentError, PaymentResult};
use std::str::FromStr;

/// Supported signing algorithms, dispatched by the `sign_type` field of
/// direct-pay parameters. An explicit enum instead of name-based lookup:
/// unknown names fail with `UnsupportedSigningMethod` up front.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignMethod {
    Md5,
}

impl SignMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignMethod::Md5 => "MD5",
        }
    }

    /// Direct-pay digest: hash over the canonical string with the secret
    /// key appended raw, no separator. Not self-delimiting, but it is the
    /// gateway's wire contract and must not be "fixed".
    pub fn sign(&self, canonical: &str, secret_key: &str) -> String {
        match self {
            SignMethod::Md5 => {
                let mut input = Vec::with_capacity(canonical.len() + secret_key.len());
                input.extend_from_slice(canonical.as_bytes());
                input.extend_from_slice(secret_key.as_bytes());
                hex::encode(md5::compute(&input).0)
            }
        }
    }
}

impl std::fmt::Display for SignMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SignMethod {
    type Err = PaymentError;

    fn from_str(value: &str) -> PaymentResult<Self> {
        match value.trim().to_uppercase().as_str() {
            "MD5" => Ok(SignMethod::Md5),
            other => Err(PaymentError::UnsupportedSigningMethod(other.to_string())),
        }
    }
}

/// Checkout-fields `CheckMacValue`: uppercase hex digest over the
/// canonical string alone (the secrets are already embedded in it).
pub fn check_mac_value(canonical: &str) -> String {
    hex::encode(md5::compute(canonical.as_bytes()).0).to_uppercase()
}

/// Constant-time digest comparison.
pub fn digests_match(claimed: &str, computed: &str) -> bool {
    secure_eq(claimed.as_bytes(), computed.as_bytes())
}

pub fn secure_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter()
        .zip(b.iter())
        .fold(0_u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}
