//! Canonical serialization of gateway parameters for signing.
//!
//! Each aggregator defines its own canonicalization rule; both are pure
//! functions of the parameter mapping and the secret material. The exact
//! escaping behavior of the checkout-fields rule is a wire contract:
//! `(`, `)`, `!` and `*` must stay unescaped or signature verification
//! against the live gateway silently fails.

use crate::payments::types::GatewayParams;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Keys excluded from the direct-pay canonical string.
const DIRECT_PAY_SIGNATURE_KEYS: [&str; 2] = ["sign", "sign_type"];

/// Key excluded from the checkout-fields canonical string.
const CHECK_MAC_KEY: &str = "CheckMacValue";

/// Escape set for the checkout-fields rule: everything but ASCII
/// alphanumerics, the unreserved `-_.~`, the gateway's `()!*` exceptions,
/// and space (rendered as `+` afterwards).
const CHECKOUT_FIELDS_ESCAPE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'(')
    .remove(b')')
    .remove(b'!')
    .remove(b'*')
    .remove(b' ');

/// Direct-pay canonical string: strip the signature keys, drop entries
/// with an empty value, sort ascending by key, join as `key=value` pairs
/// with `&`.
pub fn direct_pay_canonical(params: &GatewayParams) -> String {
    params
        .iter()
        .filter(|(key, _)| !DIRECT_PAY_SIGNATURE_KEYS.contains(&key.as_str()))
        .filter(|(_, value)| !value.is_empty())
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join("&")
}

/// Checkout-fields canonical string: strip `CheckMacValue`, sort ascending,
/// wrap in the shared-secret `HashKey=…&` prefix and `&HashIV=…` suffix,
/// percent-encode the whole string (space as `+`), lowercase the result.
pub fn checkout_fields_canonical(params: &GatewayParams, hash_key: &str, hash_iv: &str) -> String {
    let mut joined = format!("HashKey={}&", hash_key);
    for (key, value) in params.iter().filter(|(key, _)| key.as_str() != CHECK_MAC_KEY) {
        joined.push_str(&format!("{}={}&", key, value));
    }
    joined.push_str(&format!("HashIV={}", hash_iv));

    utf8_percent_encode(&joined, CHECKOUT_FIELDS_ESCAPE)
        .to_string()
        .replace(' ', "+")
        .to_lowercase()
}

/// Plain query-string encoding for outbound GET URLs.
pub fn form_urlencode(params: &GatewayParams) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in params {
        serializer.append_pair(key, value);
    }
    serializer.finish()
}
