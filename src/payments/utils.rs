use crate::payments::error::{PaymentError, PaymentResult};
use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;

/// Outbound HTTP capability consumed by the adapters. The gateways on
/// this integration only need plain GETs returning a text body; retries
/// are deliberately not part of the contract, every call is one-shot.
#[async_trait]
pub trait GatewayHttp: Send + Sync {
    async fn get_text(&self, url: &str) -> PaymentResult<String>;
}

#[derive(Clone)]
pub struct GatewayHttpClient {
    client: Client,
}

impl GatewayHttpClient {
    pub fn new(timeout: Duration) -> PaymentResult<Self> {
        let client =
            Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| PaymentError::NetworkError {
                    message: format!("failed to initialize HTTP client: {}", e),
                })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl GatewayHttp for GatewayHttpClient {
    async fn get_text(&self, url: &str) -> PaymentResult<String> {
        let response = self
            .client
            .get(url)
            .header("connection", "close")
            .send()
            .await
            .map_err(|e| PaymentError::NetworkError {
                message: format!("gateway request failed: {}", e),
            })?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(PaymentError::NetworkError {
                message: format!("HTTP {}: {}", status, text),
            });
        }
        Ok(text)
    }
}

/// Parse an `application/x-www-form-urlencoded` body into a flat map.
/// Repeated keys keep the first occurrence, matching how the NVP API is
/// consumed (each field appears once per response).
pub fn parse_form_body(body: &str) -> HashMap<String, String> {
    let mut fields = HashMap::new();
    for (key, value) in url::form_urlencoded::parse(body.as_bytes()) {
        fields.entry(key.into_owned()).or_insert(value.into_owned());
    }
    fields
}
