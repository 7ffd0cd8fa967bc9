use crate::payments::error::PaymentResult;
use crate::payments::types::{GatewayParams, ProviderName};
use async_trait::async_trait;

/// Common verification surface over the gateway adapters.
///
/// Verification is a boolean outcome: a mismatch answers `false` so the
/// ingest layer can respond with the provider's negative acknowledgement
/// convention. Errors are reserved for malformed payloads (a missing
/// `sign_type` or `CheckMacValue`) and transport failures.
#[async_trait]
pub trait GatewayProvider: Send + Sync {
    fn name(&self) -> ProviderName;

    /// Verify an inbound callback payload.
    async fn verify_notify(&self, params: &GatewayParams) -> PaymentResult<bool>;
}
