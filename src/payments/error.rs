use thiserror::Error;

pub type PaymentResult<T> = Result<T, PaymentError>;

/// Failures in building outbound gateway requests or talking to a gateway.
///
/// Verification mismatches are deliberately not represented here: the
/// verify operations return `bool` so the caller can answer the gateway
/// with its negative acknowledgement convention instead of faulting.
#[derive(Debug, Clone, Error)]
pub enum PaymentError {
    #[error("missing required parameter for {method}: {field}")]
    MissingParameter { method: String, field: String },

    #[error("invalid parameter value for {method}: {message}")]
    InvalidParameterValue { method: String, message: String },

    #[error("unsupported signing method: {0}")]
    UnsupportedSigningMethod(String),

    #[error("gateway request failed: {message}")]
    NetworkError { message: String },

    #[error("gateway rejected {step}: ack={ack}")]
    GatewayRejected { step: String, ack: String },
}

impl PaymentError {
    pub fn missing(method: &str, field: &str) -> Self {
        PaymentError::MissingParameter {
            method: method.to_string(),
            field: field.to_string(),
        }
    }

    /// Construction-time errors abort before any network call; the rest
    /// surface a gateway-side failure.
    pub fn is_construction_error(&self) -> bool {
        matches!(
            self,
            PaymentError::MissingParameter { .. }
                | PaymentError::InvalidParameterValue { .. }
                | PaymentError::UnsupportedSigningMethod(_)
        )
    }

    pub fn http_status_code(&self) -> u16 {
        match self {
            PaymentError::MissingParameter { .. } => 400,
            PaymentError::InvalidParameterValue { .. } => 400,
            PaymentError::UnsupportedSigningMethod(_) => 400,
            PaymentError::NetworkError { .. } => 503,
            PaymentError::GatewayRejected { .. } => 502,
        }
    }
}
