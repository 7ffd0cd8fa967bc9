pub mod alipay;
pub mod allpay;
pub mod paypal;

pub use alipay::{AlipayConfig, AlipayProvider};
pub use allpay::{AllpayConfig, AllpayProvider};
pub use paypal::{NvpResponse, PaypalConfig, PaypalProvider};
