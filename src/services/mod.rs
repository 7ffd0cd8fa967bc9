//! Business services over the gateway protocol layer.

pub mod checkout;
pub mod express_checkout;
pub mod notify_ingest;

pub use checkout::{CheckoutError, CheckoutService};
pub use express_checkout::{ExpressCheckout, ExpressCheckoutError};
pub use notify_ingest::{NotifyIngest, NotifyOutcome};
