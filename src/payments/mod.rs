//! Gateway protocol layer: canonical encoding, signing, and the three
//! provider adapters.

pub mod encode;
pub mod error;
pub mod provider;
pub mod providers;
pub mod sign;
pub mod types;
pub mod utils;
