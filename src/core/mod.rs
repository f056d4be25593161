pub mod config;
pub mod error_classifier;
pub mod errors;
pub mod validation;

pub use config::BridgeConfig;
pub use errors::{BridgeError, ProviderError, Result};
