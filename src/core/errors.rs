use crate::core::error_classifier::is_user_rejection;
use std::time::Duration;
use thiserror::Error;

/// Failure reported by one of the opaque chain capabilities (wallet, RPC,
/// relay, native client).
///
/// Mirrors the shape wallets hand back to callers: a message plus an optional
/// error type name (`UserRejectedRequestError`, `TransactionExecutionError`, ...).
/// The error classifier only ever looks at these two fields.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ProviderError {
    pub name: Option<String>,
    pub message: String,
}

impl ProviderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { name: None, message: message.into() }
    }

    pub fn named(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self { name: Some(name.into()), message: message.into() }
    }
}

/// Produced by the timeout guard when the deadline fires before the guarded
/// operation settles.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{label} (after {duration:?})")]
pub struct TimeoutError {
    pub label: String,
    pub duration: Duration,
}

/// Terminal (or near-terminal) extrinsic failure. Each reason keeps its own
/// message so the UI can explain why the transaction did not land.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TxFailure {
    #[error("Transaction rejected by user")]
    UserRejected,
    #[error("Failed to submit transaction: {0}")]
    Submission(String),
    #[error("{0}")]
    Internal(String),
    #[error("Transaction invalid: {0}")]
    Invalid(String),
    #[error("Transaction finalization timed out")]
    FinalityTimeout,
    #[error("Transaction was dropped from the pool")]
    Dropped,
    #[error("Transaction was replaced by another transaction")]
    Usurped,
    #[error("Transaction was retracted")]
    Retracted,
    /// Included in a block but the runtime rejected the call.
    #[error("{0}")]
    Dispatch(String),
}

/// Bridge orchestration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    /// The wallet signer declined to sign, switch or broadcast.
    #[error("{0}")]
    UserRejected(String),

    /// Network switch could not be completed after exhausting retries.
    #[error("Chain switch failed: {0}")]
    ChainSwitch(String),

    /// Capability failure (RPC, relay, wallet).
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Timeout: {0}")]
    Timeout(#[from] TimeoutError),

    /// Funds may have moved but arrival could not be observed.
    #[error("Confirmation failed: {0}")]
    ConfirmationFailed(String),

    /// Native transaction reached a terminal failure.
    #[error(transparent)]
    Transaction(#[from] TxFailure),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Configuration error: {0}")]
    Config(String),

    /// The session was reset while the operation was running.
    #[error("Operation cancelled: {0}")]
    Cancelled(String),
}

/// Bridge result type
pub type Result<T> = std::result::Result<T, BridgeError>;

impl BridgeError {
    pub fn is_user_rejection(&self) -> bool {
        match self {
            BridgeError::UserRejected(_) | BridgeError::Transaction(TxFailure::UserRejected) => {
                true
            }
            BridgeError::Provider(e) => is_user_rejection(e),
            _ => false,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            BridgeError::Timeout(_) | BridgeError::Transaction(TxFailure::FinalityTimeout)
        )
    }

    /// Whether a manual retry of the failed step makes sense.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BridgeError::Provider(_)
                | BridgeError::Timeout(_)
                | BridgeError::ChainSwitch(_)
                | BridgeError::ConfirmationFailed(_)
                | BridgeError::UserRejected(_)
        )
    }
}

impl From<toml::de::Error> for BridgeError {
    fn from(err: toml::de::Error) -> Self {
        BridgeError::Config(err.to_string())
    }
}

impl From<std::io::Error> for BridgeError {
    fn from(err: std::io::Error) -> Self {
        BridgeError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_provider_error() {
        let err = ProviderError::named("UserRejectedRequestError", "User rejected the request.");
        assert_eq!(err.to_string(), "User rejected the request.");
        assert_eq!(err.name.as_deref(), Some("UserRejectedRequestError"));
    }

    #[test]
    fn test_display_timeout_error() {
        let err = TimeoutError {
            label: "Base transfer confirmation timeout".to_string(),
            duration: Duration::from_millis(1500),
        };
        assert_eq!(err.to_string(), "Base transfer confirmation timeout (after 1.5s)");
    }

    #[test]
    fn test_tx_failures_have_distinct_messages() {
        let all = [
            TxFailure::FinalityTimeout,
            TxFailure::Dropped,
            TxFailure::Usurped,
            TxFailure::Retracted,
        ];
        let mut messages: Vec<String> = all.iter().map(|f| f.to_string()).collect();
        messages.sort();
        messages.dedup();
        assert_eq!(messages.len(), all.len());
    }

    #[test]
    fn test_classification_helpers() {
        assert!(BridgeError::UserRejected("x".into()).is_user_rejection());
        assert!(BridgeError::Transaction(TxFailure::UserRejected).is_user_rejection());
        assert!(!BridgeError::ChainSwitch("x".into()).is_user_rejection());
        let rejected = BridgeError::Provider(ProviderError::new("User rejected the request."));
        assert!(rejected.is_user_rejection());
        let funds = BridgeError::Provider(ProviderError::new("insufficient funds"));
        assert!(!funds.is_user_rejection());

        let timeout = BridgeError::from(TimeoutError {
            label: "poll".into(),
            duration: Duration::from_secs(1),
        });
        assert!(timeout.is_timeout());
        assert!(timeout.is_retryable());
        assert!(!BridgeError::InvalidInput("amount".into()).is_retryable());
    }

    #[test]
    fn test_from_toml_error() {
        let err = toml::from_str::<toml::Value>("= broken").unwrap_err();
        let bridge_err: BridgeError = err.into();
        match bridge_err {
            BridgeError::Config(msg) => assert!(!msg.is_empty()),
            _ => panic!("Expected Config variant"),
        }
    }
}
