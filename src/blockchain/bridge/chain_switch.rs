//! Bounded-retry network switching for the EVM wallet.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::blockchain::traits::EvmWallet;
use crate::core::config::BridgeConfig;
use crate::core::error_classifier::{format_error_for_user, is_user_rejection};
use crate::core::errors::{BridgeError, ProviderError, Result};
use crate::tools::async_support::TimeoutGuard;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainSwitchResult {
    pub success: bool,
    pub error_message: Option<String>,
    pub error_details: Option<String>,
    pub is_user_rejected: bool,
}

impl ChainSwitchResult {
    fn switched() -> Self {
        Self { success: true, ..Default::default() }
    }

    /// `Ok(())` on success; rejection and other failures map to
    /// `BridgeError::UserRejected` and `BridgeError::ChainSwitch`.
    pub fn into_result(self) -> Result<()> {
        if self.success {
            return Ok(());
        }
        let message = self.error_message.unwrap_or_else(|| "Chain switch failed".to_string());
        if self.is_user_rejected {
            Err(BridgeError::UserRejected(message))
        } else {
            Err(BridgeError::ChainSwitch(message))
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChainSwitchRetrier {
    max_attempts: u32,
    retry_delay: Duration,
    call_timeout: Duration,
}

impl ChainSwitchRetrier {
    pub fn new(max_attempts: u32, retry_delay: Duration, call_timeout: Duration) -> Self {
        Self { max_attempts: max_attempts.max(1), retry_delay, call_timeout }
    }

    pub fn from_config(config: &BridgeConfig) -> Self {
        Self::new(
            config.polling.max_switch_attempts,
            config.polling.switch_retry_delay(),
            config.timeouts.default_operation(),
        )
    }

    /// Makes `target_chain_id` the wallet's active network.
    ///
    /// Never fails on an intermediate attempt; the last error is classified
    /// only once all attempts are spent.
    pub async fn switch_chain_with_retry(
        &self,
        wallet: &dyn EvmWallet,
        target_chain_id: u64,
        chain_name: &str,
    ) -> ChainSwitchResult {
        match wallet.current_chain_id().await {
            Ok(current) if current == target_chain_id => {
                debug!("Already on {} ({})", chain_name, target_chain_id);
                return ChainSwitchResult::switched();
            }
            Ok(current) => debug!("On chain {}, switching to {}", current, chain_name),
            Err(e) => debug!("Could not read current chain id: {}", e),
        }

        let guard =
            TimeoutGuard::new(self.call_timeout, format!("Switch to {} timed out", chain_name));
        let mut last_error: Option<ProviderError> = None;

        for attempt in 1..=self.max_attempts {
            info!("Switching to {} (attempt {}/{})", chain_name, attempt, self.max_attempts);

            let outcome = match guard.run(wallet.switch_chain(target_chain_id)).await {
                Ok(outcome) => outcome,
                Err(timeout) => Err(ProviderError::new(timeout.to_string())),
            };

            match outcome {
                Ok(id) if id == target_chain_id => {
                    info!("Switched to {}", chain_name);
                    return ChainSwitchResult::switched();
                }
                Ok(id) => {
                    // Some wallets report before the switch lands; check again after a pause.
                    sleep(self.retry_delay).await;
                    match wallet.current_chain_id().await {
                        Ok(current) if current == target_chain_id => {
                            info!("Switched to {} (verified)", chain_name);
                            return ChainSwitchResult::switched();
                        }
                        Ok(current) => {
                            warn!(
                                "Switch to {} reported chain {}, wallet is on {}",
                                chain_name, id, current
                            );
                            last_error = Some(ProviderError::new(format!(
                                "Expected chain {}, wallet is on {}",
                                target_chain_id, current
                            )));
                        }
                        Err(e) => {
                            warn!("Switch verification failed: {}", e);
                            last_error = Some(e);
                        }
                    }
                }
                Err(e) => {
                    warn!("Switch to {} failed on attempt {}: {}", chain_name, attempt, e);
                    last_error = Some(e);
                    if attempt < self.max_attempts {
                        sleep(self.retry_delay).await;
                    }
                }
            }
        }

        let error = last_error.unwrap_or_else(|| ProviderError::new("Chain switch failed"));
        if is_user_rejection(&error) {
            ChainSwitchResult {
                success: false,
                error_message: Some(format!(
                    "Chain switch to {} was rejected. Please switch manually and try again.",
                    chain_name
                )),
                error_details: Some(error.message),
                is_user_rejected: true,
            }
        } else {
            ChainSwitchResult {
                success: false,
                error_message: Some(format!(
                    "Unable to switch to {} after {} attempts",
                    chain_name, self.max_attempts
                )),
                error_details: Some(format_error_for_user(&error)),
                is_user_rejected: false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_result() {
        assert!(ChainSwitchResult::switched().into_result().is_ok());

        let rejected = ChainSwitchResult {
            success: false,
            error_message: Some("rejected".into()),
            error_details: None,
            is_user_rejected: true,
        };
        assert!(rejected.into_result().unwrap_err().is_user_rejection());

        let failed = ChainSwitchResult {
            success: false,
            error_message: Some("Unable to switch to Base after 2 attempts".into()),
            error_details: None,
            is_user_rejected: false,
        };
        assert!(matches!(failed.into_result(), Err(BridgeError::ChainSwitch(_))));
    }

    #[test]
    fn test_attempts_never_zero() {
        let retrier = ChainSwitchRetrier::new(0, Duration::from_millis(1), Duration::from_secs(1));
        assert_eq!(retrier.max_attempts, 1);
    }
}
