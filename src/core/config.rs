use crate::core::errors::{BridgeError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Polling and chain-switch retry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Balance poll interval (milliseconds)
    #[serde(default = "PollingConfig::default_interval_ms")]
    pub interval_ms: u64,

    /// Maximum balance samples before giving up (180 x 5s = 15 minutes)
    #[serde(default = "PollingConfig::default_max_polls")]
    pub max_polls: u32,

    /// Delay between chain switch attempts (milliseconds)
    #[serde(default = "PollingConfig::default_switch_retry_delay_ms")]
    pub switch_retry_delay_ms: u64,

    /// Chain switch attempts before failing
    #[serde(default = "PollingConfig::default_max_switch_attempts")]
    pub max_switch_attempts: u32,
}

impl PollingConfig {
    fn default_interval_ms() -> u64 { 5_000 }
    fn default_max_polls() -> u32 { 180 }
    fn default_switch_retry_delay_ms() -> u64 { 1_000 }
    fn default_max_switch_attempts() -> u32 { 2 }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn switch_retry_delay(&self) -> Duration {
        Duration::from_millis(self.switch_retry_delay_ms)
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: Self::default_interval_ms(),
            max_polls: Self::default_max_polls(),
            switch_retry_delay_ms: Self::default_switch_retry_delay_ms(),
            max_switch_attempts: Self::default_max_switch_attempts(),
        }
    }
}

/// Wall-clock bounds for long-running waits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Native transaction finalization wait (milliseconds)
    #[serde(default = "TimeoutConfig::default_operation_ms")]
    pub default_operation_ms: u64,

    /// Balance polling wall clock (milliseconds)
    #[serde(default = "TimeoutConfig::default_polling_operation_ms")]
    pub polling_operation_ms: u64,
}

impl TimeoutConfig {
    fn default_operation_ms() -> u64 { 300_000 }
    fn default_polling_operation_ms() -> u64 { 900_000 }

    pub fn default_operation(&self) -> Duration {
        Duration::from_millis(self.default_operation_ms)
    }

    pub fn polling_operation(&self) -> Duration {
        Duration::from_millis(self.polling_operation_ms)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            default_operation_ms: Self::default_operation_ms(),
            polling_operation_ms: Self::default_polling_operation_ms(),
        }
    }
}

/// Chain identifiers and warp route token indices
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainsConfig {
    #[serde(default = "ChainsConfig::default_base_chain_id")]
    pub base_chain_id: u64,

    #[serde(default = "ChainsConfig::default_torus_evm_chain_id")]
    pub torus_evm_chain_id: u64,

    /// Token index of TORUS on the Base side of the warp route
    #[serde(default)]
    pub base_token_index: u32,

    /// Token index of TORUS on the Torus EVM side of the warp route
    #[serde(default)]
    pub torus_token_index: u32,

    /// Smallest-unit decimals of TORUS on every chain
    #[serde(default = "ChainsConfig::default_decimals")]
    pub decimals: u32,
}

impl ChainsConfig {
    fn default_base_chain_id() -> u64 { 8453 }
    fn default_torus_evm_chain_id() -> u64 { 21000 }
    fn default_decimals() -> u32 { 18 }
}

impl Default for ChainsConfig {
    fn default() -> Self {
        Self {
            base_chain_id: Self::default_base_chain_id(),
            torus_evm_chain_id: Self::default_torus_evm_chain_id(),
            base_token_index: 0,
            torus_token_index: 0,
            decimals: Self::default_decimals(),
        }
    }
}

/// Bridge configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub polling: PollingConfig,

    #[serde(default)]
    pub timeouts: TimeoutConfig,

    #[serde(default)]
    pub chains: ChainsConfig,
}

impl BridgeConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: BridgeConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded bridge config from {}", path.display());
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| BridgeError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.polling.interval_ms == 0 {
            return Err(BridgeError::Config("polling.interval_ms must be > 0".into()));
        }
        if self.polling.max_polls == 0 {
            return Err(BridgeError::Config("polling.max_polls must be > 0".into()));
        }
        if self.polling.max_switch_attempts == 0 {
            return Err(BridgeError::Config("polling.max_switch_attempts must be > 0".into()));
        }
        if self.timeouts.default_operation_ms == 0 || self.timeouts.polling_operation_ms == 0 {
            return Err(BridgeError::Config("timeouts must be > 0".into()));
        }
        if self.chains.base_chain_id == self.chains.torus_evm_chain_id {
            return Err(BridgeError::Config(
                "base_chain_id and torus_evm_chain_id must differ".into(),
            ));
        }
        if self.chains.decimals > 77 {
            return Err(BridgeError::Config("chains.decimals out of range".into()));
        }
        Ok(())
    }
}
