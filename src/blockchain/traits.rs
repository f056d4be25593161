use async_trait::async_trait;
use ethers::types::U256;
use serde::{Deserialize, Serialize};

use crate::blockchain::extrinsic::ExtrinsicTracker;
use crate::core::errors::ProviderError;

/// EVM wallet network control.
#[async_trait]
pub trait EvmWallet: Send + Sync {
    /// Asks the wallet to switch its active network; returns the network id
    /// the wallet reports afterwards.
    async fn switch_chain(&self, chain_id: u64) -> Result<u64, ProviderError>;

    /// Reads the wallet's active network id.
    async fn current_chain_id(&self) -> Result<u64, ProviderError>;
}

/// Outcome of a balance query, as reported by the query layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FetchStatus {
    Success,
    Error,
    Pending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub value: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub status: FetchStatus,
    pub data: Option<Balance>,
}

impl BalanceResponse {
    pub fn success(value: U256) -> Self {
        Self { status: FetchStatus::Success, data: Some(Balance { value }) }
    }

    pub fn error() -> Self {
        Self { status: FetchStatus::Error, data: None }
    }

    /// Balance value when the query reported usable data.
    pub fn usable_value(&self) -> Option<U256> {
        match self.status {
            FetchStatus::Error => None,
            _ => self.data.map(|b| b.value),
        }
    }
}

/// Per-chain account balance read.
#[async_trait]
pub trait BalanceReader: Send + Sync {
    async fn refetch_balance(&self) -> Result<BalanceResponse, ProviderError>;
}

/// Arguments of a cross-chain relay (warp route) transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayTransferRequest {
    pub origin: String,
    pub destination: String,
    pub token_index: u32,
    /// Decimal amount as entered by the user
    pub amount: String,
    pub recipient: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayReceipt {
    pub hash: Option<String>,
}

/// Cross-chain message relay, treated as an opaque async call.
#[async_trait]
pub trait RelayTransfer: Send + Sync {
    async fn trigger_relay_transfer(
        &self,
        request: RelayTransferRequest,
    ) -> Result<RelayReceipt, ProviderError>;
}

/// Torus EVM precompile withdrawal back to the native chain.
#[async_trait]
pub trait EvmWithdrawal: Send + Sync {
    /// Returns the EVM transaction hash.
    async fn withdraw_to_native(
        &self,
        native_recipient: &str,
        amount: U256,
    ) -> Result<String, ProviderError>;
}

/// Balance transfer on the native (Substrate) chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeTransfer {
    /// Destination account; EVM addresses are mapped to their native mirror
    /// account by the client.
    pub destination: String,
    pub amount: U256,
}

/// Native chain client: sign, submit, and stream status events.
#[async_trait]
pub trait NativeChain: Send + Sync {
    async fn send_transaction(&self, tx: NativeTransfer) -> Result<ExtrinsicTracker, ProviderError>;
}
