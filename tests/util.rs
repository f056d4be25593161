// tests/util.rs
// Shared helpers for the integration tests
#![allow(dead_code)]

use ethers::types::U256;
use std::sync::Arc;
use torus_bridge::blockchain::bridge::mock::{
    MockChain, MockLedger, MockNativeChain, MockRelay, MockWallet, MockWithdrawal, NativeBehavior,
    RelayBehavior,
};
use torus_bridge::blockchain::bridge::{BridgeProviders, BridgeStepExecutor};
use torus_bridge::blockchain::traits::BalanceReader;
use torus_bridge::core::config::BridgeConfig;

pub const EVM_ADDRESS: &str = "0x742d35cc6634c0532925a3b844bc454e4438f44e";
pub const NATIVE_ADDRESS: &str = "5GrwvaEF5zXb26Fz9rcQpDWS57CtERHpNehXCPcNoHGKutQY";

pub const BASE_CHAIN_ID: u64 = 8453;
pub const TORUS_EVM_CHAIN_ID: u64 = 21000;

/// `n` whole TORUS in smallest units.
pub fn torus(n: u64) -> U256 {
    U256::from(n) * U256::exp10(18)
}

/// Every capability, individually replaceable before `providers()` is called.
pub struct Mocks {
    pub wallet: Arc<MockWallet>,
    pub relay: Arc<MockRelay>,
    pub withdrawal: Arc<MockWithdrawal>,
    pub native: Arc<MockNativeChain>,
    pub base_balance: Arc<dyn BalanceReader>,
    pub torus_evm_balance: Arc<dyn BalanceReader>,
    pub native_balance: Arc<dyn BalanceReader>,
}

impl Mocks {
    /// All capabilities settle on `ledger`; the wallet starts on `wallet_chain`.
    pub fn on_ledger(ledger: &MockLedger, wallet_chain: u64) -> Self {
        Self {
            wallet: Arc::new(MockWallet::new(wallet_chain)),
            relay: Arc::new(MockRelay::new(RelayBehavior::Deliver).with_ledger(ledger.clone())),
            withdrawal: Arc::new(
                MockWithdrawal::new(RelayBehavior::Deliver).with_ledger(ledger.clone()),
            ),
            native: Arc::new(
                MockNativeChain::new(NativeBehavior::Finalize).with_ledger(ledger.clone()),
            ),
            base_balance: ledger.reader(MockChain::Base),
            torus_evm_balance: ledger.reader(MockChain::TorusEvm),
            native_balance: ledger.reader(MockChain::Native),
        }
    }

    pub fn providers(&self) -> BridgeProviders {
        BridgeProviders {
            wallet: self.wallet.clone(),
            relay: self.relay.clone(),
            withdrawal: self.withdrawal.clone(),
            native: self.native.clone(),
            base_balance: self.base_balance.clone(),
            torus_evm_balance: self.torus_evm_balance.clone(),
            native_balance: self.native_balance.clone(),
            evm_address: EVM_ADDRESS.to_string(),
            native_address: NATIVE_ADDRESS.to_string(),
        }
    }

    pub fn executor(&self) -> BridgeStepExecutor {
        BridgeStepExecutor::new(BridgeConfig::default(), self.providers())
    }
}

/// Ledger funded with 1000 TORUS on Base and on the native chain.
pub fn funded_ledger() -> MockLedger {
    MockLedger::new()
        .with_balance(MockChain::Base, torus(1_000))
        .with_balance(MockChain::Native, torus(1_000))
}
