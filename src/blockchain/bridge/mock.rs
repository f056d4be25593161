// filepath: src/blockchain/bridge/mock.rs
//! In-memory capabilities for the `simulate` command and tests.
//!
//! A `MockLedger` holds one balance per chain. Successful relay transfers,
//! withdrawals and finalized native transfers credit the destination chain
//! immediately, so balance polling sees the transfer on its first tick.

use async_trait::async_trait;
use ethers::types::U256;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::env;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::executor::BridgeProviders;
use crate::blockchain::extrinsic::{
    extrinsic_channel, ExtrinsicTracker, RuntimeOutcome, TrackerHandle, TxEventKind,
};
use crate::blockchain::traits::{
    BalanceReader, BalanceResponse, EvmWallet, EvmWithdrawal, NativeChain, NativeTransfer,
    RelayReceipt, RelayTransfer, RelayTransferRequest,
};
use crate::core::errors::{BridgeError, ProviderError, Result};
use crate::core::validation::to_base_units;

const MOCK_DECIMALS: u32 = 18;

/// Mocks are allowed with the `test-env` feature or when `ALLOW_BRIDGE_MOCKS`
/// is set to 1/true/yes.
pub fn bridge_mocks_allowed() -> bool {
    if cfg!(feature = "test-env") {
        return true;
    }
    match env::var("ALLOW_BRIDGE_MOCKS") {
        Ok(val) => {
            let v = val.trim();
            v == "1" || v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("yes")
        }
        Err(_) => false,
    }
}

fn simulated_hash() -> String {
    format!("0x{}", Uuid::new_v4().simple())
}

fn rejected_by_user() -> ProviderError {
    ProviderError::named("UserRejectedRequestError", "User rejected the request.")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockChain {
    Base,
    TorusEvm,
    Native,
}

impl MockChain {
    /// Chain for a relay route endpoint (`"base"`, `"torus"`).
    pub fn from_route(name: &str) -> Option<Self> {
        match name {
            "base" => Some(MockChain::Base),
            "torus" => Some(MockChain::TorusEvm),
            _ => None,
        }
    }
}

/// Shared per-chain balances. Cloning shares the ledger.
#[derive(Debug, Clone, Default)]
pub struct MockLedger {
    balances: Arc<Mutex<HashMap<MockChain, U256>>>,
    frozen: Arc<AtomicBool>,
}

impl MockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_balance(self, chain: MockChain, value: U256) -> Self {
        self.balances.lock().insert(chain, value);
        self
    }

    pub fn balance(&self, chain: MockChain) -> U256 {
        self.balances.lock().get(&chain).copied().unwrap_or_default()
    }

    /// Stops all future credits; transfers then never confirm.
    pub fn freeze(&self) {
        self.frozen.store(true, Ordering::SeqCst);
    }

    pub fn credit(&self, chain: MockChain, amount: U256) {
        if self.frozen.load(Ordering::SeqCst) {
            info!("[SIMULATED] Ledger frozen, {:?} credit of {} dropped", chain, amount);
            return;
        }
        let mut balances = self.balances.lock();
        let entry = balances.entry(chain).or_default();
        *entry = entry.saturating_add(amount);
    }

    pub fn debit(&self, chain: MockChain, amount: U256) {
        let mut balances = self.balances.lock();
        let entry = balances.entry(chain).or_default();
        *entry = entry.saturating_sub(amount);
    }

    pub fn reader(&self, chain: MockChain) -> Arc<LedgerBalance> {
        Arc::new(LedgerBalance { ledger: self.clone(), chain, calls: AtomicUsize::new(0) })
    }
}

/// Balance reader backed by a `MockLedger`.
#[derive(Debug)]
pub struct LedgerBalance {
    ledger: MockLedger,
    chain: MockChain,
    calls: AtomicUsize,
}

impl LedgerBalance {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BalanceReader for LedgerBalance {
    async fn refetch_balance(&self) -> std::result::Result<BalanceResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(BalanceResponse::success(self.ledger.balance(self.chain)))
    }
}

/// Balance reader replaying a fixed script. Once the script runs out the
/// last response is repeated.
#[derive(Debug)]
pub struct ScriptedBalance {
    script: Mutex<VecDeque<std::result::Result<BalanceResponse, ProviderError>>>,
    last: Mutex<std::result::Result<BalanceResponse, ProviderError>>,
    calls: AtomicUsize,
}

impl ScriptedBalance {
    pub fn new(script: Vec<std::result::Result<BalanceResponse, ProviderError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(Ok(BalanceResponse::success(U256::zero()))),
            calls: AtomicUsize::new(0),
        }
    }

    /// Successful reads of `values`, in order.
    pub fn values(values: &[U256]) -> Self {
        Self::new(values.iter().map(|v| Ok(BalanceResponse::success(*v))).collect())
    }

    pub fn constant(value: U256) -> Self {
        Self::values(&[value])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BalanceReader for ScriptedBalance {
    async fn refetch_balance(&self) -> std::result::Result<BalanceResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().pop_front();
        match next {
            Some(response) => {
                *self.last.lock() = response.clone();
                response
            }
            None => self.last.lock().clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitchBehavior {
    Switch,
    Reject,
    Fail(String),
    /// Reports `id` without switching.
    Report(u64),
}

/// Wallet whose `switch_chain` answers follow a script; `Switch` once the
/// script is exhausted.
#[derive(Debug)]
pub struct MockWallet {
    chain_id: Mutex<u64>,
    script: Mutex<VecDeque<SwitchBehavior>>,
    switch_calls: AtomicUsize,
}

impl MockWallet {
    pub fn new(chain_id: u64) -> Self {
        Self::with_script(chain_id, Vec::new())
    }

    pub fn with_script(chain_id: u64, script: Vec<SwitchBehavior>) -> Self {
        Self {
            chain_id: Mutex::new(chain_id),
            script: Mutex::new(script.into()),
            switch_calls: AtomicUsize::new(0),
        }
    }

    pub fn switch_calls(&self) -> usize {
        self.switch_calls.load(Ordering::SeqCst)
    }

    pub fn chain_id(&self) -> u64 {
        *self.chain_id.lock()
    }

    pub fn set_chain_id(&self, chain_id: u64) {
        *self.chain_id.lock() = chain_id;
    }
}

#[async_trait]
impl EvmWallet for MockWallet {
    async fn switch_chain(&self, chain_id: u64) -> std::result::Result<u64, ProviderError> {
        self.switch_calls.fetch_add(1, Ordering::SeqCst);
        let behavior = self.script.lock().pop_front().unwrap_or(SwitchBehavior::Switch);
        match behavior {
            SwitchBehavior::Switch => {
                *self.chain_id.lock() = chain_id;
                Ok(chain_id)
            }
            SwitchBehavior::Reject => Err(rejected_by_user()),
            SwitchBehavior::Fail(message) => Err(ProviderError::new(message)),
            SwitchBehavior::Report(id) => Ok(id),
        }
    }

    async fn current_chain_id(&self) -> std::result::Result<u64, ProviderError> {
        Ok(*self.chain_id.lock())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayBehavior {
    Deliver,
    Reject,
    Fail(String),
}

/// Relay that settles instantly on the ledger.
#[derive(Debug)]
pub struct MockRelay {
    behavior: RelayBehavior,
    ledger: Option<MockLedger>,
    hash: Option<String>,
    fee: U256,
    requests: Mutex<Vec<RelayTransferRequest>>,
}

impl MockRelay {
    pub fn new(behavior: RelayBehavior) -> Self {
        Self {
            behavior,
            ledger: None,
            hash: None,
            fee: U256::zero(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_ledger(mut self, ledger: MockLedger) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Fixed hash instead of a random one.
    pub fn with_hash(mut self, hash: impl Into<String>) -> Self {
        self.hash = Some(hash.into());
        self
    }

    /// Deducted from the delivered amount.
    pub fn with_fee(mut self, fee: U256) -> Self {
        self.fee = fee;
        self
    }

    pub fn requests(&self) -> Vec<RelayTransferRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl RelayTransfer for MockRelay {
    async fn trigger_relay_transfer(
        &self,
        request: RelayTransferRequest,
    ) -> std::result::Result<RelayReceipt, ProviderError> {
        self.requests.lock().push(request.clone());
        match &self.behavior {
            RelayBehavior::Reject => return Err(rejected_by_user()),
            RelayBehavior::Fail(message) => return Err(ProviderError::new(message.clone())),
            RelayBehavior::Deliver => {}
        }

        let hash = self.hash.clone().unwrap_or_else(simulated_hash);
        info!(
            "[SIMULATED] Relay {} {} -> {} ({})",
            request.amount, request.origin, request.destination, hash
        );
        if let Some(ledger) = &self.ledger {
            let amount = to_base_units(&request.amount, MOCK_DECIMALS)
                .map_err(|e| ProviderError::new(e.to_string()))?;
            if let Some(origin) = MockChain::from_route(&request.origin) {
                ledger.debit(origin, amount);
            }
            if let Some(destination) = MockChain::from_route(&request.destination) {
                ledger.credit(destination, amount.saturating_sub(self.fee));
            }
        }
        Ok(RelayReceipt { hash: Some(hash) })
    }
}

/// Torus EVM withdrawal that settles instantly on the ledger.
#[derive(Debug)]
pub struct MockWithdrawal {
    behavior: RelayBehavior,
    ledger: Option<MockLedger>,
    calls: AtomicUsize,
}

impl MockWithdrawal {
    pub fn new(behavior: RelayBehavior) -> Self {
        Self { behavior, ledger: None, calls: AtomicUsize::new(0) }
    }

    pub fn with_ledger(mut self, ledger: MockLedger) -> Self {
        self.ledger = Some(ledger);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EvmWithdrawal for MockWithdrawal {
    async fn withdraw_to_native(
        &self,
        native_recipient: &str,
        amount: U256,
    ) -> std::result::Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            RelayBehavior::Reject => return Err(rejected_by_user()),
            RelayBehavior::Fail(message) => return Err(ProviderError::new(message.clone())),
            RelayBehavior::Deliver => {}
        }
        info!("[SIMULATED] Withdraw {} to {}", amount, native_recipient);
        if let Some(ledger) = &self.ledger {
            ledger.debit(MockChain::TorusEvm, amount);
            ledger.credit(MockChain::Native, amount);
        }
        Ok(simulated_hash())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeBehavior {
    /// Ready, InBlock and Finalized, all successful.
    Finalize,
    /// Emits exactly these events.
    Script(Vec<TxEventKind>),
    /// Emits nothing; tests drive the handle themselves.
    Manual,
    Reject,
    Fail(String),
}

/// Native chain client whose extrinsics follow a fixed event script.
#[derive(Debug)]
pub struct MockNativeChain {
    behavior: NativeBehavior,
    ledger: Option<MockLedger>,
    handles: Mutex<Vec<TrackerHandle>>,
}

impl MockNativeChain {
    pub fn new(behavior: NativeBehavior) -> Self {
        Self { behavior, ledger: None, handles: Mutex::new(Vec::new()) }
    }

    pub fn with_ledger(mut self, ledger: MockLedger) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Emitter handles of every extrinsic sent so far, oldest first.
    pub fn handles(&self) -> Vec<TrackerHandle> {
        self.handles.lock().clone()
    }
}

#[async_trait]
impl NativeChain for MockNativeChain {
    async fn send_transaction(
        &self,
        tx: NativeTransfer,
    ) -> std::result::Result<ExtrinsicTracker, ProviderError> {
        let events = match &self.behavior {
            NativeBehavior::Reject => return Err(rejected_by_user()),
            NativeBehavior::Fail(message) => return Err(ProviderError::new(message.clone())),
            NativeBehavior::Manual => Vec::new(),
            NativeBehavior::Script(events) => events.clone(),
            NativeBehavior::Finalize => {
                let block_hash = simulated_hash();
                vec![
                    TxEventKind::Ready,
                    TxEventKind::InBlock {
                        block_hash: block_hash.clone(),
                        outcome: RuntimeOutcome::Success,
                    },
                    TxEventKind::Finalized { block_hash, outcome: RuntimeOutcome::Success },
                ]
            }
        };

        let (handle, tracker) = extrinsic_channel(Some(simulated_hash()));
        info!("[SIMULATED] Native transfer of {} to {}", tx.amount, tx.destination);
        for kind in events {
            let finalized =
                matches!(kind, TxEventKind::Finalized { outcome: RuntimeOutcome::Success, .. });
            handle.emit(kind);
            if finalized {
                if let Some(ledger) = &self.ledger {
                    ledger.debit(MockChain::Native, tx.amount);
                    ledger.credit(MockChain::TorusEvm, tx.amount);
                }
            }
        }
        self.handles.lock().push(handle);
        Ok(tracker)
    }
}

/// Providers for a full simulated transfer over `ledger`.
pub fn simulated_providers(
    ledger: &MockLedger,
    relay: RelayBehavior,
    wallet_chain_id: u64,
) -> Result<BridgeProviders> {
    if !bridge_mocks_allowed() {
        return Err(BridgeError::Config(
            "bridge mocks disabled: set ALLOW_BRIDGE_MOCKS=1 to enable".to_string(),
        ));
    }

    Ok(BridgeProviders {
        wallet: Arc::new(MockWallet::new(wallet_chain_id)),
        relay: Arc::new(MockRelay::new(relay).with_ledger(ledger.clone())),
        withdrawal: Arc::new(
            MockWithdrawal::new(RelayBehavior::Deliver).with_ledger(ledger.clone()),
        ),
        native: Arc::new(
            MockNativeChain::new(NativeBehavior::Finalize).with_ledger(ledger.clone()),
        ),
        base_balance: ledger.reader(MockChain::Base),
        torus_evm_balance: ledger.reader(MockChain::TorusEvm),
        native_balance: ledger.reader(MockChain::Native),
        evm_address: "0x742d35cc6634c0532925a3b844bc454e4438f44e".to_string(),
        native_address: "5GrwvaEF5zXb26Fz9rcQpDWS57CtERHpNehXCPcNoHGKutQY".to_string(),
    })
}
