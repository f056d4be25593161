// src/blockchain/bridge/mod.rs

mod base_to_native;
pub mod chain_switch;
pub mod executor;
pub mod mock;
mod native_to_base;
pub mod polling;
pub mod session;


use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::blockchain::explorer::explorer_url;

pub use chain_switch::{ChainSwitchResult, ChainSwitchRetrier};
pub use executor::{BridgeProviders, BridgeStepExecutor, StepOutcome};
pub use polling::{BalancePoller, PollFailure, PollMode, PollRequest, PollingResult};
pub use session::{BridgeSession, SessionEvent};

/// Transfer direction; fixed once a transfer starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Base -> Torus EVM -> Native
    BaseToNative,
    /// Native -> Torus EVM -> Base
    NativeToBase,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::BaseToNative => write!(f, "Base → Native"),
            Direction::NativeToBase => write!(f, "Native → Base"),
        }
    }
}

/// One of the two sequential sub-transfers of a bridge transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TransferLeg {
    First,
    Second,
}

impl TransferLeg {
    pub fn number(&self) -> u8 {
        match self {
            TransferLeg::First => 1,
            TransferLeg::Second => 2,
        }
    }
}

/// Ordered phases of a bridge transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BridgeStep {
    Idle,
    Step1Preparing,
    Step1Signing,
    Step1Confirming,
    Step1Complete,
    Step2Preparing,
    Step2Switching,
    Step2Signing,
    Step2Confirming,
    Complete,
    Error,
}

impl BridgeStep {
    fn ordinal(self) -> u8 {
        match self {
            BridgeStep::Idle => 0,
            BridgeStep::Step1Preparing => 1,
            BridgeStep::Step1Signing => 2,
            BridgeStep::Step1Confirming => 3,
            BridgeStep::Step1Complete => 4,
            BridgeStep::Step2Preparing => 5,
            BridgeStep::Step2Switching => 6,
            BridgeStep::Step2Signing => 7,
            BridgeStep::Step2Confirming => 8,
            BridgeStep::Complete => 9,
            BridgeStep::Error => 10,
        }
    }

    /// Forward moves, jumps to `Error`/`Idle`, and staying put are legal.
    /// `Error` only leaves through a reset to `Idle`.
    pub fn can_transition_to(self, next: BridgeStep) -> bool {
        match (self, next) {
            (_, BridgeStep::Idle) => true,
            (BridgeStep::Error, BridgeStep::Error) => true,
            (BridgeStep::Error, _) => false,
            (_, BridgeStep::Error) => true,
            (from, to) => to.ordinal() >= from.ordinal(),
        }
    }

    pub fn is_in_progress(self) -> bool {
        !matches!(
            self,
            BridgeStep::Idle | BridgeStep::Step1Complete | BridgeStep::Complete | BridgeStep::Error
        )
    }
}

impl fmt::Display for BridgeStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BridgeStep::Idle => "IDLE",
            BridgeStep::Step1Preparing => "STEP_1_PREPARING",
            BridgeStep::Step1Signing => "STEP_1_SIGNING",
            BridgeStep::Step1Confirming => "STEP_1_CONFIRMING",
            BridgeStep::Step1Complete => "STEP_1_COMPLETE",
            BridgeStep::Step2Preparing => "STEP_2_PREPARING",
            BridgeStep::Step2Switching => "STEP_2_SWITCHING",
            BridgeStep::Step2Signing => "STEP_2_SIGNING",
            BridgeStep::Step2Confirming => "STEP_2_CONFIRMING",
            BridgeStep::Complete => "COMPLETE",
            BridgeStep::Error => "ERROR",
        };
        f.write_str(name)
    }
}

/// Orchestrator state shown to the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeState {
    pub step: BridgeStep,
    pub direction: Option<Direction>,
    pub amount: String,
    pub error_message: Option<String>,
}

impl Default for BridgeState {
    fn default() -> Self {
        Self { step: BridgeStep::Idle, direction: None, amount: String::new(), error_message: None }
    }
}

/// Partial update merged into `BridgeState`; `None` fields are left as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BridgeStateUpdate {
    pub step: Option<BridgeStep>,
    pub direction: Option<Direction>,
    pub amount: Option<String>,
    pub error_message: Option<Option<String>>,
}

impl BridgeStateUpdate {
    pub fn step(step: BridgeStep) -> Self {
        Self { step: Some(step), ..Default::default() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            step: Some(BridgeStep::Error),
            error_message: Some(Some(message.into())),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxRecordStatus {
    Starting,
    Signing,
    Confirming,
    Success,
    Error,
}

/// Per-leg transaction record. At most one per leg; a newer record for the
/// same leg replaces the older one in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeTransactionRecord {
    pub step: TransferLeg,
    pub status: TxRecordStatus,
    pub chain_name: String,
    pub message: String,
    pub tx_hash: Option<String>,
    pub explorer_url: Option<String>,
    pub error_details: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl BridgeTransactionRecord {
    pub fn new(
        step: TransferLeg,
        status: TxRecordStatus,
        chain_name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            step,
            status,
            chain_name: chain_name.into(),
            message: message.into(),
            tx_hash: None,
            explorer_url: None,
            error_details: None,
            updated_at: Utc::now(),
        }
    }

    /// Attaches a transaction hash and its explorer link on `explorer_chain`.
    pub fn with_tx(mut self, tx_hash: Option<String>, explorer_chain: &str) -> Self {
        self.explorer_url = tx_hash.as_deref().and_then(|h| explorer_url(h, explorer_chain));
        self.tx_hash = tx_hash;
        self
    }

    pub fn with_error_details(mut self, details: Option<String>) -> Self {
        self.error_details = details;
        self
    }
}
