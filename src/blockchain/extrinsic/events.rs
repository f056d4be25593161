//! Status events emitted while a native-chain extrinsic makes its way from
//! the transaction pool into a finalized block.

use serde::{Deserialize, Serialize};

use super::dispatch::DispatchError;

/// Result of executing the call once included in a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuntimeOutcome {
    Success,
    Failed { error: DispatchError },
}

impl RuntimeOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RuntimeOutcome::Success)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxEventKind {
    /// In the pool, waiting on a dependency (nonce gap).
    Future,
    Ready,
    Broadcast { peers: Vec<String> },
    InBlock { block_hash: String, outcome: RuntimeOutcome },
    /// The including block was retracted by a re-org.
    Retracted { block_hash: String },
    FinalityTimeout { block_hash: String },
    Finalized { block_hash: String, outcome: RuntimeOutcome },
    Invalid { reason: String },
    /// Replaced by another transaction, identified by its hash.
    Usurped { by: String },
    Dropped,
    InternalError { error: String },
}

/// Coarse grouping used for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxEventGroup {
    Pending,
    Success,
    Error,
    Reverted,
}

impl TxEventKind {
    pub fn name(&self) -> &'static str {
        match self {
            TxEventKind::Future => "Future",
            TxEventKind::Ready => "Ready",
            TxEventKind::Broadcast { .. } => "Broadcast",
            TxEventKind::InBlock { .. } => "InBlock",
            TxEventKind::Retracted { .. } => "Retracted",
            TxEventKind::FinalityTimeout { .. } => "FinalityTimeout",
            TxEventKind::Finalized { .. } => "Finalized",
            TxEventKind::Invalid { .. } => "Invalid",
            TxEventKind::Usurped { .. } => "Usurped",
            TxEventKind::Dropped => "Dropped",
            TxEventKind::InternalError { .. } => "InternalError",
        }
    }

    pub fn group(&self) -> TxEventGroup {
        match self {
            TxEventKind::Future | TxEventKind::Ready | TxEventKind::Broadcast { .. } => {
                TxEventGroup::Pending
            }
            TxEventKind::InBlock { .. } | TxEventKind::Finalized { .. } => TxEventGroup::Success,
            TxEventKind::Invalid { .. }
            | TxEventKind::Dropped
            | TxEventKind::Usurped { .. }
            | TxEventKind::FinalityTimeout { .. }
            | TxEventKind::InternalError { .. } => TxEventGroup::Error,
            TxEventKind::Retracted { .. } => TxEventGroup::Reverted,
        }
    }

    /// No further status events follow a terminal one.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TxEventKind::Finalized { .. }
                | TxEventKind::FinalityTimeout { .. }
                | TxEventKind::Invalid { .. }
                | TxEventKind::Usurped { .. }
                | TxEventKind::Dropped
                | TxEventKind::InternalError { .. }
        )
    }

    pub fn block_hash(&self) -> Option<&str> {
        match self {
            TxEventKind::InBlock { block_hash, .. }
            | TxEventKind::Retracted { block_hash }
            | TxEventKind::FinalityTimeout { block_hash }
            | TxEventKind::Finalized { block_hash, .. } => Some(block_hash.as_str()),
            _ => None,
        }
    }

    pub fn outcome(&self) -> Option<&RuntimeOutcome> {
        match self {
            TxEventKind::InBlock { outcome, .. } | TxEventKind::Finalized { outcome, .. } => {
                Some(outcome)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxEvent {
    /// Extrinsic hash, known once the extrinsic is signed
    pub tx_hash: Option<String>,
    pub kind: TxEventKind,
}

impl TxEvent {
    pub fn new(tx_hash: Option<String>, kind: TxEventKind) -> Self {
        Self { tx_hash, kind }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grouping() {
        assert_eq!(TxEventKind::Ready.group(), TxEventGroup::Pending);
        assert_eq!(
            TxEventKind::Broadcast { peers: vec!["12D3KooW".into()] }.group(),
            TxEventGroup::Pending
        );
        assert_eq!(
            TxEventKind::Finalized { block_hash: "0x01".into(), outcome: RuntimeOutcome::Success }
                .group(),
            TxEventGroup::Success
        );
        assert_eq!(TxEventKind::Usurped { by: "0x02".into() }.group(), TxEventGroup::Error);
        assert_eq!(
            TxEventKind::Retracted { block_hash: "0x03".into() }.group(),
            TxEventGroup::Reverted
        );
    }

    #[test]
    fn test_retracted_is_not_terminal() {
        assert!(!TxEventKind::Retracted { block_hash: "0x03".into() }.is_terminal());
        assert!(TxEventKind::Dropped.is_terminal());
        assert!(!TxEventKind::InBlock {
            block_hash: "0x04".into(),
            outcome: RuntimeOutcome::Success
        }
        .is_terminal());
    }
}
