//! Extrinsic lifecycle tracking.
//!
//! `TransactionLifecycleTracker` sends native-chain transactions and folds the
//! resulting status events into a `TxStage`. At most one transaction is live
//! per tracker: a new `send_tx` cancels the previous subscription before the
//! new one starts, and a stale subscription can never write the stage again.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::dispatch::{map_dispatch_error_to_message, ModuleErrorRegistry};
use super::events::{RuntimeOutcome, TxEvent, TxEventKind};
use super::subscription::ExtrinsicTracker;
use crate::blockchain::traits::{NativeChain, NativeTransfer};
use crate::core::error_classifier::is_user_rejection;
use crate::core::errors::{BridgeError, Result, TxFailure};

/// Current stage of the tracked transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxStage {
    Idle,
    /// Waiting for the wallet to sign.
    Signing { extrinsic: String },
    /// Submitted; holds the latest status event.
    Submitted { event: TxEvent },
    Error { error: TxFailure, tx_hash: Option<String> },
}

/// Flags and message derived from a `TxStage`, for display.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxHelper {
    pub tx_hash: Option<String>,
    pub is_signing: bool,
    pub is_submitted: bool,
    pub is_pending: bool,
    pub is_in_block: bool,
    /// Included and executed successfully (inclusion alone is not enough)
    pub is_executed: bool,
    pub is_finalized: bool,
    pub is_error: bool,
    pub message: String,
    pub error: Option<String>,
}

impl TxStage {
    pub fn helper(&self, registry: Option<&dyn ModuleErrorRegistry>) -> TxHelper {
        match self {
            TxStage::Idle => TxHelper {
                message: "Ready to send transaction".to_string(),
                ..Default::default()
            },
            TxStage::Signing { .. } => TxHelper {
                is_signing: true,
                message: "Waiting for signature...".to_string(),
                ..Default::default()
            },
            TxStage::Submitted { event } => event_helper(event, registry),
            TxStage::Error { error, tx_hash } => TxHelper {
                tx_hash: tx_hash.clone(),
                is_error: true,
                message: error.to_string(),
                error: Some(error.to_string()),
                ..Default::default()
            },
        }
    }

    pub fn tx_hash(&self) -> Option<&str> {
        match self {
            TxStage::Submitted { event } => event.tx_hash.as_deref(),
            TxStage::Error { tx_hash, .. } => tx_hash.as_deref(),
            _ => None,
        }
    }
}

fn event_helper(event: &TxEvent, registry: Option<&dyn ModuleErrorRegistry>) -> TxHelper {
    let base = TxHelper { tx_hash: event.tx_hash.clone(), ..Default::default() };
    let pending = |message: &str| TxHelper {
        is_submitted: true,
        is_pending: true,
        message: message.to_string(),
        ..base.clone()
    };
    let failed = |message: &str, error: Option<String>| TxHelper {
        is_error: true,
        message: message.to_string(),
        error,
        ..base.clone()
    };

    match &event.kind {
        TxEventKind::InternalError { error } => {
            let message = if error.is_empty() { "Internal error occurred" } else { error };
            failed(message, Some(error.clone()))
        }
        TxEventKind::Invalid { reason } => failed("Transaction invalid", Some(reason.clone())),
        TxEventKind::Future => pending("Transaction has dependencies"),
        TxEventKind::Ready => pending("Transaction ready and included in pool"),
        TxEventKind::Broadcast { .. } => pending("Transaction broadcasted to network nodes"),
        TxEventKind::Dropped => failed("Transaction dropped", None),
        TxEventKind::Usurped { .. } => failed("Transaction replaced", None),
        TxEventKind::Retracted { .. } => failed("Transaction retracted", None),
        TxEventKind::FinalityTimeout { .. } => TxHelper {
            is_submitted: true,
            ..failed("Transaction finalization timed out", None)
        },
        TxEventKind::InBlock { outcome, .. } | TxEventKind::Finalized { outcome, .. } => {
            let finalized = matches!(event.kind, TxEventKind::Finalized { .. });
            let error = match outcome {
                RuntimeOutcome::Success => None,
                RuntimeOutcome::Failed { error } => {
                    Some(map_dispatch_error_to_message(error, registry, None))
                }
            };
            let message = match (finalized, error.is_some()) {
                (false, false) => "Transaction was included in block",
                (false, true) => "Transaction included but failed execution",
                (true, false) => "Transaction was finalized",
                (true, true) => "Transaction finalized but failed execution",
            };
            TxHelper {
                is_submitted: true,
                is_in_block: true,
                is_executed: error.is_none(),
                is_finalized: finalized,
                is_error: error.is_some(),
                message: message.to_string(),
                error,
                ..base
            }
        }
    }
}

/// Failure carried by a status event, if any. `Retracted` yields a failure
/// but is not terminal; the extrinsic may still land in another block.
fn failure_for_event(
    event: &TxEvent,
    registry: Option<&dyn ModuleErrorRegistry>,
    transaction_type: &str,
) -> Option<TxFailure> {
    match &event.kind {
        TxEventKind::InternalError { error } => Some(TxFailure::Internal(error.clone())),
        TxEventKind::Invalid { reason } => Some(TxFailure::Invalid(reason.clone())),
        TxEventKind::Finalized { outcome: RuntimeOutcome::Failed { error }, .. } => {
            Some(TxFailure::Dispatch(map_dispatch_error_to_message(
                error,
                registry,
                Some(transaction_type),
            )))
        }
        TxEventKind::FinalityTimeout { .. } => Some(TxFailure::FinalityTimeout),
        TxEventKind::Dropped => Some(TxFailure::Dropped),
        TxEventKind::Usurped { .. } => Some(TxFailure::Usurped),
        TxEventKind::Retracted { .. } => Some(TxFailure::Retracted),
        TxEventKind::Future
        | TxEventKind::Ready
        | TxEventKind::Broadcast { .. }
        | TxEventKind::InBlock { .. }
        | TxEventKind::Finalized { .. } => None,
    }
}

/// Stage that follows a status event.
fn stage_for_event(
    event: &TxEvent,
    registry: Option<&dyn ModuleErrorRegistry>,
    transaction_type: &str,
) -> TxStage {
    match failure_for_event(event, registry, transaction_type) {
        Some(error) => TxStage::Error { error, tx_hash: event.tx_hash.clone() },
        None => TxStage::Submitted { event: event.clone() },
    }
}

/// Live transaction, as seen by the caller of `send_tx`.
#[derive(Debug)]
pub struct TrackedTransaction {
    tx_hash: Option<String>,
    events: mpsc::UnboundedReceiver<TxEvent>,
    cancel: CancellationToken,
}

impl TrackedTransaction {
    pub fn tx_hash(&self) -> Option<&str> {
        self.tx_hash.as_deref()
    }

    /// Next status event. `None` once the transaction was superseded by a
    /// newer send or the subscription closed.
    pub async fn next_event(&mut self) -> Option<TxEvent> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            event = self.events.recv() => event,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

struct ActiveSend {
    generation: u64,
    token: CancellationToken,
    subscription: Option<CancellationToken>,
}

impl ActiveSend {
    fn cancel(&self) {
        self.token.cancel();
        if let Some(subscription) = &self.subscription {
            subscription.cancel();
        }
    }
}

/// Sends native-chain transactions and tracks the live one.
pub struct TransactionLifecycleTracker {
    chain: Arc<dyn NativeChain>,
    registry: Option<Arc<dyn ModuleErrorRegistry>>,
    transaction_type: String,
    stage: Arc<watch::Sender<TxStage>>,
    active: Mutex<Option<ActiveSend>>,
    next_generation: Mutex<u64>,
}

impl TransactionLifecycleTracker {
    pub fn new(chain: Arc<dyn NativeChain>, transaction_type: impl Into<String>) -> Self {
        let (stage, _) = watch::channel(TxStage::Idle);
        Self {
            chain,
            registry: None,
            transaction_type: transaction_type.into(),
            stage: Arc::new(stage),
            active: Mutex::new(None),
            next_generation: Mutex::new(0),
        }
    }

    pub fn with_registry(mut self, registry: Arc<dyn ModuleErrorRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn stage(&self) -> TxStage {
        self.stage.borrow().clone()
    }

    pub fn helper(&self) -> TxHelper {
        self.stage.borrow().helper(self.registry.as_deref())
    }

    /// Failure `event` reports, resolved the same way the stage is.
    pub fn failure_for(&self, event: &TxEvent) -> Option<TxFailure> {
        failure_for_event(event, self.registry.as_deref(), &self.transaction_type)
    }

    /// Watch the stage; every change is pushed to the receiver.
    pub fn subscribe(&self) -> watch::Receiver<TxStage> {
        self.stage.subscribe()
    }

    /// Signs and submits `tx`, cancelling whatever transaction was live before.
    ///
    /// A wallet rejection comes back as `BridgeError::UserRejected`; any other
    /// submission failure as `BridgeError::Provider`. In both cases the stage
    /// is already `Error` when this returns.
    pub async fn send_tx(&self, tx: NativeTransfer) -> Result<TrackedTransaction> {
        let token = CancellationToken::new();
        let generation = {
            let mut next = self.next_generation.lock();
            *next += 1;
            *next
        };
        {
            let mut active = self.active.lock();
            if let Some(previous) = active.take() {
                previous.cancel();
                info!("Cancelled extrinsic tracker #{} for a new send", previous.generation);
            }
            *active = Some(ActiveSend { generation, token: token.clone(), subscription: None });
        }

        let description =
            format!("{} of {} to {}", self.transaction_type, tx.amount, tx.destination);
        self.stage.send_replace(TxStage::Signing { extrinsic: description });

        let tracker = match self.chain.send_transaction(tx).await {
            Ok(tracker) => tracker,
            Err(err) => {
                warn!("Extrinsic submission failed: {}", err);
                let rejected = is_user_rejection(&err);
                let failure = if rejected {
                    TxFailure::UserRejected
                } else {
                    TxFailure::Submission(err.message.clone())
                };
                set_stage_unless_cancelled(
                    &self.stage,
                    &token,
                    TxStage::Error { error: failure, tx_hash: None },
                );
                return Err(if rejected {
                    BridgeError::UserRejected("Transaction rejected by user".to_string())
                } else {
                    BridgeError::Provider(err)
                });
            }
        };

        {
            let mut active = self.active.lock();
            match active.as_mut() {
                Some(current) if current.generation == generation => {
                    current.subscription = Some(tracker.cancellation_token());
                }
                _ => {
                    debug!("Send #{} superseded while signing", generation);
                    tracker.cancel();
                }
            }
        }

        let tx_hash = tracker.tx_hash().map(str::to_string);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        tokio::spawn(forward_events(
            tracker,
            token.clone(),
            self.stage.clone(),
            self.registry.clone(),
            self.transaction_type.clone(),
            events_tx,
        ));

        Ok(TrackedTransaction { tx_hash, events: events_rx, cancel: token })
    }

    /// Forgets the live transaction (if any) and returns to `Idle`.
    pub fn reset(&self) {
        if let Some(previous) = self.active.lock().take() {
            previous.cancel();
        }
        self.stage.send_replace(TxStage::Idle);
    }
}

impl Drop for TransactionLifecycleTracker {
    fn drop(&mut self) {
        if let Some(previous) = self.active.get_mut().take() {
            previous.cancel();
        }
    }
}

fn set_stage_unless_cancelled(
    stage: &watch::Sender<TxStage>,
    token: &CancellationToken,
    next: TxStage,
) -> bool {
    // The check runs under the watch lock, so a cancelled sender can never
    // overwrite a stage written by the send that cancelled it.
    stage.send_if_modified(|current| {
        if token.is_cancelled() {
            return false;
        }
        *current = next;
        true
    })
}

async fn forward_events(
    mut tracker: ExtrinsicTracker,
    token: CancellationToken,
    stage: Arc<watch::Sender<TxStage>>,
    registry: Option<Arc<dyn ModuleErrorRegistry>>,
    transaction_type: String,
    events_tx: mpsc::UnboundedSender<TxEvent>,
) {
    loop {
        let event = tokio::select! {
            biased;
            _ = token.cancelled() => {
                tracker.cancel();
                break;
            }
            event = tracker.next_event() => match event {
                Some(event) => event,
                None => break,
            },
        };

        debug!("Extrinsic status: {}", event.kind.name());
        let next = stage_for_event(&event, registry.as_deref(), &transaction_type);
        if !set_stage_unless_cancelled(&stage, &token, next) {
            break;
        }

        let terminal = event.kind.is_terminal();
        let _ = events_tx.send(event);
        if terminal {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::extrinsic::dispatch::{DispatchError, TokenError};

    fn event(kind: TxEventKind) -> TxEvent {
        TxEvent::new(Some("0xabc".into()), kind)
    }

    #[test]
    fn test_idle_and_signing_helpers() {
        let idle = TxStage::Idle.helper(None);
        assert_eq!(idle.message, "Ready to send transaction");
        assert!(!idle.is_pending && !idle.is_error);

        let signing = TxStage::Signing { extrinsic: "transfer".into() }.helper(None);
        assert!(signing.is_signing);
        assert_eq!(signing.message, "Waiting for signature...");
    }

    #[test]
    fn test_pool_events_are_pending() {
        let helper = TxStage::Submitted { event: event(TxEventKind::Ready) }.helper(None);
        assert!(helper.is_submitted && helper.is_pending);
        assert!(!helper.is_in_block);
        assert_eq!(helper.tx_hash.as_deref(), Some("0xabc"));
    }

    #[test]
    fn test_finalized_success_flags() {
        let helper = TxStage::Submitted {
            event: event(TxEventKind::Finalized {
                block_hash: "0x01".into(),
                outcome: RuntimeOutcome::Success,
            }),
        }
        .helper(None);
        assert!(helper.is_in_block && helper.is_executed && helper.is_finalized);
        assert!(!helper.is_error);
        assert_eq!(helper.message, "Transaction was finalized");
    }

    #[test]
    fn test_in_block_failed_execution() {
        let helper = TxStage::Submitted {
            event: event(TxEventKind::InBlock {
                block_hash: "0x01".into(),
                outcome: RuntimeOutcome::Failed {
                    error: DispatchError::Token(TokenError::FundsUnavailable),
                },
            }),
        }
        .helper(None);
        assert!(helper.is_in_block && helper.is_error);
        assert!(!helper.is_executed);
        assert_eq!(helper.message, "Transaction included but failed execution");
        assert_eq!(
            helper.error.as_deref(),
            Some("Transaction failed: Insufficient funds available")
        );
    }

    #[test]
    fn test_stage_for_terminal_failures() {
        let cases = [
            (TxEventKind::Dropped, TxFailure::Dropped),
            (TxEventKind::Usurped { by: "0x02".into() }, TxFailure::Usurped),
            (
                TxEventKind::FinalityTimeout { block_hash: "0x03".into() },
                TxFailure::FinalityTimeout,
            ),
            (TxEventKind::Retracted { block_hash: "0x04".into() }, TxFailure::Retracted),
        ];
        for (kind, expected) in cases {
            let stage = stage_for_event(&event(kind), None, "Bridge");
            assert_eq!(stage, TxStage::Error { error: expected, tx_hash: Some("0xabc".into()) });
        }
    }

    #[test]
    fn test_stage_for_failed_finalization_uses_transaction_type() {
        let stage = stage_for_event(
            &event(TxEventKind::Finalized {
                block_hash: "0x05".into(),
                outcome: RuntimeOutcome::Failed { error: DispatchError::BadOrigin },
            }),
            None,
            "Bridge transfer",
        );
        match stage {
            TxStage::Error { error: TxFailure::Dispatch(message), .. } => {
                assert_eq!(message, "Bridge transfer failed: Invalid transaction origin")
            }
            other => panic!("unexpected stage {:?}", other),
        }
    }
}
