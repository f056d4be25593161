//! Status subscription for one submitted extrinsic.
//!
//! The native client keeps a `TrackerHandle` and pushes status events into it;
//! the consumer holds the `ExtrinsicTracker` end. Cancelling the tracker tells
//! the client to drop the subscription, and any event emitted afterwards is
//! discarded.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::events::{TxEvent, TxEventKind};

/// Producer side, owned by the chain client.
#[derive(Debug, Clone)]
pub struct TrackerHandle {
    tx_hash: Option<String>,
    sender: mpsc::UnboundedSender<TxEvent>,
    cancel: CancellationToken,
}

/// Consumer side of an extrinsic status subscription.
#[derive(Debug)]
pub struct ExtrinsicTracker {
    tx_hash: Option<String>,
    events: mpsc::UnboundedReceiver<TxEvent>,
    cancel: CancellationToken,
}

/// Creates a connected handle/tracker pair.
pub fn extrinsic_channel(tx_hash: Option<String>) -> (TrackerHandle, ExtrinsicTracker) {
    let (sender, events) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();
    (
        TrackerHandle { tx_hash: tx_hash.clone(), sender, cancel: cancel.clone() },
        ExtrinsicTracker { tx_hash, events, cancel },
    )
}

impl TrackerHandle {
    pub fn tx_hash(&self) -> Option<&str> {
        self.tx_hash.as_deref()
    }

    /// Pushes a status event. Returns false when the subscription was
    /// cancelled or the consumer is gone; the event is dropped in that case.
    pub fn emit(&self, kind: TxEventKind) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        self.sender.send(TxEvent::new(self.tx_hash.clone(), kind)).is_ok()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl ExtrinsicTracker {
    pub fn tx_hash(&self) -> Option<&str> {
        self.tx_hash.as_deref()
    }

    /// Next status event; `None` once cancelled or once the client closed
    /// the subscription.
    pub async fn next_event(&mut self) -> Option<TxEvent> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            event = self.events.recv() => event,
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}
