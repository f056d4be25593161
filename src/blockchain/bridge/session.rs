//! Shared bridge state and transaction records.
//!
//! The session is the only mutable state the UI sees. It is written through
//! `update_state` (merge, with step transition checks) and `add_transaction`
//! (upsert by leg), and every change is broadcast as a `SessionEvent`.

use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

use super::{BridgeState, BridgeStateUpdate, BridgeTransactionRecord, TransferLeg};
use crate::core::errors::{BridgeError, Result};

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    StateChanged(BridgeState),
    RecordUpserted(BridgeTransactionRecord),
    Reset,
}

#[derive(Debug, Default)]
struct SessionInner {
    state: BridgeState,
    records: Vec<BridgeTransactionRecord>,
}

/// Cloneable handle; clones share the same state.
#[derive(Debug, Clone)]
pub struct BridgeSession {
    inner: Arc<RwLock<SessionInner>>,
    events: broadcast::Sender<SessionEvent>,
}

impl Default for BridgeSession {
    fn default() -> Self {
        Self::new()
    }
}

impl BridgeSession {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self { inner: Arc::new(RwLock::new(SessionInner::default())), events }
    }

    pub fn state(&self) -> BridgeState {
        self.inner.read().state.clone()
    }

    /// Records in display (first insertion) order.
    pub fn records(&self) -> Vec<BridgeTransactionRecord> {
        self.inner.read().records.clone()
    }

    pub fn record(&self, leg: TransferLeg) -> Option<BridgeTransactionRecord> {
        self.inner.read().records.iter().find(|r| r.step == leg).cloned()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Merges `update` into the state. A step change that goes backwards, or
    /// leaves `Error` for anything but `Idle`, is refused and nothing is
    /// written.
    pub fn update_state(&self, update: BridgeStateUpdate) -> Result<BridgeState> {
        let snapshot = {
            let mut inner = self.inner.write();
            let state = &mut inner.state;
            if let Some(next) = update.step {
                if !state.step.can_transition_to(next) {
                    return Err(BridgeError::InvalidTransition {
                        from: state.step.to_string(),
                        to: next.to_string(),
                    });
                }
                state.step = next;
            }
            if let Some(direction) = update.direction {
                state.direction = Some(direction);
            }
            if let Some(amount) = update.amount {
                state.amount = amount;
            }
            if let Some(error_message) = update.error_message {
                state.error_message = error_message;
            }
            state.clone()
        };

        debug!("Bridge state -> {}", snapshot.step);
        let _ = self.events.send(SessionEvent::StateChanged(snapshot.clone()));
        Ok(snapshot)
    }

    /// Inserts `record`, replacing an existing record for the same leg in place.
    pub fn add_transaction(&self, record: BridgeTransactionRecord) {
        {
            let mut inner = self.inner.write();
            match inner.records.iter_mut().find(|r| r.step == record.step) {
                Some(existing) => *existing = record.clone(),
                None => inner.records.push(record.clone()),
            }
        }
        let _ = self.events.send(SessionEvent::RecordUpserted(record));
    }

    /// Back to `Idle` with no records.
    pub fn reset(&self) {
        {
            let mut inner = self.inner.write();
            inner.state = BridgeState::default();
            inner.records.clear();
        }
        let _ = self.events.send(SessionEvent::Reset);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::bridge::{BridgeStep, Direction, TxRecordStatus};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_upsert_by_leg_keeps_position() {
        let session = BridgeSession::new();
        session.add_transaction(BridgeTransactionRecord::new(
            TransferLeg::First,
            TxRecordStatus::Starting,
            "Base",
            "Preparing",
        ));
        session.add_transaction(BridgeTransactionRecord::new(
            TransferLeg::Second,
            TxRecordStatus::Starting,
            "Torus EVM",
            "Preparing",
        ));
        session.add_transaction(BridgeTransactionRecord::new(
            TransferLeg::First,
            TxRecordStatus::Success,
            "Base",
            "Transfer complete",
        ));

        let records = session.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].step, TransferLeg::First);
        assert_eq!(records[0].status, TxRecordStatus::Success);
        assert_eq!(records[1].step, TransferLeg::Second);
    }

    #[test]
    fn test_backward_transition_refused() {
        let session = BridgeSession::new();
        session
            .update_state(BridgeStateUpdate {
                step: Some(BridgeStep::Step1Confirming),
                direction: Some(Direction::BaseToNative),
                amount: Some("10".into()),
                ..Default::default()
            })
            .unwrap();

        let err = session
            .update_state(BridgeStateUpdate::step(BridgeStep::Step1Signing))
            .unwrap_err();
        assert!(matches!(err, BridgeError::InvalidTransition { .. }));
        assert_eq!(session.state().step, BridgeStep::Step1Confirming);
    }

    #[test]
    fn test_error_only_leaves_through_reset() {
        let session = BridgeSession::new();
        session.update_state(BridgeStateUpdate::error("boom")).unwrap();
        assert!(session.update_state(BridgeStateUpdate::step(BridgeStep::Step2Preparing)).is_err());

        session.update_state(BridgeStateUpdate::step(BridgeStep::Idle)).unwrap();
        assert_eq!(session.state().step, BridgeStep::Idle);
    }

    #[tokio::test]
    async fn test_events_are_broadcast() {
        let session = BridgeSession::new();
        let mut events = session.subscribe();

        session.update_state(BridgeStateUpdate::step(BridgeStep::Step1Preparing)).unwrap();
        session.reset();

        match events.recv().await.unwrap() {
            SessionEvent::StateChanged(state) => assert_eq!(state.step, BridgeStep::Step1Preparing),
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(events.recv().await.unwrap(), SessionEvent::Reset);
        assert!(session.records().is_empty());
    }
}
