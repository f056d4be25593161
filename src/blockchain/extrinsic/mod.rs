//! Native-chain extrinsic status: events, dispatch errors, subscriptions and
//! the lifecycle tracker that folds them into a displayable stage.

pub mod dispatch;
pub mod events;
pub mod lifecycle;
pub mod subscription;

pub use dispatch::{
    map_dispatch_error_to_message, DispatchError, ModuleError, ModuleErrorMeta,
    ModuleErrorRegistry, StaticErrorRegistry,
};
pub use events::{RuntimeOutcome, TxEvent, TxEventGroup, TxEventKind};
pub use lifecycle::{TrackedTransaction, TransactionLifecycleTracker, TxHelper, TxStage};
pub use subscription::{extrinsic_channel, ExtrinsicTracker, TrackerHandle};
