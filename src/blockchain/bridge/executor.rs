//! Bridge step orchestration.
//!
//! A transfer is two legs run strictly in order. Each leg goes through
//! prepare, an optional network switch, sign and submit, then confirmation,
//! and records every phase in the `BridgeSession`. A wallet rejection ends
//! the leg quietly (`StepOutcome::Rejected`); any other failure puts the
//! session in `Error` first and is then returned as `Err`.

use ethers::types::U256;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::base_to_native;
use super::chain_switch::ChainSwitchRetrier;
use super::native_to_base;
use super::polling::{BalancePoller, PollFailure, PollMode, PollRequest};
use super::session::BridgeSession;
use super::{
    BridgeState, BridgeStateUpdate, BridgeStep, BridgeTransactionRecord, Direction, TransferLeg,
    TxRecordStatus,
};
use crate::blockchain::extrinsic::{
    ModuleErrorRegistry, RuntimeOutcome, TrackedTransaction, TransactionLifecycleTracker,
    TxEventKind,
};
use crate::blockchain::traits::{
    BalanceReader, EvmWallet, EvmWithdrawal, NativeChain, RelayReceipt, RelayTransfer,
    RelayTransferRequest,
};
use crate::core::config::BridgeConfig;
use crate::core::error_classifier::{format_error_for_user, is_user_rejection};
use crate::core::errors::{BridgeError, ProviderError, Result, TimeoutError, TxFailure};
use crate::core::validation::to_base_units;
use crate::tools::async_support::TimeoutGuard;

pub(super) const BASE: &str = "Base";
pub(super) const TORUS_EVM: &str = "Torus EVM";
pub(super) const NATIVE: &str = "Torus";

pub(super) const REJECTED_BY_USER: &str = "Transaction rejected by user";

/// Capabilities the executor drives. All of them are opaque to the bridge.
#[derive(Clone)]
pub struct BridgeProviders {
    pub wallet: Arc<dyn EvmWallet>,
    pub relay: Arc<dyn RelayTransfer>,
    pub withdrawal: Arc<dyn EvmWithdrawal>,
    pub native: Arc<dyn NativeChain>,
    pub base_balance: Arc<dyn BalanceReader>,
    pub torus_evm_balance: Arc<dyn BalanceReader>,
    pub native_balance: Arc<dyn BalanceReader>,
    /// The user's EVM account, the same on Base and Torus EVM
    pub evm_address: String,
    /// The user's native (SS58) account
    pub native_address: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Completed,
    /// The user declined in the wallet; the session is in `Error` with a
    /// rejection message.
    Rejected,
}

#[derive(Debug, Clone)]
struct FailedStep {
    direction: Direction,
    leg: TransferLeg,
    amount: String,
}

/// Inputs of one leg run.
pub(super) struct RunContext {
    pub direction: Direction,
    pub leg: TransferLeg,
    pub amount: String,
    pub units: U256,
    pub cancel: CancellationToken,
}

/// Why a leg stopped, with what to show for it.
pub(super) struct StepFailure {
    pub chain_name: &'static str,
    pub message: String,
    pub details: Option<String>,
    pub tx_hash: Option<String>,
    pub error: BridgeError,
}

impl StepFailure {
    pub fn new(chain_name: &'static str, message: impl Into<String>, error: BridgeError) -> Self {
        Self { chain_name, message: message.into(), details: None, tx_hash: None, error }
    }

    /// Wallet rejections get `rejected_message`, anything else `failed_message`.
    pub fn from_error(
        chain_name: &'static str,
        rejected_message: &str,
        failed_message: &str,
        error: BridgeError,
    ) -> Self {
        if error.is_user_rejection() {
            Self::new(
                chain_name,
                rejected_message,
                BridgeError::UserRejected(rejected_message.into()),
            )
        } else {
            Self::new(chain_name, failed_message, error)
        }
    }

    pub fn with_tx_hash(mut self, tx_hash: Option<String>) -> Self {
        self.tx_hash = tx_hash;
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    fn details(&self) -> String {
        match (&self.details, &self.error) {
            (Some(details), _) => details.clone(),
            (None, BridgeError::Provider(e)) => format_error_for_user(e),
            (None, other) => other.to_string(),
        }
    }
}

pub(super) type StepResult<T> = std::result::Result<T, StepFailure>;

pub struct BridgeStepExecutor {
    pub(super) config: BridgeConfig,
    pub(super) providers: BridgeProviders,
    pub(super) session: BridgeSession,
    pub(super) tracker: TransactionLifecycleTracker,
    switcher: ChainSwitchRetrier,
    poller: BalancePoller,
    cancel: Mutex<CancellationToken>,
    running: tokio::sync::Mutex<()>,
    last_failed: Mutex<Option<FailedStep>>,
}

impl BridgeStepExecutor {
    pub fn new(config: BridgeConfig, providers: BridgeProviders) -> Self {
        let tracker = TransactionLifecycleTracker::new(providers.native.clone(), "Bridge transfer");
        Self {
            switcher: ChainSwitchRetrier::from_config(&config),
            poller: BalancePoller::from_config(&config),
            config,
            providers,
            session: BridgeSession::new(),
            tracker,
            cancel: Mutex::new(CancellationToken::new()),
            running: tokio::sync::Mutex::new(()),
            last_failed: Mutex::new(None),
        }
    }

    /// Resolves pallet errors of failed native transactions through `registry`.
    pub fn with_error_registry(mut self, registry: Arc<dyn ModuleErrorRegistry>) -> Self {
        self.tracker =
            TransactionLifecycleTracker::new(self.providers.native.clone(), "Bridge transfer")
                .with_registry(registry);
        self
    }

    pub fn session(&self) -> &BridgeSession {
        &self.session
    }

    pub fn tracker(&self) -> &TransactionLifecycleTracker {
        &self.tracker
    }

    pub fn state(&self) -> BridgeState {
        self.session.state()
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Runs both legs; leg 2 starts only once leg 1 completed.
    /// The executor stays busy for the whole transfer, not just per leg.
    pub async fn execute_transfer(
        &self,
        direction: Direction,
        amount: &str,
    ) -> Result<StepOutcome> {
        let _running = self.try_begin()?;
        info!("Starting {} bridge transfer of {}", direction, amount);
        if self.run_leg(direction, TransferLeg::First, amount).await? == StepOutcome::Rejected {
            return Ok(StepOutcome::Rejected);
        }
        self.run_leg(direction, TransferLeg::Second, amount).await
    }

    /// Runs a single leg. Leg 1 starts a new transfer and clears the session;
    /// leg 2 needs leg 1 of the same direction completed (or an idle session).
    pub async fn execute_step(
        &self,
        direction: Direction,
        leg: TransferLeg,
        amount: &str,
    ) -> Result<StepOutcome> {
        let _running = self.try_begin()?;
        self.run_leg(direction, leg, amount).await
    }

    /// Clears the error and re-runs the leg that failed. A failed leg 1 is
    /// followed by leg 2 as usual; a failed leg 2 is re-run alone, so leg 1
    /// funds are never sent twice.
    pub async fn retry_from_failed_step(&self) -> Result<StepOutcome> {
        let _running = self.try_begin()?;
        let failed = self
            .last_failed
            .lock()
            .clone()
            .ok_or_else(|| BridgeError::InvalidInput("No failed bridge step to retry".into()))?;

        info!("Retrying leg {} of {} transfer", failed.leg.number(), failed.direction);
        self.session.reset();
        self.tracker.reset();

        let outcome = self.run_leg(failed.direction, failed.leg, &failed.amount).await?;
        if failed.leg == TransferLeg::First && outcome == StepOutcome::Completed {
            return self.run_leg(failed.direction, TransferLeg::Second, &failed.amount).await;
        }
        Ok(outcome)
    }

    /// Stops whatever is running (poll loop, native tracker) and clears the
    /// session.
    pub fn reset(&self) {
        let previous = std::mem::replace(&mut *self.cancel.lock(), CancellationToken::new());
        previous.cancel();
        self.tracker.reset();
        self.session.reset();
        *self.last_failed.lock() = None;
        info!("Bridge session reset");
    }

    fn try_begin(&self) -> Result<tokio::sync::MutexGuard<'_, ()>> {
        self.running
            .try_lock()
            .map_err(|_| BridgeError::InvalidInput("A bridge step is already running".into()))
    }

    async fn run_leg(
        &self,
        direction: Direction,
        leg: TransferLeg,
        amount: &str,
    ) -> Result<StepOutcome> {
        let units = to_base_units(amount, self.config.chains.decimals)?;

        match leg {
            TransferLeg::First => self.session.reset(),
            TransferLeg::Second => {
                let state = self.session.state();
                let resumable = state.step == BridgeStep::Idle
                    || (state.step == BridgeStep::Step1Complete
                        && state.direction == Some(direction));
                if !resumable {
                    return Err(BridgeError::InvalidTransition {
                        from: state.step.to_string(),
                        to: BridgeStep::Step2Preparing.to_string(),
                    });
                }
            }
        }

        let ctx = RunContext {
            direction,
            leg,
            amount: amount.trim().to_string(),
            units,
            cancel: self.cancel.lock().clone(),
        };

        let result = match (direction, leg) {
            (Direction::BaseToNative, TransferLeg::First) => {
                base_to_native::base_to_torus_evm(self, &ctx).await
            }
            (Direction::BaseToNative, TransferLeg::Second) => {
                base_to_native::torus_evm_to_native(self, &ctx).await
            }
            (Direction::NativeToBase, TransferLeg::First) => {
                native_to_base::native_to_torus_evm(self, &ctx).await
            }
            (Direction::NativeToBase, TransferLeg::Second) => {
                native_to_base::torus_evm_to_base(self, &ctx).await
            }
        };

        match result {
            Ok(()) => {
                *self.last_failed.lock() = None;
                info!("Leg {} of {} transfer complete", leg.number(), direction);
                Ok(StepOutcome::Completed)
            }
            Err(failure) => self.handle_failure(&ctx, failure),
        }
    }

    fn handle_failure(&self, ctx: &RunContext, failure: StepFailure) -> Result<StepOutcome> {
        if ctx.cancel.is_cancelled() {
            debug!("Leg {} stopped by reset", ctx.leg.number());
            return Err(BridgeError::Cancelled(format!("Leg {} was reset", ctx.leg.number())));
        }

        *self.last_failed.lock() = Some(FailedStep {
            direction: ctx.direction,
            leg: ctx.leg,
            amount: ctx.amount.clone(),
        });

        let rejected = failure.error.is_user_rejection();
        let details = if rejected { None } else { Some(failure.details()) };
        self.session.add_transaction(
            BridgeTransactionRecord::new(
                ctx.leg,
                TxRecordStatus::Error,
                failure.chain_name,
                &failure.message,
            )
            .with_tx(failure.tx_hash.clone(), failure.chain_name)
            .with_error_details(details),
        );
        if let Err(e) = self.session.update_state(BridgeStateUpdate::error(&failure.message)) {
            warn!("Could not record bridge error state: {}", e);
        }

        if rejected {
            info!("Leg {} rejected by user: {}", ctx.leg.number(), failure.message);
            Ok(StepOutcome::Rejected)
        } else {
            error!("Leg {} failed: {} ({})", ctx.leg.number(), failure.message, failure.error);
            Err(failure.error)
        }
    }

    /// Moves to the first step of a leg and records it as starting.
    pub(super) fn begin_leg(
        &self,
        ctx: &RunContext,
        step: BridgeStep,
        chain_name: &'static str,
        message: &str,
    ) -> StepResult<()> {
        self.apply(
            ctx,
            BridgeStateUpdate {
                step: Some(step),
                direction: Some(ctx.direction),
                amount: Some(ctx.amount.clone()),
                error_message: Some(None),
            },
            chain_name,
        )?;
        self.upsert(
            ctx,
            BridgeTransactionRecord::new(ctx.leg, TxRecordStatus::Starting, chain_name, message),
        );
        Ok(())
    }

    pub(super) fn advance_to(
        &self,
        ctx: &RunContext,
        step: BridgeStep,
        chain_name: &'static str,
    ) -> StepResult<()> {
        self.apply(ctx, BridgeStateUpdate::step(step), chain_name)
    }

    fn apply(
        &self,
        ctx: &RunContext,
        update: BridgeStateUpdate,
        chain_name: &'static str,
    ) -> StepResult<()> {
        if ctx.cancel.is_cancelled() {
            return Err(StepFailure::new(
                chain_name,
                "Bridge transfer was reset",
                BridgeError::Cancelled("session reset".into()),
            ));
        }
        self.session
            .update_state(update)
            .map(|_| ())
            .map_err(|e| StepFailure::new(chain_name, "Unexpected bridge state", e))
    }

    pub(super) fn upsert(&self, ctx: &RunContext, record: BridgeTransactionRecord) {
        if !ctx.cancel.is_cancelled() {
            self.session.add_transaction(record);
        }
    }

    pub(super) async fn ensure_chain(
        &self,
        chain_id: u64,
        chain_name: &'static str,
    ) -> StepResult<()> {
        let result = self
            .switcher
            .switch_chain_with_retry(self.providers.wallet.as_ref(), chain_id, chain_name)
            .await;
        let message = result.error_message.clone();
        let details = result.error_details.clone();
        result.into_result().map_err(|error| {
            let mut failure = StepFailure::new(
                chain_name,
                message.unwrap_or_else(|| format!("Unable to switch to {}", chain_name)),
                error,
            );
            failure.details = details;
            failure
        })
    }

    /// Whether the wallet must change network to reach `chain_id`. An
    /// unreadable chain id counts as a mismatch.
    pub(super) async fn needs_switch(&self, chain_id: u64) -> bool {
        let guard = TimeoutGuard::new(
            self.config.timeouts.default_operation(),
            "Chain id query timed out",
        );
        match guard.run(self.providers.wallet.current_chain_id()).await {
            Ok(Ok(current)) => current != chain_id,
            Ok(Err(e)) => {
                debug!("Could not read wallet chain id: {}", e);
                true
            }
            Err(_) => true,
        }
    }

    /// Best effort: puts the wallet back on the leg's origin chain. Failures
    /// are logged and otherwise ignored.
    pub(super) async fn return_to_origin(&self, chain_id: u64, chain_name: &'static str) {
        let result = self
            .switcher
            .switch_chain_with_retry(self.providers.wallet.as_ref(), chain_id, chain_name)
            .await;
        if !result.success {
            warn!(
                "Could not switch back to {}: {}",
                chain_name,
                result.error_message.unwrap_or_default()
            );
        }
    }

    /// Current balance, used as the confirmation baseline.
    pub(super) async fn read_balance(
        &self,
        reader: &dyn BalanceReader,
        chain_name: &'static str,
    ) -> StepResult<U256> {
        let guard = TimeoutGuard::new(
            self.config.timeouts.default_operation(),
            format!("{} balance query timed out", chain_name),
        );
        let unreadable = |error: BridgeError| {
            StepFailure::new(chain_name, format!("Unable to read {} balance", chain_name), error)
        };

        let response = guard
            .run(reader.refetch_balance())
            .await
            .map_err(|e| unreadable(e.into()))?
            .map_err(|e| unreadable(e.into()))?;
        response.usable_value().ok_or_else(|| {
            unreadable(BridgeError::Provider(ProviderError::new("Balance query returned no data")))
        })
    }

    pub(super) async fn trigger_relay(
        &self,
        request: RelayTransferRequest,
        chain_name: &'static str,
        failed_message: &str,
    ) -> StepResult<RelayReceipt> {
        info!(
            "Relaying {} from {} to {} for {}",
            request.amount, request.origin, request.destination, request.recipient
        );
        let guard = TimeoutGuard::new(
            self.config.timeouts.default_operation(),
            "Relay transfer timed out",
        );
        match guard.run(self.providers.relay.trigger_relay_transfer(request)).await {
            Ok(Ok(receipt)) => Ok(receipt),
            Ok(Err(e)) => Err(provider_failure(chain_name, failed_message, e)),
            Err(timeout) => Err(StepFailure::new(chain_name, failed_message, timeout.into())),
        }
    }

    /// Polls `reader` until it grew by the leg amount (or by anything, in
    /// `AnyIncrease` mode).
    pub(super) async fn confirm_by_balance(
        &self,
        ctx: &RunContext,
        reader: &dyn BalanceReader,
        baseline: U256,
        mode: PollMode,
        location_name: &'static str,
    ) -> StepResult<()> {
        let result = self
            .poller
            .poll_balance_until_target(
                PollRequest {
                    reader,
                    baseline,
                    expected_increase: ctx.units,
                    location_name,
                    mode,
                },
                &ctx.cancel,
            )
            .await;
        if result.success {
            return Ok(());
        }

        let message = result
            .error_message
            .unwrap_or_else(|| format!("{} transfer did not confirm", location_name));
        let error = match result.failure {
            Some(PollFailure::Timeout) => BridgeError::Timeout(TimeoutError {
                label: message.clone(),
                duration: self.config.timeouts.polling_operation(),
            }),
            Some(PollFailure::Cancelled) => BridgeError::Cancelled(message.clone()),
            _ => BridgeError::ConfirmationFailed(message.clone()),
        };
        Err(StepFailure::new(location_name, message, error))
    }

    /// Waits for the native transaction to finalize successfully, within the
    /// default operation timeout. Returns the finalized block hash.
    ///
    /// Decided per received event: a retraction keeps waiting for the
    /// extrinsic to land again, only terminal failures end the wait.
    pub(super) async fn wait_for_finalization(
        &self,
        tracked: &mut TrackedTransaction,
    ) -> Result<String> {
        let guard = TimeoutGuard::new(
            self.config.timeouts.default_operation(),
            "Native bridge transaction timeout",
        );
        guard
            .run(async {
                let mut last_failure = None;
                while let Some(event) = tracked.next_event().await {
                    if let TxEventKind::Finalized { block_hash, outcome: RuntimeOutcome::Success } =
                        &event.kind
                    {
                        return Ok(block_hash.clone());
                    }
                    let failure = self.tracker.failure_for(&event);
                    if event.kind.is_terminal() {
                        let error = failure.unwrap_or_else(|| {
                            TxFailure::Internal(format!("Unexpected {} status", event.kind.name()))
                        });
                        return Err(BridgeError::Transaction(error));
                    }
                    if let Some(failure) = failure {
                        warn!(
                            "Native bridge transaction {}, waiting for it to land again",
                            failure
                        );
                        last_failure = Some(failure);
                    }
                }
                Err(match last_failure {
                    Some(failure) => BridgeError::Transaction(failure),
                    None => BridgeError::Cancelled(
                        "Transaction tracking ended before finalization".into(),
                    ),
                })
            })
            .await?
    }
}

/// Maps a capability error to a step failure, telling rejections apart.
fn provider_failure(
    chain_name: &'static str,
    failed_message: &str,
    error: ProviderError,
) -> StepFailure {
    if is_user_rejection(&error) {
        StepFailure::new(
            chain_name,
            REJECTED_BY_USER,
            BridgeError::UserRejected(REJECTED_BY_USER.into()),
        )
    } else {
        StepFailure::new(chain_name, failed_message, BridgeError::Provider(error))
    }
}
