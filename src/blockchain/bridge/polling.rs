//! Balance-based transfer confirmation.
//!
//! The poller samples a destination balance on a fixed interval until it
//! reaches `baseline + expected_increase`. Two independent bounds apply: a
//! maximum number of ticks and a wall-clock timeout around the whole loop.
//! A cancellation token is checked on every tick and is cancelled however
//! the poll ends, so the interval never outlives the call.
//!
//! The check compares against an absolute target. Unrelated balance movement
//! during the poll (a withdrawal followed by a larger deposit) can therefore
//! satisfy it; this is an accepted approximation, not a transfer receipt.

use ethers::types::U256;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::blockchain::traits::BalanceReader;
use crate::core::config::BridgeConfig;
use crate::tools::async_support::TimeoutGuard;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PollMode {
    /// Target is `baseline + expected_increase`.
    ExactIncrease,
    /// Any increase over the baseline counts; used when relay fees make the
    /// delivered amount unpredictable.
    AnyIncrease,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PollFailure {
    /// `max_polls` ticks without reaching the target.
    MaxPolls,
    /// The wall-clock budget ran out.
    Timeout,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollingResult {
    pub success: bool,
    pub error_message: Option<String>,
    pub failure: Option<PollFailure>,
}

impl PollingResult {
    fn confirmed() -> Self {
        Self { success: true, error_message: None, failure: None }
    }

    fn failed(failure: PollFailure, message: String) -> Self {
        Self { success: false, error_message: Some(message), failure: Some(failure) }
    }
}

pub struct PollRequest<'a> {
    pub reader: &'a dyn BalanceReader,
    pub baseline: U256,
    pub expected_increase: U256,
    /// Chain name used in log lines and failure messages
    pub location_name: &'a str,
    pub mode: PollMode,
}

impl PollRequest<'_> {
    pub fn target(&self) -> U256 {
        match self.mode {
            PollMode::ExactIncrease => self.baseline.saturating_add(self.expected_increase),
            PollMode::AnyIncrease => self.baseline.saturating_add(U256::one()),
        }
    }
}

enum LoopExit {
    Reached(U256),
    Exhausted,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct BalancePoller {
    interval: Duration,
    max_polls: u32,
    operation_timeout: Duration,
}

impl BalancePoller {
    pub fn new(interval: Duration, max_polls: u32, operation_timeout: Duration) -> Self {
        Self { interval, max_polls, operation_timeout }
    }

    pub fn from_config(config: &BridgeConfig) -> Self {
        Self::new(
            config.polling.interval(),
            config.polling.max_polls,
            config.timeouts.polling_operation(),
        )
    }

    /// Polls until the target balance is observed, a bound is hit, or
    /// `cancel` fires. Never returns an error; failures are described by the
    /// returned `PollingResult`.
    pub async fn poll_balance_until_target(
        &self,
        request: PollRequest<'_>,
        cancel: &CancellationToken,
    ) -> PollingResult {
        let target = request.target();
        let location = request.location_name;
        info!(
            "Polling {} balance: baseline {}, target {}",
            location, request.baseline, target
        );

        let abort = cancel.child_token();
        let guard =
            TimeoutGuard::new(self.operation_timeout, format!("{} confirmation timeout", location));
        let outcome = guard.run(self.poll_loop(request.reader, target, location, &abort)).await;
        abort.cancel();

        match outcome {
            Ok(LoopExit::Reached(balance)) => {
                info!("{} balance reached {} (target {})", location, balance, target);
                PollingResult::confirmed()
            }
            Ok(LoopExit::Exhausted) => {
                warn!("{} balance did not reach target after {} polls", location, self.max_polls);
                PollingResult::failed(
                    PollFailure::MaxPolls,
                    format!("{} transfer did not confirm (check balance and retry)", location),
                )
            }
            Ok(LoopExit::Cancelled) => {
                debug!("{} balance polling cancelled", location);
                PollingResult::failed(
                    PollFailure::Cancelled,
                    format!("{} balance polling cancelled", location),
                )
            }
            Err(_) => PollingResult::failed(
                PollFailure::Timeout,
                format!("{} confirmation timeout - check balance and retry", location),
            ),
        }
    }

    async fn poll_loop(
        &self,
        reader: &dyn BalanceReader,
        target: U256,
        location: &str,
        abort: &CancellationToken,
    ) -> LoopExit {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut polls: u32 = 0;

        loop {
            tokio::select! {
                biased;
                _ = abort.cancelled() => return LoopExit::Cancelled,
                _ = ticker.tick() => {}
            }
            polls += 1;

            let response = tokio::select! {
                biased;
                _ = abort.cancelled() => return LoopExit::Cancelled,
                response = reader.refetch_balance() => response,
            };

            match response {
                Ok(response) => match response.usable_value() {
                    Some(balance) if balance >= target => return LoopExit::Reached(balance),
                    Some(balance) => debug!(
                        "{} poll {}/{}: balance {}",
                        location, polls, self.max_polls, balance
                    ),
                    None => debug!(
                        "{} poll {}/{}: no usable balance",
                        location, polls, self.max_polls
                    ),
                },
                Err(e) => warn!("{} poll {}/{} failed: {}", location, polls, self.max_polls, e),
            }

            if polls >= self.max_polls {
                return LoopExit::Exhausted;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::traits::BalanceResponse;
    use crate::core::errors::ProviderError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Growing {
        calls: AtomicUsize,
        step: u64,
    }

    #[async_trait]
    impl BalanceReader for Growing {
        async fn refetch_balance(&self) -> Result<BalanceResponse, ProviderError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) as u64 + 1;
            Ok(BalanceResponse::success(U256::from(n * self.step)))
        }
    }

    #[test]
    fn test_target_by_mode() {
        let reader = Growing { calls: AtomicUsize::new(0), step: 1 };
        let mut request = PollRequest {
            reader: &reader,
            baseline: U256::from(100u64),
            expected_increase: U256::from(10u64),
            location_name: "Base",
            mode: PollMode::ExactIncrease,
        };
        assert_eq!(request.target(), U256::from(110u64));
        request.mode = PollMode::AnyIncrease;
        assert_eq!(request.target(), U256::from(101u64));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reaches_target_on_third_tick() {
        let reader = Growing { calls: AtomicUsize::new(0), step: 5 };
        let poller = BalancePoller::new(Duration::from_secs(5), 10, Duration::from_secs(60));
        let started = Instant::now();

        let result = poller
            .poll_balance_until_target(
                PollRequest {
                    reader: &reader,
                    baseline: U256::zero(),
                    expected_increase: U256::from(15u64),
                    location_name: "Torus EVM",
                    mode: PollMode::ExactIncrease,
                },
                &CancellationToken::new(),
            )
            .await;

        assert!(result.success);
        assert_eq!(reader.calls.load(Ordering::SeqCst), 3);
        assert_eq!(started.elapsed(), Duration::from_secs(15));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_by_caller() {
        let reader = Growing { calls: AtomicUsize::new(0), step: 0 };
        let poller = BalancePoller::new(Duration::from_secs(5), 10, Duration::from_secs(60));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = poller
            .poll_balance_until_target(
                PollRequest {
                    reader: &reader,
                    baseline: U256::zero(),
                    expected_increase: U256::one(),
                    location_name: "Base",
                    mode: PollMode::AnyIncrease,
                },
                &cancel,
            )
            .await;

        assert_eq!(result.failure, Some(PollFailure::Cancelled));
        assert_eq!(reader.calls.load(Ordering::SeqCst), 0);
    }
}
