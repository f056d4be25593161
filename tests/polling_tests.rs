// tests/polling_tests.rs

mod util;

use ethers::types::U256;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use torus_bridge::blockchain::bridge::mock::ScriptedBalance;
use torus_bridge::blockchain::bridge::{BalancePoller, PollFailure, PollMode, PollRequest};
use torus_bridge::blockchain::traits::{Balance, BalanceResponse, FetchStatus};
use torus_bridge::core::errors::ProviderError;
use util::torus;

fn poller(max_polls: u32, timeout: Duration) -> BalancePoller {
    BalancePoller::new(Duration::from_secs(5), max_polls, timeout)
}

fn exact(reader: &ScriptedBalance, baseline: U256, increase: U256) -> PollRequest<'_> {
    PollRequest {
        reader,
        baseline,
        expected_increase: increase,
        location_name: "Torus EVM",
        mode: PollMode::ExactIncrease,
    }
}

#[tokio::test(start_paused = true)]
async fn gives_up_after_max_polls_and_stops_polling() {
    let reader = ScriptedBalance::constant(torus(5));
    let started = Instant::now();

    let result = poller(4, Duration::from_secs(3_600))
        .poll_balance_until_target(exact(&reader, torus(5), torus(10)), &CancellationToken::new())
        .await;

    assert!(!result.success);
    assert_eq!(result.failure, Some(PollFailure::MaxPolls));
    assert_eq!(
        result.error_message.as_deref(),
        Some("Torus EVM transfer did not confirm (check balance and retry)")
    );
    assert_eq!(reader.calls(), 4);
    assert_eq!(started.elapsed(), Duration::from_secs(20));

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(reader.calls(), 4);
}

#[tokio::test(start_paused = true)]
async fn wall_clock_timeout_wins_over_remaining_polls() {
    let reader = ScriptedBalance::constant(U256::zero());

    let result = poller(100, Duration::from_secs(12))
        .poll_balance_until_target(
            exact(&reader, U256::zero(), U256::one()),
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(result.failure, Some(PollFailure::Timeout));
    assert_eq!(
        result.error_message.as_deref(),
        Some("Torus EVM confirmation timeout - check balance and retry")
    );
    assert_eq!(reader.calls(), 2);

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(reader.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn failed_reads_are_skipped() {
    let reader = ScriptedBalance::new(vec![
        Err(ProviderError::new("rpc unavailable")),
        Ok(BalanceResponse::error()),
        Ok(BalanceResponse::success(torus(15))),
    ]);

    let result = poller(10, Duration::from_secs(60))
        .poll_balance_until_target(exact(&reader, torus(5), torus(10)), &CancellationToken::new())
        .await;

    assert!(result.success);
    assert_eq!(reader.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn any_increase_accepts_a_fee_reduced_delivery() {
    let reader = ScriptedBalance::values(&[torus(100), torus(100) + U256::from(7u64)]);

    let result = poller(10, Duration::from_secs(60))
        .poll_balance_until_target(
            PollRequest {
                reader: &reader,
                baseline: torus(100),
                expected_increase: torus(10),
                location_name: "Base",
                mode: PollMode::AnyIncrease,
            },
            &CancellationToken::new(),
        )
        .await;

    assert!(result.success);
    assert_eq!(reader.calls(), 2);
}

// The check is against an absolute target, so a dip followed by a larger
// rise confirms even though less than the expected amount arrived net.
#[tokio::test(start_paused = true)]
async fn unrelated_movement_can_reach_the_target() {
    let reader = ScriptedBalance::values(&[torus(2), torus(16)]);

    let result = poller(10, Duration::from_secs(60))
        .poll_balance_until_target(exact(&reader, torus(5), torus(10)), &CancellationToken::new())
        .await;

    assert!(result.success);
}

#[tokio::test(start_paused = true)]
async fn cancelling_mid_poll_stops_the_loop() {
    let reader = ScriptedBalance::constant(U256::zero());
    let cancel = CancellationToken::new();
    let poller = poller(100, Duration::from_secs(3_600));

    let polling =
        poller.poll_balance_until_target(exact(&reader, U256::zero(), U256::one()), &cancel);
    let stopper = async {
        tokio::time::sleep(Duration::from_millis(11_000)).await;
        cancel.cancel();
    };
    let (result, ()) = tokio::join!(polling, stopper);

    assert_eq!(result.failure, Some(PollFailure::Cancelled));
    assert_eq!(reader.calls(), 2);
}

fn response() -> impl Strategy<Value = Result<BalanceResponse, ProviderError>> {
    prop_oneof![
        (0u64..40).prop_map(|v| Ok(BalanceResponse::success(U256::from(v)))),
        (0u64..40).prop_map(|v| Ok(BalanceResponse {
            status: FetchStatus::Pending,
            data: Some(Balance { value: U256::from(v) }),
        })),
        // error status never counts, whatever data it carries
        Just(Ok(BalanceResponse {
            status: FetchStatus::Error,
            data: Some(Balance { value: U256::from(1_000u64) }),
        })),
        Just(Err(ProviderError::new("rpc unavailable"))),
    ]
}

fn usable(response: &Result<BalanceResponse, ProviderError>) -> Option<U256> {
    response.as_ref().ok().and_then(BalanceResponse::usable_value)
}

proptest! {
    #[test]
    fn confirms_iff_a_usable_sample_reaches_target(
        script in proptest::collection::vec(response(), 1..8),
        baseline in 0u64..20,
        increase in 1u64..20,
    ) {
        let max_polls = script.len() as u32;
        let target = U256::from(baseline + increase);
        let reached_at = script
            .iter()
            .position(|r| usable(r).map_or(false, |v| v >= target));

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()
            .unwrap();
        let reader = ScriptedBalance::new(script);

        let result = runtime.block_on(
            poller(max_polls, Duration::from_secs(3_600)).poll_balance_until_target(
                exact(&reader, U256::from(baseline), U256::from(increase)),
                &CancellationToken::new(),
            ),
        );

        prop_assert_eq!(result.success, reached_at.is_some());
        prop_assert_eq!(reader.calls(), reached_at.map_or(max_polls as usize, |i| i + 1));
        if !result.success {
            prop_assert_eq!(result.failure, Some(PollFailure::MaxPolls));
        }
    }
}
