//! Native -> Torus EVM -> Base.

use super::executor::{
    BridgeStepExecutor, RunContext, StepFailure, StepResult, BASE, NATIVE, REJECTED_BY_USER,
    TORUS_EVM,
};
use super::polling::PollMode;
use super::{BridgeStep, BridgeTransactionRecord, TxRecordStatus};
use crate::blockchain::traits::{NativeTransfer, RelayTransferRequest};
use tracing::info;

/// Leg 1: native transfer to the user's Torus EVM account. Confirmed first by
/// finalization of the extrinsic, then by the Torus EVM balance.
pub(super) async fn native_to_torus_evm(
    exec: &BridgeStepExecutor,
    ctx: &RunContext,
) -> StepResult<()> {
    exec.begin_leg(
        ctx,
        BridgeStep::Step1Preparing,
        NATIVE,
        "Preparing Native → Torus EVM bridge",
    )?;
    let baseline = exec.read_balance(exec.providers.torus_evm_balance.as_ref(), TORUS_EVM).await?;

    exec.advance_to(ctx, BridgeStep::Step1Signing, NATIVE)?;
    exec.upsert(
        ctx,
        BridgeTransactionRecord::new(
            ctx.leg,
            TxRecordStatus::Signing,
            NATIVE,
            "Signing transaction...",
        ),
    );
    let mut tracked = exec
        .tracker
        .send_tx(NativeTransfer {
            destination: exec.providers.evm_address.clone(),
            amount: ctx.units,
        })
        .await
        .map_err(|e| {
            StepFailure::from_error(
                NATIVE,
                REJECTED_BY_USER,
                "Failed to bridge from Native to Torus EVM",
                e,
            )
        })?;
    let tx_hash = tracked.tx_hash().map(str::to_string);

    exec.advance_to(ctx, BridgeStep::Step1Confirming, NATIVE)?;
    exec.upsert(
        ctx,
        BridgeTransactionRecord::new(
            ctx.leg,
            TxRecordStatus::Confirming,
            NATIVE,
            "Waiting for confirmation...",
        )
        .with_tx(tx_hash.clone(), NATIVE),
    );
    match exec.wait_for_finalization(&mut tracked).await {
        Ok(block_hash) => info!("Native bridge transaction finalized in {}", block_hash),
        Err(e) => {
            let message = if e.is_timeout() {
                "Native bridge transaction timeout - please retry"
            } else {
                "Native bridge transaction failed"
            };
            let details = e.to_string();
            return Err(StepFailure::new(NATIVE, message, e)
                .with_details(details)
                .with_tx_hash(tx_hash));
        }
    }

    exec.confirm_by_balance(
        ctx,
        exec.providers.torus_evm_balance.as_ref(),
        baseline,
        PollMode::ExactIncrease,
        TORUS_EVM,
    )
    .await
    .map_err(|f| {
        let details = f.message.clone();
        StepFailure {
            message: "Bridge confirmation timeout - tokens may not have arrived in Torus EVM"
                .to_string(),
            ..f
        }
        .with_details(details)
        .with_tx_hash(tx_hash.clone())
    })?;

    exec.advance_to(ctx, BridgeStep::Step1Complete, NATIVE)?;
    exec.upsert(
        ctx,
        BridgeTransactionRecord::new(ctx.leg, TxRecordStatus::Success, NATIVE, "Transfer complete")
            .with_tx(tx_hash, NATIVE),
    );
    Ok(())
}

/// Leg 2: relay from Torus EVM to Base. Relay fees are taken from the
/// transferred amount, so any Base balance increase confirms it.
pub(super) async fn torus_evm_to_base(
    exec: &BridgeStepExecutor,
    ctx: &RunContext,
) -> StepResult<()> {
    let chains = &exec.config.chains;

    exec.begin_leg(
        ctx,
        BridgeStep::Step2Preparing,
        TORUS_EVM,
        "Preparing Torus EVM → Base transfer",
    )?;
    if exec.needs_switch(chains.torus_evm_chain_id).await {
        exec.advance_to(ctx, BridgeStep::Step2Switching, TORUS_EVM)?;
        exec.upsert(
            ctx,
            BridgeTransactionRecord::new(
                ctx.leg,
                TxRecordStatus::Starting,
                TORUS_EVM,
                "Switching to Torus EVM chain...",
            ),
        );
        exec.ensure_chain(chains.torus_evm_chain_id, TORUS_EVM).await?;
    }
    let baseline = exec.read_balance(exec.providers.base_balance.as_ref(), BASE).await?;

    exec.advance_to(ctx, BridgeStep::Step2Signing, TORUS_EVM)?;
    exec.upsert(
        ctx,
        BridgeTransactionRecord::new(
            ctx.leg,
            TxRecordStatus::Signing,
            TORUS_EVM,
            "Signing transaction...",
        ),
    );
    let receipt = exec
        .trigger_relay(
            RelayTransferRequest {
                origin: "torus".to_string(),
                destination: "base".to_string(),
                token_index: chains.torus_token_index,
                amount: ctx.amount.clone(),
                recipient: exec.providers.evm_address.clone(),
            },
            TORUS_EVM,
            "Failed to execute Torus EVM → Base transfer",
        )
        .await?;
    let tx_hash = receipt.hash;

    exec.advance_to(ctx, BridgeStep::Step2Confirming, BASE)?;
    exec.upsert(
        ctx,
        BridgeTransactionRecord::new(
            ctx.leg,
            TxRecordStatus::Confirming,
            BASE,
            "Waiting for confirmation...",
        )
        .with_tx(tx_hash.clone(), TORUS_EVM),
    );
    exec.confirm_by_balance(
        ctx,
        exec.providers.base_balance.as_ref(),
        baseline,
        PollMode::AnyIncrease,
        BASE,
    )
    .await
    .map_err(|f| f.with_tx_hash(tx_hash.clone()))?;

    exec.advance_to(ctx, BridgeStep::Complete, TORUS_EVM)?;
    exec.upsert(
        ctx,
        BridgeTransactionRecord::new(
            ctx.leg,
            TxRecordStatus::Success,
            TORUS_EVM,
            "Transfer complete",
        )
        .with_tx(tx_hash, TORUS_EVM),
    );
    exec.return_to_origin(chains.torus_evm_chain_id, TORUS_EVM).await;
    Ok(())
}
