//! Base -> Torus EVM -> Native.

use super::executor::{
    BridgeStepExecutor, RunContext, StepFailure, StepResult, BASE, NATIVE, TORUS_EVM,
};
use super::polling::PollMode;
use super::{BridgeStep, BridgeTransactionRecord, TxRecordStatus};
use crate::blockchain::traits::RelayTransferRequest;
use crate::tools::async_support::TimeoutGuard;

/// Leg 1: relay from Base to Torus EVM, confirmed by the Torus EVM balance.
pub(super) async fn base_to_torus_evm(
    exec: &BridgeStepExecutor,
    ctx: &RunContext,
) -> StepResult<()> {
    let chains = &exec.config.chains;

    exec.begin_leg(ctx, BridgeStep::Step1Preparing, BASE, "Preparing Base → Torus EVM transfer")?;
    exec.ensure_chain(chains.base_chain_id, BASE).await?;
    let baseline = exec.read_balance(exec.providers.torus_evm_balance.as_ref(), TORUS_EVM).await?;

    exec.advance_to(ctx, BridgeStep::Step1Signing, BASE)?;
    exec.upsert(
        ctx,
        BridgeTransactionRecord::new(
            ctx.leg,
            TxRecordStatus::Signing,
            BASE,
            "Signing transaction...",
        ),
    );
    let receipt = exec
        .trigger_relay(
            RelayTransferRequest {
                origin: "base".to_string(),
                destination: "torus".to_string(),
                token_index: chains.base_token_index,
                amount: ctx.amount.clone(),
                recipient: exec.providers.evm_address.clone(),
            },
            BASE,
            "Failed to execute Base → Torus EVM transfer",
        )
        .await?;
    let tx_hash = receipt.hash;

    exec.advance_to(ctx, BridgeStep::Step1Confirming, TORUS_EVM)?;
    exec.upsert(
        ctx,
        BridgeTransactionRecord::new(
            ctx.leg,
            TxRecordStatus::Confirming,
            TORUS_EVM,
            "Waiting for confirmation...",
        )
        .with_tx(tx_hash.clone(), BASE),
    );
    exec.confirm_by_balance(
        ctx,
        exec.providers.torus_evm_balance.as_ref(),
        baseline,
        PollMode::ExactIncrease,
        TORUS_EVM,
    )
    .await
    .map_err(|f| f.with_tx_hash(tx_hash.clone()))?;

    exec.advance_to(ctx, BridgeStep::Step1Complete, BASE)?;
    exec.upsert(
        ctx,
        BridgeTransactionRecord::new(ctx.leg, TxRecordStatus::Success, BASE, "Transfer complete")
            .with_tx(tx_hash, BASE),
    );
    exec.return_to_origin(chains.base_chain_id, BASE).await;
    Ok(())
}

/// Leg 2: withdraw from Torus EVM to the native account, confirmed by the
/// native balance.
pub(super) async fn torus_evm_to_native(
    exec: &BridgeStepExecutor,
    ctx: &RunContext,
) -> StepResult<()> {
    let chains = &exec.config.chains;

    exec.begin_leg(
        ctx,
        BridgeStep::Step2Preparing,
        TORUS_EVM,
        "Preparing Torus EVM → Native withdrawal",
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
    let baseline = exec.read_balance(exec.providers.native_balance.as_ref(), NATIVE).await?;

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
    let guard = TimeoutGuard::new(exec.config.timeouts.default_operation(), "Withdrawal timed out");
    let tx_hash = match guard
        .run(
            exec.providers
                .withdrawal
                .withdraw_to_native(&exec.providers.native_address, ctx.units),
        )
        .await
    {
        Ok(Ok(hash)) => hash,
        Ok(Err(e)) => {
            return Err(StepFailure::from_error(
                TORUS_EVM,
                "Withdrawal transaction rejected by user",
                "Failed to withdraw from Torus EVM",
                e.into(),
            ))
        }
        Err(timeout) => {
            return Err(StepFailure::new(
                TORUS_EVM,
                "Failed to withdraw from Torus EVM",
                timeout.into(),
            ))
        }
    };

    exec.advance_to(ctx, BridgeStep::Step2Confirming, NATIVE)?;
    exec.upsert(
        ctx,
        BridgeTransactionRecord::new(
            ctx.leg,
            TxRecordStatus::Confirming,
            NATIVE,
            "Waiting for confirmation...",
        )
        .with_tx(Some(tx_hash.clone()), TORUS_EVM),
    );
    exec.confirm_by_balance(
        ctx,
        exec.providers.native_balance.as_ref(),
        baseline,
        PollMode::ExactIncrease,
        NATIVE,
    )
    .await
    .map_err(|f| f.with_tx_hash(Some(tx_hash.clone())))?;

    exec.advance_to(ctx, BridgeStep::Complete, TORUS_EVM)?;
    exec.upsert(
        ctx,
        BridgeTransactionRecord::new(
            ctx.leg,
            TxRecordStatus::Success,
            TORUS_EVM,
            "Transfer complete",
        )
        .with_tx(Some(tx_hash), TORUS_EVM),
    );
    exec.return_to_origin(chains.torus_evm_chain_id, TORUS_EVM).await;
    Ok(())
}
