// Terminate scenarios. The standard one has the map3 operator terminate its
// own node after a delegation; the invalid-address one submits the terminate
// from an unrelated sender, which the chain has to reject.

use super::entities::Map3NodeHandle;
use super::operations;
use super::run::{ScenarioContext, ScenarioRun};
use crate::accounts::Account;
use crate::error::ScenarioError;
use crate::test_case::TestCase;
use staking_common::crypto::Address;
use staking_common::Amount;

pub(super) async fn terminate(ctx: &ScenarioContext, case: &mut TestCase) {
    let mut run = ScenarioRun::begin(ctx, case);
    let outcome = terminate_steps(&mut run).await;
    run.finish(outcome).await;
}

pub(super) async fn terminate_invalid_address(ctx: &ScenarioContext, case: &mut TestCase) {
    let mut run = ScenarioRun::begin(ctx, case);
    let outcome = invalid_address_steps(&mut run).await;
    run.finish(outcome).await;
}

// Map3 node plus one delegation to it. None when the node was not created.
async fn delegated_map3_node(
    run: &mut ScenarioRun<'_>,
    operator: &Account,
    delegator: &Account,
) -> Result<Option<(Map3NodeHandle, Address)>, ScenarioError> {
    let section = run.case().parameters.create_map3_node()?.clone();
    let delegation = run.case().parameters.delegation()?.clone();

    let (map3_node, created) = operations::create_map3_node(run, operator, &section).await?;
    let map3_address = match map3_node.map3_address {
        Some(address) if created.succeeded => address,
        _ => {
            run.log("Map3 node was not created, skipping terminate");
            return Ok(None);
        }
    };

    let delegated =
        operations::delegate_to_map3_node(run, delegator, map3_address, delegation.amount)
            .await?;
    if !delegated.passed() {
        run.log("Delegation failed, skipping terminate");
        return Ok(None);
    }
    Ok(Some((map3_node, map3_address)))
}

// `signer` is the account about to submit the terminate
async fn terminate_gate(run: &mut ScenarioRun<'_>, signer: &Account) -> Result<(), ScenarioError> {
    let wait_epoch = run.case().parameters.terminate().wait_epoch;
    if wait_epoch > 0 {
        run.wait_for_epoch(wait_epoch, signer).await?;
    }
    Ok(())
}

async fn terminate_steps(run: &mut ScenarioRun<'_>) -> Result<(), ScenarioError> {
    run.validate().await?;
    let map3_amount = run.case().parameters.create_map3_node()?.amount;
    let delegation_amount = run.case().parameters.delegation()?.amount;

    let operator = run
        .provision("Map3Node", map3_amount.unwrap_or_else(Amount::zero), 1)
        .await?;
    let delegator = run
        .provision("Delegator", delegation_amount.unwrap_or_else(Amount::zero), 1)
        .await?;

    let Some((map3_node, map3_address)) =
        delegated_map3_node(run, &operator, &delegator).await?
    else {
        return Ok(());
    };

    terminate_gate(run, &map3_node.account).await?;
    let terminated = operations::terminate(run, &map3_node.account, map3_address, None).await?;
    run.set_result(terminated.passed());
    Ok(())
}

async fn invalid_address_steps(run: &mut ScenarioRun<'_>) -> Result<(), ScenarioError> {
    run.validate().await?;
    let amount = run
        .case()
        .parameters
        .create_map3_node()?
        .amount
        .unwrap_or_else(Amount::zero);

    let operator = run.provision("Map3Node", amount, 1).await?;
    let delegator = run.provision("Delegator", amount, 1).await?;
    let sender = run.provision("Sender", amount, 1).await?;

    let Some((_, map3_address)) = delegated_map3_node(run, &operator, &delegator).await? else {
        return Ok(());
    };

    terminate_gate(run, &sender).await?;
    let terminated =
        operations::terminate(run, &delegator, map3_address, Some(&sender)).await?;
    run.log(&format!(
        "Terminate of {} sent by {} on behalf of {}: {}",
        map3_address,
        sender,
        delegator,
        if terminated.tx.success { "accepted" } else { "rejected" }
    ));
    run.set_result(terminated.passed());
    Ok(())
}
