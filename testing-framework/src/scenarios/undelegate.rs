// Create a map3 node, delegate to it from a second account, then undelegate.
// Passes when every transaction went through and no active delegation from
// the delegator is left.

use super::operations;
use super::run::{ScenarioContext, ScenarioRun};
use crate::error::ScenarioError;
use crate::test_case::TestCase;
use staking_common::Amount;

pub(super) async fn undelegate(ctx: &ScenarioContext, case: &mut TestCase) {
    let mut run = ScenarioRun::begin(ctx, case);
    let outcome = steps(&mut run).await;
    run.finish(outcome).await;
}

async fn steps(run: &mut ScenarioRun<'_>) -> Result<(), ScenarioError> {
    run.validate().await?;
    let delegation = run.case().parameters.delegation()?.clone();
    let undelegation = run.case().parameters.undelegation()?.clone();

    let map3_node = operations::reuse_or_create_map3_node(run, "Map3Node").await?;
    let map3_address = match map3_node.map3_address {
        Some(address) if map3_node.exists => address,
        _ => {
            run.log("Map3 node does not exist, skipping delegation");
            return Ok(());
        }
    };

    let amount = delegation.amount.unwrap_or_else(Amount::zero);
    let delegator = run.provision("Delegator", amount, 1).await?;

    let delegated =
        operations::delegate_to_map3_node(run, &delegator, map3_address, delegation.amount)
            .await?;
    if !delegated.passed() {
        run.log("Delegation failed, skipping undelegation");
        return Ok(());
    }

    let undelegated =
        operations::undelegate(run, &delegator, map3_address, undelegation.amount).await?;
    run.set_result(undelegated.passed());
    Ok(())
}
