// Restaking delegation: a validator (reused or fresh), a delegator that
// creates its own map3 node, and the delegation of that node to the validator
// once it is active.

use super::operations;
use super::run::{ScenarioContext, ScenarioRun};
use crate::error::ScenarioError;
use crate::test_case::TestCase;
use staking_common::Amount;

pub(super) async fn delegate(ctx: &ScenarioContext, case: &mut TestCase) {
    let mut run = ScenarioRun::begin(ctx, case);
    let outcome = steps(&mut run).await;
    run.finish(outcome).await;
}

async fn steps(run: &mut ScenarioRun<'_>) -> Result<(), ScenarioError> {
    run.validate().await?;
    let map3_section = run.case().parameters.create_map3_node()?.clone();

    let validator = operations::reuse_or_create_validator(run, "Validator").await?;
    let validator_address = match validator.validator_address {
        Some(address) if validator.exists => address,
        _ => {
            run.log("Validator does not exist, skipping delegation");
            return Ok(());
        }
    };

    let amount = map3_section.amount.unwrap_or_else(Amount::zero);
    let delegator = run.provision("Delegator", amount, 1).await?;
    let (map3_node, _) = operations::create_map3_node(run, &delegator, &map3_section).await?;
    let map3_address = match map3_node.map3_address {
        Some(address) if map3_node.exists => address,
        _ => {
            return Err(ScenarioError::submission(
                "create map3 node",
                delegator.to_string(),
                "map3 node does not exist after creation",
            ))
        }
    };

    let wait = run.ctx().config.network.map3_active_wait_time();
    run.sleep(wait, "for the map3 node to become active").await;

    let outcome = operations::restake(run, &map3_node, map3_address, validator_address).await?;
    run.set_result(outcome.passed());
    Ok(())
}
