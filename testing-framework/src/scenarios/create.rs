// Standard create scenarios: one funded operator, one create transaction,
// result from the self-stake balance predicate and the existence check.

use super::operations;
use super::run::{ScenarioContext, ScenarioRun};
use crate::error::ScenarioError;
use crate::test_case::TestCase;
use staking_common::Amount;

pub(super) async fn create_validator(ctx: &ScenarioContext, case: &mut TestCase) {
    let mut run = ScenarioRun::begin(ctx, case);
    let outcome = create_validator_steps(&mut run).await;
    run.finish(outcome).await;
}

async fn create_validator_steps(run: &mut ScenarioRun<'_>) -> Result<(), ScenarioError> {
    run.validate().await?;
    let section = run.case().parameters.create_validator()?.clone();

    let amount = section.amount.unwrap_or_else(Amount::zero);
    let account = run.provision("Validator", amount, 1).await?;
    let (_, outcome) = operations::create_validator(run, &account, &section).await?;

    run.set_result(outcome.succeeded);
    Ok(())
}

pub(super) async fn create_map3_node(ctx: &ScenarioContext, case: &mut TestCase) {
    let mut run = ScenarioRun::begin(ctx, case);
    let outcome = create_map3_node_steps(&mut run).await;
    run.finish(outcome).await;
}

async fn create_map3_node_steps(run: &mut ScenarioRun<'_>) -> Result<(), ScenarioError> {
    run.validate().await?;
    let section = run.case().parameters.create_map3_node()?.clone();

    let amount = section.amount.unwrap_or_else(Amount::zero);
    let account = run.provision("Map3Node", amount, 1).await?;
    let (_, outcome) = operations::create_map3_node(run, &account, &section).await?;

    run.set_result(outcome.succeeded);
    Ok(())
}
