// Renew: delegate to a map3 node, then let the operator and the participant
// answer the renewal round, each optionally behind an epoch gate. The result
// is the conjunction of every step.

use super::operations;
use super::run::{ScenarioContext, ScenarioRun};
use crate::error::ScenarioError;
use crate::parameters::ScenarioMode;
use crate::test_case::TestCase;
use staking_common::Amount;

pub(super) async fn renew(ctx: &ScenarioContext, case: &mut TestCase) {
    let mut run = ScenarioRun::begin(ctx, case);
    let outcome = steps(&mut run).await;
    run.finish(outcome).await;
}

async fn steps(run: &mut ScenarioRun<'_>) -> Result<(), ScenarioError> {
    run.validate().await?;
    let delegation = run.case().parameters.delegation()?.clone();
    let mode = run.case().parameters.mode;
    let params = delegation.renew.clone();

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
        return Ok(());
    }
    run.set_result(true);

    if params.operator_send_renew {
        if params.operator_wait_epoch > 0 {
            run.wait_for_epoch(params.operator_wait_epoch, &map3_node.account).await?;
        }
        let renewed = operations::renew(
            run,
            &map3_node.account,
            map3_address,
            params.renew,
            params.new_commission_rate,
        )
        .await?;
        run.and_result(renewed.passed());
    }

    if params.participant_send_renew {
        if params.participant_wait_epoch > 0 {
            run.wait_for_epoch(params.participant_wait_epoch, &delegator).await?;
        }
        let renewed = operations::renew(run, &delegator, map3_address, params.renew, None).await?;
        run.and_result(renewed.passed());
    }

    if mode == ScenarioMode::RepeatRenew {
        let renewed = operations::renew(run, &delegator, map3_address, params.renew, None).await?;
        run.and_result(renewed.passed());
    }

    Ok(())
}
