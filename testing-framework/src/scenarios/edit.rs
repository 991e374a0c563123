// Edit a validator `repeat` times. Each iteration after the first only runs
// if the previous one both went through and was reflected on chain; the case
// result is the outcome of the last iteration that ran.

use super::operations;
use super::run::{ScenarioContext, ScenarioRun};
use crate::error::ScenarioError;
use crate::keys::manage_bls_keys;
use crate::test_case::TestCase;

pub(super) async fn edit_validator(ctx: &ScenarioContext, case: &mut TestCase) {
    let mut run = ScenarioRun::begin(ctx, case);
    let outcome = steps(&mut run).await;
    run.finish(outcome).await;
}

async fn steps(run: &mut ScenarioRun<'_>) -> Result<(), ScenarioError> {
    run.validate().await?;
    let section = run.case().parameters.edit()?.clone();
    let message = run.case().parameters.create_validator()?.bls_signature_message.clone();

    let mut validator = operations::reuse_or_create_validator(run, "Validator").await?;
    let validator_address = match validator.validator_address {
        Some(address) if validator.exists => address,
        _ => {
            run.log("Validator does not exist, skipping edit");
            return Ok(());
        }
    };

    if section.repeat == 0 {
        run.log("Edit repeat count is 0, nothing to submit");
        return Ok(());
    }

    for iteration in 0..section.repeat {
        let change = manage_bls_keys(&validator.bls_keys, section.mode, &message).map_err(|err| {
            ScenarioError::key_management(
                format!("{} for edit {}", section.mode, iteration + 1),
                validator.account.to_string(),
                err,
            )
        })?;

        let outcome =
            operations::edit_validator(run, &validator, validator_address, &section, &change)
                .await?;
        run.log(&format!(
            "Edit {}/{}: transaction {}, changes {}",
            iteration + 1,
            section.repeat,
            if outcome.tx.success { "succeeded" } else { "failed" },
            if outcome.succeeded { "applied" } else { "missing" }
        ));
        run.set_result(outcome.passed());

        if !outcome.passed() {
            break;
        }
        validator.bls_keys = change.apply_to(&validator.bls_keys);
        run.ctx().reusable.refresh_validator(&validator).await;
    }

    Ok(())
}
