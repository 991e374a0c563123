//! Building blocks shared by the scenarios
//!
//! Each helper submits one staking operation through the run (so the
//! transaction is recorded), re-queries the chain and returns whether the
//! operation had its intended effect.

use super::entities::{Map3NodeHandle, ValidatorHandle};
use super::run::ScenarioRun;
use crate::accounts::Account;
use crate::error::ScenarioError;
use crate::evaluator::{self, EditExpectation};
use crate::keys::{generate_keys, KeyChange};
use crate::parameters::{CreateMap3NodeParameters, CreateValidatorParameters, EditParameters};
use crate::test_case::ScenarioPhase;
use staking_common::crypto::{Address, BlsKey};
use staking_common::staking::{
    CreateMap3Node, CreateValidator, Delegate, DelegationTarget, EditValidator, Renew,
    StakingPayload, Terminate, Transaction, Undelegate,
};
use staking_common::{Amount, Decimal};

/// Outcome of one operation: the recorded transaction and whether the chain
/// reflects it
#[derive(Debug, Clone)]
pub struct Outcome {
    pub tx: Transaction,
    pub succeeded: bool,
}

impl Outcome {
    pub fn passed(&self) -> bool {
        self.tx.success && self.succeeded
    }
}

fn generate(
    run: &ScenarioRun<'_>,
    account: &Account,
    count: usize,
    message: &str,
) -> Result<Vec<BlsKey>, ScenarioError> {
    generate_keys(count, message).map_err(|err| {
        ScenarioError::key_management(
            format!("generate {} bls keys for test case {}", count, run.name()),
            account.to_string(),
            err,
        )
    })
}

// Ending balance after a create, once the configured settle time passed
async fn ending_balance(run: &ScenarioRun<'_>, account: &Account) -> Result<Amount, ScenarioError> {
    let wait = run.ctx().config.network.staking_wait_time();
    run.sleep(wait, "for the create transaction to settle").await;
    run.balance(account).await
}

/// Creates a validator operated by `account`
pub async fn create_validator(
    run: &mut ScenarioRun<'_>,
    account: &Account,
    section: &CreateValidatorParameters,
) -> Result<(ValidatorHandle, Outcome), ScenarioError> {
    let keys = generate(run, account, section.bls_key_count, &section.bls_signature_message)?;
    let starting_balance = match account.balance {
        Some(balance) => balance,
        None => run.balance(account).await?,
    };
    let amount = section.amount.unwrap_or_else(Amount::zero);

    let payload = StakingPayload::CreateValidator(CreateValidator {
        operator_address: account.address,
        description: section.description.clone(),
        commission_rate: section.commission_rate,
        max_total_delegation: section.max_total_delegation,
        bls_keys: keys.iter().map(|key| *key.shard_public_key()).collect(),
        bls_signatures: keys.iter().map(|key| *key.shard_signature()).collect(),
        amount: section.amount,
    });
    let tx = run.execute(account, payload).await?;

    let ending_balance = ending_balance(run, account).await?;
    let exists = match &tx.contract_address {
        Some(address) => run.validator_info(address, account).await?.is_some(),
        None => false,
    };
    run.log(&format!(
        "Account {} has an ending balance of {} after creating a validator \
         (started at {}, staked {})",
        account, ending_balance, starting_balance, amount
    ));

    let succeeded =
        evaluator::create_succeeded(&tx, starting_balance, ending_balance, amount, exists);
    run.enter(ScenarioPhase::PrimaryEntityReady);
    let handle = ValidatorHandle {
        account: account.clone(),
        validator_address: tx.contract_address,
        bls_keys: keys,
        exists,
    };
    Ok((handle, Outcome { tx, succeeded }))
}

/// Creates a map3 node operated by `account`
pub async fn create_map3_node(
    run: &mut ScenarioRun<'_>,
    account: &Account,
    section: &CreateMap3NodeParameters,
) -> Result<(Map3NodeHandle, Outcome), ScenarioError> {
    let keys = generate(run, account, section.bls_key_count, &section.bls_signature_message)?;
    let starting_balance = match account.balance {
        Some(balance) => balance,
        None => run.balance(account).await?,
    };
    let amount = section.amount.unwrap_or_else(Amount::zero);

    let payload = StakingPayload::CreateMap3Node(CreateMap3Node {
        operator_address: account.address,
        description: section.description.clone(),
        commission_rate: section.commission_rate,
        node_keys: keys.iter().map(|key| *key.node_public_key()).collect(),
        node_signatures: keys.iter().map(|key| *key.shard_signature()).collect(),
        amount: section.amount,
    });
    let tx = run.execute(account, payload).await?;

    let ending_balance = ending_balance(run, account).await?;
    let exists = match &tx.contract_address {
        Some(address) => run.map3_node_info(address, account).await?.is_some(),
        None => false,
    };
    run.log(&format!(
        "Account {} has an ending balance of {} after creating a map3 node \
         (started at {}, staked {})",
        account, ending_balance, starting_balance, amount
    ));

    let succeeded =
        evaluator::create_succeeded(&tx, starting_balance, ending_balance, amount, exists);
    run.enter(ScenarioPhase::PrimaryEntityReady);
    let handle = Map3NodeHandle {
        account: account.clone(),
        map3_address: tx.contract_address,
        bls_keys: keys,
        exists,
    };
    Ok((handle, Outcome { tx, succeeded }))
}

/// Returns the cached validator when the case reuses one, otherwise provisions
/// an operator and creates a validator, caching it if the case asks for reuse.
pub async fn reuse_or_create_validator(
    run: &mut ScenarioRun<'_>,
    role: &str,
) -> Result<ValidatorHandle, ScenarioError> {
    let reuse = run.case().parameters.reuse_existing_validator;
    let section = run.case().parameters.create_validator()?.clone();
    let amount = section.amount.unwrap_or_else(Amount::zero);
    if !reuse {
        let account = run.provision(role, amount, 1).await?;
        let (handle, _) = create_validator(run, &account, &section).await?;
        return Ok(handle);
    }

    // Held across creation so concurrent cases share a single entity
    let ctx = run.ctx();
    let mut cached = ctx.reusable.validator().await;
    if let Some(handle) = cached.as_ref() {
        run.log(&format!("Reusing validator operated by {}", handle.account));
        run.enter(ScenarioPhase::PrimaryEntityReady);
        return Ok(handle.clone());
    }

    let account = run.provision(role, amount, 1).await?;
    let (handle, _) = create_validator(run, &account, &section).await?;
    if handle.exists {
        run.keep(&account);
        *cached = Some(handle.clone());
    }
    Ok(handle)
}

pub async fn reuse_or_create_map3_node(
    run: &mut ScenarioRun<'_>,
    role: &str,
) -> Result<Map3NodeHandle, ScenarioError> {
    let reuse = run.case().parameters.reuse_existing_validator;
    let section = run.case().parameters.create_map3_node()?.clone();
    let amount = section.amount.unwrap_or_else(Amount::zero);
    if !reuse {
        let account = run.provision(role, amount, 1).await?;
        let (handle, _) = create_map3_node(run, &account, &section).await?;
        return Ok(handle);
    }

    // Held across creation so concurrent cases share a single entity
    let ctx = run.ctx();
    let mut cached = ctx.reusable.map3_node().await;
    if let Some(handle) = cached.as_ref() {
        run.log(&format!("Reusing map3 node operated by {}", handle.account));
        run.enter(ScenarioPhase::PrimaryEntityReady);
        return Ok(handle.clone());
    }

    let account = run.provision(role, amount, 1).await?;
    let (handle, _) = create_map3_node(run, &account, &section).await?;
    if handle.exists {
        run.keep(&account);
        *cached = Some(handle.clone());
    }
    Ok(handle)
}

/// `delegator` delegates `amount` to the map3 node
pub async fn delegate_to_map3_node(
    run: &mut ScenarioRun<'_>,
    delegator: &Account,
    map3_address: Address,
    amount: Option<Amount>,
) -> Result<Outcome, ScenarioError> {
    run.enter(ScenarioPhase::SecondaryOperation);
    let payload = StakingPayload::Delegate(Delegate {
        delegator: delegator.address,
        target: DelegationTarget::Map3Node(map3_address),
        amount,
    });
    let tx = run.execute(delegator, payload).await?;

    let expected = amount.unwrap_or_else(Amount::zero);
    let succeeded = run
        .map3_node_info(&map3_address, delegator)
        .await?
        .map(|info| evaluator::delegation_recorded(&info, &delegator.address, expected))
        .unwrap_or(false);
    Ok(Outcome { tx, succeeded })
}

/// Restakes the map3 node to the validator, signed by the node operator
pub async fn restake(
    run: &mut ScenarioRun<'_>,
    map3_node: &Map3NodeHandle,
    map3_address: Address,
    validator_address: Address,
) -> Result<Outcome, ScenarioError> {
    run.enter(ScenarioPhase::SecondaryOperation);
    let operator = &map3_node.account;
    let payload = StakingPayload::Delegate(Delegate {
        delegator: map3_address,
        target: DelegationTarget::Validator(validator_address),
        amount: None,
    });
    let tx = run.execute(operator, payload).await?;

    let map3 = run.map3_node_info(&map3_address, operator).await?;
    let validator = run.validator_info(&validator_address, operator).await?;
    let succeeded = match (map3, validator) {
        (Some(map3), Some(validator)) => evaluator::restaked(&map3, &validator),
        _ => false,
    };
    Ok(Outcome { tx, succeeded })
}

pub async fn undelegate(
    run: &mut ScenarioRun<'_>,
    delegator: &Account,
    map3_address: Address,
    amount: Option<Amount>,
) -> Result<Outcome, ScenarioError> {
    run.enter(ScenarioPhase::SecondaryOperation);
    let payload = StakingPayload::Undelegate(Undelegate {
        delegator: delegator.address,
        map3_address,
        amount,
    });
    let tx = run.execute(delegator, payload).await?;

    let succeeded = run
        .map3_node_info(&map3_address, delegator)
        .await?
        .map(|info| evaluator::undelegated(&info, &delegator.address))
        .unwrap_or(false);
    Ok(Outcome { tx, succeeded })
}

/// `account` answers the renewal round of the map3 node
pub async fn renew(
    run: &mut ScenarioRun<'_>,
    account: &Account,
    map3_address: Address,
    renew: bool,
    new_commission_rate: Option<Decimal>,
) -> Result<Outcome, ScenarioError> {
    run.enter(ScenarioPhase::SecondaryOperation);
    let payload = StakingPayload::Renew(Renew {
        delegator: account.address,
        map3_address,
        renew,
        new_commission_rate,
    });
    let tx = run.execute(account, payload).await?;

    let succeeded = run
        .map3_node_info(&map3_address, account)
        .await?
        .map(|info| {
            let recorded = evaluator::renewal_recorded(&info, &account.address, renew);
            let rate_applied = new_commission_rate
                .map(|rate| info.commission_rate == rate)
                .unwrap_or(true);
            recorded && rate_applied
        })
        .unwrap_or(false);
    Ok(Outcome { tx, succeeded })
}

/// Edits the validator with the fields of `section` and the key `change`
pub async fn edit_validator(
    run: &mut ScenarioRun<'_>,
    validator: &ValidatorHandle,
    validator_address: Address,
    section: &EditParameters,
    change: &KeyChange,
) -> Result<Outcome, ScenarioError> {
    run.enter(ScenarioPhase::SecondaryOperation);
    let operator = &validator.account;
    let bls_key_to_add = change.add.as_ref().map(|key| *key.shard_public_key());
    let payload = StakingPayload::EditValidator(EditValidator {
        validator_address,
        operator_address: operator.address,
        description: section.description.clone(),
        commission_rate: section.commission_rate,
        max_total_delegation: section.max_total_delegation,
        bls_key_to_remove: change.remove.as_ref().map(|key| *key.shard_public_key()),
        bls_key_to_add,
        bls_key_to_add_signature: change.add.as_ref().map(|key| *key.shard_signature()),
    });
    let tx = run.execute(operator, payload).await?;

    let expectation = EditExpectation {
        description: section.description.clone(),
        commission_rate: section.commission_rate,
        max_total_delegation: section.max_total_delegation,
        added_key: bls_key_to_add,
        removed_key: change.remove.as_ref().map(|key| *key.shard_public_key()),
    };
    let verbose = run.case().verbose;
    let succeeded = run
        .validator_info(&validator_address, operator)
        .await?
        .map(|info| expectation.evaluate_changes(&info, verbose))
        .unwrap_or(false);
    Ok(Outcome { tx, succeeded })
}

/// Terminates the map3 node on behalf of `delegator`. With `sender` set the
/// transaction is signed by that account instead.
pub async fn terminate(
    run: &mut ScenarioRun<'_>,
    delegator: &Account,
    map3_address: Address,
    sender: Option<&Account>,
) -> Result<Outcome, ScenarioError> {
    run.enter(ScenarioPhase::SecondaryOperation);
    let signer = sender.unwrap_or(delegator);
    let payload = StakingPayload::Terminate(Terminate {
        delegator: delegator.address,
        map3_address,
    });
    let tx = run.execute(signer, payload).await?;

    let succeeded = run
        .map3_node_info(&map3_address, signer)
        .await?
        .map(|info| evaluator::terminated(&info))
        .unwrap_or(false);
    Ok(Outcome { tx, succeeded })
}
