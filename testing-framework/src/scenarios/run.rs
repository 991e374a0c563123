//! Scenario run state machine
//!
//! A [`ScenarioRun`] wraps one [`TestCase`] for the duration of one run. It
//! tracks every account the run creates and, in [`ScenarioRun::finish`],
//! tears all of them down whatever the outcome was: teardown is
//! unconditional, result computation is not.

use crate::accounts::{Account, AccountManager};
use crate::config::FrameworkConfig;
use crate::error::{ParameterError, ScenarioError};
use crate::executor::{ExecuteError, TransactionExecutor};
use crate::funding::FundingDetails;
use crate::orchestrator::Clock;
use crate::rpc::{KeyStore, StakingRpc};
use crate::scenarios::entities::ReusableEntities;
use crate::test_case::{ScenarioPhase, TestCase};
use crate::waiters::wait_for_epoch;
use chrono::Utc;
use log::{debug, error, info, warn};
use staking_common::crypto::Address;
use staking_common::staking::{Map3NodeInfo, StakingPayload, Transaction, ValidatorInfo};
use staking_common::Amount;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// Everything a scenario needs from the outside world, passed explicitly
pub struct ScenarioContext {
    pub config: FrameworkConfig,
    pub rpc: Arc<dyn StakingRpc>,
    pub clock: Arc<dyn Clock>,
    pub accounts: AccountManager,
    pub reusable: ReusableEntities,
}

impl ScenarioContext {
    pub fn new(
        config: FrameworkConfig,
        rpc: Arc<dyn StakingRpc>,
        keystore: Arc<dyn KeyStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let accounts = AccountManager::new(&config, rpc.clone(), keystore);
        Self {
            config,
            rpc,
            clock,
            accounts,
            reusable: ReusableEntities::new(),
        }
    }

    /// Tears down the accounts behind cached reusable entities. Call once
    /// every test case that may reuse them has finished.
    pub async fn teardown_reusable(&self) -> usize {
        let accounts = self.reusable.drain().await;
        let count = accounts.len();
        for account in accounts {
            if let Err(err) = self.accounts.teardown(&account).await {
                warn!("Teardown of reusable account {} failed: {:#}", account, err);
            }
        }
        count
    }
}

pub struct ScenarioRun<'a> {
    ctx: &'a ScenarioContext,
    case: &'a mut TestCase,
    // Creation order; torn down in reverse
    created: Vec<Account>,
    kept: HashSet<Address>,
}

impl<'a> ScenarioRun<'a> {
    pub fn begin(ctx: &'a ScenarioContext, case: &'a mut TestCase) -> Self {
        case.executed = true;
        case.started_at = Some(Utc::now());
        case.result = false;
        case.error = None;
        case.transactions.clear();
        case.phases = vec![ScenarioPhase::Init];

        let run = Self {
            ctx,
            case,
            created: Vec::new(),
            kept: HashSet::new(),
        };
        run.log(&format!(
            "Starting test case {} ({})",
            run.case.name, run.case.scenario
        ));
        run
    }

    pub fn ctx(&self) -> &'a ScenarioContext {
        self.ctx
    }

    pub fn case(&self) -> &TestCase {
        self.case
    }

    pub fn name(&self) -> &str {
        &self.case.name
    }

    /// Verbose test cases log at info, the others at debug
    pub fn log(&self, message: &str) {
        if self.case.verbose {
            info!("[{}] {}", self.case.name, message);
        } else {
            debug!("[{}] {}", self.case.name, message);
        }
    }

    pub fn enter(&mut self, phase: ScenarioPhase) {
        // Repeated operations stay in one phase
        if self.case.phases.last() != Some(&phase) {
            self.case.phases.push(phase);
        }
    }

    pub fn set_result(&mut self, result: bool) {
        self.case.result = result;
    }

    /// Combines `result` into the current one
    pub fn and_result(&mut self, result: bool) {
        self.case.result = self.case.result && result;
    }

    /// Checks the parameters and the funding account balance. Nothing touches
    /// the network unless the parameters are valid.
    pub async fn validate(&mut self) -> Result<FundingDetails, ScenarioError> {
        let details = self
            .case
            .parameters
            .validate(self.case.scenario, self.ctx.config.network.shard_count)?;
        self.enter(ScenarioPhase::Validated);

        let funding = self.ctx.accounts.funding();
        funding
            .ensure_sufficient(self.ctx.rpc.as_ref(), details.funding_amount)
            .await
            .map_err(|err| {
                ScenarioError::provisioning("funding check", funding.address().to_string(), err)
            })?;
        Ok(details)
    }

    /// Creates and funds an account owned by this run. The account is
    /// registered for teardown before funding, so a failed funding is
    /// cleaned up too.
    pub async fn provision(
        &mut self,
        role: &str,
        amount: Amount,
        multiple: u64,
    ) -> Result<Account, ScenarioError> {
        let mut account = self
            .ctx
            .accounts
            .generate(&self.case.name, role)
            .map_err(|err| ScenarioError::provisioning("generate account", role, err))?;
        self.created.push(account.clone());

        self.ctx
            .accounts
            .fund(&mut account, amount, multiple)
            .await
            .map_err(|err| {
                ScenarioError::provisioning("fund account", account.to_string(), err)
            })?;

        self.enter(ScenarioPhase::Funded);
        self.log(&format!("Provisioned {} account {}", role, account));
        Ok(account)
    }

    /// Excludes `account` from this run's teardown; it now backs a reusable entity
    pub fn keep(&mut self, account: &Account) {
        self.kept.insert(account.address);
    }

    pub fn is_kept(&self, account: &Account) -> bool {
        self.kept.contains(&account.address)
    }

    /// Submits `payload` signed by `signer` and records the transaction
    pub async fn execute(
        &mut self,
        signer: &Account,
        payload: StakingPayload,
    ) -> Result<Transaction, ScenarioError> {
        let kind = payload.kind();
        let options = self.case.parameters.submit_options();
        let executor = TransactionExecutor::new(
            self.ctx.rpc.as_ref(),
            &self.ctx.accounts,
            self.ctx.config.network.chain_id,
        );

        let tx = executor
            .execute(signer, payload, &options)
            .await
            .map_err(|err| match err {
                ExecuteError::Invalid(err) => {
                    ScenarioError::Validation(ParameterError::from(err))
                }
                err => ScenarioError::submission(kind.to_string(), signer.to_string(), err),
            })?;

        self.log(&format!(
            "{} from {}: {} ({})",
            kind,
            signer,
            if tx.success { "success" } else { "failed" },
            tx.hash
        ));
        self.case.transactions.push(tx.clone());
        Ok(tx)
    }

    /// Blocks until the chain reaches `target` epoch. `account` is the one
    /// whose next operation is gated.
    pub async fn wait_for_epoch(
        &mut self,
        target: u64,
        account: &Account,
    ) -> Result<u64, ScenarioError> {
        self.enter(ScenarioPhase::EpochGate);
        self.log(&format!("Waiting for epoch {} before {} continues", target, account));
        let network = &self.ctx.config.network;
        let epoch = wait_for_epoch(
            self.ctx.rpc.as_ref(),
            self.ctx.clock.as_ref(),
            target,
            network.epoch_poll_interval(),
            network.epoch_wait_timeout(),
        )
        .await
        .map_err(|err| ScenarioError::epoch_wait(target, account.to_string(), err))?;
        self.log(&format!("Reached epoch {}", epoch));
        Ok(epoch)
    }

    pub async fn sleep(&self, duration: Duration, reason: &str) {
        if duration.is_zero() {
            return;
        }
        self.log(&format!("Sleeping {:?} {}", duration, reason));
        self.ctx.clock.sleep(duration).await;
    }

    pub async fn balance(&self, account: &Account) -> Result<Amount, ScenarioError> {
        self.ctx
            .rpc
            .balance(&account.address, self.case.parameters.shard)
            .await
            .map_err(|err| ScenarioError::query("fetch balance", account.to_string(), err))
    }

    pub async fn validator_info(
        &self,
        address: &Address,
        account: &Account,
    ) -> Result<Option<ValidatorInfo>, ScenarioError> {
        self.ctx.rpc.validator_info(address).await.map_err(|err| {
            ScenarioError::query(format!("fetch validator {}", address), account.to_string(), err)
        })
    }

    pub async fn map3_node_info(
        &self,
        address: &Address,
        account: &Account,
    ) -> Result<Option<Map3NodeInfo>, ScenarioError> {
        self.ctx.rpc.map3_node_info(address).await.map_err(|err| {
            ScenarioError::query(format!("fetch map3 node {}", address), account.to_string(), err)
        })
    }

    /// Records the outcome, tears down every account this run created (except
    /// kept ones) and moves the test case to `Done`.
    pub async fn finish(self, outcome: Result<(), ScenarioError>) {
        let Self {
            ctx,
            case,
            created,
            kept,
        } = self;

        match outcome {
            Ok(()) => case.phases.push(ScenarioPhase::Evaluated),
            Err(err) => {
                error!("Test case {} aborted: {}", case.name, err);
                case.result = false;
                case.error = Some(err);
            }
        }

        let to_teardown: Vec<&Account> = created
            .iter()
            .rev()
            .filter(|account| !kept.contains(&account.address))
            .collect();
        if case.error.is_none() || !created.is_empty() {
            if !to_teardown.is_empty() {
                let message = "Performing test teardown (returning funds and removing accounts)";
                if case.verbose {
                    info!("[{}] {}", case.name, message);
                } else {
                    debug!("[{}] {}", case.name, message);
                }
            }
            for account in to_teardown {
                if let Err(err) = ctx.accounts.teardown(account).await {
                    warn!("[{}] Teardown of account {} failed: {:#}", case.name, account, err);
                }
            }
            case.phases.push(ScenarioPhase::TornDown);
        }

        case.phases.push(ScenarioPhase::Done);
        case.finished_at = Some(Utc::now());

        let summary = format!(
            "Test case {}: result {}, expected {}",
            case.name, case.result, case.expected
        );
        if case.verbose {
            info!("{}", summary);
        } else {
            debug!("{}", summary);
        }
    }
}
