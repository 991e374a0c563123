#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
//! Scenario runs against the in-process simulated chain
//!
//! Every test pauses tokio time through `PausedClock`, so settle waits and
//! epoch gates cost no real time.

use staking_common::staking::{Map3NodeStatus, OperationKind};
use staking_testing_framework::prelude::*;
use std::collections::HashSet;

const FUNDING_COINS: i64 = 1_000_000;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

struct Harness {
    chain: Arc<SimulatedChain>,
    keystore: Arc<InMemoryKeyStore>,
    funding: Address,
    ctx: ScenarioContext,
}

impl Harness {
    fn new() -> Self {
        Self::with(SimulatedChainConfig::default(), FUNDING_COINS, |_| {})
    }

    fn with(
        chain_config: SimulatedChainConfig,
        funding_coins: i64,
        configure: impl FnOnce(&mut FrameworkConfig),
    ) -> Self {
        init_logger();
        // Pauses tokio time before the chain records its genesis instant
        let clock = Arc::new(PausedClock::new());
        let chain = Arc::new(SimulatedChain::new(chain_config));
        let keystore = Arc::new(InMemoryKeyStore::new());
        let funding = keystore.create_account("funding", "").unwrap();
        chain.fund(&funding, Amount::from_coins(funding_coins));

        let mut config = FrameworkConfig::new(funding);
        configure(&mut config);
        let ctx = ScenarioContext::new(config, chain.clone(), keystore.clone(), clock);
        Self {
            chain,
            keystore,
            funding,
            ctx,
        }
    }

    async fn run(&self, yaml: &str) -> TestCase {
        let mut case = parse_test_case(yaml).unwrap();
        run_test_case(&self.ctx, &mut case).await;
        case
    }

    fn submissions_of(&self, kind: OperationKind) -> usize {
        self.chain
            .submissions()
            .iter()
            .filter(|s| s.kind == kind)
            .count()
    }

    /// Every generated account is gone, only the funding key is left
    fn assert_clean(&self) {
        assert_eq!(self.ctx.accounts.live_count(), 0);
        assert_eq!(self.keystore.len(), 1);
        let removed = self.keystore.removed();
        let unique: HashSet<&String> = removed.iter().collect();
        assert_eq!(unique.len(), removed.len(), "account removed twice: {:?}", removed);
    }

    /// Successful return transfers into the funding account
    fn returns_to_funding(&self) -> Vec<Address> {
        self.chain
            .transfers()
            .iter()
            .filter(|t| t.success && t.to == self.funding)
            .map(|t| t.from)
            .collect()
    }
}

const CREATE_MAP3: &str = r#"
name: "create_map3"
scenario: create_map3_node
parameters:
  create_map3_node:
    amount: "100"
    commission_rate: "0.1"
    description: { name: "map3" }
"#;

#[tokio::test]
async fn test_create_map3_node_passes_and_tears_down() {
    let harness = Harness::new();
    let case = harness.run(CREATE_MAP3).await;

    assert!(case.passed(), "error: {:?}", case.error);
    assert!(case.result);
    assert_eq!(case.transactions.len(), 1);
    assert!(case.started_at.is_some() && case.finished_at.is_some());
    assert_eq!(
        case.phases,
        vec![
            ScenarioPhase::Init,
            ScenarioPhase::Validated,
            ScenarioPhase::Funded,
            ScenarioPhase::PrimaryEntityReady,
            ScenarioPhase::Evaluated,
            ScenarioPhase::TornDown,
            ScenarioPhase::Done,
        ]
    );

    let operator = case.transactions[0].sender;
    assert_eq!(harness.returns_to_funding(), vec![operator]);
    harness.assert_clean();
}

#[tokio::test]
async fn test_validation_failure_touches_nothing() {
    let harness = Harness::new();
    let case = harness
        .run(
            r#"
name: "nil_amount"
scenario: create_map3_node
parameters:
  create_map3_node:
    description: { name: "map3" }
"#,
        )
        .await;

    assert!(case.executed);
    assert!(!case.result);
    assert_eq!(case.error.as_ref().map(|e| e.kind()), Some(ErrorKind::Validation));
    assert_eq!(case.phases, vec![ScenarioPhase::Init, ScenarioPhase::Done]);
    assert_eq!(harness.chain.calls().total(), 0);
    assert_eq!(harness.keystore.len(), 1);
    assert!(harness.keystore.removed().is_empty());
}

#[tokio::test]
async fn test_unsupported_mode_is_a_validation_error() {
    let harness = Harness::new();
    let case = harness
        .run(
            r#"
name: "repeat_renew_on_create"
scenario: create_map3_node
parameters:
  mode: repeat_renew
  create_map3_node:
    amount: "100"
"#,
        )
        .await;

    assert_eq!(case.error.as_ref().map(|e| e.kind()), Some(ErrorKind::Validation));
    assert_eq!(harness.chain.calls().total(), 0);
}

#[tokio::test]
async fn test_insufficient_funding_creates_no_account() {
    let harness = Harness::with(SimulatedChainConfig::default(), 10, |_| {});
    let case = harness.run(CREATE_MAP3).await;

    assert_eq!(case.error.as_ref().map(|e| e.kind()), Some(ErrorKind::Provisioning));
    assert!(case.reached(ScenarioPhase::Validated));
    assert!(!case.reached(ScenarioPhase::Funded));
    assert_eq!(harness.keystore.len(), 1);
    assert_eq!(harness.chain.calls().transfer, 0);
    assert_eq!(harness.chain.calls().submit_staking, 0);
}

#[tokio::test]
async fn test_failed_funding_still_tears_down_the_account() {
    let harness = Harness::new();
    harness.chain.inject(Fault::RejectTransfers);
    let case = harness.run(CREATE_MAP3).await;

    assert_eq!(case.error.as_ref().map(|e| e.kind()), Some(ErrorKind::Provisioning));
    assert!(case.reached(ScenarioPhase::TornDown));
    assert_eq!(harness.keystore.removed().len(), 1);
    assert_eq!(harness.chain.calls().submit_staking, 0);
    harness.assert_clean();
}

#[tokio::test]
async fn test_submission_error_aborts_with_teardown() {
    let harness = Harness::new();
    harness
        .chain
        .inject(Fault::SubmissionRpcError(OperationKind::CreateMap3Node));
    let case = harness.run(CREATE_MAP3).await;

    let error = case.error.clone().unwrap();
    assert_eq!(error.kind(), ErrorKind::Submission);
    assert!(error.to_string().contains("create-map3-node"));
    assert!(case.transactions.is_empty());
    assert!(!case.reached(ScenarioPhase::Evaluated));
    assert_eq!(case.phases.last(), Some(&ScenarioPhase::Done));
    assert_eq!(harness.returns_to_funding().len(), 1);
    harness.assert_clean();
}

#[tokio::test]
async fn test_inclusion_timeout_is_a_failed_transaction() {
    let harness = Harness::new();
    harness
        .chain
        .inject(Fault::StallSubmissions(Duration::from_secs(300)));
    let case = harness
        .run(
            r#"
name: "stalled_create"
scenario: create_map3_node
parameters:
  timeout: 30
  create_map3_node:
    amount: "100"
"#,
        )
        .await;

    assert!(case.error.is_none());
    assert!(!case.result);
    assert_eq!(case.transactions.len(), 1);
    let tx = &case.transactions[0];
    assert!(!tx.success);
    assert!(tx.error.as_deref().unwrap().contains("not included within"));
    harness.assert_clean();
}

#[tokio::test]
async fn test_create_delegate_undelegate() {
    let harness = Harness::new();
    let case = harness
        .run(
            r#"
name: "undelegate"
scenario: undelegate
parameters:
  create_map3_node:
    amount: "1000"
  delegation:
    amount: "400"
  undelegation:
    amount: "400"
"#,
        )
        .await;

    assert!(case.passed(), "error: {:?}", case.error);
    let kinds: Vec<Option<OperationKind>> = case.transactions.iter().map(|tx| tx.kind).collect();
    assert_eq!(
        kinds,
        vec![
            Some(OperationKind::CreateMap3Node),
            Some(OperationKind::Delegate),
            Some(OperationKind::Undelegate),
        ]
    );
    assert!(case.transactions.iter().all(|tx| tx.success));
    assert!(case.reached(ScenarioPhase::SecondaryOperation));
    assert_eq!(harness.returns_to_funding().len(), 2);
    harness.assert_clean();
}

#[tokio::test]
async fn test_partial_undelegation_fails_the_predicate() {
    let harness = Harness::new();
    let case = harness
        .run(
            r#"
name: "partial_undelegate"
scenario: undelegate
expected: false
parameters:
  create_map3_node:
    amount: "1000"
  delegation:
    amount: "400"
  undelegation:
    amount: "100"
"#,
        )
        .await;

    // The transaction goes through, some delegation is left
    assert!(case.transactions.last().unwrap().success);
    assert!(!case.result);
    assert!(case.passed());
}

#[tokio::test]
async fn test_edit_with_zero_repeat_submits_nothing() {
    let harness = Harness::new();
    let case = harness
        .run(
            r#"
name: "edit_zero"
scenario: edit_validator
expected: false
parameters:
  create_validator:
    amount: "1000"
  edit:
    repeat: 0
    mode: add_bls_key
"#,
        )
        .await;

    assert!(case.error.is_none());
    assert!(!case.result);
    assert!(case.passed());
    assert_eq!(harness.submissions_of(OperationKind::Edit), 0);
    assert_eq!(case.transactions.len(), 1);
    harness.assert_clean();
}

#[tokio::test]
async fn test_edit_rotates_keys_every_iteration() {
    let harness = Harness::new();
    let case = harness
        .run(
            r#"
name: "edit_rotate"
scenario: edit_validator
parameters:
  create_validator:
    amount: "1000"
    bls_key_count: 2
  edit:
    repeat: 3
    mode: rotate_bls_key
    commission_rate: "0.3"
    description: { website: "https://validator.example" }
"#,
        )
        .await;

    assert!(case.passed(), "error: {:?}", case.error);
    assert_eq!(harness.submissions_of(OperationKind::Edit), 3);

    let validator = case.transactions[0].contract_address.unwrap();
    let info = harness.ctx.rpc.validator_info(&validator).await.unwrap().unwrap();
    assert_eq!(info.bls_keys.len(), 2);
    assert_eq!(info.commission_rate, "0.3".parse::<Decimal>().unwrap());
    assert_eq!(info.description.website, "https://validator.example");
}

#[tokio::test]
async fn test_edit_stops_after_first_failed_iteration() {
    let harness = Harness::new();
    let case = harness
        .run(
            r#"
name: "edit_remove_only_key"
scenario: edit_validator
expected: false
parameters:
  create_validator:
    amount: "1000"
  edit:
    repeat: 4
    mode: remove_bls_key
"#,
        )
        .await;

    // A validator can not drop its only key, so the chain rejects the first edit
    assert!(case.error.is_none());
    assert!(!case.result);
    assert_eq!(harness.submissions_of(OperationKind::Edit), 1);
    assert!(case.passed());
}

#[tokio::test]
async fn test_terminate_by_operator() {
    let harness = Harness::new();
    let case = harness
        .run(
            r#"
name: "terminate"
scenario: terminate
parameters:
  create_map3_node:
    amount: "1000"
  delegation:
    amount: "200"
"#,
        )
        .await;

    assert!(case.passed(), "error: {:?}", case.error);
    let map3 = case.transactions[0].contract_address.unwrap();
    let info = harness.ctx.rpc.map3_node_info(&map3).await.unwrap().unwrap();
    assert_eq!(info.status, Map3NodeStatus::Terminated);
    assert!(info.delegations.is_empty());
    harness.assert_clean();
}

#[tokio::test]
async fn test_terminate_with_mismatched_sender_is_rejected_by_the_chain() {
    let harness = Harness::new();
    let case = harness
        .run(
            r#"
name: "terminate_invalid_address"
scenario: terminate_invalid_address
expected: false
parameters:
  create_map3_node:
    amount: "1000"
  delegation:
    amount: "200"
"#,
        )
        .await;

    assert!(case.error.is_none());
    assert!(!case.result);
    assert!(case.passed());

    let kinds: Vec<Option<OperationKind>> = case.transactions.iter().map(|tx| tx.kind).collect();
    assert_eq!(
        kinds,
        vec![
            Some(OperationKind::CreateMap3Node),
            Some(OperationKind::Delegate),
            Some(OperationKind::Terminate),
        ]
    );
    let terminate = case.transactions.last().unwrap();
    assert!(!terminate.success);
    // Signed by the third account, neither operator nor delegator
    assert_ne!(terminate.sender, case.transactions[0].sender);
    assert_ne!(terminate.sender, case.transactions[1].sender);

    assert_eq!(harness.returns_to_funding().len(), 3);
    harness.assert_clean();
}

const RENEW: &str = r#"
name: "renew"
scenario: renew
parameters:
  create_map3_node:
    amount: "1000"
    commission_rate: "0.1"
  delegation:
    amount: "500"
    renew:
      operator_send_renew: true
      operator_wait_epoch: 3
      participant_send_renew: true
      participant_wait_epoch: 4
      new_commission_rate: "0.2"
"#;

#[tokio::test]
async fn test_renew_waits_for_epochs() {
    let harness = Harness::new();
    let case = harness.run(RENEW).await;

    assert!(case.passed(), "error: {:?}", case.error);
    assert!(case.reached(ScenarioPhase::EpochGate));
    assert!(harness.chain.epoch() >= 4);
    assert_eq!(harness.submissions_of(OperationKind::Renew), 2);

    let map3 = case.transactions[0].contract_address.unwrap();
    let info = harness.ctx.rpc.map3_node_info(&map3).await.unwrap().unwrap();
    assert_eq!(info.commission_rate, "0.2".parse::<Decimal>().unwrap());
    harness.assert_clean();
}

#[tokio::test]
async fn test_renew_before_the_window_opens_fails() {
    let harness = Harness::new();
    let case = harness
        .run(
            r#"
name: "early_renew"
scenario: renew
expected: false
parameters:
  create_map3_node:
    amount: "1000"
  delegation:
    amount: "500"
    renew:
      participant_send_renew: true
"#,
        )
        .await;

    assert!(case.error.is_none());
    assert!(!case.result);
    assert!(!case.transactions.last().unwrap().success);
    assert!(!case.reached(ScenarioPhase::EpochGate));
}

#[tokio::test]
async fn test_repeat_renew_sends_an_extra_participant_renew() {
    let harness = Harness::new();
    let case = harness
        .run(
            r#"
name: "repeat_renew"
scenario: renew
parameters:
  mode: repeat_renew
  create_map3_node:
    amount: "1000"
  delegation:
    amount: "500"
    renew:
      participant_send_renew: true
      participant_wait_epoch: 3
      renew: false
"#,
        )
        .await;

    assert!(case.passed(), "error: {:?}", case.error);
    assert_eq!(harness.submissions_of(OperationKind::Renew), 2);
}

#[tokio::test]
async fn test_epoch_wait_timeout_aborts_the_run() {
    let harness = Harness::with(SimulatedChainConfig::default(), FUNDING_COINS, |config| {
        config.network.epoch_wait_timeout = Some(600);
    });
    let case = harness
        .run(
            r#"
name: "far_epoch"
scenario: renew
parameters:
  create_map3_node:
    amount: "1000"
  delegation:
    amount: "500"
    renew:
      operator_send_renew: true
      operator_wait_epoch: 1000
"#,
        )
        .await;

    assert_eq!(case.error.as_ref().map(|e| e.kind()), Some(ErrorKind::EpochWait));
    // The gated operator renew names the map3 node operator
    let operator = case.transactions[0].sender;
    match case.error.as_ref().unwrap() {
        ScenarioError::EpochWait {
            target, account, ..
        } => {
            assert_eq!(*target, 1000);
            assert!(account.contains("far_epoch_map3node"), "account: {}", account);
            assert!(account.contains(&operator.to_string()), "account: {}", account);
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert!(!case.result);
    assert!(case.reached(ScenarioPhase::TornDown));
    assert_eq!(harness.returns_to_funding().len(), 2);
    harness.assert_clean();
}

#[tokio::test]
async fn test_underfunded_account_fails_without_error() {
    // No gas reserve: the operator holds exactly the stake and can not pay the fee
    let harness = Harness::with(SimulatedChainConfig::default(), FUNDING_COINS, |config| {
        config.funding.gas_reserve = Amount::zero();
    });
    let case = harness.run(CREATE_MAP3).await;

    assert!(case.error.is_none(), "error: {:?}", case.error);
    assert!(!case.result);
    assert!(!case.passed());
    assert_eq!(case.transactions.len(), 1);
    assert!(!case.transactions[0].success);
    assert!(case
        .transactions[0]
        .error
        .as_deref()
        .unwrap_or_default()
        .contains("insufficient balance"));
    assert!(case.reached(ScenarioPhase::Evaluated));
    assert_eq!(case.phases.last(), Some(&ScenarioPhase::Done));
    harness.assert_clean();
}

const DELEGATE_REUSE: &str = r#"
name: "restake"
scenario: delegate
parameters:
  reuse_existing_validator: true
  create_validator:
    amount: "5000"
  create_map3_node:
    amount: "1000"
"#;

#[tokio::test]
async fn test_restake_reuses_the_validator() {
    let harness = Harness::with(SimulatedChainConfig::default(), FUNDING_COINS, |config| {
        config.network.map3_active_wait_time = 60;
    });

    let first = harness.run(DELEGATE_REUSE).await;
    let second = harness.run(&DELEGATE_REUSE.replace("restake", "restake_again")).await;

    assert!(first.passed(), "error: {:?}", first.error);
    assert!(second.passed(), "error: {:?}", second.error);
    assert_eq!(harness.submissions_of(OperationKind::CreateValidator), 1);
    assert_eq!(harness.submissions_of(OperationKind::CreateMap3Node), 2);

    // Only the validator operator is still around
    assert_eq!(harness.ctx.accounts.live_count(), 1);
    assert_eq!(harness.ctx.teardown_reusable().await, 1);
    harness.assert_clean();
}

#[tokio::test]
async fn test_restake_without_activation_wait_is_rejected() {
    let harness = Harness::new();
    let case = harness
        .run(&DELEGATE_REUSE.replace(
            "reuse_existing_validator: true",
            "reuse_existing_validator: false",
        ))
        .await;

    // The map3 node is still pending when the restake arrives
    assert!(case.error.is_none());
    assert!(!case.result);
    assert!(!case.transactions.last().unwrap().success);
    harness.assert_clean();
}

#[tokio::test]
async fn test_concurrent_cases_share_the_funding_account() {
    let harness = Harness::new();
    let mut cases: Vec<TestCase> = (0..6)
        .map(|i| {
            let mut case = parse_test_case(CREATE_MAP3).unwrap();
            case.name = format!("create_map3_{}", i);
            case
        })
        .collect();

    run_test_cases(&harness.ctx, &mut cases).await;

    assert!(cases.iter().all(|case| case.passed()));
    // Funding transfers never collided on a nonce
    let funding_transfers: Vec<_> = harness
        .chain
        .transfers()
        .into_iter()
        .filter(|t| t.from == harness.funding)
        .collect();
    assert_eq!(funding_transfers.len(), 6);
    assert!(funding_transfers.iter().all(|t| t.success));
    assert_eq!(harness.returns_to_funding().len(), 6);
    harness.assert_clean();

    let report = TestReport::from_cases(&cases);
    assert!(report.all_passed());
    assert_eq!(report.executed, 6);
}

#[tokio::test]
async fn test_bundled_scenarios_pass() {
    let harness = Harness::with(SimulatedChainConfig::default(), FUNDING_COINS, |config| {
        config.network.map3_active_wait_time = 60;
    });
    let mut cases = load_test_cases(concat!(env!("CARGO_MANIFEST_DIR"), "/scenarios"))
        .await
        .unwrap();
    assert_eq!(cases.len(), 10);

    run_test_cases(&harness.ctx, &mut cases).await;
    harness.ctx.teardown_reusable().await;

    let report = TestReport::from_cases(&cases);
    for failure in report.failures() {
        eprintln!("{:?}", failure);
    }
    assert!(report.all_passed());
    harness.assert_clean();
}
