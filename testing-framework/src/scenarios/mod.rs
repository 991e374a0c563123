//! Staking scenarios
//!
//! Every scenario is an entry point taking a [`TestCase`] and mutating it in
//! place: result, transactions, timestamps and the phases it went through.
//! Nothing is returned; an aborted run leaves its error on the test case.
//!
//! ```rust,ignore
//! use staking_testing_framework::prelude::*;
//!
//! let ctx = ScenarioContext::new(config, rpc, keystore, Arc::new(SystemClock));
//! let mut cases = load_test_cases("scenarios/").await?;
//! run_test_cases(&ctx, &mut cases).await;
//! ctx.teardown_reusable().await;
//! TestReport::from_cases(&cases).print();
//! ```

mod create;
mod delegate;
mod edit;
pub mod entities;
pub mod operations;
pub mod parser;
mod renew;
pub mod run;
mod terminate;
mod undelegate;

pub use entities::{Map3NodeHandle, ReusableEntities, ValidatorHandle};
pub use parser::{load_test_cases, parse_test_case, TestCaseDefinition};
pub use run::{ScenarioContext, ScenarioRun};

use crate::test_case::{ScenarioKind, TestCase};
use futures::future::join_all;

/// Runs the scenario `case` names
pub async fn run_test_case(ctx: &ScenarioContext, case: &mut TestCase) {
    match case.scenario {
        ScenarioKind::CreateValidator => create::create_validator(ctx, case).await,
        ScenarioKind::CreateMap3Node => create::create_map3_node(ctx, case).await,
        ScenarioKind::Delegate => delegate::delegate(ctx, case).await,
        ScenarioKind::Undelegate => undelegate::undelegate(ctx, case).await,
        ScenarioKind::Renew => renew::renew(ctx, case).await,
        ScenarioKind::EditValidator => edit::edit_validator(ctx, case).await,
        ScenarioKind::Terminate => terminate::terminate(ctx, case).await,
        ScenarioKind::TerminateInvalidAddress => {
            terminate::terminate_invalid_address(ctx, case).await
        }
    }
}

/// Runs every case concurrently on the current task. Transfers out of the
/// funding account stay serialized.
pub async fn run_test_cases(ctx: &ScenarioContext, cases: &mut [TestCase]) {
    join_all(cases.iter_mut().map(|case| run_test_case(ctx, case))).await;
}
