//! # Staking Testing Framework
//!
//! End-to-end scenario engine for the staking lifecycle of a proof-of-stake
//! chain: it funds ephemeral accounts, submits typed staking operations,
//! waits on epochs, checks the resulting chain state and returns every
//! account's funds at the end of a run.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use staking_testing_framework::prelude::*;
//!
//! #[tokio::test]
//! async fn test_create_map3_node() {
//!     let clock = Arc::new(PausedClock::new());
//!     let chain = Arc::new(SimulatedChain::default());
//!     let keystore = Arc::new(InMemoryKeyStore::new());
//!     let ctx = ScenarioContext::new(config, chain, keystore, clock);
//!
//!     let mut case = parse_test_case(YAML).unwrap();
//!     run_test_case(&ctx, &mut case).await;
//!     assert!(case.passed());
//! }
//! ```
//!
//! ## Layout
//!
//! - [`rpc`]: the chain and keystore boundary, plus an in-process simulated chain
//! - [`accounts`], [`funding`]: ephemeral account lifecycle and the shared funding account
//! - [`executor`]: nonce resolution and staking transaction submission
//! - [`waiters`]: epoch gates
//! - [`keys`], [`evaluator`]: BLS key changes and post-condition checks
//! - [`scenarios`]: the scenario catalog and its run state machine

#![warn(clippy::all)]

pub mod accounts;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod executor;
pub mod funding;
pub mod keys;

/// Clock abstraction shared by epoch gates and settle waits
pub mod orchestrator;

pub mod parameters;
pub mod prelude;
pub mod report;
pub mod rpc;
pub mod scenarios;
pub mod test_case;
pub mod waiters;

pub use error::{ErrorKind, ParameterError, ScenarioError};
pub use orchestrator::{Clock, PausedClock, SystemClock};
pub use scenarios::{run_test_case, run_test_cases, ScenarioContext};
pub use test_case::{ScenarioKind, ScenarioPhase, TestCase};

/// Framework version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
