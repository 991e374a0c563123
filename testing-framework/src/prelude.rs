//! Convenient re-exports for test code
//!
//! ```rust,ignore
//! use staking_testing_framework::prelude::*;
//! ```

pub use crate::accounts::{Account, AccountManager};
pub use crate::config::{AccountConfig, FrameworkConfig, FundingConfig, NetworkConfig};
pub use crate::error::{ErrorKind, ParameterError, ScenarioError};
pub use crate::keys::EditMode;
pub use crate::orchestrator::{Clock, PausedClock, SystemClock};
pub use crate::parameters::{ScenarioMode, StakingParameters};
pub use crate::report::TestReport;
pub use crate::rpc::keystore::InMemoryKeyStore;
pub use crate::rpc::simulated::{Fault, SimulatedChain, SimulatedChainConfig};
pub use crate::rpc::{KeyStore, StakingRpc};
pub use crate::scenarios::{
    load_test_cases, parse_test_case, run_test_case, run_test_cases, ScenarioContext,
};
pub use crate::test_case::{ScenarioKind, ScenarioPhase, TestCase};

pub use staking_common::crypto::Address;
pub use staking_common::{Amount, Decimal};

pub use anyhow::{Context, Result};
pub use std::sync::Arc;
pub use std::time::Duration;
