use crate::error::ScenarioError;
use crate::parameters::StakingParameters;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use staking_common::staking::Transaction;
use std::fmt;

/// The fixed catalog of scenarios a test case can run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioKind {
    CreateValidator,
    CreateMap3Node,
    /// Restake a map3 node to a validator
    Delegate,
    Undelegate,
    Renew,
    EditValidator,
    Terminate,
    /// Terminate signed by an account other than the delegator
    TerminateInvalidAddress,
}

impl ScenarioKind {
    pub const ALL: [ScenarioKind; 8] = [
        Self::CreateValidator,
        Self::CreateMap3Node,
        Self::Delegate,
        Self::Undelegate,
        Self::Renew,
        Self::EditValidator,
        Self::Terminate,
        Self::TerminateInvalidAddress,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateValidator => "create_validator",
            Self::CreateMap3Node => "create_map3_node",
            Self::Delegate => "delegate",
            Self::Undelegate => "undelegate",
            Self::Renew => "renew",
            Self::EditValidator => "edit_validator",
            Self::Terminate => "terminate",
            Self::TerminateInvalidAddress => "terminate_invalid_address",
        }
    }
}

impl fmt::Display for ScenarioKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// States a scenario run moves through. Every run ends in `Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioPhase {
    Init,
    Validated,
    Funded,
    PrimaryEntityReady,
    SecondaryOperation,
    EpochGate,
    Evaluated,
    TornDown,
    Done,
}

/// A single scenario execution: parameters in, outcome recorded in place.
///
/// Built from configuration, mutated by exactly one run and never reused.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCase {
    pub name: String,
    pub scenario: ScenarioKind,
    pub parameters: StakingParameters,
    /// Result the run is expected to produce
    pub expected: bool,
    pub verbose: bool,

    pub executed: bool,
    pub result: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Submitted transactions, in submission order
    pub transactions: Vec<Transaction>,
    pub error: Option<ScenarioError>,
    pub phases: Vec<ScenarioPhase>,
}

impl TestCase {
    pub fn new(
        name: impl Into<String>,
        scenario: ScenarioKind,
        parameters: StakingParameters,
    ) -> Self {
        Self {
            name: name.into(),
            scenario,
            parameters,
            expected: true,
            verbose: false,
            executed: false,
            result: false,
            started_at: None,
            finished_at: None,
            transactions: Vec::new(),
            error: None,
            phases: Vec::new(),
        }
    }

    pub fn expecting(mut self, expected: bool) -> Self {
        self.expected = expected;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Ran, did not abort, and produced the expected result
    pub fn passed(&self) -> bool {
        self.executed && self.error.is_none() && self.result == self.expected
    }

    pub fn duration(&self) -> Option<chrono::Duration> {
        Some(self.finished_at? - self.started_at?)
    }

    pub fn reached(&self, phase: ScenarioPhase) -> bool {
        self.phases.contains(&phase)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_kind_names_round_trip_through_yaml() {
        for kind in ScenarioKind::ALL {
            let parsed: ScenarioKind = serde_yaml::from_str(kind.as_str()).unwrap();
            assert_eq!(parsed, kind);
        }
    }

    #[test]
    fn test_passed_requires_expected_result_and_no_error() {
        let mut case = TestCase::new("case", ScenarioKind::Terminate, StakingParameters::default())
            .expecting(false);
        assert!(!case.passed());

        case.executed = true;
        assert!(case.passed());

        case.result = true;
        assert!(!case.passed());

        case.result = false;
        case.error = Some(ScenarioError::epoch_wait(5, "case_delegator_1", "stalled"));
        assert!(!case.passed());
    }
}
