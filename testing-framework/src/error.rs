use serde::{Deserialize, Serialize};
use staking_common::staking::PayloadError;
use std::fmt;
use thiserror::Error;

/// Parameter problems caught before any account is created or any RPC is made
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParameterError {
    #[error("missing parameter section `{0}`")]
    MissingSection(String),

    #[error("{0} amount can not be nil")]
    NilAmount(String),

    #[error("{0} amount can not be a negative value")]
    NegativeAmount(String),

    #[error("funding multiple must be at least 1")]
    ZeroFundingMultiple,

    #[error("shard count must be at least 1")]
    ZeroShardCount,

    #[error("funding amount overflows")]
    FundingOverflow,

    #[error("{section} needs at least one bls key")]
    NoBlsKeys { section: String },

    #[error("mode `{mode}` is not supported by the {scenario} scenario")]
    UnsupportedMode { mode: String, scenario: String },

    #[error("invalid staking payload: {0}")]
    Payload(String),
}

impl From<PayloadError> for ParameterError {
    fn from(err: PayloadError) -> Self {
        Self::Payload(err.to_string())
    }
}

/// Category of a scenario failure, used in reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Provisioning,
    Submission,
    KeyManagement,
    Query,
    EpochWait,
}

/// Failure that aborted a scenario.
///
/// A transaction that went through but left the chain in an unexpected
/// state is not one of these: it only turns the test case result false.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioError {
    #[error("validation failed: {0}")]
    Validation(ParameterError),

    #[error("{step} failed for account {account}: {reason}")]
    Provisioning {
        step: String,
        account: String,
        reason: String,
    },

    #[error("{step} failed for account {account}: {reason}")]
    Submission {
        step: String,
        account: String,
        reason: String,
    },

    #[error("{step} failed for account {account}: {reason}")]
    KeyManagement {
        step: String,
        account: String,
        reason: String,
    },

    #[error("{step} failed for account {account}: {reason}")]
    Query {
        step: String,
        account: String,
        reason: String,
    },

    #[error("waiting for epoch {target} failed for account {account}: {reason}")]
    EpochWait {
        target: u64,
        account: String,
        reason: String,
    },
}

impl From<ParameterError> for ScenarioError {
    fn from(err: ParameterError) -> Self {
        Self::Validation(err)
    }
}

// `{:#}` keeps the whole context chain of an anyhow error on one line
fn reason(err: impl fmt::Display) -> String {
    format!("{:#}", err)
}

impl ScenarioError {
    pub fn provisioning(
        step: impl Into<String>,
        account: impl Into<String>,
        err: impl fmt::Display,
    ) -> Self {
        Self::Provisioning {
            step: step.into(),
            account: account.into(),
            reason: reason(err),
        }
    }

    pub fn submission(
        step: impl Into<String>,
        account: impl Into<String>,
        err: impl fmt::Display,
    ) -> Self {
        Self::Submission {
            step: step.into(),
            account: account.into(),
            reason: reason(err),
        }
    }

    pub fn key_management(
        step: impl Into<String>,
        account: impl Into<String>,
        err: impl fmt::Display,
    ) -> Self {
        Self::KeyManagement {
            step: step.into(),
            account: account.into(),
            reason: reason(err),
        }
    }

    pub fn query(
        step: impl Into<String>,
        account: impl Into<String>,
        err: impl fmt::Display,
    ) -> Self {
        Self::Query {
            step: step.into(),
            account: account.into(),
            reason: reason(err),
        }
    }

    pub fn epoch_wait(target: u64, account: impl Into<String>, err: impl fmt::Display) -> Self {
        Self::EpochWait {
            target,
            account: account.into(),
            reason: reason(err),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Provisioning { .. } => ErrorKind::Provisioning,
            Self::Submission { .. } => ErrorKind::Submission,
            Self::KeyManagement { .. } => ErrorKind::KeyManagement,
            Self::Query { .. } => ErrorKind::Query,
            Self::EpochWait { .. } => ErrorKind::EpochWait,
        }
    }
}
