use crate::accounts::{Account, AccountManager};
use crate::rpc::{SignedStaking, StakingRpc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use staking_common::staking::{
    GasParams, OperationKind, PayloadError, StakingPayload, Transaction,
};
use std::time::Duration;
use thiserror::Error;

/// Where the nonce of a submission comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NonceSelection {
    /// Used verbatim, even if the chain will reject it
    Explicit(u64),
    /// Queried from the chain right before submission
    Auto,
}

impl NonceSelection {
    // Configuration uses a signed nonce where any negative value means "query it"
    pub fn from_config(nonce: i64) -> Self {
        if nonce >= 0 {
            Self::Explicit(nonce as u64)
        } else {
            Self::Auto
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitOptions {
    pub gas: GasParams,
    pub nonce: NonceSelection,
    pub timeout: Duration,
    pub shard: u32,
}

#[derive(Error, Debug)]
pub enum ExecuteError {
    #[error("invalid staking payload: {0}")]
    Invalid(#[from] PayloadError),

    #[error("failed to unlock signer: {0:#}")]
    Unlock(anyhow::Error),

    #[error("failed to resolve nonce: {0:#}")]
    Nonce(anyhow::Error),

    #[error("failed to submit {kind}: {error:#}")]
    Rpc {
        kind: OperationKind,
        error: anyhow::Error,
    },
}

/// Validates, signs and submits staking payloads.
///
/// Transport errors are returned as they come: there is no retry here.
pub struct TransactionExecutor<'a> {
    rpc: &'a dyn StakingRpc,
    accounts: &'a AccountManager,
    chain_id: u64,
}

impl<'a> TransactionExecutor<'a> {
    pub fn new(rpc: &'a dyn StakingRpc, accounts: &'a AccountManager, chain_id: u64) -> Self {
        Self {
            rpc,
            accounts,
            chain_id,
        }
    }

    pub async fn execute(
        &self,
        signer: &Account,
        payload: StakingPayload,
        options: &SubmitOptions,
    ) -> Result<Transaction, ExecuteError> {
        let kind = payload.kind();
        payload.validate()?;

        self.accounts.unlock(signer).map_err(ExecuteError::Unlock)?;
        let nonce = match options.nonce {
            NonceSelection::Explicit(nonce) => nonce,
            NonceSelection::Auto => self
                .rpc
                .current_nonce(&signer.address)
                .await
                .map_err(ExecuteError::Nonce)?,
        };

        debug!("Submitting {} from {} with nonce {}", kind, signer, nonce);
        let tx = SignedStaking {
            signer: signer.address,
            chain_id: self.chain_id,
            nonce,
            gas: options.gas,
            shard: options.shard,
            payload,
        };

        match tokio::time::timeout(options.timeout, self.rpc.submit_staking(tx)).await {
            Ok(Ok(receipt)) => {
                if !receipt.success {
                    debug!(
                        "{} from {} was rejected: {}",
                        kind,
                        signer,
                        receipt.error.as_deref().unwrap_or("unknown error")
                    );
                }
                Ok(Transaction::from_receipt(receipt, Some(kind), signer.address, nonce))
            }
            Ok(Err(error)) => Err(ExecuteError::Rpc { kind, error }),
            Err(_) => {
                warn!(
                    "{} from {} was not included within {:?}",
                    kind, signer, options.timeout
                );
                Ok(Transaction::timed_out(
                    Some(kind),
                    signer.address,
                    nonce,
                    format!("not included within {:?}", options.timeout),
                ))
            }
        }
    }
}
