use crate::config::FundingConfig;
use crate::error::ParameterError;
use crate::rpc::{KeyStore, SignedTransfer, StakingRpc};
use anyhow::{bail, Context, Result};
use log::debug;
use staking_common::crypto::Address;
use staking_common::staking::TransactionReceipt;
use staking_common::Amount;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FundingDetails {
    /// Total to request from the funding account
    pub funding_amount: Amount,
    /// Share of the total per shard, rounded up
    pub per_shard_amount: Amount,
}

/// Computes how much a scenario has to draw from the funding account.
///
/// Pure: it runs during parameter validation, before anything touches the network.
pub fn calculate_funding_details(
    required: Option<Amount>,
    multiple: u64,
    shard_count: u32,
) -> Result<FundingDetails, ParameterError> {
    let required = required.ok_or_else(|| ParameterError::NilAmount("funding".into()))?;
    if required.is_negative() {
        return Err(ParameterError::NegativeAmount("funding".into()));
    }
    if multiple == 0 {
        return Err(ParameterError::ZeroFundingMultiple);
    }
    if shard_count == 0 {
        return Err(ParameterError::ZeroShardCount);
    }

    let funding_amount = required
        .checked_mul_int(multiple)
        .ok_or(ParameterError::FundingOverflow)?;
    let per_shard_amount = funding_amount
        .div_ceil_int(shard_count as u64)
        .ok_or(ParameterError::ZeroShardCount)?;

    Ok(FundingDetails {
        funding_amount,
        per_shard_amount,
    })
}

/// Adds optional amounts, propagating a missing one as `None`
pub fn sum_amounts(amounts: &[Option<Amount>]) -> Option<Amount> {
    amounts
        .iter()
        .try_fold(Amount::zero(), |acc, amount| acc.checked_add((*amount)?))
}

/// The shared account every test account is funded from.
///
/// Transfers out of it are serialized: the nonce query and the submission
/// happen under one lock, so concurrent scenarios never reuse a nonce.
pub struct FundingSource {
    config: FundingConfig,
    chain_id: u64,
    lock: Mutex<()>,
}

impl FundingSource {
    pub fn new(config: FundingConfig, chain_id: u64) -> Self {
        Self {
            config,
            chain_id,
            lock: Mutex::new(()),
        }
    }

    pub fn address(&self) -> &Address {
        &self.config.address
    }

    pub fn config(&self) -> &FundingConfig {
        &self.config
    }

    /// Fails unless the funding account holds at least `amount`
    pub async fn ensure_sufficient(&self, rpc: &dyn StakingRpc, amount: Amount) -> Result<Amount> {
        let balance = rpc
            .balance(&self.config.address, self.config.shard)
            .await
            .context("Failed to query funding account balance")?;
        if balance < amount {
            bail!(
                "funding account {} holds {}, {} required",
                self.config.address,
                balance,
                amount
            );
        }
        Ok(balance)
    }

    /// Transfers `amount` to `to` and waits for the transfer to succeed
    pub async fn fund(
        &self,
        rpc: &dyn StakingRpc,
        keystore: &dyn KeyStore,
        to: &Address,
        amount: Amount,
        to_shard: u32,
    ) -> Result<TransactionReceipt> {
        let _guard = self.lock.lock().await;

        keystore
            .unlock(&self.config.address, &self.config.passphrase)
            .context("Failed to unlock funding account")?;
        let nonce = rpc
            .current_nonce(&self.config.address)
            .await
            .context("Failed to query funding account nonce")?;

        debug!(
            "Funding {} with {} from {} (nonce {})",
            to, amount, self.config.address, nonce
        );
        let transfer = SignedTransfer {
            from: self.config.address,
            to: *to,
            amount,
            chain_id: self.chain_id,
            nonce,
            gas: self.config.gas,
            from_shard: self.config.shard,
            to_shard,
        };
        let receipt = tokio::time::timeout(self.config.transfer_timeout(), rpc.transfer(transfer))
            .await
            .with_context(|| {
                format!(
                    "Funding transfer to {} not confirmed within {:?}",
                    to,
                    self.config.transfer_timeout()
                )
            })?
            .with_context(|| format!("Failed to submit funding transfer to {}", to))?;

        if !receipt.success {
            bail!(
                "funding transfer to {} failed: {}",
                to,
                receipt.error.as_deref().unwrap_or("unknown error")
            );
        }
        Ok(receipt)
    }
}
