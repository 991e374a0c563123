//! Ephemeral test accounts
//!
//! Every account is created for one test case, funded from the shared
//! funding account, and torn down exactly once: remaining funds go back to
//! the funding account and the local key material is discarded.

use crate::config::FrameworkConfig;
use crate::funding::{calculate_funding_details, FundingSource};
use crate::rpc::{KeyStore, SignedTransfer, StakingRpc};
use anyhow::{anyhow, bail, Context, Result};
use log::{debug, info, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use staking_common::crypto::Address;
use staking_common::Amount;
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub name: String,
    pub address: Address,
    /// Last balance observed for this account
    pub balance: Option<Amount>,
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.address)
    }
}

/// Builds `<test case>_<role>_<sequence>`, with the test case name reduced to
/// lowercase alphanumerics and underscores
pub fn generate_account_name(test_case: &str, role: &str, sequence: u64) -> String {
    let sanitize = |value: &str| -> String {
        value
            .trim()
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_lowercase()
                } else {
                    '_'
                }
            })
            .collect()
    };
    format!("{}_{}_{}", sanitize(test_case), sanitize(role), sequence)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TeardownOutcome {
    /// Amount sent back to the funding account, if anything was left to return
    pub returned: Option<Amount>,
}

pub struct AccountManager {
    rpc: Arc<dyn StakingRpc>,
    keystore: Arc<dyn KeyStore>,
    funding: FundingSource,
    passphrase: String,
    chain_id: u64,
    shard_count: u32,
    sequence: AtomicU64,
    // Accounts created and not yet torn down
    live: Mutex<HashSet<Address>>,
}

impl AccountManager {
    pub fn new(
        config: &FrameworkConfig,
        rpc: Arc<dyn StakingRpc>,
        keystore: Arc<dyn KeyStore>,
    ) -> Self {
        Self {
            rpc,
            keystore,
            funding: FundingSource::new(config.funding.clone(), config.network.chain_id),
            passphrase: config.account.passphrase.clone(),
            chain_id: config.network.chain_id,
            shard_count: config.network.shard_count,
            sequence: AtomicU64::new(0),
            live: Mutex::new(HashSet::new()),
        }
    }

    pub fn funding(&self) -> &FundingSource {
        &self.funding
    }

    pub fn is_live(&self, address: &Address) -> bool {
        self.live.lock().contains(address)
    }

    pub fn live_count(&self) -> usize {
        self.live.lock().len()
    }

    /// Creates local signing material for a new, unfunded account
    pub fn generate(&self, test_case: &str, role: &str) -> Result<Account> {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let name = generate_account_name(test_case, role, sequence);
        let address = self
            .keystore
            .create_account(&name, &self.passphrase)
            .with_context(|| format!("Failed to create account {}", name))?;

        self.live.lock().insert(address);
        debug!("Generated account {} ({})", name, address);
        Ok(Account {
            name,
            address,
            balance: None,
        })
    }

    /// Funds `account` with `amount × multiple` plus the configured gas reserve
    pub async fn fund(
        &self,
        account: &mut Account,
        amount: Amount,
        multiple: u64,
    ) -> Result<Amount> {
        let details = calculate_funding_details(Some(amount), multiple, self.shard_count)?;
        let total = details
            .funding_amount
            .checked_add(self.funding.config().gas_reserve)
            .ok_or_else(|| anyhow!("funding amount overflows"))?;
        debug!(
            "Funding account {} with {} ({} per shard)",
            account, total, details.per_shard_amount
        );

        self.funding
            .fund(
                self.rpc.as_ref(),
                self.keystore.as_ref(),
                &account.address,
                total,
                self.funding.config().shard,
            )
            .await?;

        let balance = self.refresh_balance(account).await?;
        info!("Funded account {} with {}, balance is now {}", account, total, balance);
        Ok(balance)
    }

    /// Generates and funds an account. If funding fails the account is torn
    /// down before the error is returned, so the caller never sees it.
    pub async fn generate_and_fund(
        &self,
        test_case: &str,
        role: &str,
        amount: Amount,
        multiple: u64,
    ) -> Result<Account> {
        let mut account = self.generate(test_case, role)?;
        if let Err(err) = self.fund(&mut account, amount, multiple).await {
            warn!("Funding account {} failed, tearing it down", account);
            if let Err(teardown_err) = self.teardown(&account).await {
                warn!("Teardown of account {} failed: {:#}", account, teardown_err);
            }
            return Err(err.context(format!("Failed to fund account {}", account.name)));
        }
        Ok(account)
    }

    /// Loads signing material of `account`; unlocking twice is a no-op
    pub fn unlock(&self, account: &Account) -> Result<()> {
        self.keystore
            .unlock(&account.address, &self.passphrase)
            .with_context(|| format!("Failed to unlock account {}", account))
    }

    pub async fn refresh_balance(&self, account: &mut Account) -> Result<Amount> {
        let balance = self
            .rpc
            .balance(&account.address, self.funding.config().shard)
            .await
            .with_context(|| format!("Failed to fetch balance of account {}", account))?;
        account.balance = Some(balance);
        Ok(balance)
    }

    /// Returns the remaining funds of `account` and forgets its key.
    ///
    /// Must run once per generated account; a second call fails without
    /// touching the network. The key is removed even if the return transfer fails.
    pub async fn teardown(&self, account: &Account) -> Result<TeardownOutcome> {
        if !self.live.lock().remove(&account.address) {
            bail!("account {} was already torn down", account);
        }

        let returned = self.return_funds(account).await;
        if let Err(err) = self.keystore.remove_account(&account.name) {
            warn!("Failed to remove account {} from keystore: {:#}", account, err);
        }
        returned
    }

    async fn return_funds(&self, account: &Account) -> Result<TeardownOutcome> {
        let funding = self.funding.config();
        let balance = self
            .rpc
            .balance(&account.address, funding.shard)
            .await
            .with_context(|| format!("Failed to fetch balance of account {}", account))?;
        let fee = funding
            .gas
            .max_fee()
            .ok_or_else(|| anyhow!("teardown gas fee overflows"))?;

        if balance <= fee {
            debug!("Account {} holds {}, nothing to return", account, balance);
            return Ok(TeardownOutcome { returned: None });
        }

        let amount = balance.saturating_sub(fee);
        self.unlock(account)?;
        let nonce = self
            .rpc
            .current_nonce(&account.address)
            .await
            .with_context(|| format!("Failed to fetch nonce of account {}", account))?;
        let transfer = SignedTransfer {
            from: account.address,
            to: funding.address,
            amount,
            chain_id: self.chain_id,
            nonce,
            gas: funding.gas,
            from_shard: funding.shard,
            to_shard: funding.shard,
        };

        let timeout: Duration = funding.transfer_timeout();
        let receipt = tokio::time::timeout(timeout, self.rpc.transfer(transfer))
            .await
            .with_context(|| {
                format!("Return transfer from {} not confirmed within {:?}", account, timeout)
            })?
            .with_context(|| format!("Failed to return funds from account {}", account))?;
        if !receipt.success {
            bail!(
                "return transfer from {} failed: {}",
                account,
                receipt.error.as_deref().unwrap_or("unknown error")
            );
        }

        info!("Returned {} from account {} to {}", amount, account, funding.address);
        Ok(TeardownOutcome {
            returned: Some(amount),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::{Fault, InMemoryKeyStore, SimulatedChain};

    fn setup() -> (Arc<SimulatedChain>, Arc<InMemoryKeyStore>, AccountManager) {
        let chain = Arc::new(SimulatedChain::default());
        let keystore = Arc::new(InMemoryKeyStore::new());
        let funding = keystore.create_account("funding", "").unwrap();
        chain.fund(&funding, Amount::from_coins(1_000));

        let config = FrameworkConfig::new(funding);
        let manager = AccountManager::new(&config, chain.clone(), keystore.clone());
        (chain, keystore, manager)
    }

    #[test]
    fn test_account_name_format() {
        assert_eq!(
            generate_account_name("Create Map3 Node: standard", "Operator", 7),
            "create_map3_node__standard_operator_7"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_fund_and_teardown_round_trip() {
        let (chain, keystore, manager) = setup();
        let account = manager
            .generate_and_fund("case", "delegator", Amount::from_coins(10), 2)
            .await
            .unwrap();

        // 10 x 2 plus the default 1 coin gas reserve
        assert_eq!(account.balance, Some(Amount::from_coins(21)));
        assert!(manager.is_live(&account.address));

        let outcome = manager.teardown(&account).await.unwrap();
        let fee = FrameworkConfig::new(Address::zero()).funding.gas.max_fee().unwrap();
        assert_eq!(
            outcome.returned,
            Some(Amount::from_coins(21).saturating_sub(fee))
        );
        assert!(!keystore.contains(&account.name));
        assert_eq!(
            chain.transfers_between(&account.address, manager.funding().address()),
            1
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_teardown_is_refused() {
        let (chain, _keystore, manager) = setup();
        let account = manager.generate("case", "operator").unwrap();

        manager.teardown(&account).await.unwrap();
        let calls = chain.calls();
        assert!(manager.teardown(&account).await.is_err());
        assert_eq!(chain.calls(), calls);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_funding_tears_account_down() {
        let (chain, keystore, manager) = setup();
        chain.inject(Fault::RejectTransfers);

        let err = manager
            .generate_and_fund("case", "operator", Amount::from_coins(10), 1)
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("funding transfer"));
        assert_eq!(manager.live_count(), 0);
        assert_eq!(keystore.removed().len(), 1);
    }
}
