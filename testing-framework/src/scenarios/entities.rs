// Local references to on-chain staking entities.
//
// A handle is a projection of chain state: `exists` comes from a query and
// the handle is only changed after a transaction that changed the chain.

use crate::accounts::Account;
use staking_common::crypto::{Address, BlsKey};
use tokio::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone)]
pub struct ValidatorHandle {
    /// Operator account that created the validator
    pub account: Account,
    pub validator_address: Option<Address>,
    pub bls_keys: Vec<BlsKey>,
    pub exists: bool,
}

impl ValidatorHandle {
    pub fn operator_address(&self) -> Address {
        self.account.address
    }
}

#[derive(Debug, Clone)]
pub struct Map3NodeHandle {
    /// Operator account that created the node
    pub account: Account,
    pub map3_address: Option<Address>,
    pub bls_keys: Vec<BlsKey>,
    pub exists: bool,
}

impl Map3NodeHandle {
    pub fn operator_address(&self) -> Address {
        self.account.address
    }
}

/// Entities kept across test cases when a case sets `reuse_existing_validator`.
///
/// Lives on the scenario context. The accounts behind cached entities are
/// never torn down by the scenario that created them; see
/// [`crate::scenarios::ScenarioContext::teardown_reusable`].
#[derive(Default)]
pub struct ReusableEntities {
    validator: Mutex<Option<ValidatorHandle>>,
    map3_node: Mutex<Option<Map3NodeHandle>>,
}

impl ReusableEntities {
    pub fn new() -> Self {
        Self::default()
    }

    /// Held while checking for and creating a reusable validator, so two
    /// concurrent cases never both create one
    pub async fn validator(&self) -> MutexGuard<'_, Option<ValidatorHandle>> {
        self.validator.lock().await
    }

    pub async fn map3_node(&self) -> MutexGuard<'_, Option<Map3NodeHandle>> {
        self.map3_node.lock().await
    }

    /// Replaces the cached validator if `handle` refers to it
    pub async fn refresh_validator(&self, handle: &ValidatorHandle) {
        let mut cached = self.validator.lock().await;
        if let Some(current) = cached.as_mut() {
            if current.validator_address == handle.validator_address {
                *current = handle.clone();
            }
        }
    }

    /// Empties the cache, returning the accounts still owning cached entities
    pub async fn drain(&self) -> Vec<Account> {
        let mut accounts = Vec::new();
        if let Some(validator) = self.validator.lock().await.take() {
            accounts.push(validator.account);
        }
        if let Some(map3_node) = self.map3_node.lock().await.take() {
            accounts.push(map3_node.account);
        }
        accounts
    }
}
