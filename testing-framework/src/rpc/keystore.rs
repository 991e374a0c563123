// In-memory keystore. Secrets are stored encrypted under the account
// passphrase so a wrong passphrase fails to unlock, like a file keystore.

use super::KeyStore;
use anyhow::{anyhow, bail, Context, Result};
use parking_lot::Mutex;
use rand::{rngs::OsRng, RngCore};
use staking_common::crypto::{decrypt_with_passphrase, encrypt_with_passphrase, Address};
use std::collections::HashMap;

struct StoredKey {
    address: Address,
    encrypted_secret: String,
    unlocked: bool,
}

#[derive(Default)]
struct State {
    by_name: HashMap<String, StoredKey>,
    names: HashMap<Address, String>,
    removed: Vec<String>,
}

#[derive(Default)]
pub struct InMemoryKeyStore {
    state: Mutex<State>,
}

impl InMemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.state.lock().by_name.contains_key(name)
    }

    pub fn address_of(&self, name: &str) -> Option<Address> {
        self.state.lock().by_name.get(name).map(|key| key.address)
    }

    pub fn len(&self) -> usize {
        self.state.lock().by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Names of removed accounts, in removal order
    pub fn removed(&self) -> Vec<String> {
        self.state.lock().removed.clone()
    }
}

impl KeyStore for InMemoryKeyStore {
    fn create_account(&self, name: &str, passphrase: &str) -> Result<Address> {
        let mut state = self.state.lock();
        if state.by_name.contains_key(name) {
            bail!("account {} already exists", name);
        }

        let mut secret = [0u8; 32];
        OsRng.fill_bytes(&mut secret);
        let address = Address::from_key_material(&secret);
        let encrypted_secret = encrypt_with_passphrase(&hex::encode(secret), passphrase)
            .with_context(|| format!("Failed to encrypt key of account {}", name))?;

        state.names.insert(address, name.to_owned());
        state.by_name.insert(
            name.to_owned(),
            StoredKey {
                address,
                encrypted_secret,
                unlocked: false,
            },
        );
        Ok(address)
    }

    fn unlock(&self, address: &Address, passphrase: &str) -> Result<()> {
        let mut state = self.state.lock();
        let name = state
            .names
            .get(address)
            .cloned()
            .ok_or_else(|| anyhow!("no key for address {}", address))?;
        let key = state
            .by_name
            .get_mut(&name)
            .ok_or_else(|| anyhow!("no key for account {}", name))?;
        if key.unlocked {
            return Ok(());
        }

        decrypt_with_passphrase(&key.encrypted_secret, passphrase)
            .with_context(|| format!("Failed to unlock account {}", name))?;
        key.unlocked = true;
        Ok(())
    }

    fn is_unlocked(&self, address: &Address) -> bool {
        let state = self.state.lock();
        state
            .names
            .get(address)
            .and_then(|name| state.by_name.get(name))
            .map(|key| key.unlocked)
            .unwrap_or(false)
    }

    fn remove_account(&self, name: &str) -> Result<()> {
        let mut state = self.state.lock();
        let key = state
            .by_name
            .remove(name)
            .ok_or_else(|| anyhow!("no account named {}", name))?;
        state.names.remove(&key.address);
        state.removed.push(name.to_owned());
        Ok(())
    }
}
