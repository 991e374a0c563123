//! Chain and keystore boundaries
//!
//! Everything the scenario engine needs from the network goes through
//! [`StakingRpc`]; everything it needs from local signing material goes
//! through [`KeyStore`]. Both return `anyhow::Result` so implementations can
//! attach whatever transport context they have.
//!
//! A transaction the chain rejects is not an RPC error: it comes back as a
//! receipt with `success == false`. Only transport problems are `Err`.

pub mod keystore;
pub mod simulated;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use staking_common::crypto::Address;
use staking_common::staking::{
    GasParams, Map3NodeInfo, StakingPayload, TransactionReceipt, ValidatorInfo,
};
use staking_common::Amount;

pub use keystore::InMemoryKeyStore;
pub use simulated::{CallCounts, Fault, SimulatedChain, SimulatedChainConfig};

/// Plain value transfer between two accounts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransfer {
    pub from: Address,
    pub to: Address,
    pub amount: Amount,
    pub chain_id: u64,
    pub nonce: u64,
    pub gas: GasParams,
    pub from_shard: u32,
    pub to_shard: u32,
}

/// A staking payload together with everything needed to submit it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedStaking {
    pub signer: Address,
    pub chain_id: u64,
    pub nonce: u64,
    pub gas: GasParams,
    pub shard: u32,
    pub payload: StakingPayload,
}

/// RPC surface of a staking network
#[async_trait]
pub trait StakingRpc: Send + Sync {
    /// Current epoch reported by the beacon shard
    async fn current_epoch(&self) -> Result<u64>;

    /// Next nonce to use for `address`
    async fn current_nonce(&self, address: &Address) -> Result<u64>;

    async fn balance(&self, address: &Address, shard: u32) -> Result<Amount>;

    /// Submits a transfer and waits for its receipt
    async fn transfer(&self, transfer: SignedTransfer) -> Result<TransactionReceipt>;

    /// Submits a staking transaction and waits for its receipt
    async fn submit_staking(&self, tx: SignedStaking) -> Result<TransactionReceipt>;

    /// `None` when no validator is registered at `address`
    async fn validator_info(&self, address: &Address) -> Result<Option<ValidatorInfo>>;

    /// `None` when no map3 node is registered at `address`
    async fn map3_node_info(&self, address: &Address) -> Result<Option<Map3NodeInfo>>;
}

/// Local signing material for test accounts
pub trait KeyStore: Send + Sync {
    /// Creates a new account under `name`, protected by `passphrase`
    fn create_account(&self, name: &str, passphrase: &str) -> Result<Address>;

    /// Loads the signing key of `address` into memory. Unlocking twice is a no-op.
    fn unlock(&self, address: &Address, passphrase: &str) -> Result<()>;

    fn is_unlocked(&self, address: &Address) -> bool;

    /// Forgets the account and its key material
    fn remove_account(&self, name: &str) -> Result<()>;
}
