// Read-only projections of on-chain staking entities, refreshed by query

use super::Description;
use crate::crypto::{Address, NodePublicKey, ShardPublicKey};
use crate::{Amount, Decimal};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorInfo {
    pub validator_address: Address,
    pub operator_address: Address,
    pub bls_keys: Vec<ShardPublicKey>,
    pub commission_rate: Decimal,
    pub max_total_delegation: Option<Amount>,
    pub description: Description,
    // Keyed by the delegating map3 node (or the operator for self stake)
    pub delegations: BTreeMap<Address, Amount>,
}

impl ValidatorInfo {
    pub fn has_bls_key(&self, key: &ShardPublicKey) -> bool {
        self.bls_keys.contains(key)
    }

    pub fn delegation_from(&self, delegator: &Address) -> Amount {
        self.delegations
            .get(delegator)
            .copied()
            .unwrap_or_else(Amount::zero)
    }

    pub fn total_delegation(&self) -> Amount {
        self.delegations
            .values()
            .fold(Amount::zero(), |acc, amount| {
                acc.checked_add(*amount).unwrap_or(acc)
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Map3NodeStatus {
    Pending,
    Active,
    Terminated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Map3Delegation {
    pub amount: Amount,
    // None until the delegator answered the renewal round
    pub renewal: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Map3NodeInfo {
    pub map3_address: Address,
    pub operator_address: Address,
    pub node_keys: Vec<NodePublicKey>,
    pub commission_rate: Decimal,
    pub description: Description,
    pub status: Map3NodeStatus,
    pub delegations: BTreeMap<Address, Map3Delegation>,
    // Validator this node is restaked to, if any
    pub restaked_to: Option<Address>,
}

impl Map3NodeInfo {
    pub fn delegation_of(&self, delegator: &Address) -> Option<&Map3Delegation> {
        self.delegations.get(delegator)
    }

    pub fn active_delegation(&self, delegator: &Address) -> Amount {
        self.delegation_of(delegator)
            .map(|d| d.amount)
            .unwrap_or_else(Amount::zero)
    }

    pub fn total_delegation(&self) -> Amount {
        self.delegations
            .values()
            .fold(Amount::zero(), |acc, d| acc.checked_add(d.amount).unwrap_or(acc))
    }
}
