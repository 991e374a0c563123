//! Post-condition checks
//!
//! Every scenario result has the shape `tx.success && predicate`: a
//! transaction that went through is not enough, the chain state it was
//! supposed to produce has to be observed too. A false predicate is a normal
//! negative outcome, never an error.

use log::{debug, info};
use staking_common::crypto::{Address, ShardPublicKey};
use staking_common::staking::{
    Description, Map3NodeInfo, Map3NodeStatus, Transaction, ValidatorInfo,
};
use staking_common::{Amount, Decimal};

/// Creation result: the transaction succeeded, the entity exists and the
/// creator paid strictly more than the self stake (stake plus gas).
pub fn create_succeeded(
    tx: &Transaction,
    starting_balance: Amount,
    ending_balance: Amount,
    amount: Amount,
    exists: bool,
) -> bool {
    let Some(threshold) = starting_balance.checked_sub(amount) else {
        return false;
    };
    tx.success && ending_balance < threshold && exists
}

/// The delegator holds at least `amount` on the map3 node
pub fn delegation_recorded(info: &Map3NodeInfo, delegator: &Address, amount: Amount) -> bool {
    info.active_delegation(delegator) >= amount
}

/// The map3 node is restaked to the validator and the validator counts its stake
pub fn restaked(map3: &Map3NodeInfo, validator: &ValidatorInfo) -> bool {
    map3.restaked_to == Some(validator.validator_address)
        && validator.delegation_from(&map3.map3_address).is_positive()
}

/// No active delegation from `delegator` is left
pub fn undelegated(info: &Map3NodeInfo, delegator: &Address) -> bool {
    info.active_delegation(delegator).is_zero()
}

pub fn renewal_recorded(info: &Map3NodeInfo, delegator: &Address, renew: bool) -> bool {
    info.delegation_of(delegator)
        .map(|delegation| delegation.renewal == Some(renew))
        .unwrap_or(false)
}

pub fn terminated(info: &Map3NodeInfo) -> bool {
    info.status == Map3NodeStatus::Terminated
}

/// Expected validator state after an edit
///
/// Only the fields an edit sets are compared: empty description fields and
/// `None` values are not part of the expectation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditExpectation {
    pub description: Option<Description>,
    pub commission_rate: Option<Decimal>,
    pub max_total_delegation: Option<Amount>,
    pub added_key: Option<ShardPublicKey>,
    pub removed_key: Option<ShardPublicKey>,
}

impl EditExpectation {
    /// Field by field differences between the expectation and `validator`
    pub fn mismatches(&self, validator: &ValidatorInfo) -> Vec<String> {
        let mut mismatches = Vec::new();

        if let Some(expected) = &self.description {
            let actual = &validator.description;
            let fields = [
                ("name", &expected.name, &actual.name),
                ("identity", &expected.identity, &actual.identity),
                ("website", &expected.website, &actual.website),
                ("security_contact", &expected.security_contact, &actual.security_contact),
                ("details", &expected.details, &actual.details),
            ];
            for (field, expected, actual) in fields {
                if !expected.is_empty() && expected != actual {
                    mismatches.push(format!(
                        "description {}: expected {:?}, found {:?}",
                        field, expected, actual
                    ));
                }
            }
        }

        if let Some(expected) = self.commission_rate {
            if validator.commission_rate != expected {
                mismatches.push(format!(
                    "commission rate: expected {}, found {}",
                    expected, validator.commission_rate
                ));
            }
        }

        if let Some(expected) = self.max_total_delegation {
            if validator.max_total_delegation != Some(expected) {
                mismatches.push(format!(
                    "max total delegation: expected {}, found {:?}",
                    expected, validator.max_total_delegation
                ));
            }
        }

        if let Some(key) = &self.added_key {
            if !validator.has_bls_key(key) {
                mismatches.push(format!("bls key {} was not added", key));
            }
        }

        if let Some(key) = &self.removed_key {
            if validator.has_bls_key(key) {
                mismatches.push(format!("bls key {} was not removed", key));
            }
        }

        mismatches
    }

    /// True when every expected change is visible on `validator`
    pub fn evaluate_changes(&self, validator: &ValidatorInfo, verbose: bool) -> bool {
        let mismatches = self.mismatches(validator);
        for mismatch in &mismatches {
            if verbose {
                info!("Validator {}: {}", validator.validator_address, mismatch);
            } else {
                debug!("Validator {}: {}", validator.validator_address, mismatch);
            }
        }
        mismatches.is_empty()
    }
}
