//! In-process staking network
//!
//! `SimulatedChain` implements [`StakingRpc`] on top of a single locked state
//! map. It applies the staking rules the scenarios exercise (signer checks,
//! nonces, fees, balances, BLS proof-of-possession, map3 activation and
//! renewal windows) and derives the epoch from tokio time, so tests driven by
//! a paused clock move through epochs without real waiting.
//!
//! Faults can be injected to exercise the failure paths of the scenario engine.

use super::{SignedStaking, SignedTransfer, StakingRpc};
use anyhow::{bail, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use staking_common::config::MIN_VALIDATOR_BLS_KEYS;
use staking_common::crypto::{keccak256, Address, Hash};
use staking_common::staking::{
    CreateMap3Node, CreateValidator, Delegate, DelegationTarget, EditValidator, GasParams,
    Map3Delegation, Map3NodeInfo, Map3NodeStatus, OperationKind, Renew, StakingPayload,
    Terminate, TransactionReceipt, Undelegate, ValidatorInfo,
};
use staking_common::Amount;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct SimulatedChainConfig {
    pub chain_id: u64,
    pub start_epoch: u64,
    pub epoch_duration: Duration,
    /// Epochs after creation before a map3 node becomes active
    pub map3_activation_epochs: u64,
    /// Epochs after creation before renew transactions are accepted
    pub renew_open_after: u64,
    /// Message proofs of possession are checked against; empty means the default
    pub verification_message: String,
}

impl Default for SimulatedChainConfig {
    fn default() -> Self {
        Self {
            chain_id: 2,
            start_epoch: 1,
            epoch_duration: Duration::from_secs(60),
            map3_activation_epochs: 1,
            renew_open_after: 2,
            verification_message: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// Transfers are included but fail
    RejectTransfers,
    /// Transfer calls return a transport error
    TransferRpcError,
    /// Submissions of this kind are included but fail
    RejectSubmission(OperationKind),
    /// Submissions of this kind return a transport error
    SubmissionRpcError(OperationKind),
    /// Every staking receipt is delayed by this long
    StallSubmissions(Duration),
    /// Epoch queries return a transport error
    EpochRpcError,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CallCounts {
    pub current_epoch: usize,
    pub current_nonce: usize,
    pub balance: usize,
    pub transfer: usize,
    pub submit_staking: usize,
    pub validator_info: usize,
    pub map3_node_info: usize,
}

impl CallCounts {
    pub fn total(&self) -> usize {
        self.current_epoch
            + self.current_nonce
            + self.balance
            + self.transfer
            + self.submit_staking
            + self.validator_info
            + self.map3_node_info
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRecord {
    pub from: Address,
    pub to: Address,
    pub amount: Amount,
    pub success: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionRecord {
    pub kind: OperationKind,
    pub signer: Address,
    pub success: bool,
}

struct Map3Record {
    info: Map3NodeInfo,
    created_epoch: u64,
}

#[derive(Default)]
struct ChainState {
    balances: HashMap<Address, Amount>,
    nonces: HashMap<Address, u64>,
    validators: HashMap<Address, ValidatorInfo>,
    map3_nodes: HashMap<Address, Map3Record>,
    registered_keys: HashSet<Vec<u8>>,
    faults: Vec<Fault>,
    calls: CallCounts,
    transfers: Vec<TransferRecord>,
    submissions: Vec<SubmissionRecord>,
    tx_counter: u64,
}

type Applied = std::result::Result<Option<Address>, String>;

impl ChainState {
    fn balance(&self, address: &Address) -> Amount {
        self.balances
            .get(address)
            .copied()
            .unwrap_or_else(Amount::zero)
    }

    fn credit(&mut self, address: &Address, amount: Amount) {
        let balance = self.balance(address);
        self.balances
            .insert(*address, balance.checked_add(amount).unwrap_or(balance));
    }

    fn debit(&mut self, address: &Address, amount: Amount) -> std::result::Result<(), String> {
        let balance = self.balance(address);
        if balance < amount {
            return Err(format!(
                "insufficient balance: {} has {}, needs {}",
                address, balance, amount
            ));
        }
        self.balances.insert(*address, balance.saturating_sub(amount));
        Ok(())
    }

    fn next_hash(&mut self, sender: &Address, nonce: u64) -> Hash {
        self.tx_counter += 1;
        let mut material = sender.as_bytes().to_vec();
        material.extend_from_slice(&nonce.to_be_bytes());
        material.extend_from_slice(&self.tx_counter.to_be_bytes());
        keccak256(&material)
    }

    fn has_fault(&self, fault: &Fault) -> bool {
        self.faults.contains(fault)
    }

    fn failed(
        &mut self,
        sender: &Address,
        nonce: u64,
        error: impl Into<String>,
    ) -> TransactionReceipt {
        TransactionReceipt {
            hash: self.next_hash(sender, nonce),
            success: false,
            contract_address: None,
            error: Some(error.into()),
        }
    }

    // Checks shared by every transaction. On success the fee is charged and
    // the nonce consumed; a failure here leaves the sender untouched.
    fn admit(
        &mut self,
        chain_id: u64,
        expected_chain_id: u64,
        sender: &Address,
        nonce: u64,
        gas: &GasParams,
    ) -> std::result::Result<(), String> {
        if chain_id != expected_chain_id {
            return Err(format!("invalid chain id {}", chain_id));
        }
        let expected = self.nonces.get(sender).copied().unwrap_or(0);
        if nonce != expected {
            return Err(format!("invalid nonce: expected {}, got {}", expected, nonce));
        }
        let fee = gas
            .max_fee()
            .ok_or_else(|| "gas fee overflows".to_string())?;
        self.debit(sender, fee)
            .map_err(|e| format!("can not pay gas: {}", e))?;
        self.nonces.insert(*sender, expected + 1);
        Ok(())
    }
}

pub struct SimulatedChain {
    config: SimulatedChainConfig,
    genesis: Instant,
    state: Mutex<ChainState>,
}

impl SimulatedChain {
    pub fn new(config: SimulatedChainConfig) -> Self {
        Self {
            config,
            genesis: Instant::now(),
            state: Mutex::new(ChainState::default()),
        }
    }

    pub fn config(&self) -> &SimulatedChainConfig {
        &self.config
    }

    /// Credits `amount` to `address` outside of any transaction
    pub fn fund(&self, address: &Address, amount: Amount) {
        self.state.lock().credit(address, amount);
    }

    pub fn balance_of(&self, address: &Address) -> Amount {
        self.state.lock().balance(address)
    }

    pub fn epoch(&self) -> u64 {
        let duration = self.config.epoch_duration.as_nanos();
        if duration == 0 {
            return self.config.start_epoch;
        }
        let elapsed = Instant::now().duration_since(self.genesis).as_nanos();
        self.config.start_epoch + (elapsed / duration) as u64
    }

    pub fn inject(&self, fault: Fault) {
        self.state.lock().faults.push(fault);
    }

    pub fn clear_faults(&self) {
        self.state.lock().faults.clear();
    }

    pub fn calls(&self) -> CallCounts {
        self.state.lock().calls
    }

    pub fn transfers(&self) -> Vec<TransferRecord> {
        self.state.lock().transfers.clone()
    }

    /// Successful transfers from `from` to `to`
    pub fn transfers_between(&self, from: &Address, to: &Address) -> usize {
        self.state
            .lock()
            .transfers
            .iter()
            .filter(|t| t.success && t.from == *from && t.to == *to)
            .count()
    }

    pub fn submissions(&self) -> Vec<SubmissionRecord> {
        self.state.lock().submissions.clone()
    }

    fn map3_status(&self, record: &Map3Record, epoch: u64) -> Map3NodeStatus {
        match record.info.status {
            Map3NodeStatus::Terminated => Map3NodeStatus::Terminated,
            _ if epoch >= record.created_epoch + self.config.map3_activation_epochs => {
                Map3NodeStatus::Active
            }
            _ => Map3NodeStatus::Pending,
        }
    }

    fn refresh_map3(&self, state: &mut ChainState, address: &Address) {
        let epoch = self.epoch();
        if let Some(record) = state.map3_nodes.get(address) {
            let status = self.map3_status(record, epoch);
            if let Some(record) = state.map3_nodes.get_mut(address) {
                record.info.status = status;
            }
        }
    }

    fn apply(&self, state: &mut ChainState, tx: &SignedStaking) -> Applied {
        match &tx.payload {
            StakingPayload::CreateValidator(p) => self.create_validator(state, tx, p),
            StakingPayload::CreateMap3Node(p) => self.create_map3_node(state, tx, p),
            StakingPayload::Delegate(p) => self.delegate(state, tx, p),
            StakingPayload::Undelegate(p) => self.undelegate(state, tx, p),
            StakingPayload::Renew(p) => self.renew(state, tx, p),
            StakingPayload::EditValidator(p) => self.edit_validator(state, tx, p),
            StakingPayload::Terminate(p) => self.terminate(state, tx, p),
        }
    }

    fn verify_possession(
        &self,
        state: &ChainState,
        key: &[u8; 48],
        signature: &staking_common::crypto::BlsSignature,
    ) -> std::result::Result<(), String> {
        if state.registered_keys.contains(key.as_slice()) {
            return Err(format!("bls key {} is already registered", hex::encode(key)));
        }
        if !signature.verify(&self.config.verification_message, key) {
            return Err(format!(
                "bls key {} has an invalid proof of possession",
                hex::encode(key)
            ));
        }
        Ok(())
    }

    fn create_validator(
        &self,
        state: &mut ChainState,
        tx: &SignedStaking,
        p: &CreateValidator,
    ) -> Applied {
        if tx.signer != p.operator_address {
            return Err("signer is not the operator address".into());
        }
        let amount = p.amount.ok_or("missing self delegation amount")?;
        for (key, signature) in p.bls_keys.iter().zip(&p.bls_signatures) {
            self.verify_possession(state, key.as_bytes(), signature)?;
        }
        state.debit(&tx.signer, amount)?;

        let address = Address::derive_contract(&tx.signer, tx.nonce);
        for key in &p.bls_keys {
            state.registered_keys.insert(key.as_bytes().to_vec());
        }
        let mut delegations = BTreeMap::new();
        delegations.insert(p.operator_address, amount);
        state.validators.insert(
            address,
            ValidatorInfo {
                validator_address: address,
                operator_address: p.operator_address,
                bls_keys: p.bls_keys.clone(),
                commission_rate: p.commission_rate,
                max_total_delegation: p.max_total_delegation,
                description: p.description.clone(),
                delegations,
            },
        );
        Ok(Some(address))
    }

    fn create_map3_node(
        &self,
        state: &mut ChainState,
        tx: &SignedStaking,
        p: &CreateMap3Node,
    ) -> Applied {
        if tx.signer != p.operator_address {
            return Err("signer is not the operator address".into());
        }
        let amount = p.amount.ok_or("missing self delegation amount")?;
        for (key, signature) in p.node_keys.iter().zip(&p.node_signatures) {
            self.verify_possession(state, key.as_bytes(), signature)?;
        }
        state.debit(&tx.signer, amount)?;

        let address = Address::derive_contract(&tx.signer, tx.nonce);
        for key in &p.node_keys {
            state.registered_keys.insert(key.as_bytes().to_vec());
        }
        let mut delegations = BTreeMap::new();
        delegations.insert(
            p.operator_address,
            Map3Delegation {
                amount,
                renewal: None,
            },
        );
        state.map3_nodes.insert(
            address,
            Map3Record {
                info: Map3NodeInfo {
                    map3_address: address,
                    operator_address: p.operator_address,
                    node_keys: p.node_keys.clone(),
                    commission_rate: p.commission_rate,
                    description: p.description.clone(),
                    status: Map3NodeStatus::Pending,
                    delegations,
                    restaked_to: None,
                },
                created_epoch: self.epoch(),
            },
        );
        Ok(Some(address))
    }

    fn delegate(&self, state: &mut ChainState, tx: &SignedStaking, p: &Delegate) -> Applied {
        match p.target {
            DelegationTarget::Map3Node(map3_address) => {
                if tx.signer != p.delegator {
                    return Err("signer does not match delegator".into());
                }
                let amount = p.amount.ok_or("missing delegation amount")?;
                self.refresh_map3(state, &map3_address);
                match state.map3_nodes.get(&map3_address) {
                    None => return Err(format!("map3 node {} not found", map3_address)),
                    Some(record) if record.info.status == Map3NodeStatus::Terminated => {
                        return Err("map3 node is terminated".into())
                    }
                    Some(_) => {}
                }
                state.debit(&tx.signer, amount)?;
                if let Some(record) = state.map3_nodes.get_mut(&map3_address) {
                    let entry = record
                        .info
                        .delegations
                        .entry(p.delegator)
                        .or_insert(Map3Delegation {
                            amount: Amount::zero(),
                            renewal: None,
                        });
                    entry.amount = entry.amount.checked_add(amount).unwrap_or(entry.amount);
                }
                Ok(None)
            }
            DelegationTarget::Validator(validator_address) => {
                self.refresh_map3(state, &p.delegator);
                let record = state
                    .map3_nodes
                    .get(&p.delegator)
                    .ok_or_else(|| format!("map3 node {} not found", p.delegator))?;
                if record.info.operator_address != tx.signer {
                    return Err("only the map3 node operator can restake it".into());
                }
                if record.info.status != Map3NodeStatus::Active {
                    return Err("map3 node is not active".into());
                }
                if record.info.restaked_to.is_some() {
                    return Err("map3 node is already restaked".into());
                }
                let stake = record.info.total_delegation();
                let validator = state
                    .validators
                    .get_mut(&validator_address)
                    .ok_or_else(|| format!("validator {} not found", validator_address))?;
                let current = validator.delegation_from(&p.delegator);
                validator
                    .delegations
                    .insert(p.delegator, current.checked_add(stake).unwrap_or(current));
                if let Some(record) = state.map3_nodes.get_mut(&p.delegator) {
                    record.info.restaked_to = Some(validator_address);
                }
                Ok(None)
            }
        }
    }

    fn undelegate(&self, state: &mut ChainState, tx: &SignedStaking, p: &Undelegate) -> Applied {
        if tx.signer != p.delegator {
            return Err("signer does not match delegator".into());
        }
        let amount = p.amount.ok_or("missing undelegation amount")?;
        self.refresh_map3(state, &p.map3_address);
        let record = state
            .map3_nodes
            .get_mut(&p.map3_address)
            .ok_or_else(|| format!("map3 node {} not found", p.map3_address))?;
        if record.info.status == Map3NodeStatus::Terminated {
            return Err("map3 node is terminated".into());
        }
        if record.info.restaked_to.is_some() {
            return Err("can not undelegate from a restaked map3 node".into());
        }
        let delegation = record
            .info
            .delegations
            .get_mut(&p.delegator)
            .ok_or("no delegation from this delegator")?;
        if delegation.amount < amount {
            return Err(format!(
                "undelegation of {} exceeds delegation of {}",
                amount, delegation.amount
            ));
        }
        delegation.amount = delegation.amount.saturating_sub(amount);
        if delegation.amount.is_zero() {
            record.info.delegations.remove(&p.delegator);
        }
        state.credit(&p.delegator, amount);
        Ok(None)
    }

    fn renew(&self, state: &mut ChainState, tx: &SignedStaking, p: &Renew) -> Applied {
        if tx.signer != p.delegator {
            return Err("signer does not match delegator".into());
        }
        let epoch = self.epoch();
        self.refresh_map3(state, &p.map3_address);
        let record = state
            .map3_nodes
            .get_mut(&p.map3_address)
            .ok_or_else(|| format!("map3 node {} not found", p.map3_address))?;
        if record.info.status == Map3NodeStatus::Terminated {
            return Err("map3 node is terminated".into());
        }
        let open_epoch = record.created_epoch + self.config.renew_open_after;
        if epoch < open_epoch {
            return Err(format!("renewal is not open until epoch {}", open_epoch));
        }
        if p.new_commission_rate.is_some() && record.info.operator_address != tx.signer {
            return Err("only the operator can change the commission rate".into());
        }
        let delegation = record
            .info
            .delegations
            .get_mut(&p.delegator)
            .ok_or("no delegation to renew")?;
        delegation.renewal = Some(p.renew);
        if let Some(rate) = p.new_commission_rate {
            record.info.commission_rate = rate;
        }
        Ok(None)
    }

    fn edit_validator(
        &self,
        state: &mut ChainState,
        tx: &SignedStaking,
        p: &EditValidator,
    ) -> Applied {
        let validator = state
            .validators
            .get(&p.validator_address)
            .ok_or_else(|| format!("validator {} not found", p.validator_address))?;
        if tx.signer != p.operator_address || validator.operator_address != tx.signer {
            return Err("signer is not the validator operator".into());
        }

        let mut keys = validator.bls_keys.clone();
        if let Some(remove) = &p.bls_key_to_remove {
            let position = keys
                .iter()
                .position(|key| key == remove)
                .ok_or_else(|| format!("bls key {} is not registered", remove))?;
            keys.remove(position);
        }
        if let (Some(add), Some(signature)) = (&p.bls_key_to_add, &p.bls_key_to_add_signature) {
            self.verify_possession(state, add.as_bytes(), signature)?;
            keys.push(*add);
        }
        if keys.len() < MIN_VALIDATOR_BLS_KEYS {
            return Err("validator must keep at least one bls key".into());
        }

        if let Some(remove) = &p.bls_key_to_remove {
            state.registered_keys.remove(remove.as_bytes().as_slice());
        }
        if let Some(add) = &p.bls_key_to_add {
            state.registered_keys.insert(add.as_bytes().to_vec());
        }
        let validator = state
            .validators
            .get_mut(&p.validator_address)
            .ok_or_else(|| format!("validator {} not found", p.validator_address))?;
        validator.bls_keys = keys;
        if let Some(description) = &p.description {
            validator.description = validator.description.merged_with(description);
        }
        if let Some(rate) = p.commission_rate {
            validator.commission_rate = rate;
        }
        if let Some(max) = p.max_total_delegation {
            validator.max_total_delegation = Some(max);
        }
        Ok(None)
    }

    fn terminate(&self, state: &mut ChainState, tx: &SignedStaking, p: &Terminate) -> Applied {
        if tx.signer != p.delegator {
            return Err("sender address does not match delegator".into());
        }
        self.refresh_map3(state, &p.map3_address);
        let record = state
            .map3_nodes
            .get_mut(&p.map3_address)
            .ok_or_else(|| format!("map3 node {} not found", p.map3_address))?;
        if record.info.operator_address != tx.signer {
            return Err("only the operator can terminate a map3 node".into());
        }
        if record.info.status == Map3NodeStatus::Terminated {
            return Err("map3 node is already terminated".into());
        }
        if record.info.restaked_to.is_some() {
            return Err("can not terminate a restaked map3 node".into());
        }

        record.info.status = Map3NodeStatus::Terminated;
        let refunds: Vec<(Address, Amount)> = std::mem::take(&mut record.info.delegations)
            .into_iter()
            .map(|(delegator, delegation)| (delegator, delegation.amount))
            .collect();
        for (delegator, amount) in refunds {
            state.credit(&delegator, amount);
        }
        Ok(None)
    }
}

impl Default for SimulatedChain {
    fn default() -> Self {
        Self::new(SimulatedChainConfig::default())
    }
}

#[async_trait]
impl StakingRpc for SimulatedChain {
    async fn current_epoch(&self) -> Result<u64> {
        let mut state = self.state.lock();
        state.calls.current_epoch += 1;
        if state.has_fault(&Fault::EpochRpcError) {
            bail!("epoch query failed: connection reset");
        }
        Ok(self.epoch())
    }

    async fn current_nonce(&self, address: &Address) -> Result<u64> {
        let mut state = self.state.lock();
        state.calls.current_nonce += 1;
        Ok(state.nonces.get(address).copied().unwrap_or(0))
    }

    async fn balance(&self, address: &Address, _shard: u32) -> Result<Amount> {
        let mut state = self.state.lock();
        state.calls.balance += 1;
        Ok(state.balance(address))
    }

    async fn transfer(&self, transfer: SignedTransfer) -> Result<TransactionReceipt> {
        let mut state = self.state.lock();
        state.calls.transfer += 1;
        if state.has_fault(&Fault::TransferRpcError) {
            bail!("transfer submission failed: connection reset");
        }

        let outcome = state
            .admit(
                transfer.chain_id,
                self.config.chain_id,
                &transfer.from,
                transfer.nonce,
                &transfer.gas,
            )
            .and_then(|_| {
                if state.has_fault(&Fault::RejectTransfers) {
                    return Err("transfer rejected".to_string());
                }
                state.debit(&transfer.from, transfer.amount)
            });

        let receipt = match outcome {
            Ok(()) => {
                state.credit(&transfer.to, transfer.amount);
                TransactionReceipt {
                    hash: state.next_hash(&transfer.from, transfer.nonce),
                    success: true,
                    contract_address: None,
                    error: None,
                }
            }
            Err(reason) => state.failed(&transfer.from, transfer.nonce, reason),
        };

        state.transfers.push(TransferRecord {
            from: transfer.from,
            to: transfer.to,
            amount: transfer.amount,
            success: receipt.success,
        });
        Ok(receipt)
    }

    async fn submit_staking(&self, tx: SignedStaking) -> Result<TransactionReceipt> {
        let kind = tx.payload.kind();
        let stall = {
            let mut state = self.state.lock();
            state.calls.submit_staking += 1;
            if state.has_fault(&Fault::SubmissionRpcError(kind)) {
                bail!("{} submission failed: connection reset", kind);
            }
            state.faults.iter().find_map(|fault| match fault {
                Fault::StallSubmissions(delay) => Some(*delay),
                _ => None,
            })
        };
        if let Some(delay) = stall {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock();
        let outcome = state
            .admit(tx.chain_id, self.config.chain_id, &tx.signer, tx.nonce, &tx.gas)
            .and_then(|_| {
                if state.has_fault(&Fault::RejectSubmission(kind)) {
                    return Err(format!("{} rejected", kind));
                }
                self.apply(&mut state, &tx)
            });

        let receipt = match outcome {
            Ok(contract_address) => TransactionReceipt {
                hash: state.next_hash(&tx.signer, tx.nonce),
                success: true,
                contract_address,
                error: None,
            },
            Err(reason) => state.failed(&tx.signer, tx.nonce, reason),
        };

        state.submissions.push(SubmissionRecord {
            kind,
            signer: tx.signer,
            success: receipt.success,
        });
        Ok(receipt)
    }

    async fn validator_info(&self, address: &Address) -> Result<Option<ValidatorInfo>> {
        let mut state = self.state.lock();
        state.calls.validator_info += 1;
        Ok(state.validators.get(address).cloned())
    }

    async fn map3_node_info(&self, address: &Address) -> Result<Option<Map3NodeInfo>> {
        let mut state = self.state.lock();
        state.calls.map3_node_info += 1;
        self.refresh_map3(&mut state, address);
        Ok(state.map3_nodes.get(address).map(|record| record.info.clone()))
    }
}
