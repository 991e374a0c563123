use super::{Description, DescriptionError};
use crate::crypto::{Address, BlsSignature, NodePublicKey, ShardPublicKey};
use crate::{Amount, Decimal};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationKind {
    CreateValidator,
    CreateMap3Node,
    Delegate,
    Undelegate,
    Renew,
    Edit,
    Terminate,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::CreateValidator => "create-validator",
            Self::CreateMap3Node => "create-map3-node",
            Self::Delegate => "delegate",
            Self::Undelegate => "undelegate",
            Self::Renew => "renew",
            Self::Edit => "edit",
            Self::Terminate => "terminate",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PayloadError {
    #[error("{0} amount can not be nil")]
    NilAmount(OperationKind),

    #[error("{0} amount can not be a negative value")]
    NegativeAmount(OperationKind),

    #[error("commission rate {0} is outside [0, 1]")]
    CommissionRate(Decimal),

    #[error("{0} requires at least one bls key")]
    MissingBlsKey(OperationKind),

    #[error("{keys} bls keys but {signatures} signatures")]
    SignatureCountMismatch { keys: usize, signatures: usize },

    #[error("invalid description: {0}")]
    Description(#[from] DescriptionError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateValidator {
    pub operator_address: Address,
    pub description: Description,
    pub commission_rate: Decimal,
    pub max_total_delegation: Option<Amount>,
    pub bls_keys: Vec<ShardPublicKey>,
    // One proof-of-possession per key, same order
    pub bls_signatures: Vec<BlsSignature>,
    pub amount: Option<Amount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateMap3Node {
    pub operator_address: Address,
    pub description: Description,
    pub commission_rate: Decimal,
    pub node_keys: Vec<NodePublicKey>,
    pub node_signatures: Vec<BlsSignature>,
    pub amount: Option<Amount>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "address")]
pub enum DelegationTarget {
    // Microstaking: an account delegates tokens to a map3 node
    Map3Node(Address),
    // Restaking: a map3 node delegates its whole stake to a validator
    Validator(Address),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delegate {
    pub delegator: Address,
    pub target: DelegationTarget,
    pub amount: Option<Amount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Undelegate {
    pub delegator: Address,
    pub map3_address: Address,
    pub amount: Option<Amount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Renew {
    pub delegator: Address,
    pub map3_address: Address,
    pub renew: bool,
    // Only honoured when the operator renews
    pub new_commission_rate: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditValidator {
    pub validator_address: Address,
    pub operator_address: Address,
    pub description: Option<Description>,
    pub commission_rate: Option<Decimal>,
    pub max_total_delegation: Option<Amount>,
    pub bls_key_to_remove: Option<ShardPublicKey>,
    pub bls_key_to_add: Option<ShardPublicKey>,
    pub bls_key_to_add_signature: Option<BlsSignature>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Terminate {
    pub delegator: Address,
    pub map3_address: Address,
}

/// Every staking operation the framework can submit, with its fixed parameter shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum StakingPayload {
    CreateValidator(CreateValidator),
    CreateMap3Node(CreateMap3Node),
    Delegate(Delegate),
    Undelegate(Undelegate),
    Renew(Renew),
    EditValidator(EditValidator),
    Terminate(Terminate),
}

fn require_amount(amount: &Option<Amount>, kind: OperationKind) -> Result<(), PayloadError> {
    match amount {
        None => Err(PayloadError::NilAmount(kind)),
        Some(amount) if amount.is_negative() => Err(PayloadError::NegativeAmount(kind)),
        Some(_) => Ok(()),
    }
}

/// Commission rates are fractions in [0, 1]
pub fn validate_commission_rate(rate: &Decimal) -> Result<(), PayloadError> {
    if rate.is_negative() || *rate > Decimal::from_coins(1) {
        return Err(PayloadError::CommissionRate(*rate));
    }
    Ok(())
}

impl StakingPayload {
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::CreateValidator(_) => OperationKind::CreateValidator,
            Self::CreateMap3Node(_) => OperationKind::CreateMap3Node,
            Self::Delegate(_) => OperationKind::Delegate,
            Self::Undelegate(_) => OperationKind::Undelegate,
            Self::Renew(_) => OperationKind::Renew,
            Self::EditValidator(_) => OperationKind::Edit,
            Self::Terminate(_) => OperationKind::Terminate,
        }
    }

    /// Checks the parameter shape. Runs before any network access.
    pub fn validate(&self) -> Result<(), PayloadError> {
        let kind = self.kind();
        match self {
            Self::CreateValidator(p) => {
                require_amount(&p.amount, kind)?;
                validate_commission_rate(&p.commission_rate)?;
                p.description.validate()?;
                if p.bls_keys.is_empty() {
                    return Err(PayloadError::MissingBlsKey(kind));
                }
                if p.bls_keys.len() != p.bls_signatures.len() {
                    return Err(PayloadError::SignatureCountMismatch {
                        keys: p.bls_keys.len(),
                        signatures: p.bls_signatures.len(),
                    });
                }
                if let Some(max) = &p.max_total_delegation {
                    if max.is_negative() {
                        return Err(PayloadError::NegativeAmount(kind));
                    }
                }
            }
            Self::CreateMap3Node(p) => {
                require_amount(&p.amount, kind)?;
                validate_commission_rate(&p.commission_rate)?;
                p.description.validate()?;
                if p.node_keys.is_empty() {
                    return Err(PayloadError::MissingBlsKey(kind));
                }
                if p.node_keys.len() != p.node_signatures.len() {
                    return Err(PayloadError::SignatureCountMismatch {
                        keys: p.node_keys.len(),
                        signatures: p.node_signatures.len(),
                    });
                }
            }
            Self::Delegate(p) => match p.target {
                DelegationTarget::Map3Node(_) => require_amount(&p.amount, kind)?,
                DelegationTarget::Validator(_) => {
                    if matches!(&p.amount, Some(amount) if amount.is_negative()) {
                        return Err(PayloadError::NegativeAmount(kind));
                    }
                }
            },
            Self::Undelegate(p) => require_amount(&p.amount, kind)?,
            Self::Renew(p) => {
                if let Some(rate) = &p.new_commission_rate {
                    validate_commission_rate(rate)?;
                }
            }
            Self::EditValidator(p) => {
                if let Some(description) = &p.description {
                    description.validate()?;
                }
                if let Some(rate) = &p.commission_rate {
                    validate_commission_rate(rate)?;
                }
                if let Some(max) = &p.max_total_delegation {
                    if max.is_negative() {
                        return Err(PayloadError::NegativeAmount(kind));
                    }
                }
                if p.bls_key_to_add.is_some() != p.bls_key_to_add_signature.is_some() {
                    return Err(PayloadError::SignatureCountMismatch {
                        keys: p.bls_key_to_add.iter().count(),
                        signatures: p.bls_key_to_add_signature.iter().count(),
                    });
                }
            }
            Self::Terminate(_) => {}
        }

        Ok(())
    }
}
