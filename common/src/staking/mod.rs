mod description;
mod entity;
mod payload;
mod transaction;

pub use description::{Description, DescriptionError};
pub use entity::{Map3Delegation, Map3NodeInfo, Map3NodeStatus, ValidatorInfo};
pub use payload::{
    CreateMap3Node, CreateValidator, Delegate, DelegationTarget, EditValidator, OperationKind,
    PayloadError, Renew, StakingPayload, Terminate, Undelegate, validate_commission_rate,
};
pub use transaction::{GasParams, Transaction, TransactionReceipt};
