use super::OperationKind;
use crate::crypto::{Address, Hash};
use crate::Amount;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GasParams {
    pub limit: u64,
    pub price: Amount,
}

impl GasParams {
    // Worst case fee the sender must be able to cover
    pub fn max_fee(&self) -> Option<Amount> {
        self.price.checked_mul_int(self.limit)
    }
}

impl Default for GasParams {
    fn default() -> Self {
        Self {
            limit: 21_000,
            price: Amount::from_base_units(1_000_000_000),
        }
    }
}

/// What the chain reports back once a submission is included or rejected
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    pub hash: Hash,
    pub success: bool,
    // Address of the entity created by this transaction, if any
    pub contract_address: Option<Address>,
    pub error: Option<String>,
}

/// A submitted transaction as recorded in a test case
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub hash: Hash,
    pub kind: Option<OperationKind>,
    pub sender: Address,
    pub nonce: u64,
    pub success: bool,
    pub contract_address: Option<Address>,
    pub error: Option<String>,
}

impl Transaction {
    pub fn from_receipt(
        receipt: TransactionReceipt,
        kind: Option<OperationKind>,
        sender: Address,
        nonce: u64,
    ) -> Self {
        Self {
            hash: receipt.hash,
            kind,
            sender,
            nonce,
            success: receipt.success,
            contract_address: receipt.contract_address,
            error: receipt.error,
        }
    }

    // Recorded when a submission is never confirmed in time
    pub fn timed_out(
        kind: Option<OperationKind>,
        sender: Address,
        nonce: u64,
        error: String,
    ) -> Self {
        Self {
            hash: Hash::zero(),
            kind,
            sender,
            nonce,
            success: false,
            contract_address: None,
            error: Some(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_fee() {
        let gas = GasParams {
            limit: 100_000,
            price: "0.000000001".parse().unwrap(),
        };
        assert_eq!(gas.max_fee(), Some("0.0001".parse::<Amount>().unwrap()));
    }

    #[test]
    fn test_timed_out_transaction_failed() {
        let sender = Address::from_key_material(b"sender");
        let tx = Transaction::timed_out(Some(OperationKind::Renew), sender, 3, "timeout".into());
        assert!(!tx.success);
        assert_eq!(tx.hash, Hash::zero());
        assert_eq!(tx.nonce, 3);
    }
}
