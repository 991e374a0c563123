use super::{error::CryptoError, hash::keccak256};
use serde::de::Error as SerdeError;
use serde::{Deserialize, Serialize};
use std::{
    convert::TryInto,
    fmt::{Display, Formatter},
    str::FromStr,
};

pub const ADDRESS_SIZE: usize = 20;

// Account / entity address: the last 20 bytes of a Keccak-256 digest
#[derive(Eq, PartialEq, PartialOrd, Ord, Clone, Copy, Debug, Hash)]
pub struct Address([u8; ADDRESS_SIZE]);

impl Address {
    pub const fn new(bytes: [u8; ADDRESS_SIZE]) -> Self {
        Address(bytes)
    }

    pub const fn zero() -> Self {
        Address([0; ADDRESS_SIZE])
    }

    // Derive an address from arbitrary key material
    pub fn from_key_material(material: &[u8]) -> Self {
        let digest = keccak256(material);
        let mut bytes = [0u8; ADDRESS_SIZE];
        bytes.copy_from_slice(&digest.as_bytes()[12..]);
        Address(bytes)
    }

    // Derive the address of an entity created by `creator` with the given nonce
    pub fn derive_contract(creator: &Address, nonce: u64) -> Self {
        let mut material = Vec::with_capacity(ADDRESS_SIZE + 8);
        material.extend_from_slice(&creator.0);
        material.extend_from_slice(&nonce.to_be_bytes());
        Self::from_key_material(&material)
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_SIZE] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl FromStr for Address {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let stripped = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(stripped).map_err(|e| CryptoError::InvalidHex(e.to_string()))?;
        let bytes: [u8; ADDRESS_SIZE] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidAddress(s.to_owned()))?;
        Ok(Address(bytes))
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

impl Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'a> Deserialize<'a> for Address {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'a>,
    {
        let value = String::deserialize(deserializer)?;
        Address::from_str(&value).map_err(SerdeError::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_parse_with_and_without_prefix() {
        let address = Address::from_key_material(b"funding");
        let with_prefix = Address::from_str(&address.to_string()).unwrap();
        let without_prefix = Address::from_str(&address.to_hex()).unwrap();
        assert_eq!(with_prefix, address);
        assert_eq!(without_prefix, address);
    }

    #[test]
    fn test_address_rejects_wrong_length() {
        assert!(matches!(
            Address::from_str("0xdeadbeef"),
            Err(CryptoError::InvalidAddress(_))
        ));
        assert!(matches!(
            Address::from_str("0xzz"),
            Err(CryptoError::InvalidHex(_))
        ));
    }

    #[test]
    fn test_contract_address_depends_on_nonce() {
        let creator = Address::from_key_material(b"creator");
        assert_ne!(
            Address::derive_contract(&creator, 0),
            Address::derive_contract(&creator, 1)
        );
    }
}
