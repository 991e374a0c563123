//! BLS12-381 key material identifying validators and map3 nodes.
//!
//! Every key carries a proof-of-possession signature over the Keccak-256
//! digest of a verification message, plus the two public key encodings
//! expected by the restaking (validator shard keys) and microstaking
//! (map3 node keys) payloads.

use super::{cipher, error::PublicKeyEncoding, hash::keccak256, BlsError, CipherError};
use crate::config::{
    BLS_DOMAIN_SEPARATION_TAG, BLS_PUBLIC_KEY_SIZE, BLS_SECRET_KEY_SIZE, BLS_SIGNATURE_SIZE,
    BLS_VERIFICATION_MESSAGE,
};
use blst::min_pk::{PublicKey, SecretKey, Signature};
use blst::BLST_ERROR;
use log::trace;
use rand::{rngs::OsRng, RngCore};
use serde::de::Error as SerdeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::Zeroizing;

macro_rules! hex_bytes_type {
    ($name:ident, $size:expr) => {
        #[derive(Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name([u8; $size]);

        impl $name {
            pub const SIZE: usize = $size;

            pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
                let bytes: [u8; $size] = bytes.try_into().ok()?;
                Some(Self(bytes))
            }

            pub fn as_bytes(&self) -> &[u8; $size] {
                &self.0
            }

            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({}..)", stringify!($name), &self.to_hex()[..16])
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.to_hex())
            }
        }

        impl Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let value = String::deserialize(deserializer)?;
                let bytes = hex::decode(&value).map_err(SerdeError::custom)?;
                Self::from_bytes(&bytes).ok_or_else(|| {
                    SerdeError::custom(format!(
                        "expected {} bytes, got {}",
                        $size,
                        bytes.len()
                    ))
                })
            }
        }
    };
}

// Public key in the encoding used by validator (restaking) payloads
hex_bytes_type!(ShardPublicKey, BLS_PUBLIC_KEY_SIZE);
// Public key in the encoding used by map3 node (microstaking) payloads
hex_bytes_type!(NodePublicKey, BLS_PUBLIC_KEY_SIZE);
// Serialized proof-of-possession signature
hex_bytes_type!(BlsSignature, BLS_SIGNATURE_SIZE);

impl ShardPublicKey {
    pub fn from_public_key(public_key: &PublicKey) -> Result<Self, BlsError> {
        encode_public_key(public_key, PublicKeyEncoding::Shard).map(Self)
    }
}

impl NodePublicKey {
    pub fn from_public_key(public_key: &PublicKey) -> Result<Self, BlsError> {
        encode_public_key(public_key, PublicKeyEncoding::Node).map(Self)
    }
}

impl BlsSignature {
    /// Checks that a serialized signature has exactly the network length.
    ///
    /// Anything shorter or longer is rejected, never padded or truncated.
    pub fn from_serialized(bytes: &[u8]) -> Result<Self, BlsError> {
        Self::from_bytes(bytes).ok_or(BlsError::InvalidSignatureLength {
            len: bytes.len(),
            expected: BLS_SIGNATURE_SIZE,
        })
    }

    /// Verifies this signature as a proof of possession for `public_key`.
    pub fn verify(&self, message: &str, public_key: &[u8; BLS_PUBLIC_KEY_SIZE]) -> bool {
        let Ok(public_key) = PublicKey::key_validate(public_key) else {
            return false;
        };
        let Ok(signature) = Signature::sig_validate(&self.0, true) else {
            return false;
        };
        let digest = keccak256(message_or_default(message).as_bytes());
        signature.verify(
            true,
            digest.as_bytes(),
            BLS_DOMAIN_SEPARATION_TAG,
            &[],
            &public_key,
            true,
        ) == BLST_ERROR::BLST_SUCCESS
    }
}

fn encode_public_key(
    public_key: &PublicKey,
    encoding: PublicKeyEncoding,
) -> Result<[u8; BLS_PUBLIC_KEY_SIZE], BlsError> {
    let bytes = public_key.compress();
    // Round trip through validation so an identity or off-curve point is refused
    PublicKey::key_validate(&bytes).map_err(|_| BlsError::EncodingConversion(encoding))?;
    Ok(bytes)
}

fn message_or_default(message: &str) -> &str {
    if message.is_empty() {
        BLS_VERIFICATION_MESSAGE
    } else {
        message
    }
}

/// A BLS key pair with its derived encodings and proof-of-possession.
///
/// Immutable once built: rotation generates a new key rather than mutating one.
#[derive(Clone)]
pub struct BlsKey {
    private_key: SecretKey,
    public_key: PublicKey,
    public_key_hex: String,
    shard_public_key: ShardPublicKey,
    shard_signature: BlsSignature,
    node_public_key: NodePublicKey,
}

impl BlsKey {
    /// Generates a fresh key and signs `message` (or the default verification
    /// message when empty).
    pub fn generate(message: &str) -> Result<Self, BlsError> {
        let mut ikm = Zeroizing::new([0u8; 32]);
        OsRng.fill_bytes(&mut ikm[..]);
        Self::from_seed(&ikm[..], message)
    }

    /// Deterministically derives a key from 32+ bytes of input key material.
    pub fn from_seed(ikm: &[u8], message: &str) -> Result<Self, BlsError> {
        let private_key = SecretKey::key_gen(ikm, &[]).map_err(|_| BlsError::KeyGeneration)?;
        Self::from_secret_key(private_key, message)
    }

    /// Rebuilds a key from its hex encoded private key.
    pub fn from_private_key_hex(private_key_hex: &str, message: &str) -> Result<Self, BlsError> {
        let bytes = Zeroizing::new(
            hex::decode(private_key_hex).map_err(|e| BlsError::InvalidHex(e.to_string()))?,
        );
        if bytes.len() != BLS_SECRET_KEY_SIZE {
            return Err(BlsError::InvalidSecretKey);
        }
        let private_key = SecretKey::from_bytes(&bytes).map_err(|_| BlsError::InvalidSecretKey)?;
        Self::from_secret_key(private_key, message)
    }

    fn from_secret_key(private_key: SecretKey, message: &str) -> Result<Self, BlsError> {
        let public_key = private_key.sk_to_pk();
        let public_key_hex = hex::encode(public_key.compress());

        let shard_signature = Self::sign_verification(&private_key, message)?;
        let shard_public_key = ShardPublicKey::from_public_key(&public_key)?;
        let node_public_key = NodePublicKey::from_public_key(&public_key)?;
        trace!("Derived bls key {}", public_key_hex);

        Ok(Self {
            private_key,
            public_key,
            public_key_hex,
            shard_public_key,
            shard_signature,
            node_public_key,
        })
    }

    fn sign_verification(private_key: &SecretKey, message: &str) -> Result<BlsSignature, BlsError> {
        let digest = keccak256(message_or_default(message).as_bytes());
        let signature = private_key.sign(digest.as_bytes(), BLS_DOMAIN_SEPARATION_TAG, &[]);
        BlsSignature::from_serialized(&signature.compress())
    }

    pub fn private_key_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(hex::encode(self.private_key.to_bytes()))
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    pub fn public_key_hex(&self) -> &str {
        &self.public_key_hex
    }

    pub fn shard_public_key(&self) -> &ShardPublicKey {
        &self.shard_public_key
    }

    pub fn shard_signature(&self) -> &BlsSignature {
        &self.shard_signature
    }

    pub fn node_public_key(&self) -> &NodePublicKey {
        &self.node_public_key
    }

    /// Encrypts the hex encoded private key under `passphrase`.
    pub fn encrypt(&self, passphrase: &str) -> Result<String, CipherError> {
        cipher::encrypt_with_passphrase(&self.private_key_hex(), passphrase)
    }

    /// Inverse of [`BlsKey::encrypt`].
    pub fn decrypt(blob: &str, passphrase: &str, message: &str) -> Result<Self, DecryptKeyError> {
        let private_key_hex = Zeroizing::new(cipher::decrypt_with_passphrase(blob, passphrase)?);
        Ok(Self::from_private_key_hex(&private_key_hex, message)?)
    }
}

impl PartialEq for BlsKey {
    fn eq(&self, other: &Self) -> bool {
        self.public_key_hex == other.public_key_hex
    }
}

impl Eq for BlsKey {}

impl fmt::Debug for BlsKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlsKey")
            .field("private_key", &"[REDACTED]")
            .field("public_key", &self.public_key_hex)
            .finish()
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DecryptKeyError {
    #[error(transparent)]
    Cipher(#[from] CipherError),

    #[error(transparent)]
    Bls(#[from] BlsError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_signature_is_96_bytes_and_verifies() {
        let key = BlsKey::generate("").unwrap();
        assert_eq!(key.shard_signature().as_bytes().len(), BLS_SIGNATURE_SIZE);
        assert!(key
            .shard_signature()
            .verify("", key.shard_public_key().as_bytes()));
        assert!(key
            .shard_signature()
            .verify(BLS_VERIFICATION_MESSAGE, key.shard_public_key().as_bytes()));
    }

    #[test]
    fn test_custom_message_signature() {
        let key = BlsKey::generate("custom message").unwrap();
        assert!(key
            .shard_signature()
            .verify("custom message", key.shard_public_key().as_bytes()));
        assert!(!key
            .shard_signature()
            .verify("other message", key.shard_public_key().as_bytes()));
    }

    #[test]
    fn test_signature_length_is_enforced() {
        let too_short = [0u8; BLS_SIGNATURE_SIZE - 1];
        assert_eq!(
            BlsSignature::from_serialized(&too_short),
            Err(BlsError::InvalidSignatureLength {
                len: BLS_SIGNATURE_SIZE - 1,
                expected: BLS_SIGNATURE_SIZE
            })
        );

        let too_long = [0u8; BLS_SIGNATURE_SIZE * 2];
        assert!(BlsSignature::from_serialized(&too_long).is_err());
    }

    #[test]
    fn test_encodings_match_compressed_public_key() {
        let key = BlsKey::generate("").unwrap();
        assert_eq!(key.shard_public_key().to_hex(), key.public_key_hex());
        assert_eq!(key.node_public_key().to_hex(), key.public_key_hex());
    }

    #[test]
    fn test_seeded_keys_are_deterministic() {
        let seed = [7u8; 32];
        let first = BlsKey::from_seed(&seed, "").unwrap();
        let second = BlsKey::from_seed(&seed, "").unwrap();
        assert_eq!(first, second);
        assert_eq!(*first.private_key_hex(), *second.private_key_hex());
    }

    #[test]
    fn test_short_seed_is_rejected() {
        assert_eq!(
            BlsKey::from_seed(&[1u8; 8], "").unwrap_err(),
            BlsError::KeyGeneration
        );
    }

    #[test]
    fn test_private_key_hex_round_trip() {
        let key = BlsKey::generate("").unwrap();
        let restored = BlsKey::from_private_key_hex(&key.private_key_hex(), "").unwrap();
        assert_eq!(restored, key);
        assert!(BlsKey::from_private_key_hex("abcd", "").is_err());
    }

    #[test]
    fn test_debug_redacts_private_key() {
        let key = BlsKey::generate("").unwrap();
        let rendered = format!("{:?}", key);
        assert!(rendered.contains("REDACTED"));
        assert!(!rendered.contains(key.private_key_hex().as_str()));
    }
}
