use thiserror::Error;

/// Errors that can occur while parsing addresses and hashes
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Invalid hexadecimal string format
    #[error("Invalid hex string: {0}")]
    InvalidHex(String),

    /// Address string is malformed or invalid
    #[error("Invalid address format: {0}")]
    InvalidAddress(String),
}

/// Which public key encoding a conversion was targeting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublicKeyEncoding {
    Shard,
    Node,
}

impl std::fmt::Display for PublicKeyEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Shard => write!(f, "shard"),
            Self::Node => write!(f, "node"),
        }
    }
}

/// BLS12-381 key material errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BlsError {
    #[error("failed to generate bls secret key")]
    KeyGeneration,

    #[error("invalid secret key bytes")]
    InvalidSecretKey,

    #[error("invalid public key bytes")]
    InvalidPublicKey,

    #[error("bls signature length is {len} bytes, expected {expected} bytes")]
    InvalidSignatureLength { len: usize, expected: usize },

    #[error("couldn't convert bls public key to the {0} encoding")]
    EncodingConversion(PublicKeyEncoding),

    #[error("invalid hex in bls key material: {0}")]
    InvalidHex(String),
}

/// Passphrase cipher errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CipherError {
    #[error("invalid ciphertext hex: {0}")]
    InvalidHex(String),

    #[error("ciphertext is {len} bytes, shorter than nonce and tag ({min} bytes)")]
    Truncated { len: usize, min: usize },

    #[error("encryption failed")]
    Encryption,

    // Tag verification failed: wrong passphrase or tampered ciphertext
    #[error("ciphertext authentication failed")]
    Authentication,

    #[error("decrypted plaintext is not valid utf-8")]
    InvalidPlaintext,
}
