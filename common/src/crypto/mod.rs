mod address;
mod hash;

pub mod bls;
pub mod cipher;
pub mod error;

pub use address::*;
pub use error::{BlsError, CipherError, CryptoError};
pub use hash::*;

pub use bls::{BlsKey, BlsSignature, NodePublicKey, ShardPublicKey};
pub use cipher::{decrypt_with_passphrase, encrypt_with_passphrase};
