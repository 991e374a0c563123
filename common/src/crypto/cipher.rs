// Passphrase cipher for exported key material.
//
// Format: hex(nonce[12] || AES-256-GCM ciphertext || tag[16]).
// The AES key is the 32 ASCII bytes of the hex MD5 digest of the passphrase.
// There is no salt and no work factor: this only keeps test key material out
// of plain sight and must not protect real funds. The format is kept as is so
// blobs produced by earlier tooling still decrypt.

use super::CipherError;
use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use md5::{Digest, Md5};

pub const NONCE_SIZE: usize = 12;
pub const TAG_SIZE: usize = 16;

fn derive_key(passphrase: &str) -> [u8; 32] {
    let digest = hex::encode(Md5::digest(passphrase.as_bytes()));
    let mut key = [0u8; 32];
    key.copy_from_slice(digest.as_bytes());
    key
}

pub fn encrypt_with_passphrase(plaintext: &str, passphrase: &str) -> Result<String, CipherError> {
    let cipher =
        Aes256Gcm::new_from_slice(&derive_key(passphrase)).map_err(|_| CipherError::Encryption)?;
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let ciphertext = cipher
        .encrypt(&nonce, plaintext.as_bytes())
        .map_err(|_| CipherError::Encryption)?;

    let mut blob = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    blob.extend_from_slice(&nonce);
    blob.extend_from_slice(&ciphertext);
    Ok(hex::encode(blob))
}

pub fn decrypt_with_passphrase(blob: &str, passphrase: &str) -> Result<String, CipherError> {
    let bytes = hex::decode(blob).map_err(|e| CipherError::InvalidHex(e.to_string()))?;
    if bytes.len() < NONCE_SIZE + TAG_SIZE {
        return Err(CipherError::Truncated {
            len: bytes.len(),
            min: NONCE_SIZE + TAG_SIZE,
        });
    }

    let (nonce, ciphertext) = bytes.split_at(NONCE_SIZE);
    let cipher =
        Aes256Gcm::new_from_slice(&derive_key(passphrase)).map_err(|_| CipherError::Encryption)?;
    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| CipherError::Authentication)?;

    String::from_utf8(plaintext).map_err(|_| CipherError::InvalidPlaintext)
}
