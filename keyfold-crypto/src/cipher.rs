//! ChaCha20-Poly1305 authenticated encryption.

use crate::error::{CryptoError, CryptoResult};
use crate::key::DerivedKey;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// ChaCha20-Poly1305 nonce length in bytes.
pub const NONCE_SIZE: usize = 12;

/// Poly1305 authentication tag length in bytes.
pub const TAG_SIZE: usize = 16;

/// An AEAD ciphertext bundled with the nonce it was produced under.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedData {
    pub nonce: [u8; NONCE_SIZE],
    /// Ciphertext followed by the Poly1305 tag.
    pub ciphertext: Vec<u8>,
}

/// Encrypts plaintext under a symmetric key with a fresh random nonce.
pub fn encrypt(key: &DerivedKey, plaintext: &[u8]) -> CryptoResult<EncryptedData> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));

    let mut nonce = [0u8; NONCE_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut nonce);

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|_| CryptoError::Encryption("AEAD encryption failed".to_string()))?;

    Ok(EncryptedData { nonce, ciphertext })
}

/// Decrypts and authenticates a ciphertext.
///
/// Fails if the data was tampered with or the wrong key is supplied. The
/// failure is terminal for this ciphertext/key pair.
pub fn decrypt(key: &DerivedKey, data: &EncryptedData) -> CryptoResult<Vec<u8>> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));

    cipher
        .decrypt(Nonce::from_slice(&data.nonce), data.ciphertext.as_ref())
        .map_err(|_| CryptoError::Decryption("AEAD verification failed".to_string()))
}

/// Encrypts a UTF-8 string.
pub fn encrypt_string(key: &DerivedKey, plaintext: &str) -> CryptoResult<EncryptedData> {
    encrypt(key, plaintext.as_bytes())
}

/// Decrypts to a UTF-8 string.
pub fn decrypt_string(key: &DerivedKey, data: &EncryptedData) -> CryptoResult<String> {
    let bytes = decrypt(key, data)?;
    String::from_utf8(bytes)
        .map_err(|_| CryptoError::Decryption("plaintext is not valid UTF-8".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::generate_random_key;

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let key = generate_random_key();
        let encrypted = encrypt(&key, b"field plaintext").unwrap();
        assert_eq!(decrypt(&key, &encrypted).unwrap(), b"field plaintext");
    }

    #[test]
    fn nonce_is_fresh_per_call() {
        let key = generate_random_key();
        let a = encrypt(&key, b"same input").unwrap();
        let b = encrypt(&key, b"same input").unwrap();
        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn wrong_key_fails() {
        let encrypted = encrypt(&generate_random_key(), b"secret").unwrap();
        let result = decrypt(&generate_random_key(), &encrypted);
        assert!(matches!(result, Err(CryptoError::Decryption(_))));
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let key = generate_random_key();
        let mut encrypted = encrypt(&key, b"secret").unwrap();
        encrypted.ciphertext[0] ^= 0x01;
        assert!(decrypt(&key, &encrypted).is_err());
    }

    #[test]
    fn string_roundtrip() {
        let key = generate_random_key();
        let encrypted = encrypt_string(&key, "correct horse").unwrap();
        assert_eq!(decrypt_string(&key, &encrypted).unwrap(), "correct horse");
    }
}
