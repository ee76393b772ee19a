//! Per-item keys and field ciphertexts.
//!
//! Each item carries its own random key, wrapped under the owning vault's
//! key with the same AEAD used for owner wraps. Field values are encrypted
//! independently under the item key, so rotating one field (say, a password)
//! leaves every other ciphertext untouched.

use crate::cipher::{decrypt, encrypt, EncryptedData};
use crate::error::{CryptoError, CryptoResult};
use crate::key::{generate_random_key, DerivedKey, KEY_SIZE};
use zeroize::Zeroize;

/// Generates a fresh 256-bit item key.
pub fn generate_item_key() -> DerivedKey {
    generate_random_key()
}

/// Wraps an item key under the owning vault's key.
pub fn wrap_item_key(
    item_key: &DerivedKey,
    vault_key: &DerivedKey,
) -> CryptoResult<EncryptedData> {
    encrypt(vault_key, item_key.as_bytes())
}

/// Unwraps an item key.
///
/// Fails with `UnwrapIntegrity` on tamper or the wrong vault key.
pub fn unwrap_item_key(
    wrapped: &EncryptedData,
    vault_key: &DerivedKey,
) -> CryptoResult<DerivedKey> {
    let mut plaintext = decrypt(vault_key, wrapped).map_err(|_| CryptoError::UnwrapIntegrity)?;

    if plaintext.len() != KEY_SIZE {
        let actual = plaintext.len();
        plaintext.zeroize();
        return Err(CryptoError::InvalidKeyLength {
            expected: KEY_SIZE,
            actual,
        });
    }

    let mut bytes = [0u8; KEY_SIZE];
    bytes.copy_from_slice(&plaintext);
    plaintext.zeroize();
    Ok(DerivedKey::from_bytes(bytes))
}

/// Encrypts a single field value under the item key.
pub fn encrypt_field(item_key: &DerivedKey, plaintext: &[u8]) -> CryptoResult<EncryptedData> {
    encrypt(item_key, plaintext)
}

/// Decrypts a field ciphertext under the item key.
///
/// Integrity failure is terminal for this ciphertext/key pair — callers must
/// not silently retry with a different key.
pub fn decrypt_field(
    ciphertext: &EncryptedData,
    item_key: &DerivedKey,
) -> CryptoResult<Vec<u8>> {
    decrypt(item_key, ciphertext)
}
