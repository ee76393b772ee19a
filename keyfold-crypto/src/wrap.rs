//! Vault key generation and wrapping.
//!
//! A vault key is wrapped once per principal with access to the vault. The
//! owner's wrap is symmetric (AEAD under their master key) so the owner can
//! bootstrap the vault before any other member exists; every invited member's
//! wrap is asymmetric (sealed to their X25519 public key) so the owner never
//! needs to know another member's master key.
//!
//! The scheme is a closed tagged union: unwrap dispatch is exhaustively
//! matched, so an unhandled third scheme cannot fall through silently.

use crate::cipher::{decrypt, encrypt, EncryptedData};
use crate::envelope::{open_key, seal_key, SealedEnvelope};
use crate::error::{CryptoError, CryptoResult};
use crate::key::{generate_random_key, DerivedKey, KEY_SIZE};
use crypto_box::{PublicKey, SecretKey};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

/// Generates a fresh 256-bit vault key. Called once at vault creation.
pub fn generate_vault_key() -> DerivedKey {
    generate_random_key()
}

/// A ciphertext of a vault key, tagged with its wrapping scheme.
///
/// The scheme is fixed when the wrap is created and determines the unwrap
/// path deterministically — never both.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "scheme", rename_all = "snake_case")]
pub enum WrapRecord {
    /// AEAD under the owner's master key, fresh nonce stored in the record.
    Symmetric { data: EncryptedData },
    /// Sealed to the recipient's X25519 public key.
    Asymmetric { envelope: SealedEnvelope },
}

impl WrapRecord {
    pub fn is_symmetric(&self) -> bool {
        matches!(self, WrapRecord::Symmetric { .. })
    }

    pub fn is_asymmetric(&self) -> bool {
        matches!(self, WrapRecord::Asymmetric { .. })
    }
}

/// Key material the caller has on hand when unwrapping.
pub enum AvailableKeyMaterial<'a> {
    /// The caller's own master key (owner path).
    MasterKey(&'a DerivedKey),
    /// The caller's X25519 private key (member path).
    PrivateKey(&'a SecretKey),
}

/// Wraps a vault key for the vault owner under their master key.
pub fn wrap_for_owner(
    vault_key: &DerivedKey,
    master_key: &DerivedKey,
) -> CryptoResult<WrapRecord> {
    let data = encrypt(master_key, vault_key.as_bytes())?;
    Ok(WrapRecord::Symmetric { data })
}

/// Wraps a vault key for an invited member under their public key.
pub fn wrap_for_member(
    vault_key: &DerivedKey,
    recipient_pk: &PublicKey,
) -> CryptoResult<WrapRecord> {
    let envelope = seal_key(vault_key.as_bytes(), recipient_pk)?;
    Ok(WrapRecord::Asymmetric { envelope })
}

/// Unwraps a vault key, dispatching on the record's scheme.
///
/// Pure and side-effect-free: the unwrapped key is returned to the caller,
/// never persisted — the caller owns disposal. Supplying the wrong kind of
/// key material for the scheme fails with `KeyMaterialMismatch` before any
/// cryptography runs; ciphertext verification failure is `UnwrapIntegrity`.
pub fn unwrap(
    record: &WrapRecord,
    available: AvailableKeyMaterial<'_>,
) -> CryptoResult<DerivedKey> {
    let plaintext = match (record, available) {
        (WrapRecord::Symmetric { data }, AvailableKeyMaterial::MasterKey(master_key)) => {
            decrypt(master_key, data).map_err(|_| CryptoError::UnwrapIntegrity)?
        }
        (WrapRecord::Asymmetric { envelope }, AvailableKeyMaterial::PrivateKey(secret_key)) => {
            open_key(envelope, secret_key)?
        }
        (WrapRecord::Symmetric { .. }, AvailableKeyMaterial::PrivateKey(_)) => {
            return Err(CryptoError::KeyMaterialMismatch {
                expected: "master key",
            });
        }
        (WrapRecord::Asymmetric { .. }, AvailableKeyMaterial::MasterKey(_)) => {
            return Err(CryptoError::KeyMaterialMismatch {
                expected: "private key",
            });
        }
    };

    key_from_plaintext(plaintext)
}

fn key_from_plaintext(mut plaintext: Vec<u8>) -> CryptoResult<DerivedKey> {
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
