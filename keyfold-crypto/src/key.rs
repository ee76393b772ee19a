//! Key types and Argon2id derivation.

use crate::error::{CryptoError, CryptoResult};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Symmetric key length in bytes (256-bit).
pub const KEY_SIZE: usize = 32;

/// KDF salt length in bytes.
pub const SALT_SIZE: usize = 16;

/// A 256-bit symmetric key. Zeroized on drop.
///
/// Used for master keys, vault keys and item keys alike — the hierarchy tier
/// is a property of how the key is wrapped, not of the key itself.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey([u8; KEY_SIZE]);

impl DerivedKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl PartialEq for DerivedKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl Eq for DerivedKey {}

// Key bytes must never end up in logs or panic messages.
impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DerivedKey(..)")
    }
}

/// Argon2id salt. Generated once per principal and stored server-side in
/// plaintext — it is not secret, only unique.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Salt([u8; SALT_SIZE]);

impl Salt {
    pub fn random() -> Self {
        let mut bytes = [0u8; SALT_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; SALT_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SALT_SIZE] {
        &self.0
    }
}

/// Argon2id cost parameters.
///
/// The defaults follow the OWASP interactive-login profile. Anything that
/// keeps the derivation deliberately slow and salted satisfies the contract;
/// the parameters are data, not constants, so deployments can raise them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            memory_kib: 19_456,
            iterations: 2,
            parallelism: 1,
        }
    }
}

/// Derives a 256-bit key from a secret and salt using Argon2id.
///
/// Deterministic: the same `(secret, salt, params)` always yields the same
/// key. An empty secret is rejected before any work happens.
pub fn derive_key(secret: &str, salt: &Salt, params: &KdfParams) -> CryptoResult<DerivedKey> {
    if secret.is_empty() {
        return Err(CryptoError::InvalidInput(
            "secret must not be empty".to_string(),
        ));
    }

    let argon_params = Params::new(
        params.memory_kib,
        params.iterations,
        params.parallelism,
        Some(KEY_SIZE),
    )
    .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;

    let argon = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon_params);

    let mut out = [0u8; KEY_SIZE];
    argon
        .hash_password_into(secret.as_bytes(), salt.as_bytes(), &mut out)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;

    Ok(DerivedKey(out))
}

/// Generates a cryptographically random 256-bit key.
pub fn generate_random_key() -> DerivedKey {
    let mut bytes = [0u8; KEY_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    DerivedKey(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_params() -> KdfParams {
        KdfParams {
            memory_kib: 8,
            iterations: 1,
            parallelism: 1,
        }
    }

    #[test]
    fn derive_is_deterministic() {
        let salt = Salt::from_bytes([7u8; SALT_SIZE]);
        let a = derive_key("hunter2-but-longer", &salt, &fast_params()).unwrap();
        let b = derive_key("hunter2-but-longer", &salt, &fast_params()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn different_salts_differ() {
        let a = derive_key("same secret", &Salt::from_bytes([1u8; SALT_SIZE]), &fast_params())
            .unwrap();
        let b = derive_key("same secret", &Salt::from_bytes([2u8; SALT_SIZE]), &fast_params())
            .unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn empty_secret_rejected() {
        let err = derive_key("", &Salt::random(), &fast_params()).unwrap_err();
        assert!(matches!(err, CryptoError::InvalidInput(_)));
    }

    #[test]
    fn random_keys_are_distinct() {
        assert_ne!(generate_random_key(), generate_random_key());
    }

    #[test]
    fn debug_never_prints_key_bytes() {
        let key = generate_random_key();
        assert_eq!(format!("{key:?}"), "DerivedKey(..)");
    }
}
