//! Master key derivation and the login verifier.
//!
//! The master key is derived client-side from the user's secret (passphrase
//! or BIP39 mnemonic) and a per-user salt. It never leaves the client. The
//! verifier is a one-way digest the server stores so it can confirm the user
//! supplied the correct secret without ever learning the key.

use crate::error::{CryptoError, CryptoResult};
use crate::key::{derive_key, DerivedKey, KdfParams, Salt};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Domain tag hashed ahead of the key bytes so the verifier can never collide
/// with any other SHA-256 use of the same material.
const VERIFIER_DOMAIN: &[u8] = b"keyfold-login-verifier-v1";

/// One-way digest of the master key. Safe to store and compare server-side;
/// cannot be reversed to the master key.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Verifier([u8; 32]);

impl Verifier {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Constant-time comparison, safe for login checks.
    pub fn matches(&self, other: &Verifier) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl PartialEq for Verifier {
    fn eq(&self, other: &Self) -> bool {
        self.matches(other)
    }
}

impl Eq for Verifier {}

/// Output of master key derivation.
///
/// The key stays on the client; only the verifier is sent to the server.
#[derive(Debug)]
pub struct MasterKeyBundle {
    pub master_key: DerivedKey,
    pub verifier: Verifier,
}

/// Derives the master key and its login verifier from a user secret.
///
/// Pure and deterministic: identical `(secret, salt)` inputs always produce
/// byte-identical outputs, and different salts produce unrelated outputs for
/// the same secret.
pub fn derive_master_key(secret: &str, salt: &Salt) -> CryptoResult<MasterKeyBundle> {
    derive_master_key_with(secret, salt, &KdfParams::default())
}

/// Like [`derive_master_key`] with explicit KDF cost parameters.
pub fn derive_master_key_with(
    secret: &str,
    salt: &Salt,
    params: &KdfParams,
) -> CryptoResult<MasterKeyBundle> {
    if secret.trim().is_empty() {
        return Err(CryptoError::InvalidInput(
            "master secret must not be empty".to_string(),
        ));
    }

    let master_key = derive_key(secret, salt, params)?;
    let verifier = verifier_for(&master_key);

    Ok(MasterKeyBundle {
        master_key,
        verifier,
    })
}

/// Computes the login verifier for an already-derived master key.
pub fn verifier_for(master_key: &DerivedKey) -> Verifier {
    let mut hasher = Sha256::new();
    hasher.update(VERIFIER_DOMAIN);
    hasher.update(master_key.as_bytes());
    Verifier(hasher.finalize().into())
}

/// Generates a 24-word BIP39 mnemonic (256-bit entropy) for use as the master
/// secret.
pub fn generate_master_mnemonic() -> CryptoResult<String> {
    let mut entropy = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut entropy);

    let mnemonic = bip39::Mnemonic::from_entropy(&entropy)
        .map_err(|e| CryptoError::KeyDerivation(format!("mnemonic generation failed: {e}")))?;

    Ok(mnemonic.to_string())
}

/// Validates a BIP39 mnemonic phrase without deriving anything from it.
pub fn validate_mnemonic(phrase: &str) -> CryptoResult<()> {
    let _: bip39::Mnemonic = phrase
        .parse()
        .map_err(|e| CryptoError::InvalidInput(format!("invalid mnemonic: {e}")))?;
    Ok(())
}
