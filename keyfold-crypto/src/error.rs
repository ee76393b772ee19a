//! Crypto error types.

use thiserror::Error;

/// Result type for cryptographic operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors that can occur in the cryptographic core.
///
/// Integrity failures (`UnwrapIntegrity`, `Decryption`) are terminal for the
/// ciphertext/key pair that produced them — they are never retried with the
/// same inputs and never silently swallowed.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Malformed or missing cryptographic input. Nothing was processed.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Wrong key material supplied for a wrap's scheme (e.g. a master key
    /// offered against an asymmetric wrap).
    #[error("key material mismatch: this wrap requires a {expected}")]
    KeyMaterialMismatch { expected: &'static str },

    /// Wrap ciphertext failed authentication — tampered data or wrong key.
    #[error("unwrap integrity failure (wrong key or tampered data)")]
    UnwrapIntegrity,

    /// Field ciphertext failed authentication under the supplied key.
    #[error("decryption failed: {0}")]
    Decryption(String),

    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },
}
