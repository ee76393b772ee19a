//! Cryptographic core for Keyfold.
//!
//! Provides the key hierarchy for the team password vault:
//! - Argon2id master key derivation with a one-way login verifier
//! - ChaCha20-Poly1305 for authenticated encryption
//! - Vault key wrapping: symmetric for the owner, X25519 envelopes for members
//! - Per-item keys with independently encrypted fields
//! - RFC 6238 TOTP provisioning
//!
//! # Architecture
//!
//! The key hierarchy has three tiers:
//!
//! 1. **Master Key**: Derived from the user's secret (passphrase or BIP39
//!    mnemonic) using Argon2id. Never stored and never transmitted — the
//!    server only ever sees a one-way verifier digest.
//!
//! 2. **Vault Key**: A random key generated once per vault. Wrapped once per
//!    principal with access: the owner's wrap is AEAD under their master key,
//!    every invited member's wrap is sealed to their X25519 public key.
//!
//! 3. **Item Key**: A random key per item, wrapped under the vault key.
//!    Individual fields (username, password, note, TOTP seed) are encrypted
//!    independently under the item key so partial updates do not touch
//!    unrelated ciphertexts.
//!
//! This architecture allows:
//! - Sharing a vault with a new member without the owner knowing any of the
//!   member's secrets (only their public key)
//! - Rotating a single field without re-encrypting the rest of the item
//! - Changing the master passphrase without re-encrypting vault contents

mod cipher;
pub mod envelope;
mod error;
mod item;
mod key;
pub mod master;
pub mod totp;
pub mod wrap;

pub use cipher::{
    decrypt, decrypt_string, encrypt, encrypt_string, EncryptedData, NONCE_SIZE, TAG_SIZE,
};
pub use envelope::{
    decrypt_private_key, encrypt_private_key, open_key, seal_key, MemberKeyPair,
    PassphraseProtectedKey, SealedEnvelope,
};
pub use crypto_box::{PublicKey, SecretKey};
pub use error::{CryptoError, CryptoResult};
pub use item::{
    decrypt_field, encrypt_field, generate_item_key, unwrap_item_key, wrap_item_key,
};
pub use key::{derive_key, generate_random_key, DerivedKey, KdfParams, Salt, KEY_SIZE, SALT_SIZE};
pub use master::{
    derive_master_key, derive_master_key_with, generate_master_mnemonic, validate_mnemonic,
    verifier_for, MasterKeyBundle, Verifier,
};
pub use totp::{provision, verify, verify_at, TotpProvision};
pub use wrap::{
    generate_vault_key, unwrap, wrap_for_member, wrap_for_owner, AvailableKeyMaterial, WrapRecord,
};
