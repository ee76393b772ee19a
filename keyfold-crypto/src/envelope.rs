//! Asymmetric envelopes for member key wraps.
//!
//! Uses X25519 key exchange + XSalsa20-Poly1305 to seal key material to a
//! recipient's public key with a fresh ephemeral keypair per seal, so the
//! owner can grant vault access knowing only the member's public key.
//!
//! Also provides passphrase-protected private key storage (Argon2id ->
//! ChaCha20-Poly1305) so the member's private key can rest on disk encrypted.

use crate::error::{CryptoError, CryptoResult};
use crate::key::{KdfParams, Salt};
use crate::{decrypt, encrypt, EncryptedData};
use crypto_box::aead::Aead;
use crypto_box::{PublicKey, SalsaBox, SecretKey};
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// X25519 keypair held by a vault member.
///
/// The public key is registered server-side at E2EE initialization; the
/// secret key never leaves the client. The secret key zeroizes on drop
/// (from crypto_box).
pub struct MemberKeyPair {
    pub secret: SecretKey,
    pub public: PublicKey,
}

impl MemberKeyPair {
    /// Generates a fresh keypair.
    pub fn generate() -> Self {
        let secret = SecretKey::generate(&mut rand::rngs::OsRng);
        let public = secret.public_key();
        Self { secret, public }
    }

    /// Returns the public key as a raw 32-byte array.
    pub fn public_bytes(&self) -> [u8; 32] {
        *self.public.as_bytes()
    }

    /// Returns the secret key as a raw 32-byte array.
    pub fn secret_bytes(&self) -> [u8; 32] {
        self.secret.to_bytes()
    }

    /// Reconstructs a keypair from raw secret key bytes.
    pub fn from_secret_bytes(bytes: [u8; 32]) -> Self {
        let secret = SecretKey::from(bytes);
        let public = secret.public_key();
        Self { secret, public }
    }
}

/// Key material sealed to a recipient's X25519 public key.
///
/// The ephemeral public key is included so the recipient can reconstruct the
/// shared secret; the sender's identity is not revealed.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SealedEnvelope {
    /// Ephemeral X25519 public key (sender side of DH).
    pub ephemeral_public_key: [u8; 32],
    /// XSalsa20 nonce (24 bytes).
    pub nonce: [u8; 24],
    /// XSalsa20-Poly1305 ciphertext + tag.
    pub ciphertext: Vec<u8>,
}

/// A private key encrypted with a passphrase.
///
/// Bundles the Argon2id salt with the ciphertext so the passphrase is the
/// only input needed for decryption.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PassphraseProtectedKey {
    pub salt: [u8; 16],
    pub encrypted: EncryptedData,
}

/// Seals key material to a recipient's public key.
///
/// A fresh ephemeral X25519 keypair is generated per seal, giving forward
/// secrecy across wraps.
pub fn seal_key(key_bytes: &[u8], recipient_pk: &PublicKey) -> CryptoResult<SealedEnvelope> {
    let ephemeral = SecretKey::generate(&mut rand::rngs::OsRng);
    let ephemeral_pk = ephemeral.public_key();

    let salsa_box = SalsaBox::new(recipient_pk, &ephemeral);

    let mut nonce_bytes = [0u8; 24];
    rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);

    let ciphertext = salsa_box
        .encrypt(crypto_box::Nonce::from_slice(&nonce_bytes), key_bytes)
        .map_err(|e| CryptoError::Encryption(format!("envelope seal failed: {e}")))?;

    Ok(SealedEnvelope {
        ephemeral_public_key: *ephemeral_pk.as_bytes(),
        nonce: nonce_bytes,
        ciphertext,
    })
}

/// Opens a sealed envelope using the recipient's secret key.
///
/// Fails with `UnwrapIntegrity` on tamper or wrong key.
pub fn open_key(envelope: &SealedEnvelope, recipient_sk: &SecretKey) -> CryptoResult<Vec<u8>> {
    let ephemeral_pk = PublicKey::from(envelope.ephemeral_public_key);
    let salsa_box = SalsaBox::new(&ephemeral_pk, recipient_sk);

    salsa_box
        .decrypt(
            crypto_box::Nonce::from_slice(&envelope.nonce),
            envelope.ciphertext.as_ref(),
        )
        .map_err(|_| CryptoError::UnwrapIntegrity)
}

/// Encrypts a private key with a passphrase (Argon2id -> ChaCha20-Poly1305).
pub fn encrypt_private_key(
    sk: &SecretKey,
    passphrase: &str,
) -> CryptoResult<PassphraseProtectedKey> {
    let salt = Salt::random();
    let derived = crate::derive_key(passphrase, &salt, &KdfParams::default())?;
    let encrypted = encrypt(&derived, &sk.to_bytes())?;

    Ok(PassphraseProtectedKey {
        salt: *salt.as_bytes(),
        encrypted,
    })
}

/// Decrypts a passphrase-protected private key.
pub fn decrypt_private_key(
    protected: &PassphraseProtectedKey,
    passphrase: &str,
) -> CryptoResult<SecretKey> {
    let salt = Salt::from_bytes(protected.salt);
    let derived = crate::derive_key(passphrase, &salt, &KdfParams::default())?;
    let plaintext = decrypt(&derived, &protected.encrypted)?;

    if plaintext.len() != 32 {
        return Err(CryptoError::InvalidKeyLength {
            expected: 32,
            actual: plaintext.len(),
        });
    }

    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&plaintext);
    Ok(SecretKey::from(bytes))
}
