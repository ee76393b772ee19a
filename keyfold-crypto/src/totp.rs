//! TOTP provisioning and verification (RFC 6238).
//!
//! Independent of the vault key hierarchy — a TOTP secret gates login, never
//! key unwrap. Provisioning generates a 160-bit shared secret, a standard
//! `otpauth://` URI for QR rendering, and ten single-use backup codes.

use crate::error::{CryptoError, CryptoResult};
use data_encoding::BASE32_NOPAD;
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use std::time::{SystemTime, UNIX_EPOCH};
use subtle::ConstantTimeEq;

/// Code length in digits.
pub const TOTP_DIGITS: u32 = 6;

/// Time step in seconds.
pub const TOTP_PERIOD_SECS: u64 = 30;

// RFC 4226 recommends a shared secret of at least 160 bits.
const SECRET_BYTES: usize = 20;
const BACKUP_CODE_COUNT: usize = 10;

/// Everything a client needs to enrol an authenticator app.
#[derive(Clone, Serialize, Deserialize)]
pub struct TotpProvision {
    /// Base32-encoded shared secret.
    pub secret: String,
    /// `otpauth://` provisioning URI for QR rendering.
    pub otpauth_uri: String,
    /// Single-use backup codes. Shown once; the server stores only digests.
    pub backup_codes: Vec<String>,
}

// The secret appears in every field, URI included. None of it may reach logs.
impl std::fmt::Debug for TotpProvision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TotpProvision")
            .field("secret", &"..")
            .field("otpauth_uri", &"..")
            .field("backup_codes", &format_args!("[{} codes]", self.backup_codes.len()))
            .finish()
    }
}

/// Generates a TOTP secret, provisioning URI and backup codes for an identity.
pub fn provision(issuer: &str, account: &str) -> CryptoResult<TotpProvision> {
    if issuer.is_empty() || account.is_empty() {
        return Err(CryptoError::InvalidInput(
            "issuer and account must not be empty".to_string(),
        ));
    }

    let mut secret_bytes = [0u8; SECRET_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut secret_bytes);
    let secret = BASE32_NOPAD.encode(&secret_bytes);

    let issuer_enc = percent_encode(issuer);
    let account_enc = percent_encode(account);
    let otpauth_uri = format!(
        "otpauth://totp/{issuer_enc}:{account_enc}?secret={secret}&issuer={issuer_enc}\
         &algorithm=SHA1&digits={TOTP_DIGITS}&period={TOTP_PERIOD_SECS}"
    );

    let backup_codes = (0..BACKUP_CODE_COUNT).map(|_| backup_code()).collect();

    Ok(TotpProvision {
        secret,
        otpauth_uri,
        backup_codes,
    })
}

// RFC 3986 unreserved characters pass through; everything else is escaped so
// issuer/account values with spaces, ':' or '&' cannot break the URI.
fn percent_encode(component: &str) -> String {
    let mut out = String::with_capacity(component.len());
    for byte in component.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char);
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

fn backup_code() -> String {
    let mut bytes = [0u8; 8];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    let n = u64::from_be_bytes(bytes) % 10_000_000_000;
    format!("{:05}-{:05}", n / 100_000, n % 100_000)
}

/// Verifies a TOTP code against the current system time, allowing `window`
/// steps of clock skew in either direction.
pub fn verify(secret_base32: &str, code: &str, window: u32) -> CryptoResult<bool> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| CryptoError::InvalidInput(format!("system clock before epoch: {e}")))?
        .as_secs();
    verify_at(secret_base32, code, window, now)
}

/// Verifies a TOTP code at an explicit Unix time.
///
/// Every step in the window is checked with a constant-time comparison, and
/// the result is accumulated so timing does not reveal which step matched.
pub fn verify_at(
    secret_base32: &str,
    code: &str,
    window: u32,
    unix_secs: u64,
) -> CryptoResult<bool> {
    let secret = decode_secret(secret_base32)?;

    if code.len() != TOTP_DIGITS as usize || !code.bytes().all(|b| b.is_ascii_digit()) {
        return Ok(false);
    }

    let step = unix_secs / TOTP_PERIOD_SECS;
    let lo = step.saturating_sub(window as u64);
    let hi = step.saturating_add(window as u64);

    let mut matched = false;
    for counter in lo..=hi {
        let expected = format!("{:0width$}", hotp(&secret, counter)?, width = TOTP_DIGITS as usize);
        matched |= bool::from(expected.as_bytes().ct_eq(code.as_bytes()));
    }

    Ok(matched)
}

fn decode_secret(secret_base32: &str) -> CryptoResult<Vec<u8>> {
    let normalized: String = secret_base32
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect();

    BASE32_NOPAD
        .decode(normalized.as_bytes())
        .map_err(|_| CryptoError::InvalidInput("TOTP secret is not valid base32".to_string()))
}

/// RFC 4226 HOTP with dynamic truncation.
fn hotp(secret: &[u8], counter: u64) -> CryptoResult<u32> {
    let mut mac = Hmac::<Sha1>::new_from_slice(secret)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
    mac.update(&counter.to_be_bytes());
    let digest = mac.finalize().into_bytes();

    let offset = (digest[digest.len() - 1] & 0x0f) as usize;
    let bin = ((u32::from(digest[offset]) & 0x7f) << 24)
        | (u32::from(digest[offset + 1]) << 16)
        | (u32::from(digest[offset + 2]) << 8)
        | u32::from(digest[offset + 3]);

    Ok(bin % 10u32.pow(TOTP_DIGITS))
}
