//! Server-side data model.
//!
//! Every record here stores only ciphertexts and public material. Salts and
//! verifiers are not secret; wraps are ciphertexts; item fields are AEAD
//! ciphertexts under keys the server never sees.

use crate::error::{AccessError, AccessResult};
use crate::role::Role;
use chrono::{DateTime, Utc};
use keyfold_crypto::{EncryptedData, Salt, Verifier, WrapRecord};
use keyfold_types::{InvitationId, ItemId, OrgId, PrincipalId, VaultId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A principal's E2EE material, set exactly once at initialization.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct E2eeProfile {
    /// Per-user KDF salt. Plaintext server-side; unique, not secret.
    pub salt: Salt,
    /// One-way digest of the master key, for login checks.
    pub verifier: Verifier,
    /// X25519 public key for receiving asymmetric wraps.
    pub public_key: [u8; 32],
}

/// A user identity.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Principal {
    pub id: PrincipalId,
    e2ee: Option<E2eeProfile>,
}

impl Principal {
    pub fn new(id: PrincipalId) -> Self {
        Self { id, e2ee: None }
    }

    /// Sets salt, verifier and public key. Idempotence contract: a second
    /// initialization is rejected, never overwritten.
    pub fn initialize_e2ee(&mut self, profile: E2eeProfile) -> AccessResult<()> {
        if self.e2ee.is_some() {
            return Err(AccessError::AlreadyInitialized);
        }
        self.e2ee = Some(profile);
        Ok(())
    }

    pub fn e2ee(&self) -> Option<&E2eeProfile> {
        self.e2ee.as_ref()
    }

    pub fn is_initialized(&self) -> bool {
        self.e2ee.is_some()
    }
}

/// An organization. Owns exactly one org vault and has exactly one owner.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Organization {
    pub id: OrgId,
    pub owner: PrincipalId,
    pub vault: VaultId,
}

/// What a vault belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VaultKind {
    Personal { owner: PrincipalId },
    Org { org: OrgId },
}

/// A container of items, keyed by a single vault key that never exists
/// server-side in unwrapped form.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Vault {
    pub id: VaultId,
    pub kind: VaultKind,
}

/// An (organization, principal, role) triple carrying that principal's vault
/// key wrap.
///
/// The wrap scheme is fixed at creation. Role transitions never touch the
/// wrap — role gates permission, not which key the member can unwrap.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Membership {
    pub org: OrgId,
    pub principal: PrincipalId,
    pub role: Role,
    pub wrap: WrapRecord,
    pub created_at: DateTime<Utc>,
}

/// Semantic facets an item may carry (non-exclusive).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemFacet {
    Login,
    Note,
    Totp,
}

/// Encrypted fields an item may hold.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemField {
    Username,
    Password,
    Note,
    TotpSeed,
}

/// A vault entry: a wrapped item key plus independently encrypted fields.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub vault: VaultId,
    pub facets: BTreeSet<ItemFacet>,
    /// Item key wrapped under the vault key.
    pub wrapped_key: EncryptedData,
    fields: BTreeMap<ItemField, EncryptedData>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Item {
    pub fn new(
        id: ItemId,
        vault: VaultId,
        facets: BTreeSet<ItemFacet>,
        wrapped_key: EncryptedData,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            vault,
            facets,
            wrapped_key,
            fields: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Stores or replaces one field ciphertext. Refreshes `updated_at`.
    pub fn set_field(&mut self, field: ItemField, ciphertext: EncryptedData) {
        self.fields.insert(field, ciphertext);
        self.updated_at = Utc::now();
    }

    /// Removes a field ciphertext. Refreshes `updated_at` if it existed.
    pub fn clear_field(&mut self, field: ItemField) -> bool {
        let removed = self.fields.remove(&field).is_some();
        if removed {
            self.updated_at = Utc::now();
        }
        removed
    }

    pub fn field(&self, field: ItemField) -> Option<&EncryptedData> {
        self.fields.get(&field)
    }

    pub fn fields(&self) -> impl Iterator<Item = (ItemField, &EncryptedData)> {
        self.fields.iter().map(|(k, v)| (*k, v))
    }
}

/// Lifecycle of an invitation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvitationStatus {
    Pending,
    Consumed,
}

/// A pending offer of org membership. Accepting it creates the membership
/// with the supplied wrap and consumes the invitation atomically.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Invitation {
    pub id: InvitationId,
    pub org: OrgId,
    pub invitee: PrincipalId,
    pub role: Role,
    pub status: InvitationStatus,
}

/// Action recorded in the audit log.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    InvitationAccepted,
    MembershipRewrapped,
}

/// One audit log entry.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuditRecord {
    pub at: DateTime<Utc>,
    pub org: OrgId,
    pub principal: PrincipalId,
    pub action: AuditAction,
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyfold_crypto::{generate_random_key, generate_vault_key, wrap_item_key};

    #[test]
    fn e2ee_initialization_is_once_only() {
        let mut principal = Principal::new(PrincipalId::new());
        assert!(!principal.is_initialized());

        let bundle = keyfold_crypto::derive_master_key_with(
            "secret",
            &Salt::random(),
            &keyfold_crypto::KdfParams {
                memory_kib: 8,
                iterations: 1,
                parallelism: 1,
            },
        )
        .unwrap();

        let profile = E2eeProfile {
            salt: Salt::random(),
            verifier: bundle.verifier.clone(),
            public_key: [0u8; 32],
        };

        principal.initialize_e2ee(profile.clone()).unwrap();
        assert!(principal.is_initialized());

        let err = principal.initialize_e2ee(profile).unwrap_err();
        assert!(matches!(err, AccessError::AlreadyInitialized));
    }

    #[test]
    fn field_mutation_refreshes_updated_at() {
        let vault_key = generate_vault_key();
        let item_key = generate_random_key();
        let wrapped = wrap_item_key(&item_key, &vault_key).unwrap();

        let mut item = Item::new(
            ItemId::new(),
            VaultId::new(),
            BTreeSet::from([ItemFacet::Login]),
            wrapped,
        );
        let created = item.updated_at;

        let ciphertext = keyfold_crypto::encrypt_field(&item_key, b"alice").unwrap();
        item.set_field(ItemField::Username, ciphertext);

        assert!(item.updated_at >= created);
        assert!(item.field(ItemField::Username).is_some());
        assert!(item.field(ItemField::Password).is_none());
    }

    #[test]
    fn clear_field_is_reported() {
        let vault_key = generate_vault_key();
        let item_key = generate_random_key();
        let wrapped = wrap_item_key(&item_key, &vault_key).unwrap();

        let mut item = Item::new(ItemId::new(), VaultId::new(), BTreeSet::new(), wrapped);
        assert!(!item.clear_field(ItemField::Note));

        let ciphertext = keyfold_crypto::encrypt_field(&item_key, b"body").unwrap();
        item.set_field(ItemField::Note, ciphertext);
        assert!(item.clear_field(ItemField::Note));
    }
}
