//! Persistence boundary.
//!
//! The real server owns principals, vaults, memberships and invitations
//! behind an HTTP/database surface that is out of scope here. [`Directory`]
//! captures the read/update contracts the crypto core depends on;
//! [`MemoryDirectory`] is a reference implementation for tests and
//! embedders. Reads are expected to be read-after-write consistent.

use crate::error::{AccessError, AccessResult};
use crate::model::{
    AuditAction, AuditRecord, E2eeProfile, Invitation, InvitationStatus, Item, ItemField,
    Membership, Organization, Principal, Vault, VaultKind,
};
use crate::role::Role;
use chrono::Utc;
use keyfold_crypto::{EncryptedData, Salt, Verifier, WrapRecord};
use keyfold_types::{InvitationId, ItemId, OrgId, PrincipalId, VaultId};
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::{debug, info};

/// Read/update surface the core requires from persistence.
pub trait Directory {
    /// Per-user KDF salt. Read-only, idempotent.
    fn salt(&self, principal: PrincipalId) -> AccessResult<Salt>;

    /// Compares a freshly computed verifier against the stored one.
    /// Constant-time; the result leaks nothing about partial matches.
    fn check_verifier(&self, principal: PrincipalId, candidate: &Verifier) -> AccessResult<bool>;

    /// The principal's registered X25519 public key.
    fn public_key(&self, principal: PrincipalId) -> AccessResult<[u8; 32]>;

    fn vault(&self, vault: VaultId) -> AccessResult<Vault>;

    /// Resolves an item to its owning vault.
    fn item_vault(&self, item: ItemId) -> AccessResult<VaultId>;

    fn org_owner(&self, org: OrgId) -> AccessResult<PrincipalId>;

    fn membership(&self, org: OrgId, principal: PrincipalId)
        -> AccessResult<Option<Membership>>;

    /// The single owner wrap of a personal vault.
    fn personal_vault_wrap(&self, vault: VaultId) -> AccessResult<WrapRecord>;

    /// The wrap an org-vault caller should use: their own membership wrap if
    /// one exists, otherwise (owner only) the symmetric owner wrap.
    fn org_vault_wrap(&self, vault: VaultId, caller: PrincipalId) -> AccessResult<WrapRecord>;

    /// Accepts an invitation: creates the membership with the supplied wrap,
    /// consumes the invitation and appends an audit record — all or nothing.
    fn accept_invitation(
        &self,
        invitation: InvitationId,
        wrap: WrapRecord,
    ) -> AccessResult<Membership>;
}

#[derive(Default)]
struct DirectoryState {
    principals: HashMap<PrincipalId, Principal>,
    orgs: HashMap<OrgId, Organization>,
    vaults: HashMap<VaultId, Vault>,
    /// Owner wrap per vault: the personal-vault wrap, or the org owner's
    /// symmetric bootstrap wrap.
    owner_wraps: HashMap<VaultId, WrapRecord>,
    memberships: HashMap<(OrgId, PrincipalId), Membership>,
    items: HashMap<ItemId, Item>,
    invitations: HashMap<InvitationId, Invitation>,
    audit: Vec<AuditRecord>,
}

/// In-memory [`Directory`] implementation.
///
/// Single process, interior mutability; every vault created through it holds
/// an owner wrap from the start, so the "owner can always reach the vault
/// key" invariant cannot be violated by construction.
#[derive(Default)]
pub struct MemoryDirectory {
    inner: RwLock<DirectoryState>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a principal with no E2EE material yet.
    pub fn register_principal(&self) -> PrincipalId {
        let id = PrincipalId::new();
        let mut state = self.inner.write().unwrap();
        state.principals.insert(id, Principal::new(id));
        id
    }

    /// One-time E2EE initialization: salt, verifier and public key.
    /// Rejected if already set.
    pub fn initialize_e2ee(
        &self,
        principal: PrincipalId,
        profile: E2eeProfile,
    ) -> AccessResult<()> {
        let mut state = self.inner.write().unwrap();
        let record = state
            .principals
            .get_mut(&principal)
            .ok_or(AccessError::PrincipalNotFound(principal))?;
        record.initialize_e2ee(profile)?;
        debug!(%principal, "E2EE profile initialized");
        Ok(())
    }

    /// Creates a personal vault with its single owner wrap.
    pub fn create_personal_vault(
        &self,
        owner: PrincipalId,
        wrap: WrapRecord,
    ) -> AccessResult<VaultId> {
        if !wrap.is_symmetric() {
            return Err(AccessError::InvalidWrapScheme);
        }

        let mut state = self.inner.write().unwrap();
        if !state.principals.contains_key(&owner) {
            return Err(AccessError::PrincipalNotFound(owner));
        }

        let vault_id = VaultId::new();
        state.vaults.insert(
            vault_id,
            Vault {
                id: vault_id,
                kind: VaultKind::Personal { owner },
            },
        );
        state.owner_wraps.insert(vault_id, wrap);
        Ok(vault_id)
    }

    /// Creates an organization and its vault, bootstrapped with the owner's
    /// symmetric wrap.
    pub fn create_org(
        &self,
        owner: PrincipalId,
        owner_wrap: WrapRecord,
    ) -> AccessResult<(OrgId, VaultId)> {
        if !owner_wrap.is_symmetric() {
            return Err(AccessError::InvalidWrapScheme);
        }

        let mut state = self.inner.write().unwrap();
        if !state.principals.contains_key(&owner) {
            return Err(AccessError::PrincipalNotFound(owner));
        }

        let org_id = OrgId::new();
        let vault_id = VaultId::new();
        state.orgs.insert(
            org_id,
            Organization {
                id: org_id,
                owner,
                vault: vault_id,
            },
        );
        state.vaults.insert(
            vault_id,
            Vault {
                id: vault_id,
                kind: VaultKind::Org { org: org_id },
            },
        );
        state.owner_wraps.insert(vault_id, owner_wrap);

        info!(%org_id, %vault_id, "organization created");
        Ok((org_id, vault_id))
    }

    /// Creates a pending invitation for org membership at the given role.
    pub fn invite(
        &self,
        org: OrgId,
        invitee: PrincipalId,
        role: Role,
    ) -> AccessResult<InvitationId> {
        let mut state = self.inner.write().unwrap();
        if !state.orgs.contains_key(&org) {
            return Err(AccessError::OrgNotFound(org));
        }
        if !state.principals.contains_key(&invitee) {
            return Err(AccessError::PrincipalNotFound(invitee));
        }

        let id = InvitationId::new();
        state.invitations.insert(
            id,
            Invitation {
                id,
                org,
                invitee,
                role,
                status: InvitationStatus::Pending,
            },
        );
        Ok(id)
    }

    /// Changes a member's role. Deliberately does not touch the wrap — role
    /// gates permission only.
    pub fn set_role(&self, org: OrgId, principal: PrincipalId, role: Role) -> AccessResult<()> {
        let mut state = self.inner.write().unwrap();
        let membership = state
            .memberships
            .get_mut(&(org, principal))
            .ok_or(AccessError::WrapNotFound(principal))?;
        membership.role = role;
        Ok(())
    }

    /// Replaces a member's wrap (explicit re-wrap, e.g. after key rotation).
    pub fn rewrap_membership(
        &self,
        org: OrgId,
        principal: PrincipalId,
        wrap: WrapRecord,
    ) -> AccessResult<()> {
        if !wrap.is_asymmetric() {
            return Err(AccessError::InvalidWrapScheme);
        }

        let mut state = self.inner.write().unwrap();
        let membership = state
            .memberships
            .get_mut(&(org, principal))
            .ok_or(AccessError::WrapNotFound(principal))?;
        membership.wrap = wrap;
        state.audit.push(AuditRecord {
            at: Utc::now(),
            org,
            principal,
            action: AuditAction::MembershipRewrapped,
        });
        debug!(%org, %principal, "membership re-wrapped");
        Ok(())
    }

    /// Stores an item. The caller is responsible for having passed the gate.
    pub fn put_item(&self, item: Item) -> AccessResult<ItemId> {
        let mut state = self.inner.write().unwrap();
        if !state.vaults.contains_key(&item.vault) {
            return Err(AccessError::VaultNotFound(item.vault));
        }
        let id = item.id;
        state.items.insert(id, item);
        Ok(id)
    }

    pub fn item(&self, item: ItemId) -> AccessResult<Item> {
        let state = self.inner.read().unwrap();
        state
            .items
            .get(&item)
            .cloned()
            .ok_or(AccessError::ItemNotFound(item))
    }

    /// Replaces one field ciphertext on an item.
    pub fn update_item_field(
        &self,
        item: ItemId,
        field: ItemField,
        ciphertext: EncryptedData,
    ) -> AccessResult<()> {
        let mut state = self.inner.write().unwrap();
        let record = state
            .items
            .get_mut(&item)
            .ok_or(AccessError::ItemNotFound(item))?;
        record.set_field(field, ciphertext);
        Ok(())
    }

    /// The audit trail, oldest first.
    pub fn audit_log(&self) -> Vec<AuditRecord> {
        self.inner.read().unwrap().audit.clone()
    }

    pub fn invitation(&self, invitation: InvitationId) -> AccessResult<Invitation> {
        let state = self.inner.read().unwrap();
        state
            .invitations
            .get(&invitation)
            .cloned()
            .ok_or(AccessError::InvitationNotFound(invitation))
    }
}

impl Directory for MemoryDirectory {
    fn salt(&self, principal: PrincipalId) -> AccessResult<Salt> {
        let state = self.inner.read().unwrap();
        let record = state
            .principals
            .get(&principal)
            .ok_or(AccessError::PrincipalNotFound(principal))?;
        record
            .e2ee()
            .map(|p| p.salt)
            .ok_or(AccessError::NotInitialized)
    }

    fn check_verifier(&self, principal: PrincipalId, candidate: &Verifier) -> AccessResult<bool> {
        let state = self.inner.read().unwrap();
        let record = state
            .principals
            .get(&principal)
            .ok_or(AccessError::PrincipalNotFound(principal))?;
        let profile = record.e2ee().ok_or(AccessError::NotInitialized)?;
        Ok(profile.verifier.matches(candidate))
    }

    fn public_key(&self, principal: PrincipalId) -> AccessResult<[u8; 32]> {
        let state = self.inner.read().unwrap();
        let record = state
            .principals
            .get(&principal)
            .ok_or(AccessError::PrincipalNotFound(principal))?;
        record
            .e2ee()
            .map(|p| p.public_key)
            .ok_or(AccessError::NotInitialized)
    }

    fn vault(&self, vault: VaultId) -> AccessResult<Vault> {
        let state = self.inner.read().unwrap();
        state
            .vaults
            .get(&vault)
            .cloned()
            .ok_or(AccessError::VaultNotFound(vault))
    }

    fn item_vault(&self, item: ItemId) -> AccessResult<VaultId> {
        let state = self.inner.read().unwrap();
        state
            .items
            .get(&item)
            .map(|i| i.vault)
            .ok_or(AccessError::ItemNotFound(item))
    }

    fn org_owner(&self, org: OrgId) -> AccessResult<PrincipalId> {
        let state = self.inner.read().unwrap();
        state
            .orgs
            .get(&org)
            .map(|o| o.owner)
            .ok_or(AccessError::OrgNotFound(org))
    }

    fn membership(
        &self,
        org: OrgId,
        principal: PrincipalId,
    ) -> AccessResult<Option<Membership>> {
        let state = self.inner.read().unwrap();
        Ok(state.memberships.get(&(org, principal)).cloned())
    }

    fn personal_vault_wrap(&self, vault: VaultId) -> AccessResult<WrapRecord> {
        let state = self.inner.read().unwrap();
        let record = state
            .vaults
            .get(&vault)
            .ok_or(AccessError::VaultNotFound(vault))?;
        let owner = match record.kind {
            VaultKind::Personal { owner } => owner,
            VaultKind::Org { .. } => return Err(AccessError::VaultNotFound(vault)),
        };
        state
            .owner_wraps
            .get(&vault)
            .cloned()
            .ok_or(AccessError::WrapNotFound(owner))
    }

    fn org_vault_wrap(&self, vault: VaultId, caller: PrincipalId) -> AccessResult<WrapRecord> {
        let state = self.inner.read().unwrap();
        let record = state
            .vaults
            .get(&vault)
            .ok_or(AccessError::VaultNotFound(vault))?;
        let org = match record.kind {
            VaultKind::Org { org } => org,
            VaultKind::Personal { .. } => return Err(AccessError::VaultNotFound(vault)),
        };

        // The caller's own membership wrap wins; the owner falls back to the
        // symmetric bootstrap wrap when they hold no membership wrap.
        if let Some(membership) = state.memberships.get(&(org, caller)) {
            return Ok(membership.wrap.clone());
        }

        let owner = state
            .orgs
            .get(&org)
            .map(|o| o.owner)
            .ok_or(AccessError::OrgNotFound(org))?;
        if caller == owner {
            return state
                .owner_wraps
                .get(&vault)
                .cloned()
                .ok_or(AccessError::WrapNotFound(caller));
        }

        Err(AccessError::WrapNotFound(caller))
    }

    fn accept_invitation(
        &self,
        invitation: InvitationId,
        wrap: WrapRecord,
    ) -> AccessResult<Membership> {
        if !wrap.is_asymmetric() {
            return Err(AccessError::InvalidWrapScheme);
        }

        // Validate everything before mutating anything, then apply the three
        // writes (membership, invitation status, audit) under one lock so
        // they are all-or-nothing.
        let mut state = self.inner.write().unwrap();

        let pending = state
            .invitations
            .get(&invitation)
            .ok_or(AccessError::InvitationNotFound(invitation))?;
        if pending.status == InvitationStatus::Consumed {
            return Err(AccessError::InvitationConsumed(invitation));
        }
        let (org, invitee, role) = (pending.org, pending.invitee, pending.role);
        if !state.principals.contains_key(&invitee) {
            return Err(AccessError::PrincipalNotFound(invitee));
        }

        let membership = Membership {
            org,
            principal: invitee,
            role,
            wrap,
            created_at: Utc::now(),
        };
        state.memberships.insert((org, invitee), membership.clone());
        if let Some(record) = state.invitations.get_mut(&invitation) {
            record.status = InvitationStatus::Consumed;
        }
        state.audit.push(AuditRecord {
            at: Utc::now(),
            org,
            principal: invitee,
            action: AuditAction::InvitationAccepted,
        });

        info!(%org, principal = %invitee, %role, "invitation accepted");
        Ok(membership)
    }
}
