//! The role/access gate.
//!
//! Consulted before any unwrap attempt. Fail-closed: no membership and no
//! ownership means deny. The gate is purely an authorization check — whether
//! the caller can then *cryptographically* unwrap is a separate question
//! with a separate error, so "you may not" is never conflated with "this key
//! is wrong".

use crate::directory::Directory;
use crate::error::{AccessError, AccessResult};
use crate::model::VaultKind;
use crate::role::{Permission, Role};
use keyfold_types::{ItemId, PrincipalId, VaultId};
use tracing::debug;

/// What a permission check is aimed at. Items resolve to their owning vault.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Target {
    Vault(VaultId),
    Item(ItemId),
}

/// Resolves the caller's effective role on a target, if any.
///
/// Personal-vault ownership counts as `Owner`; org-vault access comes from
/// org ownership or a membership. `None` means no relationship at all.
pub fn effective_role<D: Directory + ?Sized>(
    dir: &D,
    principal: PrincipalId,
    target: Target,
) -> AccessResult<Option<Role>> {
    let vault_id = match target {
        Target::Vault(vault) => vault,
        Target::Item(item) => dir.item_vault(item)?,
    };
    let vault = dir.vault(vault_id)?;

    match vault.kind {
        VaultKind::Personal { owner } => Ok((owner == principal).then_some(Role::Owner)),
        VaultKind::Org { org } => {
            if dir.org_owner(org)? == principal {
                return Ok(Some(Role::Owner));
            }
            Ok(dir.membership(org, principal)?.map(|m| m.role))
        }
    }
}

/// Whether the principal holds `required` on the target.
///
/// Any lookup failure (unknown principal, missing vault, dangling item)
/// evaluates to deny.
pub fn check_permission<D: Directory + ?Sized>(
    dir: &D,
    principal: PrincipalId,
    target: Target,
    required: Permission,
) -> bool {
    matches!(
        effective_role(dir, principal, target),
        Ok(Some(role)) if role.allows(required)
    )
}

/// Gate entry point for callers that need the resolved role.
///
/// Returns the effective role on success so callers can make finer-grained
/// decisions (e.g. restricted member edits) without a second lookup.
pub fn authorize<D: Directory + ?Sized>(
    dir: &D,
    principal: PrincipalId,
    target: Target,
    required: Permission,
) -> AccessResult<Role> {
    match effective_role(dir, principal, target)? {
        Some(role) if role.allows(required) => Ok(role),
        _ => {
            debug!(%principal, ?target, ?required, "access denied");
            Err(AccessError::AccessDenied)
        }
    }
}
