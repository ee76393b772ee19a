//! Roles and the fixed permission table.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Role in an organization, ordered by privilege (`Viewer < Member < Admin <
/// Owner`).
///
/// A role gates *authorization to call* unwrap/decrypt/edit/share/manage. It
/// is independent of which wrap scheme the member holds: only a member with a
/// stored wrap can cryptographically unwrap at all, and changing a role never
/// changes the wrap.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Viewer,
    Member,
    Admin,
    Owner,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Viewer => write!(f, "viewer"),
            Role::Member => write!(f, "member"),
            Role::Admin => write!(f, "admin"),
            Role::Owner => write!(f, "owner"),
        }
    }
}

/// An action a principal may be authorized to perform on a vault or item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    View,
    /// Create and modify items. For `Member` this is restricted to item
    /// contents; vault settings require `Manage`.
    Edit,
    Share,
    Manage,
    Decrypt,
}

/// Every permission, for set-style iteration.
pub const ALL_PERMISSIONS: [Permission; 5] = [
    Permission::View,
    Permission::Edit,
    Permission::Share,
    Permission::Manage,
    Permission::Decrypt,
];

impl Role {
    /// The fixed permission table.
    ///
    /// A closed match over `(Role, Permission)`: adding a role or permission
    /// without extending this table is a compile error, so no role can ever
    /// be unmapped at runtime.
    pub fn allows(self, permission: Permission) -> bool {
        match (self, permission) {
            (Role::Owner | Role::Admin, _) => true,
            (
                Role::Member,
                Permission::View | Permission::Edit | Permission::Share | Permission::Decrypt,
            ) => true,
            (Role::Member, Permission::Manage) => false,
            (Role::Viewer, Permission::View | Permission::Decrypt) => true,
            (Role::Viewer, Permission::Edit | Permission::Share | Permission::Manage) => false,
        }
    }

    /// The permissions this role grants.
    pub fn permissions(self) -> impl Iterator<Item = Permission> {
        ALL_PERMISSIONS.into_iter().filter(move |p| self.allows(*p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn privilege_order() {
        assert!(Role::Viewer < Role::Member);
        assert!(Role::Member < Role::Admin);
        assert!(Role::Admin < Role::Owner);
    }

    #[test]
    fn permission_sets_are_monotonic() {
        let roles = [Role::Viewer, Role::Member, Role::Admin, Role::Owner];
        for pair in roles.windows(2) {
            let (lower, higher) = (pair[0], pair[1]);
            for permission in ALL_PERMISSIONS {
                if lower.allows(permission) {
                    assert!(
                        higher.allows(permission),
                        "{higher} must allow everything {lower} allows"
                    );
                }
            }
        }
    }

    #[test]
    fn table_matches_design() {
        assert!(Role::Viewer.allows(Permission::View));
        assert!(Role::Viewer.allows(Permission::Decrypt));
        assert!(!Role::Viewer.allows(Permission::Edit));
        assert!(!Role::Viewer.allows(Permission::Share));

        assert!(Role::Member.allows(Permission::Edit));
        assert!(Role::Member.allows(Permission::Share));
        assert!(!Role::Member.allows(Permission::Manage));

        assert!(Role::Admin.allows(Permission::Manage));
        assert!(Role::Owner.allows(Permission::Manage));
    }

    #[test]
    fn serde_uses_lowercase_names() {
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
        let role: Role = serde_json::from_str("\"viewer\"").unwrap();
        assert_eq!(role, Role::Viewer);
    }
}
