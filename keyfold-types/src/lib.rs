//! Shared identifier types for Keyfold.
//!
//! Every record kind gets its own UUID newtype so a vault ID can never be
//! passed where an item ID is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type! {
    /// Unique identifier for a principal (user).
    PrincipalId
}

id_type! {
    /// Unique identifier for an organization.
    OrgId
}

id_type! {
    /// Unique identifier for a vault.
    VaultId
}

id_type! {
    /// Unique identifier for an item within a vault.
    ItemId
}

id_type! {
    /// Unique identifier for a pending membership invitation.
    InvitationId
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        assert_ne!(PrincipalId::new(), PrincipalId::new());
        assert_ne!(VaultId::new(), VaultId::new());
    }

    #[test]
    fn display_matches_inner_uuid() {
        let id = OrgId::new();
        assert_eq!(id.to_string(), id.0.to_string());
    }
}
