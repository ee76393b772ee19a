//! Access control and data model for Keyfold.
//!
//! Sits between the crypto core and the (external) persistence layer:
//!
//! - The data model: principals, organizations, vaults, memberships, items
//!   and invitations. The server stores these; it never holds an unwrapped
//!   key of any kind.
//! - The role/access gate: a fixed role-to-permission table consulted before
//!   any unwrap attempt. Authorization refusal is a distinct error from
//!   cryptographic failure so the two are never conflated.
//! - The directory contract: the read/update surface the core needs from
//!   whatever persistence backs the server, plus an in-memory implementation
//!   for tests and embedding.

mod directory;
mod error;
mod gate;
mod model;
mod role;

pub use directory::{Directory, MemoryDirectory};
pub use error::{AccessError, AccessResult};
pub use gate::{authorize, check_permission, effective_role, Target};
pub use model::{
    AuditAction, AuditRecord, E2eeProfile, Invitation, InvitationStatus, Item, ItemFacet,
    ItemField, Membership, Organization, Principal, Vault, VaultKind,
};
pub use role::{Permission, Role, ALL_PERMISSIONS};
