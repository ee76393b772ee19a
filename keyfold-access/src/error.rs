//! Access layer error types.

use keyfold_types::{InvitationId, ItemId, OrgId, PrincipalId, VaultId};
use thiserror::Error;

/// Result type for access-layer operations.
pub type AccessResult<T> = Result<T, AccessError>;

/// Errors from the data model, role gate and directory.
///
/// `AccessDenied` is raised by the gate before any cryptography runs; a
/// caller that is authorized but cryptographically unable to unwrap sees a
/// `Crypto` error instead. The two are never merged into one message.
#[derive(Debug, Error)]
pub enum AccessError {
    /// Role/access gate refusal. Fail-closed: missing membership and
    /// non-ownership land here too.
    #[error("access denied")]
    AccessDenied,

    #[error("principal not found: {0}")]
    PrincipalNotFound(PrincipalId),

    #[error("organization not found: {0}")]
    OrgNotFound(OrgId),

    #[error("vault not found: {0}")]
    VaultNotFound(VaultId),

    #[error("item not found: {0}")]
    ItemNotFound(ItemId),

    #[error("no wrap stored for principal {0}")]
    WrapNotFound(PrincipalId),

    #[error("E2EE already initialized for this principal")]
    AlreadyInitialized,

    #[error("principal has not initialized E2EE")]
    NotInitialized,

    #[error("invitation not found: {0}")]
    InvitationNotFound(InvitationId),

    #[error("invitation already consumed: {0}")]
    InvitationConsumed(InvitationId),

    /// Wrap scheme does not match the recipient: owners hold symmetric
    /// wraps, invited members hold asymmetric wraps.
    #[error("wrap scheme not valid for this recipient")]
    InvalidWrapScheme,

    #[error("crypto error: {0}")]
    Crypto(#[from] keyfold_crypto::CryptoError),
}
