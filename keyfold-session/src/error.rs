//! Session layer error types.

use thiserror::Error;

pub type SessionResult<T> = Result<T, SessionError>;

#[derive(Debug, Error)]
pub enum SessionError {
    /// The session is locked or past its expiry. Callers must treat this as
    /// "re-authenticate", not retry.
    #[error("session expired")]
    SessionExpired,

    /// A cancellable operation was aborted because the session locked (or was
    /// cancelled explicitly) while it was in flight.
    #[error("operation cancelled")]
    Cancelled,

    #[error("background task failed: {0}")]
    TaskFailed(String),

    #[error("crypto error: {0}")]
    Crypto(#[from] keyfold_crypto::CryptoError),
}
