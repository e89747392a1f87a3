//! Typed errors for the durable stores

use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors raised by the dedup and progress stores.
///
/// Persistence failures are never silently dropped by callers: a lost
/// dedup write risks a duplicate send, so the dispatcher logs and
/// retries these with backoff before degrading the campaign.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode record: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("Failed to decode record: {0}")]
    Decode(#[from] bincode::error::DecodeError),

    /// A campaign id that cannot be used as a storage namespace
    /// (path separators, traversal patterns).
    #[error("Invalid campaign namespace: {0}")]
    InvalidNamespace(String),

    #[error("Internal store error: {0}")]
    Internal(String),
}
