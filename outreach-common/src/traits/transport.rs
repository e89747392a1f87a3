use async_trait::async_trait;
use thiserror::Error;

use crate::{identity::IdentityId, message::Message};

/// Errors raised by a delivery attempt.
///
/// The split mirrors the retry taxonomy: `Transient` and `Pushback`
/// are retryable with backoff, `Rejected` is terminal.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Network-level or timeout failure; a later attempt may succeed.
    #[error("Transient transport failure: {0}")]
    Transient(String),

    /// The remote side permanently rejected this target (hard-bounce
    /// equivalent, invalid address). Never retried.
    #[error("Permanently rejected: {0}")]
    Rejected(String),

    /// The remote side signalled rate or quota pushback. Retryable
    /// after backoff.
    #[error("Remote pushback: {0}")]
    Pushback(String),
}

impl TransportError {
    /// Whether a later attempt may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::Pushback(_))
    }
}

/// Attempts one delivery for one rendered message.
///
/// The only collaborator that performs real I/O. Attempts must be safe
/// to repeat for the same target: the dispatcher guarantees
/// at-least-once semantics across retries and crash recovery, never
/// exactly-once.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn attempt(&self, message: &Message, identity: &IdentityId)
    -> Result<(), TransportError>;
}
