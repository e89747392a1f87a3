//! Typed error handling for dispatch operations.
//!
//! The taxonomy drives the retry state machine:
//! - Transient failures (timeouts, connection errors, remote pushback)
//!   are retried with exponential backoff up to a cap.
//! - Terminal failures (permanent rejection, unusable target data) are
//!   recorded and never retried.
//! - Persistence failures degrade the campaign rather than a target:
//!   they are retried in place and, past a threshold, pause new sends.

use outreach_common::traits::{RenderError, SourceError, TransportError};
use outreach_store::StoreError;
use thiserror::Error;

/// Top-level dispatch error type.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Transient failure that can be retried with backoff.
    #[error("Transient failure: {0}")]
    Transient(#[from] TransientError),

    /// Permanent failure for this target; never retried.
    #[error("Terminal failure: {0}")]
    Terminal(#[from] TerminalError),

    /// A dedup or progress write failed. Never attributed to the
    /// target silently; logged, retried, and allowed to degrade the
    /// whole campaign if it persists.
    #[error("Persistence failure: {0}")]
    Persistence(#[from] StoreError),

    /// The target source could not produce the campaign's targets.
    /// Fatal to the run, not to any one target.
    #[error("Target source failure: {0}")]
    Source(#[from] SourceError),
}

/// Failures for which a later attempt may succeed.
#[derive(Debug, Error)]
pub enum TransientError {
    /// Network-level or timeout failure from the transport.
    #[error("Transport failure: {0}")]
    Transport(String),

    /// The remote side signalled rate or quota pushback.
    #[error("Remote pushback: {0}")]
    Pushback(String),

    /// Content generation failed transiently.
    #[error("Content generation failed: {0}")]
    Render(String),
}

/// Failures that will never succeed for this target.
#[derive(Debug, Error)]
pub enum TerminalError {
    /// The target's contact address is missing or malformed.
    #[error("Invalid contact address: {0}")]
    InvalidAddress(String),

    /// The remote side permanently rejected the target (hard-bounce
    /// equivalent).
    #[error("Permanently rejected: {0}")]
    Rejected(String),

    /// The target's data cannot produce a message.
    #[error("Unrenderable target: {0}")]
    Unrenderable(String),
}

impl DispatchError {
    /// Returns `true` if this error is transient and should be retried.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Taxonomy category used for the per-category failure breakdown
    /// in campaign reports.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::Transient(TransientError::Transport(_)) => "transient_transport",
            Self::Transient(TransientError::Pushback(_)) => "remote_pushback",
            Self::Transient(TransientError::Render(_))
            | Self::Terminal(TerminalError::Unrenderable(_)) => "content_generation",
            Self::Terminal(TerminalError::InvalidAddress(_)) => "invalid_address",
            Self::Terminal(TerminalError::Rejected(_)) => "remote_rejection",
            Self::Persistence(_) => "persistence",
            Self::Source(_) => "source",
        }
    }
}

/// Transport errors carry their own retryability; map them onto the
/// dispatch taxonomy so worker code can use `?` throughout.
impl From<TransportError> for DispatchError {
    fn from(error: TransportError) -> Self {
        match error {
            TransportError::Transient(msg) => Self::Transient(TransientError::Transport(msg)),
            TransportError::Pushback(msg) => Self::Transient(TransientError::Pushback(msg)),
            TransportError::Rejected(msg) => Self::Terminal(TerminalError::Rejected(msg)),
        }
    }
}

/// Render failures are retryable unless the generator marked the
/// target itself as unusable.
impl From<RenderError> for DispatchError {
    fn from(error: RenderError) -> Self {
        match error {
            RenderError::Transient(msg) => Self::Transient(TransientError::Render(msg)),
            RenderError::Permanent(msg) => Self::Terminal(TerminalError::Unrenderable(msg)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_classification() {
        let err: DispatchError = TransportError::Transient("connection refused".to_string()).into();
        assert!(err.is_retryable());
        assert_eq!(err.category(), "transient_transport");

        let err: DispatchError = TransportError::Pushback("slow down".to_string()).into();
        assert!(err.is_retryable());
        assert_eq!(err.category(), "remote_pushback");

        let err: DispatchError = TransportError::Rejected("user unknown".to_string()).into();
        assert!(!err.is_retryable());
        assert_eq!(err.category(), "remote_rejection");
    }

    #[test]
    fn test_render_error_classification() {
        let err: DispatchError = RenderError::Transient("backend busy".to_string()).into();
        assert!(err.is_retryable());

        let err: DispatchError = RenderError::Permanent("no template fields".to_string()).into();
        assert!(!err.is_retryable());
        assert_eq!(err.category(), "content_generation");
    }

    #[test]
    fn test_error_display() {
        let err = DispatchError::Terminal(TerminalError::Rejected("550 no such user".to_string()));
        assert_eq!(
            err.to_string(),
            "Terminal failure: Permanently rejected: 550 no such user"
        );
    }
}
