use async_trait::async_trait;
use thiserror::Error;

use crate::{message::Message, target::Target};

/// Errors raised while rendering a message for a target.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The target's data cannot produce a message and never will
    /// (missing required attributes, malformed address). Terminal.
    #[error("Target cannot be rendered: {0}")]
    Permanent(String),

    /// A transient rendering failure (generation backend unavailable,
    /// timeout). Retryable with backoff.
    #[error("Rendering failed transiently: {0}")]
    Transient(String),
}

impl RenderError {
    /// Whether this failure is permanent for the target.
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(self, Self::Permanent(_))
    }
}

/// Produces a rendered message for a target.
///
/// Rendering must be a pure function of the target: no side effects,
/// no delivery. Failures default to retryable unless the generator
/// signals that the target data itself is unusable.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn render(&self, target: &Target) -> Result<Message, RenderError>;
}
