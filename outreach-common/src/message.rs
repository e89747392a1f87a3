//! Rendered outbound messages

use serde::{Deserialize, Serialize};

use crate::target::TargetId;

/// A rendered message ready for one delivery attempt.
///
/// Produced by the content generator; the dispatch core treats the
/// body as opaque and only threads it through to the transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// The target this message was rendered for.
    pub target_id: TargetId,

    /// The address the transport should deliver to.
    pub contact_address: String,

    /// Subject line, where the transport has such a concept.
    pub subject: String,

    /// Rendered body.
    pub body: String,
}

impl Message {
    #[must_use]
    pub fn new(
        target_id: TargetId,
        contact_address: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            target_id,
            contact_address: contact_address.into(),
            subject: subject.into(),
            body: body.into(),
        }
    }
}
