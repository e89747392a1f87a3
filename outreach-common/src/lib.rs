pub mod campaign;
pub mod identity;
pub mod logging;
pub mod message;
pub mod target;
pub mod traits;

pub use campaign::{AttemptOutcome, AttemptRecord, CampaignId, CampaignState, RunId};
pub use identity::{IdentityId, SenderIdentity};
pub use message::Message;
pub use target::{Target, TargetId};

pub use tracing;

/// Control signal broadcast to long-running components.
#[derive(Debug, Clone, Copy)]
pub enum Signal {
    /// Stop pulling new work, finish in-flight attempts, then exit.
    Shutdown,
    /// All components have drained and final state has been written.
    Finalised,
}
