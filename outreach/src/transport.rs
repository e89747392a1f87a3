//! Built-in transports
//!
//! Real delivery mechanics (SMTP relays, web-form drivers) plug in
//! behind the `Transport` trait from their own crates. This module
//! only ships the dry-run transport used for rehearsing a campaign
//! without contacting anyone.

use std::time::Duration;

use async_trait::async_trait;
use outreach_common::{
    IdentityId, Message,
    traits::{Transport, TransportError},
    tracing,
};
use serde::{Deserialize, Serialize};

/// Which transport the runner should construct.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TransportConfig {
    /// Log every would-be send and report success.
    DryRun {
        /// Simulated per-send latency in milliseconds.
        #[serde(default)]
        delay_ms: u64,
    },
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self::DryRun { delay_ms: 0 }
    }
}

impl TransportConfig {
    #[must_use]
    pub fn build(&self) -> std::sync::Arc<dyn Transport> {
        match self {
            Self::DryRun { delay_ms } => std::sync::Arc::new(DryRunTransport {
                delay: Duration::from_millis(*delay_ms),
            }),
        }
    }
}

/// Transport that performs no delivery at all.
#[derive(Debug)]
pub struct DryRunTransport {
    delay: Duration,
}

#[async_trait]
impl Transport for DryRunTransport {
    async fn attempt(
        &self,
        message: &Message,
        identity: &IdentityId,
    ) -> Result<(), TransportError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        tracing::info!(
            target = %message.target_id,
            identity = %identity,
            address = %message.contact_address,
            subject = %message.subject,
            "Dry-run send"
        );
        Ok(())
    }
}
