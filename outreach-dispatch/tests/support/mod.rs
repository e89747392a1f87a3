//! Scripted collaborators for dispatcher integration tests

use std::{
    collections::{HashMap, VecDeque},
    time::Duration,
};

use async_trait::async_trait;
use outreach_common::{
    CampaignId, IdentityId, Message, SenderIdentity, Target, TargetId,
    traits::{ContentGenerator, RenderError, SourceError, TargetSource, Transport, TransportError},
};
use parking_lot::Mutex;

/// Source that yields a fixed target list on every load.
pub struct StaticSource {
    targets: Vec<Target>,
}

impl StaticSource {
    pub fn new(targets: Vec<Target>) -> Self {
        Self { targets }
    }
}

#[async_trait]
impl TargetSource for StaticSource {
    async fn load(&self, _campaign: &CampaignId) -> Result<Vec<Target>, SourceError> {
        Ok(self.targets.clone())
    }
}

/// Generator that renders a trivial message for any target.
pub struct StubGenerator;

#[async_trait]
impl ContentGenerator for StubGenerator {
    async fn render(&self, target: &Target) -> Result<Message, RenderError> {
        Ok(Message::new(
            target.id.clone(),
            target.contact_address.clone(),
            "Hello",
            "Hello from the test suite",
        ))
    }
}

/// What the transport should do for one attempt.
#[derive(Debug, Clone, Copy)]
pub enum Script {
    Succeed,
    Transient,
    Pushback,
    Reject,
}

/// Transport whose behavior per target is a scripted sequence.
///
/// Each attempt consumes the next step in the target's script; once
/// the script is exhausted attempts succeed. Every attempt is logged
/// with the identity that made it.
#[derive(Default)]
pub struct ScriptedTransport {
    scripts: Mutex<HashMap<TargetId, VecDeque<Script>>>,
    attempts: Mutex<Vec<(TargetId, IdentityId)>>,
    delay: Option<Duration>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn script(&self, target: impl Into<TargetId>, steps: &[Script]) {
        self.scripts
            .lock()
            .insert(target.into(), steps.iter().copied().collect());
    }

    pub fn attempt_order(&self) -> Vec<TargetId> {
        self.attempts.lock().iter().map(|(id, _)| id.clone()).collect()
    }

    pub fn attempt_count(&self, target: &TargetId) -> usize {
        self.attempts.lock().iter().filter(|(id, _)| id == target).count()
    }

    pub fn total_attempts(&self) -> usize {
        self.attempts.lock().len()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn attempt(
        &self,
        message: &Message,
        identity: &IdentityId,
    ) -> Result<(), TransportError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.attempts
            .lock()
            .push((message.target_id.clone(), identity.clone()));

        let step = self
            .scripts
            .lock()
            .get_mut(&message.target_id)
            .and_then(VecDeque::pop_front)
            .unwrap_or(Script::Succeed);

        match step {
            Script::Succeed => Ok(()),
            Script::Transient => Err(TransportError::Transient("connection timed out".to_string())),
            Script::Pushback => Err(TransportError::Pushback("slow down".to_string())),
            Script::Reject => Err(TransportError::Rejected("550 no such user".to_string())),
        }
    }
}

pub fn identities(specs: &[(&str, u32)]) -> Vec<SenderIdentity> {
    specs
        .iter()
        .map(|(id, quota)| SenderIdentity::new(*id, *quota))
        .collect()
}
