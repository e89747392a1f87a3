//! Process controller: wires configuration into a running dispatcher

use std::{
    path::PathBuf,
    sync::{Arc, LazyLock},
};

use outreach_common::{CampaignId, SenderIdentity, Signal, internal, logging, tracing};
use outreach_dispatch::{Dispatcher, DispatcherConfig};
use outreach_store::{FileDedupStore, FileProgressStore};
use serde::Deserialize;
use tokio::sync::broadcast;

use crate::{
    generator::{Template, TemplateGenerator},
    source::RonFileSource,
    transport::TransportConfig,
};

/// Top-level runner configuration, deserialized from the RON config
/// file.
#[derive(Debug, Deserialize)]
pub struct Outreach {
    /// Directory for dedup logs and progress snapshots.
    data_dir: PathBuf,

    /// RON file holding the campaign's target list.
    targets_file: PathBuf,

    /// Sender identities and their daily quotas.
    identities: Vec<SenderIdentity>,

    /// Message templates.
    template: Template,

    #[serde(default)]
    transport: TransportConfig,

    #[serde(default)]
    dispatcher: DispatcherConfig,
}

pub static SHUTDOWN_BROADCAST: LazyLock<broadcast::Sender<Signal>> = LazyLock::new(|| {
    let (sender, _receiver) = broadcast::channel(64);
    sender
});

/// Wait for an interrupt and translate it into the shutdown broadcast.
async fn shutdown() -> anyhow::Result<()> {
    let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            internal!(level = INFO, "CTRL+C entered, draining in-flight work");
        }
        _ = terminate.recv() => {
            internal!(level = INFO, "Terminate signal received, draining in-flight work");
        }
    }

    SHUTDOWN_BROADCAST
        .send(Signal::Shutdown)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Interrupted, e.to_string()))?;

    Ok(())
}

impl Outreach {
    /// Override the configured worker count.
    pub fn set_concurrency(&mut self, concurrency: usize) {
        self.dispatcher.concurrency = concurrency;
    }

    /// Override every identity's daily quota.
    pub fn set_daily_quota(&mut self, daily_quota: u32) {
        for identity in &mut self.identities {
            identity.daily_quota = daily_quota;
        }
    }

    fn dispatcher(&self) -> anyhow::Result<Dispatcher> {
        let dedup = Arc::new(FileDedupStore::new(self.data_dir.join("dedup"))?);
        let progress = Arc::new(FileProgressStore::new(self.data_dir.join("progress"))?);

        Ok(Dispatcher::new(
            self.dispatcher.clone(),
            self.identities.clone(),
            Arc::new(RonFileSource::new(self.targets_file.clone())),
            Arc::new(TemplateGenerator::new(self.template.clone())),
            self.transport.build(),
            dedup,
            progress,
        ))
    }

    /// Run one campaign to completion or drained shutdown and print
    /// the report.
    ///
    /// # Errors
    ///
    /// Fails when the stores cannot be opened or the target source
    /// cannot produce the campaign's targets.
    pub async fn run(self, campaign: CampaignId) -> anyhow::Result<()> {
        logging::init();
        internal!(level = INFO, "Controller running");

        let dispatcher = self.dispatcher()?;

        let interrupt = tokio::spawn(shutdown());
        let report = dispatcher.run(campaign, SHUTDOWN_BROADCAST.subscribe()).await?;
        interrupt.abort();

        internal!(level = INFO, "Shutting down...");
        println!("{report}");
        Ok(())
    }

    /// Print the last persisted snapshot for a campaign.
    ///
    /// # Errors
    ///
    /// Fails when the stores cannot be opened or read.
    pub async fn status(self, campaign: CampaignId) -> anyhow::Result<()> {
        logging::init();

        let dispatcher = self.dispatcher()?;
        match dispatcher.status(&campaign).await? {
            Some(state) => {
                println!(
                    "campaign {} run {}: {}/{} resolved ({} completed, {} failed, {} skipped, {} deferred){}",
                    state.campaign_id,
                    state.run_id,
                    state.resolved(),
                    state.total_targets,
                    state.completed,
                    state.failed,
                    state.skipped,
                    state.deferred,
                    if state.completed_at.is_some() {
                        ", finished"
                    } else {
                        ", in progress"
                    },
                );
            }
            None => {
                tracing::warn!(campaign = %campaign, "No snapshot recorded");
                println!("campaign {campaign}: no recorded run");
            }
        }
        Ok(())
    }
}
