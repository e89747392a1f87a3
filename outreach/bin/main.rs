#![deny(clippy::pedantic, clippy::all, clippy::nursery)]
#![allow(clippy::must_use_candidate)]

use clap::{Parser, Subcommand};
use outreach_common::CampaignId;

#[derive(Parser)]
#[command(name = "outreach", about = "Campaign dispatch runner", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start a campaign and run it to completion (or drained
    /// shutdown).
    Start {
        /// Campaign identifier (also the deduplication namespace).
        campaign: String,

        /// Override the configured worker count.
        #[arg(long)]
        concurrency: Option<usize>,

        /// Override every identity's daily quota.
        #[arg(long)]
        daily_quota: Option<u32>,
    },
    /// Show the last recorded progress snapshot for a campaign.
    Status { campaign: String },
    /// Resume a previously started campaign.
    ///
    /// Targets recorded as resolved in the dedup log are skipped;
    /// everything else is processed again.
    Resume { campaign: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = find_config_file()?;
    let config_content = std::fs::read_to_string(&config_path).map_err(|e| {
        anyhow::anyhow!(
            "Failed to read config from {}: {}",
            config_path.display(),
            e
        )
    })?;
    let mut outreach: outreach::Outreach = ron::from_str(&config_content)?;

    match cli.command {
        Command::Start {
            campaign,
            concurrency,
            daily_quota,
        } => {
            if let Some(concurrency) = concurrency {
                outreach.set_concurrency(concurrency);
            }
            if let Some(daily_quota) = daily_quota {
                outreach.set_daily_quota(daily_quota);
            }
            outreach.run(CampaignId::new(campaign)).await
        }
        Command::Resume { campaign } => outreach.run(CampaignId::new(campaign)).await,
        Command::Status { campaign } => outreach.status(CampaignId::new(campaign)).await,
    }
}

/// Find the configuration file using the following precedence:
/// 1. `OUTREACH_CONFIG` environment variable
/// 2. ./outreach.config.ron (current working directory)
/// 3. /etc/outreach/outreach.config.ron (system-wide config)
fn find_config_file() -> anyhow::Result<std::path::PathBuf> {
    if let Ok(env_path) = std::env::var("OUTREACH_CONFIG") {
        let path = std::path::PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        }
        anyhow::bail!(
            "OUTREACH_CONFIG points to non-existent file: {}",
            path.display()
        );
    }

    let default_paths = vec![
        std::path::PathBuf::from("./outreach.config.ron"),
        std::path::PathBuf::from("/etc/outreach/outreach.config.ron"),
    ];

    for path in &default_paths {
        if path.exists() {
            return Ok(path.clone());
        }
    }

    let paths_tried = default_paths
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");

    anyhow::bail!(
        "No configuration file found. Tried:\n  - OUTREACH_CONFIG environment variable\n{paths_tried}"
    )
}
