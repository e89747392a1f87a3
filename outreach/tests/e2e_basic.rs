//! End-to-end runner tests: RON targets file through file-backed
//! stores to the dry-run transport.
#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;

use outreach_common::{CampaignId, SenderIdentity, Signal, traits::TargetSource};
use outreach_dispatch::{Dispatcher, DispatcherConfig, RateLimitConfig};
use outreach_store::{FileDedupStore, FileProgressStore, ProgressStore};
use outreach::{
    generator::{Template, TemplateGenerator},
    source::RonFileSource,
    transport::TransportConfig,
};
use tokio::sync::broadcast;

const TARGETS: &str = r#"[
    (id: "biz-1", priority_score: 90, contact_address: "one@example.com", attributes: {"name": "One"}),
    (id: "biz-2", priority_score: 50, contact_address: "two@example.com", attributes: {"name": "Two"}),
    (id: "biz-3", priority_score: 10, contact_address: "three@example.com", attributes: {"name": "Three"}),
]"#;

fn write_targets(dir: &std::path::Path) -> std::path::PathBuf {
    let path = dir.join("targets.ron");
    std::fs::write(&path, TARGETS).expect("Failed to write targets file");
    path
}

fn dispatcher(dir: &std::path::Path) -> Dispatcher {
    let config = DispatcherConfig {
        concurrency: 2,
        rate_limit: RateLimitConfig {
            capacity: 100,
            window_secs: 1.0,
        },
        ..DispatcherConfig::default()
    };

    Dispatcher::new(
        config,
        vec![SenderIdentity::new("sender-a", 100)],
        Arc::new(RonFileSource::new(write_targets(dir))),
        Arc::new(TemplateGenerator::new(Template {
            subject: "Hi {name}".to_string(),
            body: "Hello {name} at {contact_address}".to_string(),
        })),
        TransportConfig::default().build(),
        Arc::new(FileDedupStore::new(dir.join("dedup")).expect("Failed to open dedup store")),
        Arc::new(
            FileProgressStore::new(dir.join("progress")).expect("Failed to open progress store"),
        ),
    )
}

#[tokio::test]
async fn test_full_campaign_flow() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let campaign = CampaignId::new("launch");

    let (_signals, rx) = broadcast::channel(4);
    let report = dispatcher(dir.path())
        .run(campaign.clone(), rx)
        .await
        .expect("Run failed");

    assert_eq!(report.state.completed, 3);
    assert_eq!(report.state.failed, 0);
    assert!(report.state.is_finished());

    // The snapshot survives the dispatcher.
    let progress =
        FileProgressStore::new(dir.path().join("progress")).expect("Failed to reopen store");
    let snapshot = progress
        .load(&campaign)
        .await
        .expect("Snapshot read failed")
        .expect("No snapshot written");
    assert_eq!(snapshot.completed, 3);
    assert!(snapshot.completed_at.is_some());
}

#[tokio::test]
async fn test_rerun_is_a_no_op() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let campaign = CampaignId::new("rerun");

    let (_signals, rx) = broadcast::channel(4);
    let report = dispatcher(dir.path())
        .run(campaign.clone(), rx)
        .await
        .expect("First run failed");
    assert_eq!(report.state.completed, 3);

    // Fresh dispatcher over the same data directory: the dedup log
    // keeps every target from being re-sent.
    let (_signals, rx) = broadcast::channel(4);
    let report = dispatcher(dir.path())
        .run(campaign, rx)
        .await
        .expect("Second run failed");
    assert_eq!(report.state.completed, 0);
    assert_eq!(report.state.skipped, 3);
    assert!(report.state.is_finished());
}

#[tokio::test]
async fn test_source_reflects_file_edits_between_runs() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = write_targets(dir.path());
    let source = RonFileSource::new(&path);

    let targets = source
        .load(&CampaignId::new("edits"))
        .await
        .expect("Load failed");
    assert_eq!(targets.len(), 3);

    std::fs::write(
        &path,
        r#"[(id: "biz-9", priority_score: 1, contact_address: "nine@example.com")]"#,
    )
    .expect("Rewrite failed");

    let targets = source
        .load(&CampaignId::new("edits"))
        .await
        .expect("Reload failed");
    assert_eq!(targets.len(), 1);
    assert_eq!(targets[0].id.as_str(), "biz-9");
}

#[tokio::test]
async fn test_shutdown_before_work_reports_unfinished() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");

    let (signals, rx) = broadcast::channel(4);
    signals.send(Signal::Shutdown).expect("Send failed");
    // The signal is queued before the run starts; workers drain
    // immediately and the run reports everything still queued.
    let report = dispatcher(dir.path())
        .run(CampaignId::new("aborted"), rx)
        .await
        .expect("Run failed");

    assert!(report.state.completed <= 3);
}
