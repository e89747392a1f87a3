//! Final campaign report assembly
//!
//! Folds the run's aggregate state, attempt log, and identity usage
//! into the summary handed back to the operator surface when a run
//! ends.

use std::time::Duration;

use outreach_common::{AttemptRecord, CampaignState, SenderIdentity};
use serde::Serialize;

/// Terminal failures grouped by error taxonomy category.
#[derive(Debug, Clone, Serialize)]
pub struct FailureGroup {
    pub category: String,
    pub count: u64,
    /// One representative error message from the group, for triage.
    pub example_error: Option<String>,
}

/// Summary of a finished (or drained) campaign run.
#[derive(Debug, Serialize)]
pub struct CampaignReport {
    pub state: CampaignState,
    pub failures: Vec<FailureGroup>,
    /// Per-identity quota counters at the end of the run.
    pub identity_usage: Vec<SenderIdentity>,
    pub total_attempts: u64,
    /// Attempts beyond the first per target.
    pub retried_attempts: u64,
    pub duration: Duration,
}

impl CampaignReport {
    /// Assemble the report from the aggregator's output and the quota
    /// pool's final counters.
    #[must_use]
    pub fn assemble(
        state: CampaignState,
        attempts: &[AttemptRecord],
        failure_examples: &ahash::AHashMap<String, String>,
        identity_usage: Vec<SenderIdentity>,
    ) -> Self {
        let duration = state
            .completed_at
            .unwrap_or_else(chrono::Utc::now)
            .signed_duration_since(state.started_at)
            .to_std()
            .unwrap_or(Duration::ZERO);

        let total_attempts = attempts.len() as u64;
        let retried_attempts = attempts
            .iter()
            .filter(|record| record.attempt_number > 1)
            .count() as u64;

        let mut failures: Vec<FailureGroup> = state
            .by_category
            .iter()
            .map(|(category, count)| FailureGroup {
                category: category.clone(),
                count: *count,
                example_error: failure_examples.get(category).cloned(),
            })
            .collect();
        failures.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.category.cmp(&b.category)));

        Self {
            state,
            failures,
            identity_usage,
            total_attempts,
            retried_attempts,
            duration,
        }
    }
}

impl std::fmt::Display for CampaignReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "campaign {} run {} finished in {:.1}s",
            self.state.campaign_id,
            self.state.run_id,
            self.duration.as_secs_f64()
        )?;
        writeln!(
            f,
            "  targets: {} total, {} completed, {} failed, {} skipped, {} deferred",
            self.state.total_targets,
            self.state.completed,
            self.state.failed,
            self.state.skipped,
            self.state.deferred
        )?;
        writeln!(
            f,
            "  attempts: {} total, {} retries",
            self.total_attempts, self.retried_attempts
        )?;

        if !self.failures.is_empty() {
            writeln!(f, "  failures by category:")?;
            for group in &self.failures {
                write!(f, "    {}: {}", group.category, group.count)?;
                if let Some(example) = &group.example_error {
                    write!(f, " (e.g. {example})")?;
                }
                writeln!(f)?;
            }
        }

        if !self.identity_usage.is_empty() {
            writeln!(f, "  identity usage:")?;
            for identity in &self.identity_usage {
                writeln!(
                    f,
                    "    {}: {}/{}",
                    identity.id, identity.sent_today, identity.daily_quota
                )?;
            }
        }

        Ok(())
    }
}
