use chrono::{DateTime, Utc};
use serde::Serialize;

/// Summary of one load test run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub conductor_api: String,
    pub workflow_name: String,
    /// Whether the task definition patch was accepted
    pub patched: bool,
    pub workflows_spawned: u32,
    /// Start requests answered with an error status
    pub spawns_rejected: u32,
    /// Running-count queries issued by the poller
    pub polls: u32,
    pub spawn_elapsed_secs: f64,
    pub completion_elapsed_secs: f64,
    pub expect_spawning_time_secs: f64,
    pub expect_completion_time_secs: f64,
}

impl RunReport {
    /// Spawn throughput in workflows per second.
    pub fn spawn_rate(&self) -> f64 {
        if self.spawn_elapsed_secs > 0.0 {
            self.workflows_spawned as f64 / self.spawn_elapsed_secs
        } else {
            0.0
        }
    }

    pub fn log_summary(&self) {
        log::info!("****************************************");
        log::info!(
            "* workflows spawned:[{}] rejected:[{}]",
            self.workflows_spawned,
            self.spawns_rejected
        );
        log::info!(
            "* spawning time:[{:.3}] secs (budget {} secs, {:.2} workflows/sec)",
            self.spawn_elapsed_secs,
            self.expect_spawning_time_secs,
            self.spawn_rate()
        );
        log::info!(
            "* completion time:[{:.3}] secs (budget {} secs, {} polls)",
            self.completion_elapsed_secs,
            self.expect_completion_time_secs,
            self.polls
        );
        log::info!("****************************************");
        match serde_json::to_string(self) {
            Ok(json) => log::debug!("Run report: {}", json),
            Err(e) => log::warn!("Failed to serialize run report: {}", e),
        }
    }
}
