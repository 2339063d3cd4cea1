//! The load test itself: patch the task definition, spawn the workflows,
//! then poll until none of them is running.
//!
//! Every request is awaited before the next one is sent, so a run issues a
//! strictly ordered sequence of calls against the API.

use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::watch;

use crate::client::ConductorClient;
use crate::config::Config;
use crate::error::{LoadTestError, LoadTestResult};
use crate::metrics;
use crate::payloads::{StartWorkflowInput, TaskDef};
use crate::report::RunReport;

/// Result of the spawner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SpawnOutcome {
    /// Start requests answered with a 2xx status
    pub accepted: u32,
    /// Start requests answered with an error status
    pub rejected: u32,
}

/// Result of the completion poller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollOutcome {
    /// Running-count queries issued, including the final empty one
    pub polls: u32,
    /// Poll intervals actually slept through
    pub sleeps: u32,
    /// Seconds since run start, taken after the last sleep
    pub elapsed_secs: f64,
}

struct Phases {
    patched: bool,
    spawn: SpawnOutcome,
    spawn_elapsed_secs: f64,
    poll: PollOutcome,
}

pub struct LoadTest {
    config: Config,
    client: ConductorClient,
    shutdown: watch::Receiver<bool>,
}

impl LoadTest {
    /// Build a load test; sending `true` on the shutdown channel cancels it.
    pub fn new(config: Config, shutdown: watch::Receiver<bool>) -> LoadTestResult<Self> {
        let client = ConductorClient::new(&config.conductor_api, config.http.request_timeout)?;
        Ok(Self::with_client(config, client, shutdown))
    }

    pub fn with_client(
        config: Config,
        client: ConductorClient,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            config,
            client,
            shutdown,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run every phase and check both budgets.
    pub async fn run(&mut self) -> LoadTestResult<RunReport> {
        self.log_banner();
        metrics::init_metrics();

        let started_at = Utc::now();
        let start = Instant::now();

        let result = self.run_phases(start).await;
        metrics::record_run_outcome(result.is_ok());

        let phases = result?;
        let report = RunReport {
            started_at,
            finished_at: Utc::now(),
            conductor_api: self.config.conductor_api.clone(),
            workflow_name: self.config.workflow.name.clone(),
            patched: phases.patched,
            workflows_spawned: phases.spawn.accepted,
            spawns_rejected: phases.spawn.rejected,
            polls: phases.poll.polls,
            spawn_elapsed_secs: phases.spawn_elapsed_secs,
            completion_elapsed_secs: phases.poll.elapsed_secs,
            expect_spawning_time_secs: self.config.expect_spawning_time_secs,
            expect_completion_time_secs: self.config.expect_completion_time_secs,
        };
        report.log_summary();
        Ok(report)
    }

    async fn run_phases(&mut self, start: Instant) -> LoadTestResult<Phases> {
        let patched = self.patch_task().await;
        let spawn = self.spawn_workflows().await?;

        let spawn_elapsed = start.elapsed().as_secs_f64();
        log::info!(" - spawning time [{:.3}]", spawn_elapsed);
        metrics::record_phase_elapsed("spawn", spawn_elapsed);
        check_spawn_budget(self.config.expect_spawning_time_secs, spawn_elapsed)?;

        let poll = self.wait_for_completion(start).await?;
        metrics::record_phase_elapsed("completion", poll.elapsed_secs);
        check_completion_budget(self.config.expect_completion_time_secs, poll.elapsed_secs)?;

        Ok(Phases {
            patched,
            spawn,
            spawn_elapsed_secs: spawn_elapsed,
            poll,
        })
    }

    /// Register the search task definition. Best effort: the definition may
    /// already exist, so a failure is only logged.
    pub async fn patch_task(&self) -> bool {
        let task_def = TaskDef::elasticsearch_search();
        let accepted = match self.client.put_task_def(&task_def).await {
            Ok(()) => {
                log::info!(
                    "patched task: {}",
                    serde_json::to_string(&task_def).unwrap_or_else(|_| task_def.name.clone())
                );
                true
            }
            Err(e) => {
                log::warn!("Failed to patch task {}: {}", task_def.name, e);
                false
            }
        };
        metrics::record_task_patch(accepted);
        accepted
    }

    /// Send `workflow_count - 1` start requests, one at a time.
    ///
    /// An error status is logged with its body and the loop goes on; only a
    /// transport error stops it.
    pub async fn spawn_workflows(&self) -> LoadTestResult<SpawnOutcome> {
        log::info!("**** spawning workflow .... ****");
        let input = StartWorkflowInput::new(self.config.workflow.task2_name.as_str());
        let mut outcome = SpawnOutcome::default();
        for index in 1..self.config.workflow_count {
            if *self.shutdown.borrow() {
                return Err(LoadTestError::Cancelled);
            }
            let sent_at = Instant::now();
            let response = self
                .client
                .start_workflow(&self.config.workflow.name, &input)
                .await?;
            let duration_secs = sent_at.elapsed().as_secs_f64();
            if response.is_success() {
                metrics::record_workflow_spawned(duration_secs);
                log::info!("{} -> {}", index, response.body);
                outcome.accepted += 1;
            } else {
                metrics::record_spawn_rejected(duration_secs);
                log::warn!("{} -> {} (HTTP {})", index, response.body, response.status);
                outcome.rejected += 1;
            }
        }
        Ok(outcome)
    }

    /// Poll the running count until it drops to zero.
    ///
    /// Unbounded unless `max_attempts` or `timeout` is configured.
    pub async fn wait_for_completion(&mut self, start: Instant) -> LoadTestResult<PollOutcome> {
        let poll_started = Instant::now();
        let mut elapsed_secs = start.elapsed().as_secs_f64();
        let mut polls = 0u32;
        let mut sleeps = 0u32;

        let mut running = self.count_running().await?;
        polls += 1;

        while running > 0 {
            if let Some(max_attempts) = self.config.poll.max_attempts
                && polls >= max_attempts
            {
                return Err(LoadTestError::PollExhausted {
                    attempts: polls,
                    running,
                });
            }
            if let Some(timeout) = self.config.poll.timeout
                && poll_started.elapsed() >= timeout
            {
                return Err(LoadTestError::PollTimedOut {
                    waited_secs: poll_started.elapsed().as_secs_f64(),
                    running,
                });
            }

            if self.sleep_or_shutdown(self.config.poll.interval).await {
                log::warn!("Shutdown requested with {} workflows still running", running);
                return Err(LoadTestError::Cancelled);
            }
            sleeps += 1;

            elapsed_secs = start.elapsed().as_secs_f64();
            log::info!("waiting until all workflow completed... ({} running)", running);
            log::info!("total time so far [{:.3}]", elapsed_secs);

            running = self.count_running().await?;
            polls += 1;
        }

        Ok(PollOutcome {
            polls,
            sleeps,
            elapsed_secs,
        })
    }

    async fn count_running(&self) -> LoadTestResult<usize> {
        let running = self
            .client
            .count_running_workflows(&self.config.workflow.name, self.config.workflow.version)
            .await?;
        metrics::record_running_poll(running);
        log::debug!("{} workflows running", running);
        Ok(running)
    }

    /// Sleep for `interval`; returns true when shutdown was requested first.
    async fn sleep_or_shutdown(&mut self, interval: Duration) -> bool {
        if *self.shutdown.borrow() {
            return true;
        }
        let sleep = tokio::time::sleep(interval);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = &mut sleep => return false,
                changed = self.shutdown.changed() => match changed {
                    Ok(()) if *self.shutdown.borrow() => return true,
                    Ok(()) => continue,
                    // sender gone, nobody can cancel anymore
                    Err(_) => {
                        (&mut sleep).await;
                        return false;
                    }
                },
            }
        }
    }

    fn log_banner(&self) {
        log::info!("****************************************");
        log::info!("* conductor_api:[{}]", self.config.conductor_api);
        log::info!("* workflow_count:[{}]", self.config.workflow_count);
        log::info!(
            "* expect_spawning_time_secs:[{}]",
            self.config.expect_spawning_time_secs
        );
        log::info!(
            "* expect_completion_time_secs:[{}]",
            self.config.expect_completion_time_secs
        );
        log::info!("****************************************");
    }
}

/// Spawning must finish strictly within its budget.
pub fn check_spawn_budget(budget_secs: f64, elapsed_secs: f64) -> LoadTestResult<()> {
    if budget_secs > elapsed_secs {
        Ok(())
    } else {
        Err(LoadTestError::SpawnBudgetExceeded {
            budget_secs,
            elapsed_secs,
        })
    }
}

/// The run must reach zero running workflows strictly within its budget.
pub fn check_completion_budget(budget_secs: f64, elapsed_secs: f64) -> LoadTestResult<()> {
    if budget_secs > elapsed_secs {
        Ok(())
    } else {
        Err(LoadTestError::CompletionBudgetExceeded {
            budget_secs,
            elapsed_secs,
        })
    }
}
