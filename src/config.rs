//! Load test configuration management.
//!
//! Provides typed configuration loaded from environment variables with validation.

use std::path::PathBuf;
use std::time::Duration;

/// Load test configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the Conductor API (e.g. `http://localhost:8080/api`)
    pub conductor_api: String,

    /// Upper bound of the spawn loop; `workflow_count - 1` workflows are started,
    /// none when it is 1 or less
    pub workflow_count: i64,

    /// Max allowed duration of the spawn phase, in seconds. Not validated: a
    /// budget of 0 or less makes the run fail its assertion
    pub expect_spawning_time_secs: f64,

    /// Max allowed duration of the whole run up to completion, in seconds
    pub expect_completion_time_secs: f64,

    /// Workflow settings
    pub workflow: WorkflowConfig,

    /// Completion poller settings
    pub poll: PollConfig,

    /// HTTP client settings
    pub http: HttpConfig,

    /// Where to write the Prometheus text dump at the end of the run
    pub metrics_output: Option<PathBuf>,
}

/// Which workflow is spawned and polled.
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    /// Workflow definition name
    pub name: String,

    /// Version used when querying running instances
    pub version: u32,

    /// Value of `task2Name` in the start payload
    pub task2_name: String,
}

/// Completion poller configuration.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Sleep between two running-count queries
    pub interval: Duration,

    /// Give up after this many polls that still report running workflows
    pub max_attempts: Option<u32>,

    /// Give up once the poll phase has lasted this long
    pub timeout: Option<Duration>,
}

/// HTTP client configuration.
#[derive(Debug, Clone, Default)]
pub struct HttpConfig {
    /// Per-request timeout; requests may wait forever when unset
    pub request_timeout: Option<Duration>,
}

pub const DEFAULT_CONDUCTOR_API: &str = "http://localhost:8080/api";
pub const DEFAULT_WORKFLOW_COUNT: i64 = 50;
pub const DEFAULT_EXPECT_SPAWNING_TIME_SECS: f64 = 5.0;
pub const DEFAULT_EXPECT_COMPLETION_TIME_SECS: f64 = 60.0;

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            name: "kitchensink".to_string(),
            version: 1,
            task2_name: "task_5".to_string(),
        }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_attempts: None,
            timeout: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            conductor_api: DEFAULT_CONDUCTOR_API.to_string(),
            workflow_count: DEFAULT_WORKFLOW_COUNT,
            expect_spawning_time_secs: DEFAULT_EXPECT_SPAWNING_TIME_SECS,
            expect_completion_time_secs: DEFAULT_EXPECT_COMPLETION_TIME_SECS,
            workflow: WorkflowConfig::default(),
            poll: PollConfig::default(),
            http: HttpConfig::default(),
            metrics_output: None,
        }
    }
}

/// Configuration loading error.
#[derive(Debug, thiserror::Error)]
#[error("Configuration error for '{field}': {message}")]
pub struct ConfigError {
    pub field: String,
    pub message: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Optional environment variables:
    /// - `CONDUCTOR_API`: Conductor API base URL (default: http://localhost:8080/api)
    /// - `EXPECT_WORKFLOW_COUNT`: Spawn loop bound (default: 50)
    /// - `EXPECT_WORKFLOW_CREATION_TIME_SECS`: Spawn budget in seconds (default: 5)
    /// - `EXPECT_WORKFLOW_COMPLETION_TIME_SECS`: Completion budget in seconds (default: 60)
    /// - `WORKFLOW_NAME`: Workflow to spawn and poll (default: kitchensink)
    /// - `WORKFLOW_VERSION`: Version used by the running query (default: 1)
    /// - `WORKFLOW_TASK2_NAME`: `task2Name` sent in the start payload (default: task_5)
    /// - `POLL_INTERVAL_MS`: Sleep between polls in ms (default: 1000)
    /// - `POLL_MAX_ATTEMPTS`: Max polls still reporting running workflows (default: unbounded)
    /// - `POLL_TIMEOUT_SECS`: Deadline of the poll phase in seconds (default: unbounded)
    /// - `HTTP_TIMEOUT_SECS`: Per-request timeout in seconds (default: none)
    /// - `METRICS_OUTPUT_PATH`: File receiving Prometheus metrics at the end of the run
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let workflow = WorkflowConfig {
            name: env.string_or("WORKFLOW_NAME", "kitchensink"),
            version: env.parse_or("WORKFLOW_VERSION", 1)?,
            task2_name: env.string_or("WORKFLOW_TASK2_NAME", "task_5"),
        };

        let poll = PollConfig {
            interval: Duration::from_millis(env.parse_or("POLL_INTERVAL_MS", 1000)?),
            max_attempts: env.parse_opt("POLL_MAX_ATTEMPTS")?,
            timeout: env
                .parse_opt::<f64>("POLL_TIMEOUT_SECS")?
                .map(|secs| duration_from_secs("POLL_TIMEOUT_SECS", secs))
                .transpose()?,
        };

        let http = HttpConfig {
            request_timeout: env.parse_opt("HTTP_TIMEOUT_SECS")?.map(Duration::from_secs),
        };

        let config = Self {
            conductor_api: env.string_or("CONDUCTOR_API", DEFAULT_CONDUCTOR_API),
            workflow_count: env.parse_or("EXPECT_WORKFLOW_COUNT", DEFAULT_WORKFLOW_COUNT)?,
            expect_spawning_time_secs: env.parse_or(
                "EXPECT_WORKFLOW_CREATION_TIME_SECS",
                DEFAULT_EXPECT_SPAWNING_TIME_SECS,
            )?,
            expect_completion_time_secs: env.parse_or(
                "EXPECT_WORKFLOW_COMPLETION_TIME_SECS",
                DEFAULT_EXPECT_COMPLETION_TIME_SECS,
            )?,
            workflow,
            poll,
            http,
            metrics_output: env.get("METRICS_OUTPUT_PATH").map(PathBuf::from),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.conductor_api.is_empty() {
            return Err(ConfigError {
                field: "CONDUCTOR_API".to_string(),
                message: "Cannot be empty".to_string(),
            });
        }

        if !self.conductor_api.starts_with("http://") && !self.conductor_api.starts_with("https://")
        {
            return Err(ConfigError {
                field: "CONDUCTOR_API".to_string(),
                message: "Must start with http:// or https://".to_string(),
            });
        }

        if self.workflow.name.is_empty() {
            return Err(ConfigError {
                field: "WORKFLOW_NAME".to_string(),
                message: "Cannot be empty".to_string(),
            });
        }

        if self.poll.interval.is_zero() {
            return Err(ConfigError {
                field: "POLL_INTERVAL_MS".to_string(),
                message: "Must be greater than 0".to_string(),
            });
        }

        if self.http.request_timeout.is_some_and(|t| t.is_zero()) {
            return Err(ConfigError {
                field: "HTTP_TIMEOUT_SECS".to_string(),
                message: "Must be greater than 0".to_string(),
            });
        }

        if self.poll.max_attempts == Some(0) {
            return Err(ConfigError {
                field: "POLL_MAX_ATTEMPTS".to_string(),
                message: "Must be greater than 0".to_string(),
            });
        }

        Ok(())
    }

    /// Number of start requests the spawner will send.
    pub fn spawn_target(&self) -> u64 {
        u64::try_from(self.workflow_count.saturating_sub(1)).unwrap_or(0)
    }
}

struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, name: &str) -> Option<String> {
        (self.0)(name)
    }

    fn string_or(&self, name: &str, default: &str) -> String {
        self.get(name).unwrap_or_else(|| default.to_string())
    }

    /// Parse a variable or return a default value.
    fn parse_or<T: std::str::FromStr>(&self, name: &str, default: T) -> Result<T, ConfigError> {
        Ok(self.parse_opt(name)?.unwrap_or(default))
    }

    fn parse_opt<T: std::str::FromStr>(&self, name: &str) -> Result<Option<T>, ConfigError> {
        match self.get(name) {
            Some(val) => val.trim().parse().map(Some).map_err(|_| ConfigError {
                field: name.to_string(),
                message: format!("Invalid value '{}', expected a valid number", val),
            }),
            None => Ok(None),
        }
    }
}

fn duration_from_secs(field: &str, secs: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(secs).map_err(|_| ConfigError {
        field: field.to_string(),
        message: format!("Invalid duration '{}'", secs),
    })
}
