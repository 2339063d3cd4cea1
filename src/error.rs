//! Error types for the load test.
//!
//! Patch failures never surface here: they are logged and swallowed by the
//! runner. Everything below aborts the run.

use thiserror::Error;

use crate::config::ConfigError;

/// Errors returned by the Conductor client.
#[derive(Error, Debug)]
pub enum ClientError {
    /// HTTP transport or connection error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server returned an error status code.
    #[error("API error (HTTP {status}): {body}")]
    Api { status: u16, body: String },

    /// Failed to deserialize the response body.
    #[error("Deserialization error: {0}")]
    Deserialize(String),
}

/// Main error type for load test runs.
#[derive(Error, Debug)]
pub enum LoadTestError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Conductor request failed: {0}")]
    Client(#[from] ClientError),

    /// Spawn phase took longer than its budget
    #[error("TIME TO CREATE WORKFLOWS MUST BE LOWER THAN [{budget_secs}] secs (took {elapsed_secs:.3} secs)")]
    SpawnBudgetExceeded { budget_secs: f64, elapsed_secs: f64 },

    /// Workflows did not all complete within the budget
    #[error("TIME TO COMPLETE WORKFLOWS MUST BE LOWER THAN [{budget_secs}] secs (took {elapsed_secs:.3} secs)")]
    CompletionBudgetExceeded { budget_secs: f64, elapsed_secs: f64 },

    /// Poller hit its attempt cap with workflows still running
    #[error("{running} workflows still running after {attempts} polls")]
    PollExhausted { attempts: u32, running: usize },

    /// Poller hit its deadline with workflows still running
    #[error("{running} workflows still running after polling for {waited_secs:.3} secs")]
    PollTimedOut { waited_secs: f64, running: usize },

    #[error("Load test cancelled")]
    Cancelled,

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Result type alias for load test operations.
pub type LoadTestResult<T> = Result<T, LoadTestError>;
