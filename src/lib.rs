pub mod client;
pub mod config;
pub mod error;
pub mod metrics;
pub mod mock;
pub mod payloads;
pub mod report;
pub mod runner;

pub use config::Config;
pub use error::{LoadTestError, LoadTestResult};
pub use runner::LoadTest;
