//! Load test against a Conductor API.
//!
//! Patches the search task definition, spawns a batch of workflows and waits
//! for all of them to complete, failing when either phase exceeds its budget.

use std::path::Path;
use std::process::ExitCode;

use conductor_loadtest::{Config, LoadTest, LoadTestResult, metrics};
use tokio::sync::watch;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::new().default_filter_or("info"))
        .target(env_logger::Target::Stdout)
        .init();

    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        log::debug!("rustls crypto provider already installed");
    }

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("Load test failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> LoadTestResult<()> {
    let config = Config::from_env()?;
    let metrics_output = config.metrics_output.clone();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("Ctrl+C received, stopping load test");
            let _ = shutdown_tx.send(true);
        }
    });

    let mut load_test = LoadTest::new(config, shutdown_rx)?;
    let result = load_test.run().await;

    // metrics are written for failed runs too, and never change the outcome
    if let Some(path) = metrics_output {
        write_metrics(&path);
    }

    result.map(|_| ())
}

fn write_metrics(path: &Path) {
    let text = match metrics::render() {
        Ok(text) => text,
        Err(e) => {
            log::warn!("Failed to render metrics: {}", e);
            return;
        }
    };
    match std::fs::write(path, text) {
        Ok(()) => log::info!("Metrics written to {}", path.display()),
        Err(e) => log::warn!("Failed to write metrics to {}: {}", path.display(), e),
    }
}
