use std::time::Duration;

use conductor_loadtest::config::{Config, PollConfig};
use conductor_loadtest::mock::{MockConductor, MockSettings};
use conductor_loadtest::{LoadTest, LoadTestError, LoadTestResult};
use conductor_loadtest::report::RunReport;
use tokio::sync::watch;

/// Poll interval used by the tests, short enough to keep runs fast.
pub const TEST_POLL_INTERVAL_MS: u64 = 20;

/// Start a mock conductor, failing the test if it cannot bind.
pub fn start_mock(settings: MockSettings) -> MockConductor {
    MockConductor::start(settings).expect("mock conductor should start")
}

/// Configuration pointing at the mock with generous budgets.
pub fn test_config(mock: &MockConductor, workflow_count: i64) -> Config {
    Config {
        conductor_api: mock.api_url(),
        workflow_count,
        poll: PollConfig {
            interval: Duration::from_millis(TEST_POLL_INTERVAL_MS),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Load test plus the sender that keeps its shutdown channel open.
pub fn load_test(config: Config) -> (LoadTest, watch::Sender<bool>) {
    let (tx, rx) = watch::channel(false);
    let load_test = LoadTest::new(config, rx).expect("load test should build");
    (load_test, tx)
}

/// Run a whole load test against `config`.
pub async fn run(config: Config) -> LoadTestResult<RunReport> {
    let (mut load_test, _tx) = load_test(config);
    load_test.run().await
}

/// Unwrap an error, failing with the report when the run passed.
pub fn expect_failure(result: LoadTestResult<RunReport>) -> LoadTestError {
    match result {
        Ok(report) => panic!("load test should have failed, got {:?}", report),
        Err(e) => e,
    }
}
