use std::process::{Command, Output};

use conductor_loadtest::mock::{MockConductor, MockSettings};

fn run_loadtest(vars: &[(&str, &str)]) -> Output {
    let mut command = Command::new(env!("CARGO_BIN_EXE_loadtest"));
    command
        .env_remove("METRICS_OUTPUT_PATH")
        .env_remove("POLL_MAX_ATTEMPTS")
        .env_remove("POLL_TIMEOUT_SECS")
        .env("RUST_LOG", "info")
        .env("HTTP_TIMEOUT_SECS", "5");
    for (name, value) in vars {
        command.env(name, value);
    }
    command.output().expect("loadtest binary should run")
}

#[test]
fn test_diagnostics_go_to_stdout() {
    // nothing listens on port 1
    let output = run_loadtest(&[
        ("CONDUCTOR_API", "http://127.0.0.1:1/api"),
        ("EXPECT_WORKFLOW_COUNT", "1"),
    ]);

    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("* conductor_api:[http://127.0.0.1:1/api]"),
        "stdout: {stdout}"
    );
    assert!(stdout.contains("Failed to patch task"), "stdout: {stdout}");
    assert!(stdout.contains("Load test failed"), "stdout: {stdout}");
}

#[test]
fn test_invalid_config_exits_with_failure() {
    let output = run_loadtest(&[("EXPECT_WORKFLOW_COUNT", "many")]);

    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("EXPECT_WORKFLOW_COUNT"), "stdout: {stdout}");
}

async fn run_loadtest_against_mock(vars: Vec<(&'static str, String)>) -> Output {
    actix_web::rt::task::spawn_blocking(move || {
        let vars: Vec<(&str, &str)> = vars.iter().map(|(k, v)| (*k, v.as_str())).collect();
        run_loadtest(&vars)
    })
    .await
    .expect("loadtest binary task should finish")
}

#[actix_web::test]
async fn test_metrics_written_after_passing_run() {
    let mock = MockConductor::start(MockSettings::default()).expect("mock conductor should start");
    let path = std::env::temp_dir().join(format!("loadtest-metrics-{}.prom", std::process::id()));

    let output = run_loadtest_against_mock(vec![
        ("CONDUCTOR_API", mock.api_url()),
        ("EXPECT_WORKFLOW_COUNT", "3".to_string()),
        ("METRICS_OUTPUT_PATH", path.display().to_string()),
    ])
    .await;

    assert!(output.status.success(), "{:?}", output);
    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("loadtest_workflows_spawned_total 2"));
    let _ = std::fs::remove_file(&path);
    assert_eq!(mock.state().started().len(), 2);
    mock.stop().await;
}

#[actix_web::test]
async fn test_metrics_write_failure_keeps_run_outcome() {
    let mock = MockConductor::start(MockSettings::default()).expect("mock conductor should start");
    let path = std::env::temp_dir()
        .join("loadtest-missing-dir")
        .join("metrics.prom");

    let output = run_loadtest_against_mock(vec![
        ("CONDUCTOR_API", mock.api_url()),
        ("EXPECT_WORKFLOW_COUNT", "2".to_string()),
        ("METRICS_OUTPUT_PATH", path.display().to_string()),
    ])
    .await;

    assert!(output.status.success(), "{:?}", output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Failed to write metrics"), "stdout: {stdout}");
    mock.stop().await;
}
