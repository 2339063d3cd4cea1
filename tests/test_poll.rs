mod common;
use common::*;

use std::time::{Duration, Instant};

use conductor_loadtest::LoadTestError;
use conductor_loadtest::mock::MockSettings;

#[actix_web::test]
async fn test_two_polls_and_one_sleep() {
    let mock = start_mock(MockSettings {
        running_script: vec![3, 0],
        ..Default::default()
    });
    let (mut load_test, _tx) = load_test(test_config(&mock, 1));

    let outcome = load_test.wait_for_completion(Instant::now()).await.unwrap();

    assert_eq!(outcome.polls, 2);
    assert_eq!(outcome.sleeps, 1);
    assert!(outcome.elapsed_secs >= TEST_POLL_INTERVAL_MS as f64 / 1000.0);
    let times = mock.state().poll_times();
    assert_eq!(times.len(), 2);
    assert!(times[1] - times[0] >= Duration::from_millis(TEST_POLL_INTERVAL_MS));
    assert_eq!(
        mock.state().running_polls(),
        vec![
            ("kitchensink".to_string(), Some(1)),
            ("kitchensink".to_string(), Some(1))
        ]
    );
    mock.stop().await;
}

#[actix_web::test]
async fn test_no_sleep_when_nothing_running() {
    let mock = start_mock(MockSettings::default());
    let (mut load_test, _tx) = load_test(test_config(&mock, 1));

    let start = Instant::now();
    let outcome = load_test.wait_for_completion(start).await.unwrap();

    assert_eq!(outcome.polls, 1);
    assert_eq!(outcome.sleeps, 0);
    mock.stop().await;
}

#[actix_web::test]
async fn test_waits_for_spawned_workflows() {
    let mock = start_mock(MockSettings {
        workflow_duration: Duration::from_millis(150),
        ..Default::default()
    });

    let report = run(test_config(&mock, 4)).await.unwrap();

    assert!(report.polls >= 2, "expected several polls, got {}", report.polls);
    assert!(report.completion_elapsed_secs >= 0.1);
    mock.stop().await;
}

#[actix_web::test]
async fn test_sleeps_between_every_poll() {
    let mock = start_mock(MockSettings {
        running_script: vec![2, 2, 1, 0],
        ..Default::default()
    });
    let (mut load_test, _tx) = load_test(test_config(&mock, 1));

    let outcome = load_test.wait_for_completion(Instant::now()).await.unwrap();

    assert_eq!(outcome.polls, 4);
    assert_eq!(outcome.sleeps, 3);
    let times = mock.state().poll_times();
    for pair in times.windows(2) {
        assert!(pair[1] - pair[0] >= Duration::from_millis(TEST_POLL_INTERVAL_MS));
    }
    mock.stop().await;
}

#[actix_web::test]
async fn test_max_attempts_stops_stuck_poll() {
    let mock = start_mock(MockSettings {
        running_script: vec![3, 3, 3],
        ..Default::default()
    });
    let mut config = test_config(&mock, 1);
    config.poll.max_attempts = Some(2);

    let err = expect_failure(run(config).await);

    assert!(
        matches!(
            err,
            LoadTestError::PollExhausted {
                attempts: 2,
                running: 3
            }
        ),
        "unexpected error: {err}"
    );
    assert_eq!(mock.state().running_polls().len(), 2);
    mock.stop().await;
}

#[actix_web::test]
async fn test_timeout_stops_stuck_poll() {
    let mock = start_mock(MockSettings {
        workflow_duration: Duration::from_secs(60),
        ..Default::default()
    });
    let mut config = test_config(&mock, 3);
    config.poll.timeout = Some(Duration::from_millis(150));

    let err = expect_failure(run(config).await);

    assert!(
        matches!(err, LoadTestError::PollTimedOut { running: 2, .. }),
        "unexpected error: {err}"
    );
    mock.stop().await;
}

#[actix_web::test]
async fn test_shutdown_cancels_poll() {
    let mock = start_mock(MockSettings {
        workflow_duration: Duration::from_secs(60),
        ..Default::default()
    });
    let (mut load_test, tx) = load_test(test_config(&mock, 2));

    actix_web::rt::spawn(async move {
        actix_web::rt::time::sleep(Duration::from_millis(100)).await;
        let _ = tx.send(true);
    });
    let err = expect_failure(load_test.run().await);

    assert!(
        matches!(err, LoadTestError::Cancelled),
        "unexpected error: {err}"
    );
    mock.stop().await;
}

#[actix_web::test]
async fn test_shutdown_before_spawn_cancels() {
    let mock = start_mock(MockSettings::default());
    let (mut load_test, tx) = load_test(test_config(&mock, 5));
    tx.send(true).unwrap();

    let err = expect_failure(load_test.run().await);

    assert!(matches!(err, LoadTestError::Cancelled));
    assert!(mock.state().started().is_empty());
    mock.stop().await;
}
