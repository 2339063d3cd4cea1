//! Prometheus metrics for load test runs.
//!
//! Counters and histograms describing the patch, spawn and poll phases. The
//! registry is rendered in text exposition format at the end of a run.

use prometheus::{
    Encoder, Gauge, GaugeVec, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts,
    Registry, TextEncoder,
};
use std::sync::LazyLock;

/// Global metrics registry
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// ============================================================================
// Patch
// ============================================================================

/// Task definition patches by outcome (accepted/rejected)
pub static TASK_PATCHES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "loadtest_task_patches_total",
            "Number of task definition patches by outcome",
        ),
        &["outcome"],
    )
    .expect("metric can be created");
    REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
});

// ============================================================================
// Spawn
// ============================================================================

/// Total number of workflows started
pub static WORKFLOWS_SPAWNED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    let counter = IntCounter::new(
        "loadtest_workflows_spawned_total",
        "Total number of workflows started",
    )
    .expect("metric can be created");
    REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
});

/// Start requests answered with an error status
pub static SPAWN_REJECTED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    let counter = IntCounter::new(
        "loadtest_spawn_rejected_total",
        "Start-workflow requests answered with an error status",
    )
    .expect("metric can be created");
    REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
});

/// Latency of a single start-workflow request
pub static SPAWN_REQUEST_DURATION_SECONDS: LazyLock<Histogram> = LazyLock::new(|| {
    let histogram = Histogram::with_opts(
        HistogramOpts::new(
            "loadtest_spawn_request_duration_seconds",
            "Duration of start-workflow requests in seconds",
        )
        .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]),
    )
    .expect("metric can be created");
    REGISTRY.register(Box::new(histogram.clone())).unwrap();
    histogram
});

// ============================================================================
// Poll
// ============================================================================

/// Running-count queries issued
pub static RUNNING_POLLS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    let counter = IntCounter::new(
        "loadtest_running_polls_total",
        "Total number of running-workflow queries",
    )
    .expect("metric can be created");
    REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
});

/// Running workflows reported by the last poll
pub static RUNNING_WORKFLOWS: LazyLock<IntGauge> = LazyLock::new(|| {
    let gauge = IntGauge::new(
        "loadtest_running_workflows",
        "Running workflows reported by the last poll",
    )
    .expect("metric can be created");
    REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

// ============================================================================
// Phases
// ============================================================================

/// Elapsed seconds since run start, taken at the end of each phase
pub static PHASE_ELAPSED_SECONDS: LazyLock<GaugeVec> = LazyLock::new(|| {
    let gauge = GaugeVec::new(
        Opts::new(
            "loadtest_phase_elapsed_seconds",
            "Elapsed seconds since run start at the end of each phase",
        ),
        &["phase"],
    )
    .expect("metric can be created");
    REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

/// 1 when the last run stayed within both budgets
pub static RUN_PASSED: LazyLock<Gauge> = LazyLock::new(|| {
    let gauge = Gauge::new(
        "loadtest_run_passed",
        "1 when the last run stayed within both budgets",
    )
    .expect("metric can be created");
    REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

// ============================================================================
// Helper Functions
// ============================================================================

/// Record a task definition patch
pub fn record_task_patch(accepted: bool) {
    let outcome = if accepted { "accepted" } else { "rejected" };
    TASK_PATCHES_TOTAL.with_label_values(&[outcome]).inc();
}

/// Record a started workflow
pub fn record_workflow_spawned(duration_secs: f64) {
    WORKFLOWS_SPAWNED_TOTAL.inc();
    SPAWN_REQUEST_DURATION_SECONDS.observe(duration_secs);
}

/// Record a start request the server refused
pub fn record_spawn_rejected(duration_secs: f64) {
    SPAWN_REJECTED_TOTAL.inc();
    SPAWN_REQUEST_DURATION_SECONDS.observe(duration_secs);
}

/// Record a running-count poll
pub fn record_running_poll(running: usize) {
    RUNNING_POLLS_TOTAL.inc();
    RUNNING_WORKFLOWS.set(running as i64);
}

/// Record the elapsed time at the end of a phase (`spawn` or `completion`)
pub fn record_phase_elapsed(phase: &str, elapsed_secs: f64) {
    PHASE_ELAPSED_SECONDS
        .with_label_values(&[phase])
        .set(elapsed_secs);
}

pub fn record_run_outcome(passed: bool) {
    RUN_PASSED.set(if passed { 1.0 } else { 0.0 });
}

/// Initialize all metrics (call at startup to register them)
pub fn init_metrics() {
    // Force lazy initialization of all metrics
    let _ = &*TASK_PATCHES_TOTAL;
    let _ = &*WORKFLOWS_SPAWNED_TOTAL;
    let _ = &*SPAWN_REJECTED_TOTAL;
    let _ = &*SPAWN_REQUEST_DURATION_SECONDS;
    let _ = &*RUNNING_POLLS_TOTAL;
    let _ = &*RUNNING_WORKFLOWS;
    let _ = &*PHASE_ELAPSED_SECONDS;
    let _ = &*RUN_PASSED;
}

/// Render the registry in Prometheus text exposition format.
pub fn render() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&REGISTRY.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
