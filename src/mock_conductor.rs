//! Fake Conductor server for local dry runs of the load test.

use std::time::Duration;

use actix_web::{App, HttpServer, middleware, web};
use actix_web_prometheus::PrometheusMetricsBuilder;
use conductor_loadtest::mock::{MockSettings, MockState, configure_routes};

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::new().default_filter_or("info"))
        .target(env_logger::Target::Stdout)
        .init();

    let port: u16 = env_or("MOCK_CONDUCTOR_PORT", 8080);
    let settings = MockSettings {
        patch_status: env_or("MOCK_PATCH_STATUS", 200),
        spawn_status: env_or("MOCK_SPAWN_STATUS", 200),
        spawn_delay: Duration::from_millis(env_or("MOCK_SPAWN_DELAY_MS", 0)),
        workflow_duration: Duration::from_millis(env_or("MOCK_WORKFLOW_DURATION_MS", 3000)),
        running_script: vec![],
        keep_history: false,
    };
    log::info!("starting mock conductor at http://0.0.0.0:{port}/api");
    log::info!("{:?}", settings);

    let state = web::Data::new(MockState::new(settings));
    let prometheus = PrometheusMetricsBuilder::new("mock_conductor")
        .endpoint("/metrics")
        .build()
        .map_err(|e| std::io::Error::other(e.to_string()))?;

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(prometheus.clone())
            .wrap(middleware::Logger::default())
            .configure(configure_routes)
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}
