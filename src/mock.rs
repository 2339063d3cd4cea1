//! In-process fake of the Conductor endpoints driven by the load test.
//!
//! Used by the integration tests and by the `mock-conductor` binary for
//! local dry runs. Workflows are never executed: a started workflow counts
//! as running until `workflow_duration` has elapsed, unless a scripted
//! sequence of running counts is configured.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use actix_web::{
    App, HttpResponse, HttpServer, Responder, dev::ServerHandle, get, http::StatusCode, post, put,
    rt, web,
};
use serde::Deserialize;
use uuid::Uuid;

/// Behavior of the fake server.
#[derive(Debug, Clone)]
pub struct MockSettings {
    /// Status returned by `PUT /metadata/taskdefs`
    pub patch_status: u16,

    /// Status returned by `POST /workflow/{name}`
    pub spawn_status: u16,

    /// Delay applied to every start-workflow request
    pub spawn_delay: Duration,

    /// How long a started workflow is reported as running
    pub workflow_duration: Duration,

    /// Running counts returned by successive polls, ahead of the time based ones
    pub running_script: Vec<usize>,

    /// Record every request for later inspection. Off for long-lived servers:
    /// only the workflows still running are then kept.
    pub keep_history: bool,
}

impl Default for MockSettings {
    fn default() -> Self {
        Self {
            patch_status: 200,
            spawn_status: 200,
            spawn_delay: Duration::ZERO,
            workflow_duration: Duration::ZERO,
            running_script: vec![],
            keep_history: true,
        }
    }
}

/// A workflow start received by the fake server.
#[derive(Debug, Clone)]
pub struct StartedWorkflow {
    pub id: String,
    pub name: String,
    pub input: serde_json::Value,
    started_at: Instant,
}

#[derive(Debug, Default)]
struct Recorded {
    task_defs: Vec<serde_json::Value>,
    started: Vec<StartedWorkflow>,
    rejected_starts: usize,
    /// Started workflows not yet past `workflow_duration`
    running: Vec<StartedWorkflow>,
    running_script: VecDeque<usize>,
    running_polls: Vec<(String, Option<u32>)>,
    poll_times: Vec<Instant>,
}

/// Shared state of the fake server.
#[derive(Debug)]
pub struct MockState {
    settings: MockSettings,
    recorded: Mutex<Recorded>,
}

impl MockState {
    pub fn new(settings: MockSettings) -> Self {
        let recorded = Recorded {
            running_script: settings.running_script.iter().copied().collect(),
            ..Default::default()
        };
        Self {
            settings,
            recorded: Mutex::new(recorded),
        }
    }

    fn recorded(&self) -> MutexGuard<'_, Recorded> {
        self.recorded.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Task definitions received, in order.
    pub fn task_defs(&self) -> Vec<serde_json::Value> {
        self.recorded().task_defs.clone()
    }

    /// Workflow starts received, in order.
    pub fn started(&self) -> Vec<StartedWorkflow> {
        self.recorded().started.clone()
    }

    /// Start requests answered with an error status.
    pub fn rejected_starts(&self) -> usize {
        self.recorded().rejected_starts
    }

    /// Running-count queries received, as `(workflow name, version)`.
    pub fn running_polls(&self) -> Vec<(String, Option<u32>)> {
        self.recorded().running_polls.clone()
    }

    /// When each running-count query arrived.
    pub fn poll_times(&self) -> Vec<Instant> {
        self.recorded().poll_times.clone()
    }

    /// Started workflows the server still holds to answer running queries.
    pub fn tracked_workflows(&self) -> usize {
        self.recorded().running.len()
    }

    fn record_start(&self, workflow: StartedWorkflow) {
        let mut recorded = self.recorded();
        if self.settings.keep_history {
            recorded.started.push(workflow.clone());
        }
        recorded.running.push(workflow);
    }

    fn running_ids(&self, name: &str, version: Option<u32>) -> Vec<String> {
        let mut recorded = self.recorded();
        if self.settings.keep_history {
            recorded.running_polls.push((name.to_string(), version));
            recorded.poll_times.push(Instant::now());
        }
        if let Some(count) = recorded.running_script.pop_front() {
            return (0..count).map(|_| Uuid::new_v4().to_string()).collect();
        }
        let duration = self.settings.workflow_duration;
        recorded.running.retain(|w| w.started_at.elapsed() < duration);
        recorded
            .running
            .iter()
            .filter(|w| w.name == name)
            .map(|w| w.id.clone())
            .collect()
    }
}

fn status(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

#[put("/metadata/taskdefs")]
async fn put_task_defs(
    state: web::Data<MockState>,
    body: web::Json<serde_json::Value>,
) -> impl Responder {
    log::debug!("Received task definition: {}", body.0);
    if state.settings.keep_history {
        state.recorded().task_defs.push(body.0);
    }
    HttpResponse::build(status(state.settings.patch_status)).finish()
}

#[post("/workflow/{name}")]
async fn start_workflow(
    state: web::Data<MockState>,
    name: web::Path<String>,
    body: web::Json<serde_json::Value>,
) -> impl Responder {
    if !state.settings.spawn_delay.is_zero() {
        rt::time::sleep(state.settings.spawn_delay).await;
    }
    let code = status(state.settings.spawn_status);
    if !code.is_success() {
        state.recorded().rejected_starts += 1;
        return HttpResponse::build(code).body(format!("Unable to start workflow {}", name));
    }
    let id = Uuid::new_v4().to_string();
    state.record_start(StartedWorkflow {
        id: id.clone(),
        name: name.into_inner(),
        input: body.0,
        started_at: Instant::now(),
    });
    HttpResponse::Ok().content_type("text/plain").body(id)
}

#[derive(Deserialize)]
struct RunningQuery {
    version: Option<u32>,
}

#[get("/workflow/running/{name}")]
async fn running_workflows(
    state: web::Data<MockState>,
    name: web::Path<String>,
    query: web::Query<RunningQuery>,
) -> impl Responder {
    HttpResponse::Ok().json(state.running_ids(&name, query.version))
}

/// Register the fake Conductor routes under `/api`.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .service(put_task_defs)
            .service(start_workflow)
            .service(running_workflows),
    );
}

/// A fake Conductor listening on a local port.
pub struct MockConductor {
    addr: SocketAddr,
    state: web::Data<MockState>,
    handle: ServerHandle,
}

impl MockConductor {
    /// Bind an ephemeral port on 127.0.0.1 and serve in the background.
    ///
    /// Must be called from within an actix (or tokio local) runtime.
    pub fn start(settings: MockSettings) -> std::io::Result<Self> {
        let state = web::Data::new(MockState::new(settings));
        let data = state.clone();
        let server = HttpServer::new(move || {
            App::new()
                .app_data(data.clone())
                .configure(configure_routes)
        })
        .workers(1)
        .bind(("127.0.0.1", 0))?;

        let addr = server
            .addrs()
            .first()
            .copied()
            .ok_or_else(|| std::io::Error::other("mock conductor is not bound to any address"))?;
        let server = server.run();
        let handle = server.handle();
        rt::spawn(server);
        log::debug!("Mock conductor listening on {}", addr);

        Ok(Self {
            addr,
            state,
            handle,
        })
    }

    /// API base URL, suitable for `CONDUCTOR_API`.
    pub fn api_url(&self) -> String {
        format!("http://{}/api", self.addr)
    }

    pub fn state(&self) -> &MockState {
        &self.state
    }

    pub async fn stop(self) {
        self.handle.stop(true).await;
    }
}
