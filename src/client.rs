//! Typed client for the Conductor endpoints the load test drives.

use std::time::Duration;

use crate::error::{ClientError, ClientResult};
use crate::payloads::{StartWorkflowInput, TaskDef};

/// Build the HTTP client; without a timeout a request may block forever.
pub fn get_http_client(timeout: Option<Duration>) -> ClientResult<reqwest::Client> {
    let mut builder = reqwest::Client::builder();
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    Ok(builder.build()?)
}

/// Response to a start-workflow request, successful or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartResponse {
    pub status: u16,
    /// Raw body: the new workflow id on success, the server's message otherwise
    pub body: String,
}

impl StartResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Client for the Conductor REST API.
#[derive(Debug, Clone)]
pub struct ConductorClient {
    base_url: String,
    http: reqwest::Client,
}

impl ConductorClient {
    /// Create a new client pointing to the given API base URL
    /// (e.g. `http://localhost:8080/api`).
    pub fn new(base_url: impl Into<String>, timeout: Option<Duration>) -> ClientResult<Self> {
        Ok(Self::with_http_client(base_url, get_http_client(timeout)?))
    }

    /// Create a client with a custom `reqwest::Client`.
    pub fn with_http_client(base_url: impl Into<String>, http: reqwest::Client) -> Self {
        let mut base = base_url.into();
        // Strip trailing slash for consistent URL building
        while base.ends_with('/') {
            base.pop();
        }
        Self {
            base_url: base,
            http,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Register or update a task definition (PUT /metadata/taskdefs).
    pub async fn put_task_def(&self, task_def: &TaskDef) -> ClientResult<()> {
        let resp = self
            .http
            .put(format!("{}/metadata/taskdefs", self.base_url))
            .json(task_def)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(Self::make_api_error(resp).await);
        }
        Ok(())
    }

    /// Start one workflow instance (POST /workflow/{name}).
    ///
    /// Only transport errors are returned as `Err`; an error status comes
    /// back in the `StartResponse` with the server's body.
    pub async fn start_workflow(
        &self,
        name: &str,
        input: &StartWorkflowInput,
    ) -> ClientResult<StartResponse> {
        let resp = self
            .http
            .post(format!("{}/workflow/{}", self.base_url, name))
            .json(input)
            .send()
            .await?;

        let status = resp.status().as_u16();
        let body = resp.text().await?;
        Ok(StartResponse { status, body })
    }

    /// Ids of the running instances of a workflow
    /// (GET /workflow/running/{name}?version={version}).
    pub async fn running_workflows(&self, name: &str, version: u32) -> ClientResult<Vec<String>> {
        let resp = self
            .http
            .get(format!("{}/workflow/running/{}", self.base_url, name))
            .query(&[("version", version)])
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(Self::make_api_error(resp).await);
        }

        let running: Vec<serde_json::Value> = resp
            .json()
            .await
            .map_err(|e| ClientError::Deserialize(e.to_string()))?;
        Ok(running
            .into_iter()
            .map(|v| match v {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            })
            .collect())
    }

    /// Number of running instances of a workflow.
    pub async fn count_running_workflows(&self, name: &str, version: u32) -> ClientResult<usize> {
        Ok(self.running_workflows(name, version).await?.len())
    }

    async fn make_api_error(resp: reqwest::Response) -> ClientError {
        let status = resp.status().as_u16();
        let body = resp
            .text()
            .await
            .unwrap_or_else(|_| format!("HTTP {}", status));
        ClientError::Api { status, body }
    }
}
