//! Google Tasks task sink.
//!
//! Targets the Tasks v1 `tasks.insert` REST endpoint with a bearer token.

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::error::{DispatchError, DispatchResult};
use crate::traits::{NewTask, TaskSink};

/// Default Tasks API base URL.
const TASKS_BASE_URL: &str = "https://tasks.googleapis.com/tasks/v1";

/// Per-request timeout.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Task sink backed by the Google Tasks v1 API.
pub struct GoogleTasksSink {
    /// OAuth bearer token (provisioned externally).
    token: String,
    /// Target task list, usually `@default`.
    tasklist_id: String,
    base_url: String,
    client: reqwest::Client,
}

impl GoogleTasksSink {
    /// Create a sink for the given task list.
    pub fn new(token: impl Into<String>, tasklist_id: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();

        Self {
            token: token.into(),
            tasklist_id: tasklist_id.into(),
            base_url: TASKS_BASE_URL.to_owned(),
            client,
        }
    }

    /// Override the API base URL (tests, proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Build the `tasks.insert` request body for a task.
    pub fn build_task_payload(task: &NewTask) -> Value {
        let mut payload = json!({
            "title": task.title,
            "notes": task.notes,
        });
        if let Some(due) = task.due {
            payload["due"] = json!(due.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string());
        }
        payload
    }
}

#[async_trait]
impl TaskSink for GoogleTasksSink {
    async fn create_task(&self, task: &NewTask) -> DispatchResult<()> {
        if self.token.is_empty() {
            return Err(DispatchError::MissingCredential { service: "tasks" });
        }

        let url = format!("{}/lists/{}/tasks", self.base_url, self.tasklist_id);
        let payload = Self::build_task_payload(task);

        debug!(title = %task.title, due = ?task.due, "creating task");

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| DispatchError::RequestFailed {
                service: "tasks",
                reason: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(DispatchError::ApiError {
                service: "tasks",
                status: status.as_u16(),
                body,
            });
        }

        info!(title = %task.title, "task created");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
