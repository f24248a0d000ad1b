#[cfg(test)]
pub mod mock;
pub mod openai;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    /// Network failure or 5xx; worth retrying within the run-retry budget.
    #[error("transient backend error: {0}")]
    Transient(String),
    /// The session or run vanished remotely; treated as a
    /// recreate-and-continue signal, not a user-visible failure.
    #[error("not found: {0}")]
    NotFound(String),
    /// Any other definitive API rejection.
    #[error("backend API error: {0}")]
    Api(String),
}

impl BackendError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, BackendError::NotFound(_))
    }
}

/// Backend-reported state of one run execution.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    RequiresAction,
    Completed,
    Failed,
    Cancelled,
    Expired,
}

impl RunStatus {
    /// Terminal but eligible for a fresh run on the same session.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RunStatus::Failed | RunStatus::Cancelled | RunStatus::Expired
        )
    }
}

/// Callback surfaced mid-run; the run blocks until every pending call
/// has been answered.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ToolCallRequest {
    pub call_id: String,
    pub name: String,
    pub arguments: Value,
}

/// Answer for one callback, keyed by the backend-assigned call id.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ToolCallResult {
    pub call_id: String,
    pub output: String,
}

/// Poll response: either plain status, or status plus the callbacks that
/// must be answered before the run continues.
#[derive(Debug, Clone)]
pub struct RunState {
    pub status: RunStatus,
    pub pending_calls: Vec<ToolCallRequest>,
}

impl RunState {
    pub fn status(status: RunStatus) -> Self {
        Self {
            status,
            pending_calls: Vec::new(),
        }
    }
}

/// Remote assistant configuration; its fingerprint decides when stored
/// sessions go stale.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AssistantConfig {
    pub instructions: String,
    pub model: String,
    pub tools: Value,
}

impl AssistantConfig {
    /// Content fingerprint over everything that shapes conversational
    /// context server-side.
    pub fn fingerprint(&self) -> String {
        serde_json::json!({
            "instructions": self.instructions,
            "model": self.model,
            "tools": self.tools,
        })
        .to_string()
    }
}

/// The inference backend seam, shaped after an assistants-style API.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    async fn create_session(&self) -> Result<String, BackendError>;
    async fn get_session(&self, session_id: &str) -> Result<(), BackendError>;
    async fn delete_session(&self, session_id: &str) -> Result<(), BackendError>;
    async fn append_message(&self, session_id: &str, text: &str) -> Result<(), BackendError>;
    async fn create_run(&self, session_id: &str) -> Result<String, BackendError>;
    async fn get_run(&self, session_id: &str, run_id: &str) -> Result<RunState, BackendError>;
    async fn submit_tool_results(
        &self,
        session_id: &str,
        run_id: &str,
        results: Vec<ToolCallResult>,
    ) -> Result<(), BackendError>;
    async fn cancel_run(&self, session_id: &str, run_id: &str) -> Result<(), BackendError>;
    async fn latest_response(&self, session_id: &str) -> Result<String, BackendError>;
    async fn assistant_config(&self) -> Result<AssistantConfig, BackendError>;
}
