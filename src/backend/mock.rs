//! Scripted in-memory backend used by the orchestration tests.

use crate::backend::{
    AssistantConfig, BackendError, InferenceBackend, RunState, RunStatus, ToolCallResult,
};
use async_trait::async_trait;
use serde_json::json;
use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// What a scripted call should do instead of succeeding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fail {
    NotFound,
    Transient,
}

impl Fail {
    fn to_error(self, what: &str) -> BackendError {
        match self {
            Fail::NotFound => BackendError::NotFound(what.to_string()),
            Fail::Transient => BackendError::Transient(what.to_string()),
        }
    }
}

#[derive(Default)]
pub struct MockBackend {
    session_seq: AtomicUsize,
    run_seq: AtomicUsize,
    pub live_sessions: Mutex<HashSet<String>>,
    pub deleted_sessions: Mutex<Vec<String>>,
    pub appended: Mutex<Vec<(String, String)>>,
    pub created_runs: Mutex<Vec<String>>,
    pub cancelled_runs: Mutex<Vec<String>>,
    pub submitted: Mutex<Vec<(String, Vec<ToolCallResult>)>>,
    pub polls: AtomicUsize,
    /// Per-poll script; when exhausted every poll reports `InProgress`.
    pub poll_script: Mutex<VecDeque<RunState>>,
    pub response_text: Mutex<String>,
    pub model: Mutex<String>,
    pub fail_get_session: Mutex<Option<Fail>>,
    pub fail_get_run: Mutex<Option<Fail>>,
    pub fail_create_session: Mutex<Option<Fail>>,
    pub fail_delete_session: Mutex<Option<Fail>>,
    pub fail_assistant_config: Mutex<Option<Fail>>,
    pub config_fetches: AtomicUsize,
}

impl MockBackend {
    pub fn new() -> Self {
        let mock = Self::default();
        *mock.response_text.lock().unwrap() = "Hi there!".to_string();
        *mock.model.lock().unwrap() = "model-a".to_string();
        mock
    }

    pub fn script_polls(&self, states: Vec<RunState>) {
        *self.poll_script.lock().unwrap() = states.into();
    }

    pub fn script_statuses(&self, statuses: Vec<RunStatus>) {
        self.script_polls(statuses.into_iter().map(RunState::status).collect());
    }

    pub fn poll_count(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    pub fn run_count(&self) -> usize {
        self.created_runs.lock().unwrap().len()
    }
}

#[async_trait]
impl InferenceBackend for MockBackend {
    async fn create_session(&self) -> Result<String, BackendError> {
        if let Some(fail) = *self.fail_create_session.lock().unwrap() {
            return Err(fail.to_error("create_session"));
        }
        let id = format!("s{}", self.session_seq.fetch_add(1, Ordering::SeqCst) + 1);
        self.live_sessions.lock().unwrap().insert(id.clone());
        Ok(id)
    }

    async fn get_session(&self, session_id: &str) -> Result<(), BackendError> {
        if let Some(fail) = *self.fail_get_session.lock().unwrap() {
            return Err(fail.to_error(session_id));
        }
        if self.live_sessions.lock().unwrap().contains(session_id) {
            Ok(())
        } else {
            Err(BackendError::NotFound(session_id.to_string()))
        }
    }

    async fn delete_session(&self, session_id: &str) -> Result<(), BackendError> {
        if let Some(fail) = *self.fail_delete_session.lock().unwrap() {
            return Err(fail.to_error(session_id));
        }
        self.deleted_sessions
            .lock()
            .unwrap()
            .push(session_id.to_string());
        if !self.live_sessions.lock().unwrap().remove(session_id) {
            return Err(BackendError::NotFound(session_id.to_string()));
        }
        Ok(())
    }

    async fn append_message(&self, session_id: &str, text: &str) -> Result<(), BackendError> {
        self.appended
            .lock()
            .unwrap()
            .push((session_id.to_string(), text.to_string()));
        Ok(())
    }

    async fn create_run(&self, _session_id: &str) -> Result<String, BackendError> {
        let id = format!("r{}", self.run_seq.fetch_add(1, Ordering::SeqCst) + 1);
        self.created_runs.lock().unwrap().push(id.clone());
        Ok(id)
    }

    async fn get_run(&self, _session_id: &str, run_id: &str) -> Result<RunState, BackendError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        if let Some(fail) = *self.fail_get_run.lock().unwrap() {
            return Err(fail.to_error(run_id));
        }
        let next = self.poll_script.lock().unwrap().pop_front();
        Ok(next.unwrap_or_else(|| RunState::status(RunStatus::InProgress)))
    }

    async fn submit_tool_results(
        &self,
        _session_id: &str,
        run_id: &str,
        results: Vec<ToolCallResult>,
    ) -> Result<(), BackendError> {
        self.submitted
            .lock()
            .unwrap()
            .push((run_id.to_string(), results));
        Ok(())
    }

    async fn cancel_run(&self, _session_id: &str, run_id: &str) -> Result<(), BackendError> {
        self.cancelled_runs.lock().unwrap().push(run_id.to_string());
        Ok(())
    }

    async fn latest_response(&self, _session_id: &str) -> Result<String, BackendError> {
        Ok(self.response_text.lock().unwrap().clone())
    }

    async fn assistant_config(&self) -> Result<AssistantConfig, BackendError> {
        self.config_fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(fail) = *self.fail_assistant_config.lock().unwrap() {
            return Err(fail.to_error("assistant_config"));
        }
        Ok(AssistantConfig {
            instructions: "help customers".into(),
            model: self.model.lock().unwrap().clone(),
            tools: json!([]),
        })
    }
}
