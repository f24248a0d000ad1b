pub mod executor;
pub mod registry;

use crate::backend::BackendError;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunError {
    /// The per-attempt deadline elapsed, whatever the backend reported.
    #[error("run timed out after {0:?}")]
    TimedOut(Duration),
    /// The run was removed from the active registry by an external actor.
    #[error("run {0} was cancelled")]
    Cancelled(String),
    /// The run stayed terminal after the whole retry budget.
    #[error("run failed after {0} retries")]
    ExhaustedRetries(u32),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Tunables for one executor instance.
#[derive(Debug, Clone)]
pub struct RunPolicy {
    /// Gap between status polls; also bounds cancellation latency.
    pub poll_interval: Duration,
    /// Hard deadline per attempt.
    pub max_run_time: Duration,
    /// Fresh runs started after a terminal-but-retryable status.
    pub max_retries: u32,
}

impl Default for RunPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            max_run_time: Duration::from_secs(30),
            max_retries: 3,
        }
    }
}
