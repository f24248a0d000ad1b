//! Drives one inference run from user text to assistant reply: appends the
//! message, starts a run, polls it, answers tool callbacks, and retries
//! terminal-but-retryable statuses with fresh runs until the retry budget
//! is spent.

use crate::backend::{InferenceBackend, RunStatus};
use crate::run::registry::RunRegistry;
use crate::run::{RunError, RunPolicy};
use crate::tools::{ToolContext, ToolDispatcher};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

pub struct RunExecutor {
    backend: Arc<dyn InferenceBackend>,
    registry: Arc<RunRegistry>,
    policy: RunPolicy,
}

impl RunExecutor {
    pub fn new(
        backend: Arc<dyn InferenceBackend>,
        registry: Arc<RunRegistry>,
        policy: RunPolicy,
    ) -> Self {
        Self {
            backend,
            registry,
            policy,
        }
    }

    pub fn registry(&self) -> &Arc<RunRegistry> {
        &self.registry
    }

    /// Appends `text` to the session and drives a run to completion,
    /// returning the assistant's reply.
    ///
    /// Each attempt gets its own `max_run_time` deadline; a retry starts a
    /// brand-new run with a fresh clock. The active run is tracked in the
    /// registry so another caller can cancel it out from under us; we
    /// notice on the next poll tick and bail with [`RunError::Cancelled`].
    pub async fn execute(
        &self,
        session_id: &str,
        text: &str,
        dispatcher: &ToolDispatcher,
        ctx: &ToolContext,
    ) -> Result<String, RunError> {
        self.backend.append_message(session_id, text).await?;

        let mut run_id = self.backend.create_run(session_id).await?;
        if let Some(old) = self.registry.register(session_id, &run_id) {
            // A stale run was still registered; cancelling it is best-effort
            // since its loop already stops once displaced.
            warn!(session_id, old_run = %old, "displacing stale active run");
            let _ = self.backend.cancel_run(session_id, &old).await;
        }
        debug!(session_id, run_id = %run_id, "run started");

        let mut retries = 0u32;
        let mut deadline = Instant::now() + self.policy.max_run_time;

        loop {
            if Instant::now() >= deadline {
                self.abandon(session_id, &run_id).await;
                return Err(RunError::TimedOut(self.policy.max_run_time));
            }
            if !self.registry.is_active(session_id, &run_id) {
                info!(session_id, run_id = %run_id, "run cancelled externally");
                return Err(RunError::Cancelled(run_id));
            }

            let state = match self.backend.get_run(session_id, &run_id).await {
                Ok(state) => state,
                Err(err) => {
                    self.abandon(session_id, &run_id).await;
                    return Err(err.into());
                }
            };

            match state.status {
                RunStatus::Completed => {
                    self.registry.retire(session_id, &run_id);
                    let reply = self.backend.latest_response(session_id).await?;
                    debug!(session_id, run_id = %run_id, "run completed");
                    return Ok(reply);
                }
                RunStatus::RequiresAction => {
                    let results = dispatcher.dispatch_all(&state.pending_calls, ctx).await;
                    self.backend
                        .submit_tool_results(session_id, &run_id, results)
                        .await?;
                }
                status if status.is_retryable() => {
                    if retries >= self.policy.max_retries {
                        self.registry.retire(session_id, &run_id);
                        warn!(session_id, run_id = %run_id, retries, "retry budget spent");
                        return Err(RunError::ExhaustedRetries(retries));
                    }
                    retries += 1;
                    info!(
                        session_id,
                        run_id = %run_id,
                        ?status,
                        attempt = retries,
                        "run ended, starting a fresh one"
                    );
                    // Retire before creating the replacement so no window
                    // exists where the dead run looks active. The dead run
                    // also gets a best-effort remote cancel; it is already
                    // terminal, so a failure here changes nothing.
                    self.registry.retire(session_id, &run_id);
                    if let Err(err) = self.backend.cancel_run(session_id, &run_id).await {
                        debug!(session_id, run_id = %run_id, %err, "cancel of dead run failed");
                    }
                    run_id = self.backend.create_run(session_id).await?;
                    self.registry.register(session_id, &run_id);
                    deadline = Instant::now() + self.policy.max_run_time;
                    continue;
                }
                _ => {}
            }

            sleep(self.policy.poll_interval).await;
        }
    }

    /// Drops the run from the registry and asks the backend to cancel it,
    /// ignoring failures since the run may already be terminal.
    async fn abandon(&self, session_id: &str, run_id: &str) {
        self.registry.retire(session_id, run_id);
        if let Err(err) = self.backend.cancel_run(session_id, run_id).await {
            debug!(session_id, run_id, %err, "cancel after abandon failed");
        }
    }

    /// Cancels whatever run is active for the session, if any. Used by the
    /// operator commands to unstick a user.
    pub async fn cancel_active(&self, session_id: &str) -> bool {
        match self.registry.evict(session_id) {
            Some(run_id) => {
                if let Err(err) = self.backend.cancel_run(session_id, &run_id).await {
                    debug!(session_id, %run_id, %err, "backend cancel failed");
                }
                true
            }
            None => false,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        self.policy.poll_interval
    }
}
