use dashmap::DashMap;
use std::sync::Arc;

/// Active runs keyed by session id. One entry per session; replacing the
/// value retires the previous run so its poll loop bails on the next pass.
///
/// Since a session has at most one active run, the (session id, run id)
/// pair identifies a run exactly: an external actor cancels a specific run
/// through `retire` (no-op when that run is no longer the active one) or
/// whatever runs for the session through `evict`.
#[derive(Debug, Default)]
pub struct RunRegistry {
    active: DashMap<String, String>,
}

impl RunRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registers `run_id` as the active run for the session, returning the
    /// run it displaced, if any.
    pub fn register(&self, session_id: &str, run_id: &str) -> Option<String> {
        self.active
            .insert(session_id.to_string(), run_id.to_string())
    }

    /// True while `run_id` is still the active run for the session.
    pub fn is_active(&self, session_id: &str, run_id: &str) -> bool {
        self.active
            .get(session_id)
            .is_some_and(|entry| entry.value() == run_id)
    }

    pub fn active_run(&self, session_id: &str) -> Option<String> {
        self.active.get(session_id).map(|e| e.value().clone())
    }

    /// Clears the entry only if `run_id` is still the registered run, so a
    /// finished attempt never evicts its replacement.
    pub fn retire(&self, session_id: &str, run_id: &str) {
        self.active
            .remove_if(session_id, |_, active| active == run_id);
    }

    /// Unconditionally drops the session's active run. Returns the run id
    /// that was evicted, which tells the caller whether anything was running.
    pub fn evict(&self, session_id: &str) -> Option<String> {
        self.active.remove(session_id).map(|(_, run_id)| run_id)
    }

    /// Drops every active run. Each affected poll loop notices on its next
    /// tick and reports cancellation.
    pub fn clear(&self) -> usize {
        let n = self.active.len();
        self.active.clear();
        n
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}
