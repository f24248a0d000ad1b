use crate::backend::{BackendError, InferenceBackend};
use crate::session::SessionRecord;
use crate::session::config_watch::ConfigWatch;
use crate::session::store::SessionStore;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Owns every mutation of the session records: resolves a live backend
/// session for a user, recreating it lazily after remote loss or a
/// configuration change.
///
/// All calls for one user happen inside that user's serialized sequencer
/// slot, so no two lifecycle operations ever race on the same record.
pub struct SessionLifecycleManager {
    backend: Arc<dyn InferenceBackend>,
    store: Arc<SessionStore>,
    watch: ConfigWatch,
}

impl SessionLifecycleManager {
    pub fn new(
        backend: Arc<dyn InferenceBackend>,
        store: Arc<SessionStore>,
        watch: ConfigWatch,
    ) -> Self {
        Self {
            backend,
            store,
            watch,
        }
    }

    /// Returns a usable session id for `user_id`, creating or recreating
    /// the remote session as needed. Fails only when session creation
    /// itself fails after one local fallback attempt.
    pub async fn ensure_valid_session(&self, user_id: &str) -> Result<String, BackendError> {
        if self.watch.has_changed().await {
            self.invalidate_all().await;
        }

        match self.resolve(user_id).await {
            Ok(id) => Ok(id),
            Err(e) => {
                warn!(user_id, error = %e, "Session resolution failed, attempting fallback creation");
                self.create_for(user_id).await.map_err(|fallback| {
                    error!(user_id, error = %fallback, "Fallback session creation failed");
                    fallback
                })
            }
        }
    }

    async fn resolve(&self, user_id: &str) -> Result<String, BackendError> {
        let session_id = match self.store.get(user_id) {
            Some(record) if record.is_usable() => record.id.expect("usable record has an id"),
            _ => {
                debug!(user_id, "No usable session record, creating");
                return self.create_for(user_id).await;
            }
        };

        match self.backend.get_session(&session_id).await {
            Ok(()) => {
                self.store.touch(user_id);
                Ok(session_id)
            }
            Err(e) if e.is_not_found() => {
                info!(user_id, session_id, "Session gone remotely, recreating");
                self.create_for(user_id).await
            }
            Err(e) => {
                error!(user_id, session_id, error = %e, "Session verification failed");
                Err(e)
            }
        }
    }

    async fn create_for(&self, user_id: &str) -> Result<String, BackendError> {
        let session_id = self.backend.create_session().await?;
        self.store.put(user_id, SessionRecord::live(&session_id));
        info!(user_id, session_id, "Created session");
        Ok(session_id)
    }

    /// Marks every stored session outdated and best-effort deletes the
    /// remote counterparts. A remote 404 counts as already deleted;
    /// other delete failures are logged and skipped.
    async fn invalidate_all(&self) {
        let stale_ids = self.store.mark_all_outdated();
        info!(
            count = stale_ids.len(),
            "Configuration changed, sessions marked for recreation"
        );
        for session_id in stale_ids {
            match self.backend.delete_session(&session_id).await {
                Ok(()) => debug!(session_id, "Deleted stale session"),
                Err(e) if e.is_not_found() => {
                    debug!(session_id, "Stale session already deleted")
                }
                Err(e) => warn!(session_id, error = %e, "Could not delete stale session"),
            }
        }
    }
}
