use crate::backend::InferenceBackend;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{info, warn};

/// Rate-limited watch over the remote assistant configuration.
///
/// At most one remote fetch per `interval`; between checks the last
/// answer stands. The signal is edge-triggered: `has_changed` reports
/// `true` exactly once per observed fingerprint change, and the first
/// observation only sets the baseline.
pub struct ConfigWatch {
    backend: Arc<dyn InferenceBackend>,
    interval: Duration,
    state: Mutex<WatchState>,
}

#[derive(Debug, Default)]
struct WatchState {
    last_check: Option<Instant>,
    fingerprint: Option<String>,
}

impl ConfigWatch {
    pub fn new(backend: Arc<dyn InferenceBackend>, interval: Duration) -> Self {
        Self {
            backend,
            interval,
            state: Mutex::new(WatchState::default()),
        }
    }

    /// True when this check observed a configuration fingerprint that
    /// differs from the previous one. Fetch failures keep the last known
    /// answer (no change reported).
    pub async fn has_changed(&self) -> bool {
        let mut state = self.state.lock().await;

        if let Some(last) = state.last_check {
            if last.elapsed() < self.interval {
                return false;
            }
        }
        state.last_check = Some(Instant::now());

        let config = match self.backend.assistant_config().await {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, "Could not fetch assistant configuration, keeping last answer");
                return false;
            }
        };

        let fingerprint = config.fingerprint();
        match state.fingerprint.replace(fingerprint.clone()) {
            None => false,
            Some(previous) if previous == fingerprint => false,
            Some(_) => {
                info!(model = %config.model, "Assistant configuration changed");
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::{Fail, MockBackend};
    use std::sync::atomic::Ordering;

    fn set_model(backend: &MockBackend, model: &str) {
        *backend.model.lock().unwrap() = model.to_string();
    }

    #[tokio::test]
    async fn first_observation_is_baseline() {
        let backend = Arc::new(MockBackend::new());
        let watch = ConfigWatch::new(backend.clone(), Duration::ZERO);
        assert!(!watch.has_changed().await);
        assert_eq!(backend.config_fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn change_reported_once_then_quiet() {
        let backend = Arc::new(MockBackend::new());
        let watch = ConfigWatch::new(backend.clone(), Duration::ZERO);

        assert!(!watch.has_changed().await); // baseline
        set_model(&backend, "model-b");
        assert!(watch.has_changed().await);
        assert!(!watch.has_changed().await); // same fingerprint again
    }

    #[tokio::test]
    async fn interval_rate_limits_remote_fetches() {
        let backend = Arc::new(MockBackend::new());
        let watch = ConfigWatch::new(backend.clone(), Duration::from_secs(300));

        assert!(!watch.has_changed().await);
        set_model(&backend, "model-b");
        // Within the interval: no remote call, last answer stands.
        assert!(!watch.has_changed().await);
        assert_eq!(backend.config_fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn fetch_failure_keeps_last_answer() {
        let backend = Arc::new(MockBackend::new());
        let watch = ConfigWatch::new(backend.clone(), Duration::ZERO);

        assert!(!watch.has_changed().await); // baseline
        *backend.fail_assistant_config.lock().unwrap() = Some(Fail::Transient);
        assert!(!watch.has_changed().await);

        // Recovery with a changed fingerprint still surfaces the change.
        *backend.fail_assistant_config.lock().unwrap() = None;
        set_model(&backend, "model-b");
        assert!(watch.has_changed().await);
    }
}
