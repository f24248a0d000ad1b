pub mod config_watch;
pub mod lifecycle;
pub mod store;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Durable record of one user's backend conversation session.
///
/// `id == None` means "create on demand" and is never used to submit
/// work. `outdated` marks the session for lazy recreation after a remote
/// configuration change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: Option<String>,
    pub outdated: bool,
    pub last_active: DateTime<Utc>,
}

impl SessionRecord {
    pub fn live(id: &str) -> Self {
        Self {
            id: Some(id.to_string()),
            outdated: false,
            last_active: Utc::now(),
        }
    }

    /// Usable without a round-trip to the backend (still subject to the
    /// liveness check).
    pub fn is_usable(&self) -> bool {
        self.id.is_some() && !self.outdated
    }
}
