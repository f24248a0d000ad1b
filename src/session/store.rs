use crate::session::SessionRecord;
use crate::store::JsonStore;
use chrono::Utc;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::info;

/// Durable user → session-record map over a flat JSON snapshot.
///
/// All mutation happens inside a user's serialized drain-loop slot, so
/// per-record writes never race; cross-user safety comes from the store's
/// internal lock.
#[derive(Debug)]
pub struct SessionStore {
    inner: JsonStore<HashMap<String, SessionRecord>>,
}

impl SessionStore {
    pub fn open(path: PathBuf) -> Self {
        let store = Self {
            inner: JsonStore::open(path),
        };
        info!(count = store.inner.read().len(), "Loaded session records");
        store
    }

    pub fn get(&self, user_id: &str) -> Option<SessionRecord> {
        self.inner.read().get(user_id).cloned()
    }

    pub fn put(&self, user_id: &str, record: SessionRecord) {
        self.inner.update(|map| {
            map.insert(user_id.to_string(), record);
        });
    }

    pub fn remove(&self, user_id: &str) {
        self.inner.update(|map| {
            map.remove(user_id);
        });
    }

    pub fn touch(&self, user_id: &str) {
        self.inner.update(|map| {
            if let Some(record) = map.get_mut(user_id) {
                record.last_active = Utc::now();
            }
        });
    }

    /// Flags every stored session for lazy recreation and returns the
    /// remote ids that were live, so the caller can best-effort delete
    /// them.
    pub fn mark_all_outdated(&self) -> Vec<String> {
        self.inner.update(|map| {
            let mut ids = Vec::new();
            for record in map.values_mut() {
                if let Some(id) = &record.id {
                    ids.push(id.clone());
                }
                record.outdated = true;
            }
            ids
        })
    }

    pub fn clear(&self) {
        self.inner.write(HashMap::new());
        info!("All session records cleared");
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn put_get_remove() {
        let dir = tempdir().unwrap();
        let store = SessionStore::open(dir.path().join("sessions.json"));

        store.put("user1", SessionRecord::live("s1"));
        assert_eq!(store.get("user1").unwrap().id.as_deref(), Some("s1"));

        store.remove("user1");
        assert!(store.get("user1").is_none());
    }

    #[test]
    fn mark_all_outdated_returns_live_ids() {
        let dir = tempdir().unwrap();
        let store = SessionStore::open(dir.path().join("sessions.json"));
        store.put("a", SessionRecord::live("s1"));
        store.put(
            "b",
            SessionRecord {
                id: None,
                outdated: false,
                last_active: Utc::now(),
            },
        );

        let mut ids = store.mark_all_outdated();
        ids.sort();
        assert_eq!(ids, vec!["s1"]);
        assert!(store.get("a").unwrap().outdated);
        assert!(store.get("b").unwrap().outdated);
    }

    #[test]
    fn records_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sessions.json");
        {
            let store = SessionStore::open(path.clone());
            store.put("user1", SessionRecord::live("s1"));
        }
        let reopened = SessionStore::open(path);
        assert_eq!(reopened.get("user1").unwrap().id.as_deref(), Some("s1"));
    }
}
