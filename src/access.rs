use crate::store::JsonStore;
use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing::info;

/// Users the bot must not auto-respond to (they asked for a human, or an
/// operator muted the assistant for them). Flat JSON set, hot-reloaded
/// on external edits.
#[derive(Debug)]
pub struct IgnoreList {
    inner: JsonStore<BTreeSet<String>>,
}

impl IgnoreList {
    pub fn open(path: PathBuf) -> Self {
        let list = Self {
            inner: JsonStore::open(path),
        };
        info!(count = list.inner.read().len(), "Loaded ignore list");
        list
    }

    pub fn add(&self, user_id: &str) {
        self.inner.update(|set| {
            set.insert(user_id.to_string());
        });
    }

    pub fn remove(&self, user_id: &str) {
        self.inner.update(|set| {
            set.remove(user_id);
        });
    }

    pub fn contains(&self, user_id: &str) -> bool {
        self.inner.read().contains(user_id)
    }
}

/// Moderator identities; moderators may run the administrative command
/// set without being configured admins.
#[derive(Debug)]
pub struct ModeratorSet {
    inner: JsonStore<BTreeSet<String>>,
}

impl ModeratorSet {
    pub fn open(path: PathBuf) -> Self {
        let set = Self {
            inner: JsonStore::open(path),
        };
        info!(count = set.inner.read().len(), "Loaded moderators");
        set
    }

    pub fn add(&self, user_id: &str) {
        self.inner.update(|set| {
            set.insert(user_id.to_string());
        });
    }

    pub fn remove(&self, user_id: &str) {
        self.inner.update(|set| {
            set.remove(user_id);
        });
    }

    pub fn contains(&self, user_id: &str) -> bool {
        self.inner.read().contains(user_id)
    }

    pub fn list(&self) -> Vec<String> {
        self.inner.read().into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn ignore_list_round_trip() {
        let dir = tempdir().unwrap();
        let list = IgnoreList::open(dir.path().join("ignore.json"));

        list.add("923499490427");
        assert!(list.contains("923499490427"));

        list.remove("923499490427");
        assert!(!list.contains("923499490427"));
    }

    #[test]
    fn moderators_listed_in_order() {
        let dir = tempdir().unwrap();
        let mods = ModeratorSet::open(dir.path().join("mods.json"));
        mods.add("92222222222");
        mods.add("91111111111");
        assert_eq!(mods.list(), vec!["91111111111", "92222222222"]);
    }

    #[test]
    fn ignore_list_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ignore.json");
        IgnoreList::open(path.clone()).add("923499490427");
        assert!(IgnoreList::open(path).contains("923499490427"));
    }
}
