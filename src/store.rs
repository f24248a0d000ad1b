use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::SystemTime;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("serialization error on {path}: {source}")]
    Serde {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Flat JSON snapshot store with reload-on-demand.
///
/// Every read checks the backing file's mtime and reloads when it changed
/// externally, so the in-memory view tracks hot edits without a watcher
/// task. I/O failures degrade to the in-memory copy; the process keeps
/// running on the last good state.
#[derive(Debug)]
pub struct JsonStore<T> {
    path: PathBuf,
    state: Mutex<Cached<T>>,
}

#[derive(Debug)]
struct Cached<T> {
    data: T,
    modified: Option<SystemTime>,
}

impl<T> JsonStore<T>
where
    T: Serialize + DeserializeOwned + Clone + Default,
{
    /// Opens the store, creating the file with a default snapshot when it
    /// does not exist yet.
    pub fn open(path: PathBuf) -> Self {
        let data = match load_snapshot::<T>(&path) {
            Ok(Some(data)) => data,
            Ok(None) => {
                let data = T::default();
                if let Err(e) = write_snapshot(&path, &data) {
                    warn!(path = %path.display(), error = %e, "Could not seed snapshot file");
                }
                data
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Could not load snapshot, starting empty");
                T::default()
            }
        };
        let modified = file_mtime(&path);
        Self {
            path,
            state: Mutex::new(Cached { data, modified }),
        }
    }

    /// Snapshot of the current data, reloading first when the file was
    /// changed by someone else. Idempotent and side-effect-free on the
    /// file itself.
    pub fn read(&self) -> T {
        let mut state = self.state.lock().expect("store lock poisoned");
        self.reload_if_changed(&mut state);
        state.data.clone()
    }

    /// Replaces the snapshot in memory and on disk. A write failure is
    /// logged and the new data stays live in memory.
    pub fn write(&self, data: T) {
        let mut state = self.state.lock().expect("store lock poisoned");
        self.persist(&mut state, data);
    }

    /// Read-modify-write under one lock acquisition, so concurrent updates
    /// never lose each other's changes.
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut state = self.state.lock().expect("store lock poisoned");
        self.reload_if_changed(&mut state);
        let mut data = state.data.clone();
        let out = f(&mut data);
        self.persist(&mut state, data);
        out
    }

    fn reload_if_changed(&self, state: &mut Cached<T>) {
        let on_disk = file_mtime(&self.path);
        if on_disk == state.modified {
            return;
        }
        debug!(path = %self.path.display(), "Snapshot changed externally, reloading");
        match load_snapshot::<T>(&self.path) {
            Ok(Some(data)) => {
                state.data = data;
                state.modified = on_disk;
            }
            Ok(None) => {
                state.data = T::default();
                state.modified = on_disk;
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Reload failed, keeping in-memory state");
            }
        }
    }

    fn persist(&self, state: &mut Cached<T>, data: T) {
        if let Err(e) = write_snapshot(&self.path, &data) {
            warn!(path = %self.path.display(), error = %e, "Persist failed, continuing in memory");
        }
        state.modified = file_mtime(&self.path);
        state.data = data;
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

fn file_mtime(path: &PathBuf) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

fn load_snapshot<T: DeserializeOwned>(path: &PathBuf) -> Result<Option<T>, StoreError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|source| StoreError::Io {
        path: path.display().to_string(),
        source,
    })?;
    if raw.trim().is_empty() {
        return Ok(None);
    }
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|source| StoreError::Serde {
            path: path.display().to_string(),
            source,
        })
}

fn write_snapshot<T: Serialize>(path: &PathBuf, data: &T) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| StoreError::Io {
            path: path.display().to_string(),
            source,
        })?;
    }
    let raw = serde_json::to_string_pretty(data).map_err(|source| StoreError::Serde {
        path: path.display().to_string(),
        source,
    })?;
    fs::write(path, raw).map_err(|source| StoreError::Io {
        path: path.display().to_string(),
        source,
    })
}
