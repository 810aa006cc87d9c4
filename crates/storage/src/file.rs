//! JSON-file store.
//!
//! The file holds every key with its value and the time it was last written:
//!
//! ```json
//! {
//!   "entries": {
//!     "hasVisitedHome": { "value": "true", "updated_at": "2026-10-19T09:12:44Z" }
//!   }
//! }
//! ```
//!
//! Writes go through a temporary file in the same directory and are renamed
//! into place, so a crash never leaves a half-written store behind.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sequencer::{StorageError, StorageKey, Timestamp, VisitStore};
use tracing::{debug, warn};

/// One stored value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEntry {
    /// The raw string value.
    pub value: String,
    /// When the value was last written.
    pub updated_at: Timestamp,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    #[serde(default)]
    entries: BTreeMap<String, StoredEntry>,
}

/// [`VisitStore`] persisted to a JSON file.
///
/// The file is read once by [`FileStore::open`]; every `set` and `remove`
/// writes it back immediately.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    contents: StoreFile,
}

impl FileStore {
    /// Opens the store at `path`. A missing file is an empty store; it is
    /// created on the first write.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let contents = match std::fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => StoreFile::default(),
            Ok(text) => serde_json::from_str(&text).map_err(|e| StorageError::Corrupt {
                reason: format!("{}: {e}", path.display()),
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "store file absent; starting empty");
                StoreFile::default()
            }
            Err(e) => return Err(io_error(&path, &e)),
        };
        Ok(Self { path, contents })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The stored entry for `key`, including when it was written.
    pub fn entry(&self, key: &StorageKey) -> Option<&StoredEntry> {
        self.contents.entries.get(key.as_str())
    }

    fn persist(&self) -> Result<(), StorageError> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(|e| io_error(&dir, &e))?;

        let json = serde_json::to_string_pretty(&self.contents).map_err(|e| StorageError::Io {
            message: format!("encode store: {e}"),
        })?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(|e| io_error(&dir, &e))?;
        tmp.write_all(json.as_bytes())
            .map_err(|e| io_error(tmp.path(), &e))?;
        tmp.persist(&self.path)
            .map_err(|e| io_error(&self.path, &e.error))?;
        debug!(path = %self.path.display(), "store written");
        Ok(())
    }
}

impl VisitStore for FileStore {
    fn get(&self, key: &StorageKey) -> Result<Option<String>, StorageError> {
        Ok(self.entry(key).map(|e| e.value.clone()))
    }

    fn set(&mut self, key: &StorageKey, value: &str) -> Result<(), StorageError> {
        let previous = self.contents.entries.insert(
            key.as_str().to_string(),
            StoredEntry {
                value: value.to_string(),
                updated_at: Timestamp::now(),
            },
        );
        if let Err(e) = self.persist() {
            warn!(key = %key, error = %e, "write failed; in-memory value rolled back");
            match previous {
                Some(p) => self.contents.entries.insert(key.as_str().to_string(), p),
                None => self.contents.entries.remove(key.as_str()),
            };
            return Err(e);
        }
        Ok(())
    }

    fn remove(&mut self, key: &StorageKey) -> Result<(), StorageError> {
        let Some(previous) = self.contents.entries.remove(key.as_str()) else {
            return Ok(());
        };
        if let Err(e) = self.persist() {
            self.contents
                .entries
                .insert(key.as_str().to_string(), previous);
            return Err(e);
        }
        Ok(())
    }
}

fn io_error(path: &Path, e: &std::io::Error) -> StorageError {
    StorageError::Io {
        message: format!("{}: {e}", path.display()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn key() -> StorageKey {
        sequencer::default_visit_key()
    }

    #[test]
    fn missing_file_is_an_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path().join("store.json")).unwrap();

        assert_eq!(store.get(&key()).unwrap(), None);
        assert!(!store.path().exists());
    }

    #[test]
    fn values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.json");

        let mut store = FileStore::open(&path).unwrap();
        store.set(&key(), "true").unwrap();
        drop(store);

        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(reopened.get(&key()).unwrap().as_deref(), Some("true"));
        assert!(reopened.entry(&key()).is_some());
    }

    #[test]
    fn remove_is_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let mut store = FileStore::open(&path).unwrap();
        store.set(&key(), "true").unwrap();

        store.remove(&key()).unwrap();
        store.remove(&key()).unwrap();

        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(reopened.get(&key()).unwrap(), None);
    }

    #[test]
    fn corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = FileStore::open(&path).unwrap_err();

        assert!(matches!(err, StorageError::Corrupt { .. }), "got {err:?}");
    }

    #[test]
    fn empty_file_is_an_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, "\n").unwrap();

        let store = FileStore::open(&path).unwrap();
        assert_eq!(store.get(&key()).unwrap(), None);
    }

    #[test]
    fn file_layout_is_keyed_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let mut store = FileStore::open(&path).unwrap();
        store.set(&key(), "true").unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();

        assert_eq!(raw["entries"]["hasVisitedHome"]["value"], "true");
        assert!(raw["entries"]["hasVisitedHome"]["updated_at"].is_string());
    }
}
