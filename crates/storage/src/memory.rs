//! Process-local store.

use std::collections::BTreeMap;

use sequencer::{StorageError, StorageKey, VisitStore};

/// [`VisitStore`] backed by a map; forgets everything when dropped.
///
/// Behaves like a browser session with storage enabled but nothing persisted
/// across processes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryStore {
    values: BTreeMap<String, String>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl VisitStore for MemoryStore {
    fn get(&self, key: &StorageKey) -> Result<Option<String>, StorageError> {
        Ok(self.values.get(key.as_str()).cloned())
    }

    fn set(&mut self, key: &StorageKey, value: &str) -> Result<(), StorageError> {
        self.values
            .insert(key.as_str().to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &StorageKey) -> Result<(), StorageError> {
        self.values.remove(key.as_str());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_remove() {
        let mut store = MemoryStore::new();
        let key = sequencer::default_visit_key();

        assert_eq!(store.get(&key).unwrap(), None);
        store.set(&key, "true").unwrap();
        assert_eq!(store.get(&key).unwrap().as_deref(), Some("true"));
        store.remove(&key).unwrap();
        store.remove(&key).unwrap();
        assert!(store.is_empty());
    }
}
