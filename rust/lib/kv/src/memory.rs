use std::collections::BTreeMap;
use std::sync::RwLock;

use crate::error::KVError;
use crate::traits::{KVStore, WriteOp};

/// In-memory KVStore. Used by tests and by hosts that keep settings volatile.
///
/// A single `RwLock` guards the map, so `write` is atomic with respect to
/// concurrent readers.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned<T>(_: T) -> KVError {
    KVError::Storage("memory store lock poisoned".to_string())
}

impl KVStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KVError> {
        let entries = self.entries.read().map_err(poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), KVError> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), KVError> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        entries.remove(key);
        Ok(())
    }

    fn write(&self, ops: &[WriteOp]) -> Result<(), KVError> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        for op in ops {
            match op {
                WriteOp::Put { key, value } => {
                    entries.insert(key.clone(), value.clone());
                }
                WriteOp::Delete { key } => {
                    entries.remove(key);
                }
            }
        }
        Ok(())
    }

    fn scan(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, KVError> {
        let entries = self.entries.read().map_err(poisoned)?;
        Ok(entries
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_batch_and_scan() {
        let store = MemoryStore::new();
        store
            .write(&[
                WriteOp::Put { key: "prefs:x:a".into(), value: b"1".to_vec() },
                WriteOp::Put { key: "prefs:x:b".into(), value: b"2".to_vec() },
                WriteOp::Put { key: "prefs:y:a".into(), value: b"3".to_vec() },
            ])
            .unwrap();

        assert_eq!(store.len(), 3);
        let scanned = store.scan("prefs:x:").unwrap();
        assert_eq!(scanned.len(), 2);
        assert_eq!(scanned[0], ("prefs:x:a".to_string(), b"1".to_vec()));
    }

    #[test]
    fn delete_missing_key_is_ok() {
        let store = MemoryStore::new();
        store.delete("nope").unwrap();
        assert!(!store.contains("nope").unwrap());
        assert!(store.is_empty());
    }
}
