use std::path::Path;
use std::sync::Arc;

use redb::{Database, TableDefinition};
use tracing::debug;

use crate::error::KVError;
use crate::traits::{KVStore, WriteOp};

const TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("settings");

/// RedbStore is a KVStore implementation backed by redb, a pure-Rust embedded
/// key-value database. Every `write` is one redb write transaction, so a
/// batch of settings mutations commits or rolls back as a unit.
pub struct RedbStore {
    db: Arc<Database>,
}

impl RedbStore {
    /// Open or create a redb database at the given path.
    pub fn open(path: &Path) -> Result<Self, KVError> {
        let db = Database::create(path).map_err(KVError::storage)?;

        // Ensure the table exists so readers never see a missing table.
        let write_txn = db.begin_write().map_err(KVError::storage)?;
        {
            let _table = write_txn.open_table(TABLE).map_err(KVError::storage)?;
        }
        write_txn.commit().map_err(KVError::storage)?;

        debug!("RedbStore: opened {:?}", path);
        Ok(Self { db: Arc::new(db) })
    }
}

impl KVStore for RedbStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KVError> {
        let read_txn = self.db.begin_read().map_err(KVError::storage)?;
        let table = read_txn.open_table(TABLE).map_err(KVError::storage)?;

        let value = table.get(key).map_err(KVError::storage)?;
        Ok(value.map(|v| v.value().to_vec()))
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), KVError> {
        self.write(&[WriteOp::Put {
            key: key.to_string(),
            value: value.to_vec(),
        }])
    }

    fn delete(&self, key: &str) -> Result<(), KVError> {
        self.write(&[WriteOp::Delete {
            key: key.to_string(),
        }])
    }

    fn write(&self, ops: &[WriteOp]) -> Result<(), KVError> {
        if ops.is_empty() {
            return Ok(());
        }
        let write_txn = self.db.begin_write().map_err(KVError::storage)?;
        {
            let mut table = write_txn.open_table(TABLE).map_err(KVError::storage)?;
            for op in ops {
                match op {
                    WriteOp::Put { key, value } => {
                        table
                            .insert(key.as_str(), value.as_slice())
                            .map_err(KVError::storage)?;
                    }
                    WriteOp::Delete { key } => {
                        table.remove(key.as_str()).map_err(KVError::storage)?;
                    }
                }
            }
        }
        // Dropping an uncommitted transaction aborts it, so an early return
        // above leaves the table untouched.
        write_txn.commit().map_err(KVError::storage)?;
        Ok(())
    }

    fn scan(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, KVError> {
        let read_txn = self.db.begin_read().map_err(KVError::storage)?;
        let table = read_txn.open_table(TABLE).map_err(KVError::storage)?;

        let mut results = Vec::new();
        for entry in table.range(prefix..).map_err(KVError::storage)? {
            let (key, value) = entry.map_err(KVError::storage)?;
            let key = key.value().to_string();
            if !key.starts_with(prefix) {
                break;
            }
            results.push((key, value.value().to_vec()));
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_temp() -> (tempfile::TempDir, RedbStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = RedbStore::open(&dir.path().join("settings.redb")).unwrap();
        (dir, store)
    }

    #[test]
    fn set_get_delete() {
        let (_dir, store) = open_temp();
        assert_eq!(store.get("prefs:a:x").unwrap(), None);

        store.set("prefs:a:x", b"true").unwrap();
        assert_eq!(store.get("prefs:a:x").unwrap(), Some(b"true".to_vec()));
        assert!(store.contains("prefs:a:x").unwrap());

        store.delete("prefs:a:x").unwrap();
        assert_eq!(store.get("prefs:a:x").unwrap(), None);
    }

    #[test]
    fn write_applies_ops_in_order() {
        let (_dir, store) = open_temp();
        store
            .write(&[
                WriteOp::Put { key: "k".into(), value: b"1".to_vec() },
                WriteOp::Put { key: "k".into(), value: b"2".to_vec() },
                WriteOp::Put { key: "gone".into(), value: b"x".to_vec() },
                WriteOp::Delete { key: "gone".into() },
            ])
            .unwrap();

        assert_eq!(store.get("k").unwrap(), Some(b"2".to_vec()));
        assert_eq!(store.get("gone").unwrap(), None);
    }

    #[test]
    fn scan_stops_at_prefix_boundary() {
        let (_dir, store) = open_temp();
        store.set("prefs:a:1", b"1").unwrap();
        store.set("prefs:a:2", b"2").unwrap();
        store.set("prefs:b:1", b"3").unwrap();

        let keys: Vec<String> = store
            .scan("prefs:a:")
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec!["prefs:a:1", "prefs:a:2"]);
    }

    #[test]
    fn data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.redb");
        {
            let store = RedbStore::open(&path).unwrap();
            store.set("prefs:a:x", b"42").unwrap();
        }
        let store = RedbStore::open(&path).unwrap();
        assert_eq!(store.get("prefs:a:x").unwrap(), Some(b"42".to_vec()));
    }
}
