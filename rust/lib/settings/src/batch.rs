//! Named preference stores over the shared KV backend and the write batch
//! every update call commits through.

use std::fmt;
use std::sync::Arc;

use tracing::debug;
use wear_kv::{KVError, KVStore, WriteOp};

use crate::error::SettingsError;
use crate::value::SettingValue;

/// A named preference store: a key namespace `prefs:{name}:` inside the
/// process-wide [`KVStore`]. Several property sets may share one store.
#[derive(Clone)]
pub struct Preferences {
    kv: Arc<dyn KVStore>,
    name: String,
}

impl fmt::Debug for Preferences {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Preferences").field("name", &self.name).finish()
    }
}

impl Preferences {
    pub fn new(kv: Arc<dyn KVStore>, name: impl Into<String>) -> Self {
        Self {
            kv,
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn storage_key(&self, key: &str) -> String {
        format!("prefs:{}:{}", self.name, key)
    }

    /// Read a stored value. `None` means the key is absent; an explicit
    /// null comes back as `Some(SettingValue::Null)`.
    pub fn get(&self, key: &str) -> Result<Option<SettingValue>, SettingsError> {
        let storage_key = self.storage_key(key);
        match self.kv.get(&storage_key)? {
            Some(bytes) => {
                let value = serde_json::from_slice(&bytes).map_err(|e| KVError::Corrupt {
                    key: storage_key,
                    reason: e.to_string(),
                })?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    pub fn contains(&self, key: &str) -> Result<bool, SettingsError> {
        Ok(self.kv.contains(&self.storage_key(key))?)
    }

    /// Start a write batch. Nothing reaches storage until
    /// [`WriteBatch::commit`].
    pub fn begin_update_batch(&self) -> WriteBatch {
        WriteBatch {
            prefs: self.clone(),
            ops: Vec::new(),
        }
    }
}

/// Deferred writes for one update call, committed once as a single atomic
/// KV write. Dropping a batch without committing discards it.
#[must_use = "a WriteBatch does nothing until committed"]
pub struct WriteBatch {
    prefs: Preferences,
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn put(&mut self, key: &str, value: &SettingValue) -> Result<(), SettingsError> {
        let bytes = serde_json::to_vec(value).map_err(|e| SettingsError::Codec(e.to_string()))?;
        self.ops.push(WriteOp::Put {
            key: self.prefs.storage_key(key),
            value: bytes,
        });
        Ok(())
    }

    /// Number of queued writes.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn commit(self) -> Result<(), SettingsError> {
        if self.ops.is_empty() {
            return Ok(());
        }
        debug!(
            "WriteBatch: committing {} write(s) to prefs:{}",
            self.ops.len(),
            self.prefs.name
        );
        self.prefs.kv.write(&self.ops)?;
        Ok(())
    }
}
