use std::time::Duration;

use thiserror::Error;
use wear_kv::KVError;

/// Errors surfaced by property, group and dispatcher operations.
///
/// `InvalidArgument` and `Unsupported` reach direct callers of `update`.
/// Restore passes turn both into skipped keys instead of failing.
#[derive(Error, Debug)]
pub enum SettingsError {
    /// Wrong-typed, absent or out-of-range value for a key.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Mutation of an immutable property or group.
    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error(transparent)]
    Storage(#[from] KVError),

    /// Backup blob could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(String),

    /// A host service (notification backend, global settings) failed.
    #[error("host error: {0}")]
    Host(String),

    #[error("config error: {0}")]
    Config(String),
}

impl SettingsError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        SettingsError::InvalidArgument(msg.into())
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        SettingsError::Unsupported(msg.into())
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, SettingsError::Unsupported(_))
    }

    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, SettingsError::InvalidArgument(_))
    }
}

/// Errors that abort a backup or restore pass.
#[derive(Error, Debug)]
pub enum BackupError {
    #[error("backup service did not connect within {0:?}")]
    ConnectTimeout(Duration),

    #[error("backup service connection failed: {0}")]
    Connect(String),

    #[error("backup transport: {0}")]
    Transport(#[from] std::io::Error),

    #[error(transparent)]
    Settings(#[from] SettingsError),
}
