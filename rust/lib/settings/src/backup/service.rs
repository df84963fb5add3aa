//! The service side of the backup handshake.
//!
//! The agent connects to a [`BackupService`] through a [`BackupConnector`];
//! the local implementation talks straight to an in-process provider.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::codec;
use crate::error::{BackupError, SettingsError};
use crate::group::RestoreReport;
use crate::provider::SettingsProvider;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Per-path serialize/restore entry points.
pub trait BackupService: Send + Sync {
    /// Blob for `path`, or `None` if no group is registered there.
    fn serialize(&self, path: &str) -> Result<Option<Vec<u8>>, SettingsError>;

    /// Apply a blob to `path`. Returns `None` if no group is registered there.
    fn restore(&self, path: &str, blob: &[u8]) -> Option<RestoreReport>;

    fn disconnect(&self);
}

/// Establishes a [`BackupService`] connection.
pub trait BackupConnector: Send + Sync {
    fn connect(&self) -> BoxFuture<'_, Result<Arc<dyn BackupService>, BackupError>>;
}

/// [`BackupService`] over an in-process provider.
pub struct LocalBackupService {
    provider: Arc<SettingsProvider>,
    connected: AtomicBool,
}

impl LocalBackupService {
    pub fn new(provider: Arc<SettingsProvider>) -> Self {
        Self {
            provider,
            connected: AtomicBool::new(true),
        }
    }
}

impl BackupService for LocalBackupService {
    fn serialize(&self, path: &str) -> Result<Option<Vec<u8>>, SettingsError> {
        let registry = self.provider.registry();
        registry.get(path).map(codec::serialize).transpose()
    }

    fn restore(&self, path: &str, blob: &[u8]) -> Option<RestoreReport> {
        let registry = self.provider.registry();
        let group = registry.get(path)?;
        let report = codec::restore(group, blob);
        for (key, reason) in report.skipped() {
            warn!("restore {}: {} skipped: {}", path, key, reason);
        }
        Some(report)
    }

    fn disconnect(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            debug!("local backup service disconnected");
        }
    }
}

/// Connects immediately to a [`LocalBackupService`].
pub struct LocalConnector {
    provider: Arc<SettingsProvider>,
}

impl LocalConnector {
    pub fn new(provider: Arc<SettingsProvider>) -> Self {
        Self { provider }
    }
}

impl BackupConnector for LocalConnector {
    fn connect(&self) -> BoxFuture<'_, Result<Arc<dyn BackupService>, BackupError>> {
        let provider = Arc::clone(&self.provider);
        Box::pin(async move {
            Ok(Arc::new(LocalBackupService::new(provider)) as Arc<dyn BackupService>)
        })
    }
}
