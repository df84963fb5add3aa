//! Backup and restore passes.
//!
//! A backup pass asks the provider whether anything changed since the last
//! pass, connects to the backup service within [`CONNECT_TIMEOUT`], writes
//! one frame per group in registry order and broadcasts completion so the
//! provider can clear its dirty flag up to the generation the pass started
//! from. A restore pass replays frames into the service and, once at least
//! one group was applied, broadcasts completion so the provider rebuilds its
//! registry.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::service::{BackupConnector, BackupService};
use super::transport::{BackupDataInput, BackupDataOutput};
use crate::error::BackupError;
use crate::paths::{self, keys};
use crate::provider::SettingsProvider;
use crate::signal::{Signal, SignalBus, BACKUP_PERMISSION};
use crate::value::row_value;

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Result of a backup pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupOutcome {
    /// Nothing changed since the last pass; no connection was made.
    Clean,
    Written { groups: usize },
}

/// Result of a restore pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreSummary {
    pub groups: usize,
    pub changed: usize,
    pub unknown_paths: Vec<String>,
}

pub struct SettingsBackupAgent {
    provider: Arc<SettingsProvider>,
    connector: Arc<dyn BackupConnector>,
    bus: Arc<SignalBus>,
    connect_timeout: Duration,
}

impl SettingsBackupAgent {
    pub fn new(
        provider: Arc<SettingsProvider>,
        connector: Arc<dyn BackupConnector>,
        bus: Arc<SignalBus>,
    ) -> Self {
        Self {
            provider,
            connector,
            bus,
            connect_timeout: CONNECT_TIMEOUT,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    fn needs_backup(&self) -> Result<bool, BackupError> {
        let rows = self
            .provider
            .query(&self.provider.uri_for(paths::NEEDS_BACKUP))?
            .unwrap_or_default();
        Ok(row_value(&rows, keys::NEEDS_BACKUP).and_then(|v| v.as_int()) == Some(1))
    }

    async fn connect(&self) -> Result<Arc<dyn BackupService>, BackupError> {
        match tokio::time::timeout(self.connect_timeout, self.connector.connect()).await {
            Ok(service) => service,
            Err(_) => {
                warn!("backup service did not connect within {:?}", self.connect_timeout);
                Err(BackupError::ConnectTimeout(self.connect_timeout))
            }
        }
    }

    pub async fn on_backup(
        &self,
        out: &mut dyn BackupDataOutput,
    ) -> Result<BackupOutcome, BackupError> {
        let generation = self.provider.dirty_flag().generation();
        if !self.needs_backup()? {
            debug!("backup: settings unchanged, skipping");
            return Ok(BackupOutcome::Clean);
        }

        let service = self.connect().await?;
        let written = write_groups(&self.provider, service.as_ref(), out);
        service.disconnect();
        let groups = written?;

        self.bus.send(Signal::BackupComplete { generation }, BACKUP_PERMISSION);
        info!("backup: wrote {} group(s) at generation {}", groups, generation);
        Ok(BackupOutcome::Written { groups })
    }

    pub async fn on_restore(
        &self,
        input: &mut dyn BackupDataInput,
    ) -> Result<RestoreSummary, BackupError> {
        let service = self.connect().await?;
        let mut summary = RestoreSummary::default();
        let read = read_groups(service.as_ref(), input, &mut summary);
        service.disconnect();

        if summary.groups > 0 {
            self.bus.send(Signal::RestoreComplete, BACKUP_PERMISSION);
        }
        if let Err(e) = read {
            warn!("restore: stopped after {} group(s): {}", summary.groups, e);
            return Err(e);
        }
        info!(
            "restore: {} group(s), {} row(s) changed, {} unknown",
            summary.groups,
            summary.changed,
            summary.unknown_paths.len()
        );
        Ok(summary)
    }

    /// Run [`on_backup`](Self::on_backup) on its own task. The output is
    /// handed back with the outcome.
    pub fn spawn_backup<O>(
        self: &Arc<Self>,
        mut out: O,
    ) -> JoinHandle<Result<(BackupOutcome, O), BackupError>>
    where
        O: BackupDataOutput + 'static,
    {
        let agent = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = agent.on_backup(&mut out).await?;
            Ok((outcome, out))
        })
    }

    pub fn spawn_restore<I>(
        self: &Arc<Self>,
        mut input: I,
    ) -> JoinHandle<Result<RestoreSummary, BackupError>>
    where
        I: BackupDataInput + 'static,
    {
        let agent = Arc::clone(self);
        tokio::spawn(async move { agent.on_restore(&mut input).await })
    }
}

fn write_groups(
    provider: &SettingsProvider,
    service: &dyn BackupService,
    out: &mut dyn BackupDataOutput,
) -> Result<usize, BackupError> {
    let registry = provider.registry();
    let mut groups = 0;
    for path in registry.paths() {
        let Some(blob) = service.serialize(path)? else {
            warn!("backup: service has no group at {}", path);
            continue;
        };
        out.write_entity(path, &blob)?;
        groups += 1;
    }
    Ok(groups)
}

/// Apply frames until the input runs out. `summary` keeps the progress made
/// before any error.
fn read_groups(
    service: &dyn BackupService,
    input: &mut dyn BackupDataInput,
    summary: &mut RestoreSummary,
) -> Result<(), BackupError> {
    while let Some((path, blob)) = input.next_entity()? {
        match service.restore(&path, &blob) {
            Some(report) => {
                summary.groups += 1;
                summary.changed += report.changed();
            }
            None => {
                warn!("restore: skipping unknown path {}", path);
                summary.unknown_paths.push(path);
            }
        }
    }
    Ok(())
}
