//! Backup orchestration: framed transport, service handshake and the agent
//! that drives backup and restore passes.

pub mod agent;
pub mod service;
pub mod transport;

pub use agent::{BackupOutcome, RestoreSummary, SettingsBackupAgent, CONNECT_TIMEOUT};
pub use service::{BackupConnector, BackupService, BoxFuture, LocalBackupService, LocalConnector};
pub use transport::{BackupDataInput, BackupDataOutput, StreamBackupInput, StreamBackupOutput};
