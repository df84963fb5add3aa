//! Typed settings registry for a wearable device.
//!
//! Settings are grouped under stable paths and addressed as
//! `content://{authority}/{path}`. Each group is either a declarative set of
//! typed, defaulted [`Property`] cells stored in a named [`Preferences`]
//! namespace, or a [`ComputedGroup`] with its own rules. The
//! [`SettingsProvider`] routes queries and updates, tracks whether a backup
//! is pending, and notifies observers. The [`backup`] module snapshots every
//! group into a framed archive and restores it, key by key, best-effort.
//!
//! ```ignore
//! let kv: Arc<dyn KVStore> = Arc::new(RedbStore::open(&config.resolve_db_path())?);
//! let bus = SignalBus::new();
//! let provider = SettingsProvider::new(
//!     &config.authority,
//!     PropertiesMap::factory(kv, HostServices::in_memory()),
//!     &bus,
//! );
//! provider.update(&provider.uri_for(paths::WIFI), &ContentValues::new().with("auto_wifi", 0))?;
//! ```

pub mod backup;
pub mod batch;
pub mod codec;
pub mod config;
pub mod error;
pub mod group;
pub mod groups;
pub mod host;
pub mod matcher;
pub mod observer;
pub mod paths;
pub mod preferences;
pub mod property;
pub mod provider;
pub mod registry;
pub mod signal;
pub mod value;

pub use backup::{BackupOutcome, RestoreSummary, SettingsBackupAgent};
pub use batch::{Preferences, WriteBatch};
pub use config::SettingsConfig;
pub use error::{BackupError, SettingsError};
pub use group::{ComputedGroup, KeyOutcome, PropertyGroup, RestoreReport};
pub use host::HostServices;
pub use observer::{ContentObservers, ObserverId};
pub use preferences::PreferencesProperties;
pub use property::{Property, PropertyKind};
pub use provider::{DirtyFlag, Resolution, SettingsProvider};
pub use registry::{PropertiesMap, RegistryFactory};
pub use signal::{Signal, SignalBus, BACKUP_PERMISSION};
pub use value::{ContentValues, Row, SettingValue, COLUMNS};
