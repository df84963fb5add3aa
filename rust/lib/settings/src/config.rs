use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::backup::CONNECT_TIMEOUT;
use crate::error::SettingsError;
use crate::paths;

/// Settings store configuration.
///
/// Loaded from a TOML file; `settingsctl` flags override individual fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsConfig {
    /// Directory holding the settings database.
    pub data_dir: Option<PathBuf>,

    /// Path to the redb database file.
    /// Defaults to `{data_dir}/settings.redb` if not specified.
    pub db_path: Option<PathBuf>,

    /// Content authority the provider answers to.
    pub authority: String,

    /// Deadline for connecting to the backup service.
    pub backup_connect_timeout_secs: u64,
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            db_path: None,
            authority: paths::DEFAULT_AUTHORITY.to_string(),
            backup_connect_timeout_secs: CONNECT_TIMEOUT.as_secs(),
        }
    }
}

impl SettingsConfig {
    /// Load config from disk, or return default if the file doesn't exist.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| SettingsError::Config(format!("{}: {}", path.display(), e)))?;
        toml::from_str(&content)
            .map_err(|e| SettingsError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let io = |e: std::io::Error| SettingsError::Config(format!("{}: {}", path.display(), e));
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| SettingsError::Config(e.to_string()))?;
        std::fs::write(path, content).map_err(io)
    }

    /// Resolve the redb database path, falling back to `{data_dir}/settings.redb`.
    pub fn resolve_db_path(&self) -> PathBuf {
        self.db_path.clone().unwrap_or_else(|| {
            self.data_dir
                .as_ref()
                .map(|d| d.join("settings.redb"))
                .unwrap_or_else(|| PathBuf::from("settings.redb"))
        })
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.backup_connect_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_defaults() {
        let config = SettingsConfig {
            data_dir: Some(PathBuf::from("/data")),
            ..Default::default()
        };
        assert_eq!(config.resolve_db_path(), PathBuf::from("/data/settings.redb"));
        assert_eq!(SettingsConfig::default().resolve_db_path(), PathBuf::from("settings.redb"));
        assert_eq!(SettingsConfig::default().connect_timeout(), CONNECT_TIMEOUT);
    }

    #[test]
    fn test_load_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf/settings.toml");
        assert_eq!(SettingsConfig::load(&path).unwrap(), SettingsConfig::default());

        let config = SettingsConfig {
            db_path: Some(PathBuf::from("/var/wear/s.redb")),
            backup_connect_timeout_secs: 30,
            ..Default::default()
        };
        config.save(&path).unwrap();
        assert_eq!(SettingsConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "authority = \"x.y\"\n").unwrap();
        let config = SettingsConfig::load(&path).unwrap();
        assert_eq!(config.authority, "x.y");
        assert_eq!(config.backup_connect_timeout_secs, 10);
    }
}
