//! Host platform services the computed groups read and write through.
//!
//! Each service is a trait so hosts can plug their own implementation; the
//! in-memory versions back tests and the `settingsctl` tool.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, RwLock};

use wear_kv::{KVError, KVStore};

use crate::error::SettingsError;
use crate::value::SettingValue;

fn poisoned<T>(_: T) -> SettingsError {
    SettingsError::Host("host service lock poisoned".to_string())
}

/// Global/secure host settings table (integers by name).
pub trait HostSettings: Send + Sync {
    fn get_long(&self, name: &str) -> Result<Option<i64>, SettingsError>;
    fn put_long(&self, name: &str, value: i64) -> Result<(), SettingsError>;
}

/// Read/write access to system properties (`ro.*` read-only by convention).
pub trait SystemProperties: Send + Sync {
    fn get(&self, name: &str) -> Option<String>;
    fn set(&self, name: &str, value: &str) -> Result<(), SettingsError>;

    fn get_bool(&self, name: &str, default: bool) -> bool {
        match self.get(name).as_deref() {
            Some("1") | Some("true") | Some("y") | Some("yes") | Some("on") => true,
            Some("0") | Some("false") | Some("n") | Some("no") | Some("off") => false,
            _ => default,
        }
    }

    fn get_int(&self, name: &str, default: i32) -> i32 {
        self.get(name)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }
}

/// Secondary feature-flag service consulted by lazy defaults.
pub trait FeatureFlags: Send + Sync {
    fn is_enabled(&self, feature: &str) -> bool;
}

/// A notification channel as reported by the notification backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationChannel {
    pub id: String,
    pub importance: i32,
}

/// External notification backend owning channel importance.
pub trait NotificationBackend: Send + Sync {
    fn channels(&self) -> Result<Vec<NotificationChannel>, SettingsError>;
    fn set_importance(&self, channel_id: &str, importance: i32) -> Result<(), SettingsError>;
}

/// Bundle of host services handed to the registry builder.
#[derive(Clone)]
pub struct HostServices {
    pub settings: Arc<dyn HostSettings>,
    pub system_properties: Arc<dyn SystemProperties>,
    pub features: Arc<dyn FeatureFlags>,
    pub notifications: Arc<dyn NotificationBackend>,
}

impl HostServices {
    /// All-in-memory host, empty state.
    pub fn in_memory() -> Self {
        Self {
            settings: Arc::new(MemoryHostSettings::default()),
            system_properties: Arc::new(MemorySystemProperties::default()),
            features: Arc::new(StaticFeatureFlags::default()),
            notifications: Arc::new(MemoryNotificationBackend::default()),
        }
    }
}

#[derive(Default)]
pub struct MemoryHostSettings {
    longs: RwLock<HashMap<String, i64>>,
}

impl HostSettings for MemoryHostSettings {
    fn get_long(&self, name: &str) -> Result<Option<i64>, SettingsError> {
        Ok(self.longs.read().map_err(poisoned)?.get(name).copied())
    }

    fn put_long(&self, name: &str, value: i64) -> Result<(), SettingsError> {
        self.longs
            .write()
            .map_err(poisoned)?
            .insert(name.to_string(), value);
        Ok(())
    }
}

/// Host settings persisted in the settings KV store under `host:{name}`.
pub struct KvHostSettings {
    kv: Arc<dyn KVStore>,
}

impl KvHostSettings {
    pub fn new(kv: Arc<dyn KVStore>) -> Self {
        Self { kv }
    }

    fn get_value(&self, name: &str) -> Result<Option<SettingValue>, SettingsError> {
        let key = format!("host:{}", name);
        match self.kv.get(&key)? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| KVError::Corrupt { key, reason: e.to_string() }.into()),
            None => Ok(None),
        }
    }

    fn put_value(&self, name: &str, value: SettingValue) -> Result<(), SettingsError> {
        let bytes = serde_json::to_vec(&value).map_err(|e| SettingsError::Host(e.to_string()))?;
        Ok(self.kv.set(&format!("host:{}", name), &bytes)?)
    }
}

impl HostSettings for KvHostSettings {
    fn get_long(&self, name: &str) -> Result<Option<i64>, SettingsError> {
        Ok(self.get_value(name)?.and_then(|v| v.as_long()))
    }

    fn put_long(&self, name: &str, value: i64) -> Result<(), SettingsError> {
        self.put_value(name, SettingValue::Long(value))
    }
}

#[derive(Default)]
pub struct MemorySystemProperties {
    props: RwLock<HashMap<String, String>>,
}

impl MemorySystemProperties {
    pub fn with(self, name: &str, value: &str) -> Self {
        if let Ok(mut props) = self.props.write() {
            props.insert(name.to_string(), value.to_string());
        }
        self
    }
}

impl SystemProperties for MemorySystemProperties {
    fn get(&self, name: &str) -> Option<String> {
        self.props.read().ok()?.get(name).cloned()
    }

    fn set(&self, name: &str, value: &str) -> Result<(), SettingsError> {
        self.props
            .write()
            .map_err(poisoned)?
            .insert(name.to_string(), value.to_string());
        Ok(())
    }
}

/// Feature flags fixed at construction.
#[derive(Debug, Default, Clone)]
pub struct StaticFeatureFlags {
    enabled: HashSet<String>,
}

impl StaticFeatureFlags {
    pub fn new<I, S>(features: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            enabled: features.into_iter().map(Into::into).collect(),
        }
    }
}

impl FeatureFlags for StaticFeatureFlags {
    fn is_enabled(&self, feature: &str) -> bool {
        self.enabled.contains(feature)
    }
}

/// Channel table kept in memory, ordered by channel id.
#[derive(Default)]
pub struct MemoryNotificationBackend {
    channels: RwLock<BTreeMap<String, i32>>,
}

impl MemoryNotificationBackend {
    pub fn with_channel(self, id: &str, importance: i32) -> Self {
        if let Ok(mut channels) = self.channels.write() {
            channels.insert(id.to_string(), importance);
        }
        self
    }
}

impl NotificationBackend for MemoryNotificationBackend {
    fn channels(&self) -> Result<Vec<NotificationChannel>, SettingsError> {
        Ok(self
            .channels
            .read()
            .map_err(poisoned)?
            .iter()
            .map(|(id, importance)| NotificationChannel {
                id: id.clone(),
                importance: *importance,
            })
            .collect())
    }

    fn set_importance(&self, channel_id: &str, importance: i32) -> Result<(), SettingsError> {
        let mut channels = self.channels.write().map_err(poisoned)?;
        match channels.get_mut(channel_id) {
            Some(slot) => {
                *slot = importance;
                Ok(())
            }
            None => Err(SettingsError::Host(format!(
                "unknown notification channel {}",
                channel_id
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_property_parsing() {
        let props = MemorySystemProperties::default()
            .with("ro.flag", "yes")
            .with("ro.num", " 12 ")
            .with("ro.bad", "twelve");
        assert!(props.get_bool("ro.flag", false));
        assert!(props.get_bool("ro.missing", true));
        assert_eq!(props.get_int("ro.num", 0), 12);
        assert_eq!(props.get_int("ro.bad", 3), 3);
    }

    #[test]
    fn notification_backend_rejects_unknown_channel() {
        let backend = MemoryNotificationBackend::default().with_channel("calls", 4);
        backend.set_importance("calls", 2).unwrap();
        assert_eq!(backend.channels().unwrap()[0].importance, 2);
        assert!(backend.set_importance("nope", 1).is_err());
    }

    #[test]
    fn kv_host_settings_persist() {
        let kv: Arc<dyn KVStore> = Arc::new(wear_kv::MemoryStore::new());
        KvHostSettings::new(Arc::clone(&kv)).put_long("doze_always_on", 0).unwrap();
        let reopened = KvHostSettings::new(kv);
        assert_eq!(reopened.get_long("doze_always_on").unwrap(), Some(0));
        assert_eq!(reopened.get_long("missing").unwrap(), None);
    }

    #[test]
    fn host_settings_round_trip() {
        let settings = MemoryHostSettings::default();
        assert_eq!(settings.get_long("x").unwrap(), None);
        settings.put_long("x", 5).unwrap();
        settings.put_long("x", 6).unwrap();
        assert_eq!(settings.get_long("x").unwrap(), Some(6));
    }
}
