//! The path → group registry and the watch's group catalog.

use std::collections::HashMap;
use std::sync::Arc;

use wear_kv::KVStore;

use crate::batch::Preferences;
use crate::group::PropertyGroup;
use crate::groups::{
    AmbientGroup, BluetoothGroup, DeviceInfoGroup, NotificationChannelsGroup, OemSetupGroup,
};
use crate::host::HostServices;
use crate::paths::{self, keys};
use crate::preferences::PreferencesProperties;

/// Rebuilds a registry from scratch. Used after a restore so every group
/// re-reads its backing stores.
pub type RegistryFactory = Arc<dyn Fn() -> PropertiesMap + Send + Sync>;

pub const FEATURE_SMART_REPLY: &str = "smart_reply";
pub const FEATURE_SMART_ILLUSTRATIONS: &str = "smart_illustrations";
pub const FEATURE_EXERCISE_DETECTION: &str = "exercise_detection";

/// Groups in registration order, addressable by path.
#[derive(Debug, Default)]
pub struct PropertiesMap {
    groups: Vec<PropertyGroup>,
    index: HashMap<String, usize>,
}

impl PropertiesMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a group. Panics if its path is already registered.
    pub fn register(&mut self, group: impl Into<PropertyGroup>) {
        let group = group.into();
        let path = group.path().to_string();
        assert!(
            !self.index.contains_key(&path),
            "duplicate property group path '{}'",
            path
        );
        self.index.insert(path, self.groups.len());
        self.groups.push(group);
    }

    pub fn with(mut self, group: impl Into<PropertyGroup>) -> Self {
        self.register(group);
        self
    }

    pub fn get(&self, path: &str) -> Option<&PropertyGroup> {
        self.index.get(path).map(|&i| &self.groups[i])
    }

    pub(crate) fn get_index(&self, index: usize) -> Option<&PropertyGroup> {
        self.groups.get(index)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.index.contains_key(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PropertyGroup> {
        self.groups.iter()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|g| g.path())
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// The full catalog over `kv` and the host services.
    pub fn build(kv: &Arc<dyn KVStore>, host: &HostServices) -> Self {
        let prefs = |path: &str| Preferences::new(Arc::clone(kv), path);
        let props = &host.system_properties;

        let smart_reply = Arc::clone(&host.features);
        let smart_illustrations = Arc::clone(&host.features);
        let exercise = Arc::clone(&host.features);

        PropertiesMap::new()
            .with(PropertyGroup::computed(BluetoothGroup::new(
                prefs(paths::BLUETOOTH),
                Arc::clone(&host.settings),
            )))
            .with(PropertyGroup::computed(AmbientGroup::new(
                prefs(paths::AMBIENT),
                Arc::clone(&host.settings),
                Arc::clone(props),
            )))
            .with(PropertyGroup::computed(OemSetupGroup::new(
                prefs(paths::OEM_SETUP),
                Arc::clone(props),
            )))
            .with(PropertyGroup::computed(NotificationChannelsGroup::new(
                Arc::clone(&host.notifications),
            )))
            .with(PropertyGroup::computed(DeviceInfoGroup::new(Arc::clone(props))))
            .with(
                PreferencesProperties::new(paths::DISPLAY, prefs(paths::DISPLAY))
                    .add_string(keys::BRIGHTNESS_LEVELS, None)
                    .add_boolean(keys::SMART_ILLUMINATION, true),
            )
            .with(
                PreferencesProperties::new(paths::GESTURES, prefs(paths::GESTURES))
                    .add_boolean(keys::TILT_TO_WAKE, true)
                    .add_boolean("wrist_gestures_enabled", true)
                    .add_int("wrist_gesture_mode", 0, &[0, 1]),
            )
            .with(
                PreferencesProperties::new(paths::WIFI, prefs(paths::WIFI))
                    .add_int(keys::AUTO_WIFI, 1, &[0, 1])
                    .add_int(keys::WIFI_POWER_SAVE, 0, &[0, 1, 2]),
            )
            .with(
                PreferencesProperties::new(paths::TIME, prefs(paths::TIME))
                    .add_boolean("clock_24h", false)
                    .add_int("auto_time", 1, &[0, 1, 2])
                    .add_int("auto_time_zone", 1, &[0, 1, 2]),
            )
            .with(
                PreferencesProperties::new(paths::BATTERY_SAVER, prefs(paths::BATTERY_SAVER))
                    .add_int("battery_saver_mode", 0, &[0, 1, 2])
                    .add_boolean("battery_saver_tilt_to_wake", false),
            )
            .with(
                PreferencesProperties::new(paths::SMART_REPLIES, prefs(paths::SMART_REPLIES))
                    .add_boolean_with(keys::SMART_REPLIES_ENABLED, move || {
                        smart_reply.is_enabled(FEATURE_SMART_REPLY)
                    })
                    .add_boolean_with("smart_illustrations_enabled", move || {
                        smart_illustrations.is_enabled(FEATURE_SMART_ILLUSTRATIONS)
                    }),
            )
            .with(
                PreferencesProperties::new(paths::FITNESS, prefs(paths::FITNESS))
                    .add_boolean_with("exercise_detection_enabled", move || {
                        exercise.is_enabled(FEATURE_EXERCISE_DETECTION)
                    })
                    .add_long("last_exercise_time", 0),
            )
            .with(
                PreferencesProperties::new(paths::SETUP, prefs(paths::SETUP))
                    .add_boolean(keys::SETUP_COMPLETE, false)
                    .add_string(keys::SETUP_LOCALE, None)
                    .add_boolean("setup_skipped", false),
            )
            .with(
                PreferencesProperties::new(paths::COMPANION, prefs(paths::COMPANION))
                    .add_int("paired_device_os_type", 0, &[0, 1, 2])
                    .add_string("companion_package", None),
            )
            .with(
                PreferencesProperties::new(paths::CAPABILITIES, prefs(paths::CAPABILITIES))
                    .add_immutable(keys::HAS_SPEAKER, props.get_bool("ro.hardware.speaker", false))
                    .add_immutable("has_lte", props.get_bool("ro.telephony.lte", false))
                    .add_immutable("has_ambient", props.get_bool("ro.ambient.supported", true)),
            )
            .with(
                PreferencesProperties::new(paths::RETAIL, prefs(paths::RETAIL))
                    .add_int("retail_mode", 0, &[0, 1]),
            )
    }

    /// A factory that calls [`PropertiesMap::build`] over the same stores.
    pub fn factory(kv: Arc<dyn KVStore>, host: HostServices) -> RegistryFactory {
        Arc::new(move || PropertiesMap::build(&kv, &host))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;
    use crate::groups::bluetooth::{CALL_TWINNING_SETTING, DISABLED_PROFILES_SETTING};
    use crate::host::{
        HostSettings, MemoryHostSettings, MemoryNotificationBackend, MemorySystemProperties,
        StaticFeatureFlags,
    };
    use crate::value::{row_value, ContentValues, SettingValue};
    use wear_kv::MemoryStore;

    fn host() -> HostServices {
        HostServices {
            settings: Arc::new(MemoryHostSettings::default()),
            system_properties: Arc::new(
                MemorySystemProperties::default().with("ro.hardware.speaker", "1"),
            ),
            features: Arc::new(StaticFeatureFlags::new([FEATURE_SMART_REPLY])),
            notifications: Arc::new(MemoryNotificationBackend::default().with_channel("calls", 4)),
        }
    }

    #[test]
    fn catalog_paths_are_unique_and_ordered() {
        let kv: Arc<dyn KVStore> = Arc::new(MemoryStore::new());
        let map = PropertiesMap::build(&kv, &host());
        let paths: Vec<&str> = map.paths().collect();
        assert_eq!(paths[0], paths::BLUETOOTH);
        assert_eq!(paths.len(), 16);
        assert!(map.contains(paths::RETAIL));
        assert!(!map.contains(paths::BLUETOOTH_MODE));
    }

    #[test]
    #[should_panic(expected = "duplicate property group path")]
    fn duplicate_path_panics() {
        let kv: Arc<dyn KVStore> = Arc::new(MemoryStore::new());
        let prefs = Preferences::new(kv, "x");
        PropertiesMap::new()
            .with(PreferencesProperties::new("wifi", prefs.clone()))
            .with(PreferencesProperties::new("wifi", prefs));
    }

    #[test]
    fn suppliers_read_feature_flags() {
        let kv: Arc<dyn KVStore> = Arc::new(MemoryStore::new());
        let map = PropertiesMap::build(&kv, &host());
        let rows = map.get(paths::SMART_REPLIES).unwrap().query().unwrap();
        assert_eq!(row_value(&rows, keys::SMART_REPLIES_ENABLED), Some(&SettingValue::Int(1)));
        assert_eq!(row_value(&rows, "smart_illustrations_enabled"), Some(&SettingValue::Int(0)));

        let caps = map.get(paths::CAPABILITIES).unwrap().query().unwrap();
        assert_eq!(row_value(&caps, keys::HAS_SPEAKER), Some(&SettingValue::Int(1)));
    }

    #[test]
    fn rebuild_sees_the_same_state() {
        let kv: Arc<dyn KVStore> = Arc::new(MemoryStore::new());
        let factory = PropertiesMap::factory(Arc::clone(&kv), host());

        let first = factory();
        let values = ContentValues::new().with(keys::AUTO_WIFI, 0);
        assert_eq!(first.get(paths::WIFI).unwrap().update(&values).unwrap(), 1);

        let second = factory();
        assert_eq!(second.len(), first.len());
        for group in first.iter() {
            let rebuilt = second.get(group.path()).unwrap();
            assert_eq!(group.query().unwrap(), rebuilt.query().unwrap());
        }
    }

    fn assert_round_trip_is_stable(twinning: bool) {
        let kv: Arc<dyn KVStore> = Arc::new(MemoryStore::new());
        let settings = Arc::new(MemoryHostSettings::default());
        if twinning {
            settings.put_long(CALL_TWINNING_SETTING, 1).unwrap();
        }
        let host = HostServices {
            settings: settings.clone(),
            ..host()
        };
        let map = PropertiesMap::build(&kv, &host);
        let bluetooth = ContentValues::new()
            .with(keys::COMPANION_ADDRESS, "00:11:22:33:44:55")
            .with(keys::BLUETOOTH_MODE, 1);
        assert_eq!(map.get(paths::BLUETOOTH).unwrap().update(&bluetooth).unwrap(), 2);

        for pass in 0..2 {
            for group in map.iter() {
                let before = group.query().unwrap();
                let report = codec::restore(group, &codec::serialize(group).unwrap());
                let context = format!("{} (twinning={})", group.path(), twinning);
                assert_eq!(group.query().unwrap(), before, "{}", context);
                // The stored OEM version is written on its first restore.
                if pass > 0 || group.path() != paths::OEM_SETUP {
                    assert_eq!(report.changed(), 0, "{}", context);
                }
            }
        }
        assert_eq!(settings.get_long(DISABLED_PROFILES_SETTING).unwrap(), None);
    }

    #[test]
    fn every_group_survives_its_own_backup() {
        assert_round_trip_is_stable(false);
        assert_round_trip_is_stable(true);
    }
}
