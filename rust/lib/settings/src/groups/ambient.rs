//! Ambient (always-on) display.
//!
//! `ambient_enabled` lives in the host settings table and is mirrored to a
//! system property so early boot code can read it. The remaining rows are a
//! plain declarative set.

use std::sync::Arc;

use tracing::info;

use crate::batch::Preferences;
use crate::error::SettingsError;
use crate::group::ComputedGroup;
use crate::host::{HostSettings, SystemProperties};
use crate::paths::{self, keys};
use crate::preferences::PreferencesProperties;
use crate::value::{ContentValues, Row};

pub const DOZE_ALWAYS_ON_SETTING: &str = "doze_always_on";
pub const AMBIENT_ENABLED_PROP: &str = "persist.sys.ambient_enabled";
/// Product default used while the host setting is unset.
pub const AMBIENT_DEFAULT_PROP: &str = "ro.ambient.default_enabled";
pub const LOW_BIT_PROP: &str = "ro.ambient.low_bit";

pub struct AmbientGroup {
    settings: Arc<dyn HostSettings>,
    props: Arc<dyn SystemProperties>,
    extras: PreferencesProperties,
}

impl AmbientGroup {
    pub fn new(
        prefs: Preferences,
        settings: Arc<dyn HostSettings>,
        props: Arc<dyn SystemProperties>,
    ) -> Self {
        let extras = PreferencesProperties::new(paths::AMBIENT, prefs)
            .add_boolean(keys::AMBIENT_TILT_TO_WAKE, true)
            .add_boolean(keys::AMBIENT_TOUCH_TO_WAKE, false)
            .add_immutable(keys::AMBIENT_LOW_BIT, props.get_bool(LOW_BIT_PROP, false));
        Self {
            settings,
            props,
            extras,
        }
    }

    pub fn enabled(&self) -> Result<bool, SettingsError> {
        match self.settings.get_long(DOZE_ALWAYS_ON_SETTING)? {
            Some(v) => Ok(v != 0),
            None => Ok(self.props.get_bool(AMBIENT_DEFAULT_PROP, true)),
        }
    }

    fn set_enabled(&self, enabled: bool) -> Result<(), SettingsError> {
        self.settings
            .put_long(DOZE_ALWAYS_ON_SETTING, i64::from(enabled))?;
        self.props
            .set(AMBIENT_ENABLED_PROP, if enabled { "1" } else { "0" })?;
        info!("ambient: enabled={}", enabled);
        Ok(())
    }
}

impl ComputedGroup for AmbientGroup {
    fn path(&self) -> &str {
        paths::AMBIENT
    }

    fn query(&self) -> Result<Vec<Row>, SettingsError> {
        let mut rows = vec![Row::new(keys::AMBIENT_ENABLED, self.enabled()?)];
        rows.extend(self.extras.query()?);
        Ok(rows)
    }

    fn update(&self, values: &ContentValues) -> Result<usize, SettingsError> {
        let enabled = values
            .get(keys::AMBIENT_ENABLED)
            .map(|v| {
                v.as_bool().ok_or_else(|| {
                    let key = keys::AMBIENT_ENABLED;
                    SettingsError::invalid(format!("{}: expected bool, got '{}'", key, v))
                })
            })
            .transpose()?;

        // Queue the declarative rows first so an invalid value aborts before
        // the host setting is touched.
        let mut batch = self.extras.prefs().begin_update_batch();
        let mut changed = self.extras.update_in(values, &mut batch)?;

        if let Some(enabled) = enabled {
            if enabled != self.enabled()? {
                self.set_enabled(enabled)?;
                changed += 1;
            }
        }
        batch.commit()?;
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{MemoryHostSettings, MemorySystemProperties};
    use crate::value::{row_value, SettingValue};
    use wear_kv::MemoryStore;

    fn group(
        props: MemorySystemProperties,
    ) -> (AmbientGroup, Arc<MemoryHostSettings>, Arc<MemorySystemProperties>) {
        let settings = Arc::new(MemoryHostSettings::default());
        let props = Arc::new(props);
        let prefs = Preferences::new(Arc::new(MemoryStore::new()), paths::AMBIENT);
        (
            AmbientGroup::new(prefs, settings.clone(), props.clone()),
            settings,
            props,
        )
    }

    #[test]
    fn default_comes_from_product_property() {
        let props = MemorySystemProperties::default().with(AMBIENT_DEFAULT_PROP, "0");
        let (group, _, _) = group(props);
        let rows = group.query().unwrap();
        assert_eq!(row_value(&rows, keys::AMBIENT_ENABLED), Some(&SettingValue::Int(0)));
        assert_eq!(row_value(&rows, keys::AMBIENT_TILT_TO_WAKE), Some(&SettingValue::Int(1)));
        assert_eq!(rows.len(), 4);
    }

    #[test]
    fn enabled_writes_through() {
        let (group, settings, props) = group(MemorySystemProperties::default());
        let off = ContentValues::new().with(keys::AMBIENT_ENABLED, false);

        assert_eq!(group.update(&off).unwrap(), 1);
        assert_eq!(settings.get_long(DOZE_ALWAYS_ON_SETTING).unwrap(), Some(0));
        assert_eq!(props.get(AMBIENT_ENABLED_PROP).as_deref(), Some("0"));
        assert_eq!(group.update(&off).unwrap(), 0);
    }

    #[test]
    fn mixed_update_counts_both_sides() {
        let (group, _, _) = group(MemorySystemProperties::default());
        let values = ContentValues::new()
            .with(keys::AMBIENT_ENABLED, false)
            .with(keys::AMBIENT_TOUCH_TO_WAKE, true)
            .with(keys::AMBIENT_LOW_BIT, true);
        assert_eq!(group.update(&values).unwrap(), 2);
    }

    #[test]
    fn invalid_value_leaves_host_untouched() {
        let (group, settings, _) = group(MemorySystemProperties::default());
        let values = ContentValues::new()
            .with(keys::AMBIENT_ENABLED, false)
            .with(keys::AMBIENT_TILT_TO_WAKE, "maybe");
        assert!(group.update(&values).unwrap_err().is_invalid_argument());
        assert_eq!(settings.get_long(DOZE_ALWAYS_ON_SETTING).unwrap(), None);
    }
}
