//! OEM setup wizard versioning.
//!
//! The device image advertises the latest OEM setup version. The stored
//! `oem_setup_version` records the version the user last completed and
//! `oem_setup_current` is derived from the two.

use std::sync::Arc;

use tracing::debug;

use crate::batch::Preferences;
use crate::error::SettingsError;
use crate::group::ComputedGroup;
use crate::host::SystemProperties;
use crate::paths::{self, keys};
use crate::preferences::PreferencesProperties;
use crate::value::{ContentValues, Row};

pub const LATEST_VERSION_PROP: &str = "ro.oem.setup_version";

pub struct OemSetupGroup {
    props: Arc<dyn SystemProperties>,
    stored: PreferencesProperties,
}

impl OemSetupGroup {
    pub fn new(prefs: Preferences, props: Arc<dyn SystemProperties>) -> Self {
        let stored = PreferencesProperties::new(paths::OEM_SETUP, prefs)
            .add_version(keys::OEM_SETUP_VERSION, 0);
        Self { props, stored }
    }

    pub fn latest_version(&self) -> i32 {
        self.props.get_int(LATEST_VERSION_PROP, 0)
    }

    pub fn version(&self) -> Result<i32, SettingsError> {
        Ok(self
            .stored
            .read(keys::OEM_SETUP_VERSION)?
            .and_then(|v| v.as_int())
            .unwrap_or(0))
    }

    pub fn is_current(&self) -> Result<bool, SettingsError> {
        Ok(self.version()? == self.latest_version())
    }

    /// Resolve the version implied by `values`, rejecting combinations where
    /// the version and the current flag disagree.
    fn target_version(&self, values: &ContentValues) -> Result<Option<i32>, SettingsError> {
        let version = match values.get(keys::OEM_SETUP_VERSION) {
            None => None,
            Some(v) => Some(v.as_int().filter(|v| *v >= 0).ok_or_else(|| {
                SettingsError::invalid(format!("{}: bad version '{}'", keys::OEM_SETUP_VERSION, v))
            })?),
        };
        let current = match values.get(keys::OEM_SETUP_CURRENT) {
            None => return Ok(version),
            Some(v) => v.as_bool().ok_or_else(|| {
                let key = keys::OEM_SETUP_CURRENT;
                SettingsError::invalid(format!("{}: expected bool, got '{}'", key, v))
            })?,
        };

        let latest = self.latest_version();
        let effective = match version {
            Some(v) => v,
            None => self.version()?,
        };
        match (current, version) {
            (true, Some(v)) if v != latest => Err(SettingsError::invalid(format!(
                "version {} cannot be current, latest is {}",
                v, latest
            ))),
            (true, _) => Ok(Some(latest)),
            (false, _) if effective == latest => Err(SettingsError::invalid(format!(
                "version {} is the latest and cannot be marked out of date",
                effective
            ))),
            (false, _) => Ok(version),
        }
    }
}

impl ComputedGroup for OemSetupGroup {
    fn path(&self) -> &str {
        paths::OEM_SETUP
    }

    fn query(&self) -> Result<Vec<Row>, SettingsError> {
        Ok(vec![
            Row::new(keys::OEM_SETUP_VERSION, self.version()?),
            Row::new(keys::OEM_SETUP_CURRENT, self.is_current()?),
        ])
    }

    fn update(&self, values: &ContentValues) -> Result<usize, SettingsError> {
        let Some(target) = self.target_version(values)? else {
            return Ok(0);
        };
        let was_current = self.is_current()?;
        let mut changed = self
            .stored
            .update(&ContentValues::new().with(keys::OEM_SETUP_VERSION, target))?;
        if self.is_current()? != was_current {
            changed += 1;
        }
        debug!("oem_setup: version={} changed={}", target, changed);
        Ok(changed)
    }

    /// The current flag is recomputed against this device's latest version.
    fn derived_keys(&self) -> &[&'static str] {
        &[keys::OEM_SETUP_CURRENT]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::KeyOutcome;
    use crate::host::MemorySystemProperties;
    use crate::value::SettingValue;
    use wear_kv::MemoryStore;

    fn rows(group: &OemSetupGroup) -> Vec<SettingValue> {
        group.query().unwrap().into_iter().map(|r| r.value).collect()
    }

    fn group(latest: &str) -> OemSetupGroup {
        let props = Arc::new(MemorySystemProperties::default().with(LATEST_VERSION_PROP, latest));
        OemSetupGroup::new(Preferences::new(Arc::new(MemoryStore::new()), paths::OEM_SETUP), props)
    }

    #[test]
    fn fresh_device_is_behind() {
        let group = group("3");
        assert_eq!(rows(&group), vec![SettingValue::Int(0), SettingValue::Int(0)]);
    }

    #[test]
    fn marking_current_stores_latest() {
        let group = group("3");
        let values = ContentValues::new().with(keys::OEM_SETUP_CURRENT, true);
        assert_eq!(group.update(&values).unwrap(), 2);
        assert_eq!(rows(&group), vec![SettingValue::Int(3), SettingValue::Int(1)]);
        assert_eq!(group.update(&values).unwrap(), 0);
    }

    #[test]
    fn first_write_of_default_version_counts() {
        let group = group("3");
        let values = ContentValues::new().with(keys::OEM_SETUP_VERSION, 0);
        assert_eq!(group.update(&values).unwrap(), 1);
        assert_eq!(group.update(&values).unwrap(), 0);
    }

    #[test]
    fn inconsistent_fields_are_rejected() {
        let group = group("3");
        let values = ContentValues::new()
            .with(keys::OEM_SETUP_VERSION, 2)
            .with(keys::OEM_SETUP_CURRENT, true);
        assert!(group.update(&values).unwrap_err().is_invalid_argument());

        group
            .update(&ContentValues::new().with(keys::OEM_SETUP_VERSION, 3))
            .unwrap();
        let clear = ContentValues::new().with(keys::OEM_SETUP_CURRENT, false);
        assert!(group.update(&clear).unwrap_err().is_invalid_argument());
        assert_eq!(group.version().unwrap(), 3);
    }

    #[test]
    fn restore_recomputes_current_flag() {
        let group = group("4");
        let blob = ContentValues::new()
            .with(keys::OEM_SETUP_VERSION, "3")
            .with(keys::OEM_SETUP_CURRENT, "1");
        let report = group.restore(&blob);
        assert_eq!(report.outcome(keys::OEM_SETUP_VERSION), Some(&KeyOutcome::Changed));
        assert!(matches!(report.outcome(keys::OEM_SETUP_CURRENT), Some(KeyOutcome::Skipped(_))));
        assert!(!group.is_current().unwrap());
    }
}
