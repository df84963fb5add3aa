//! Companion Bluetooth state.
//!
//! Four related rows: the companion address, the companion mode, the user's
//! HFP client preference and whether the HFP client profile is currently
//! enabled. The last one is derived from the host's disabled-profiles mask.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::batch::Preferences;
use crate::error::SettingsError;
use crate::group::ComputedGroup;
use crate::host::HostSettings;
use crate::paths::{self, keys};
use crate::value::{ContentValues, Row, SettingValue};

/// Host setting holding the bitmask of disabled Bluetooth profiles.
pub const DISABLED_PROFILES_SETTING: &str = "bluetooth_disabled_profiles";
/// Host setting that is non-zero while call twinning is active.
pub const CALL_TWINNING_SETTING: &str = "call_twinning_state";
/// Bit of [`DISABLED_PROFILES_SETTING`] for the HFP client profile.
pub const HFP_CLIENT_PROFILE_BIT: i64 = 1 << 16;

pub const MODE_UNKNOWN: i32 = 0;
pub const MODE_ALT: i32 = 1;
pub const MODE_NON_ALT: i32 = 2;

pub const HFP_UNSET: i32 = 0;
pub const HFP_ENABLED: i32 = 1;
pub const HFP_DISABLED: i32 = 2;

pub struct BluetoothGroup {
    prefs: Preferences,
    host: Arc<dyn HostSettings>,
}

impl BluetoothGroup {
    pub fn new(prefs: Preferences, host: Arc<dyn HostSettings>) -> Self {
        Self { prefs, host }
    }

    pub fn companion_address(&self) -> Result<Option<String>, SettingsError> {
        Ok(self
            .prefs
            .get(keys::COMPANION_ADDRESS)?
            .and_then(|v| v.as_str().map(str::to_string)))
    }

    pub fn mode(&self) -> Result<i32, SettingsError> {
        Ok(self
            .prefs
            .get(keys::BLUETOOTH_MODE)?
            .and_then(|v| v.as_int())
            .unwrap_or(MODE_UNKNOWN))
    }

    pub fn user_hfp_setting(&self) -> Result<i32, SettingsError> {
        Ok(self
            .prefs
            .get(keys::USER_HFP_CLIENT_SETTING)?
            .and_then(|v| v.as_int())
            .unwrap_or(HFP_UNSET))
    }

    pub fn twinning_enabled(&self) -> Result<bool, SettingsError> {
        Ok(self.host.get_long(CALL_TWINNING_SETTING)?.unwrap_or(0) != 0)
    }

    fn disabled_profiles(&self) -> Result<i64, SettingsError> {
        Ok(self.host.get_long(DISABLED_PROFILES_SETTING)?.unwrap_or(0))
    }

    pub fn hfp_client_profile_enabled(&self) -> Result<bool, SettingsError> {
        Ok(self.disabled_profiles()? & HFP_CLIENT_PROFILE_BIT == 0)
    }

    /// Flip the HFP client bit if the computed state differs from `requested`.
    fn set_hfp_client_profile(&self, requested: bool) -> Result<bool, SettingsError> {
        let requested = if requested && self.twinning_enabled()? {
            debug!("bluetooth: twinning active, coercing hfp client profile to disabled");
            false
        } else {
            requested
        };
        if self.hfp_client_profile_enabled()? == requested {
            return Ok(false);
        }
        let mask = self.disabled_profiles()? ^ HFP_CLIENT_PROFILE_BIT;
        self.host.put_long(DISABLED_PROFILES_SETTING, mask)?;
        info!("bluetooth: hfp client profile enabled={}", requested);
        Ok(true)
    }
}

impl ComputedGroup for BluetoothGroup {
    fn path(&self) -> &str {
        paths::BLUETOOTH
    }

    fn query(&self) -> Result<Vec<Row>, SettingsError> {
        Ok(vec![
            Row::new(keys::COMPANION_ADDRESS, self.companion_address()?),
            Row::new(keys::BLUETOOTH_MODE, self.mode()?),
            Row::new(keys::USER_HFP_CLIENT_SETTING, self.user_hfp_setting()?),
            Row::new(keys::HFP_CLIENT_PROFILE_ENABLED, self.hfp_client_profile_enabled()?),
        ])
    }

    /// Rejected fields are logged and count zero rows; they do not fail the
    /// call.
    fn update(&self, values: &ContentValues) -> Result<usize, SettingsError> {
        let mut batch = self.prefs.begin_update_batch();
        let mut changed = 0;

        if let Some(value) = values.get(keys::COMPANION_ADDRESS) {
            match value.as_str().filter(|s| !s.is_empty()) {
                None => warn!("bluetooth: rejecting empty companion address"),
                Some(address) if self.companion_address()?.as_deref() == Some(address) => {}
                Some(address) => {
                    batch.put(keys::COMPANION_ADDRESS, &SettingValue::from(address))?;
                    changed += 1;
                }
            }
        }

        if let Some(value) = values.get(keys::BLUETOOTH_MODE) {
            match value.as_int() {
                Some(mode @ (MODE_ALT | MODE_NON_ALT)) => {
                    if self.mode()? != mode {
                        batch.put(keys::BLUETOOTH_MODE, &SettingValue::Int(mode))?;
                        changed += 1;
                    }
                }
                _ => warn!("bluetooth: rejecting mode {}", value),
            }
        }

        if let Some(value) = values.get(keys::USER_HFP_CLIENT_SETTING) {
            if self.twinning_enabled()? {
                warn!("bluetooth: call twinning active, ignoring user hfp setting");
            } else {
                match value.as_int() {
                    Some(setting @ (HFP_UNSET | HFP_ENABLED | HFP_DISABLED)) => {
                        if self.user_hfp_setting()? != setting {
                            batch.put(keys::USER_HFP_CLIENT_SETTING, &SettingValue::Int(setting))?;
                            changed += 1;
                        }
                    }
                    _ => warn!("bluetooth: rejecting user hfp setting {}", value),
                }
            }
        }

        batch.commit()?;

        if let Some(value) = values.get(keys::HFP_CLIENT_PROFILE_ENABLED) {
            match value.as_bool() {
                Some(requested) => {
                    if self.set_hfp_client_profile(requested)? {
                        changed += 1;
                    }
                }
                None => warn!("bluetooth: rejecting hfp client profile value {}", value),
            }
        }

        Ok(changed)
    }

    fn notify_aliases(&self) -> &[&'static str] {
        &[paths::BLUETOOTH_MODE]
    }

    /// The profile state follows the host mask and twinning. Writing it back
    /// would turn a restored `1` into a disable while twinning is active.
    fn derived_keys(&self) -> &[&'static str] {
        &[keys::HFP_CLIENT_PROFILE_ENABLED]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::KeyOutcome;
    use crate::host::MemoryHostSettings;
    use crate::value::row_value;
    use wear_kv::MemoryStore;

    fn group() -> (BluetoothGroup, Arc<MemoryHostSettings>) {
        let host = Arc::new(MemoryHostSettings::default());
        let prefs = Preferences::new(Arc::new(MemoryStore::new()), paths::BLUETOOTH);
        (BluetoothGroup::new(prefs, host.clone()), host)
    }

    #[test]
    fn defaults() {
        let (group, _) = group();
        let rows = group.query().unwrap();
        assert_eq!(row_value(&rows, keys::COMPANION_ADDRESS), Some(&SettingValue::Null));
        assert_eq!(row_value(&rows, keys::BLUETOOTH_MODE), Some(&SettingValue::Int(MODE_UNKNOWN)));
        assert_eq!(row_value(&rows, keys::HFP_CLIENT_PROFILE_ENABLED), Some(&SettingValue::Int(1)));
    }

    #[test]
    fn address_rejects_empty_and_unchanged() {
        let (group, _) = group();
        let set = ContentValues::new().with(keys::COMPANION_ADDRESS, "AA:BB:CC:DD:EE:FF");
        assert_eq!(group.update(&set).unwrap(), 1);
        assert_eq!(group.update(&set).unwrap(), 0);
        assert_eq!(
            group.update(&ContentValues::new().with(keys::COMPANION_ADDRESS, "")).unwrap(),
            0
        );
        assert_eq!(
            group
                .update(&ContentValues::new().with(keys::COMPANION_ADDRESS, SettingValue::Null))
                .unwrap(),
            0
        );
        assert_eq!(group.companion_address().unwrap().as_deref(), Some("AA:BB:CC:DD:EE:FF"));
    }

    #[test]
    fn mode_accepts_only_alt_or_non_alt() {
        let (group, _) = group();
        assert_eq!(group.update(&ContentValues::new().with(keys::BLUETOOTH_MODE, 0)).unwrap(), 0);
        assert_eq!(group.update(&ContentValues::new().with(keys::BLUETOOTH_MODE, 3)).unwrap(), 0);
        assert_eq!(group.update(&ContentValues::new().with(keys::BLUETOOTH_MODE, 2)).unwrap(), 1);
        assert_eq!(group.update(&ContentValues::new().with(keys::BLUETOOTH_MODE, "2")).unwrap(), 0);
        assert_eq!(group.mode().unwrap(), MODE_NON_ALT);
    }

    #[test]
    fn twinning_blocks_user_hfp_setting() {
        let (group, host) = group();
        host.put_long(CALL_TWINNING_SETTING, 1).unwrap();

        let values = ContentValues::new().with(keys::USER_HFP_CLIENT_SETTING, HFP_ENABLED);
        assert_eq!(group.update(&values).unwrap(), 0);
        assert_eq!(group.user_hfp_setting().unwrap(), HFP_UNSET);

        host.put_long(CALL_TWINNING_SETTING, 0).unwrap();
        assert_eq!(group.update(&values).unwrap(), 1);
        assert_eq!(group.user_hfp_setting().unwrap(), HFP_ENABLED);
    }

    #[test]
    fn profile_flag_flips_only_on_difference() {
        let (group, host) = group();
        host.put_long(DISABLED_PROFILES_SETTING, 0b101).unwrap();

        let enable = ContentValues::new().with(keys::HFP_CLIENT_PROFILE_ENABLED, true);
        let disable = ContentValues::new().with(keys::HFP_CLIENT_PROFILE_ENABLED, false);

        assert_eq!(group.update(&enable).unwrap(), 0);
        assert_eq!(group.update(&disable).unwrap(), 1);
        assert_eq!(
            host.get_long(DISABLED_PROFILES_SETTING).unwrap(),
            Some(0b101 | HFP_CLIENT_PROFILE_BIT)
        );
        assert!(!group.hfp_client_profile_enabled().unwrap());
        assert_eq!(group.update(&enable).unwrap(), 1);
        assert_eq!(host.get_long(DISABLED_PROFILES_SETTING).unwrap(), Some(0b101));
    }

    #[test]
    fn twinning_coerces_profile_enable_to_disable() {
        let (group, host) = group();
        host.put_long(CALL_TWINNING_SETTING, 1).unwrap();

        let enable = ContentValues::new().with(keys::HFP_CLIENT_PROFILE_ENABLED, 1);
        assert_eq!(group.update(&enable).unwrap(), 1);
        assert!(!group.hfp_client_profile_enabled().unwrap());
        assert_eq!(group.update(&enable).unwrap(), 0);
    }

    #[test]
    fn declares_legacy_mode_alias() {
        let (group, _) = group();
        assert_eq!(group.notify_aliases(), &[paths::BLUETOOTH_MODE]);
    }

    #[test]
    fn restore_leaves_profile_state_alone_while_twinning() {
        let (group, host) = group();
        host.put_long(CALL_TWINNING_SETTING, 1).unwrap();
        let blob = ContentValues::new()
            .with(keys::BLUETOOTH_MODE, "1")
            .with(keys::HFP_CLIENT_PROFILE_ENABLED, "1");

        let report = group.restore(&blob);
        assert_eq!(report.outcome(keys::BLUETOOTH_MODE), Some(&KeyOutcome::Changed));
        assert_eq!(
            report.outcome(keys::HFP_CLIENT_PROFILE_ENABLED),
            Some(&KeyOutcome::Skipped("derived".to_string()))
        );
        assert!(group.hfp_client_profile_enabled().unwrap());
        assert_eq!(host.get_long(DISABLED_PROFILES_SETTING).unwrap(), None);
    }
}
