//! Stable routing paths, row keys and URI helpers.
//!
//! Backup archives are keyed by path, so these strings must never change.

pub const SCHEME: &str = "content://";
pub const DEFAULT_AUTHORITY: &str = "com.wear.settings";

pub const BLUETOOTH: &str = "bluetooth";
/// Legacy path still observed by older clients; notified with [`BLUETOOTH`].
pub const BLUETOOTH_MODE: &str = "bluetooth_mode";
pub const AMBIENT: &str = "ambient";
pub const OEM_SETUP: &str = "oem_setup";
pub const NOTIFICATION_CHANNELS: &str = "notification_channels";
pub const DEVICE_INFO: &str = "device_info";
pub const DISPLAY: &str = "display";
pub const GESTURES: &str = "gestures";
pub const WIFI: &str = "wifi";
pub const TIME: &str = "time";
pub const BATTERY_SAVER: &str = "battery_saver";
pub const SMART_REPLIES: &str = "smart_replies";
pub const FITNESS: &str = "fitness";
pub const SETUP: &str = "setup";
pub const COMPANION: &str = "companion";
pub const CAPABILITIES: &str = "capabilities";
pub const RETAIL: &str = "retail";

/// Synthetic path reporting whether a backup pass is pending.
pub const NEEDS_BACKUP: &str = "needs_backup";

/// Row keys referenced outside the registry.
pub mod keys {
    pub const COMPANION_ADDRESS: &str = "companion_address";
    pub const BLUETOOTH_MODE: &str = "bluetooth_mode";
    pub const USER_HFP_CLIENT_SETTING: &str = "user_hfp_client_setting";
    pub const HFP_CLIENT_PROFILE_ENABLED: &str = "hfp_client_profile_enabled";

    pub const AMBIENT_ENABLED: &str = "ambient_enabled";
    pub const AMBIENT_TILT_TO_WAKE: &str = "ambient_tilt_to_wake";
    pub const AMBIENT_TOUCH_TO_WAKE: &str = "ambient_touch_to_wake";
    pub const AMBIENT_LOW_BIT: &str = "ambient_low_bit_enabled";

    pub const OEM_SETUP_VERSION: &str = "oem_setup_version";
    pub const OEM_SETUP_CURRENT: &str = "oem_setup_current";

    pub const TILT_TO_WAKE: &str = "tilt_to_wake";
    pub const SMART_ILLUMINATION: &str = "smart_illumination_enabled";
    pub const BRIGHTNESS_LEVELS: &str = "brightness_levels";
    pub const AUTO_WIFI: &str = "auto_wifi";
    pub const WIFI_POWER_SAVE: &str = "wifi_power_save";
    pub const SETUP_COMPLETE: &str = "setup_complete";
    pub const SETUP_LOCALE: &str = "setup_locale";
    pub const SMART_REPLIES_ENABLED: &str = "smart_replies_enabled";
    pub const HAS_SPEAKER: &str = "has_speaker";

    pub const NEEDS_BACKUP: &str = "needs_backup";
}

/// Build `content://{authority}/{path}`.
pub fn uri(authority: &str, path: &str) -> String {
    format!("{}{}/{}", SCHEME, authority, path)
}

/// Split a content URI into `(authority, path)`. Trailing slashes are
/// ignored; a URI without a path yields an empty path.
pub fn parse_uri(uri: &str) -> Option<(&str, &str)> {
    let rest = uri.strip_prefix(SCHEME)?;
    let (authority, path) = match rest.find('/') {
        Some(idx) => (&rest[..idx], &rest[idx + 1..]),
        None => (rest, ""),
    };
    if authority.is_empty() {
        return None;
    }
    Some((authority, path.trim_end_matches('/')))
}
