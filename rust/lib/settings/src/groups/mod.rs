//! Computed property groups.
//!
//! Each group owns rules that cannot be expressed as independent key
//! defaults: derived rows, cross-field checks or state living outside the
//! preferences store.

pub mod ambient;
pub mod bluetooth;
pub mod device_info;
pub mod notification_channels;
pub mod oem_setup;

pub use ambient::AmbientGroup;
pub use bluetooth::BluetoothGroup;
pub use device_info::DeviceInfoGroup;
pub use notification_channels::NotificationChannelsGroup;
pub use oem_setup::OemSetupGroup;
