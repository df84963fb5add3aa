//! Read-only device identity reported from system properties.

use std::sync::Arc;

use crate::error::SettingsError;
use crate::group::ComputedGroup;
use crate::host::SystemProperties;
use crate::paths;
use crate::value::{ContentValues, Row};

/// Row key and the system property it mirrors.
pub const FIELDS: [(&str, &str); 4] = [
    ("manufacturer", "ro.product.manufacturer"),
    ("model", "ro.product.model"),
    ("os_version", "ro.build.version.release"),
    ("build_id", "ro.build.id"),
];

pub struct DeviceInfoGroup {
    props: Arc<dyn SystemProperties>,
}

impl DeviceInfoGroup {
    pub fn new(props: Arc<dyn SystemProperties>) -> Self {
        Self { props }
    }
}

impl ComputedGroup for DeviceInfoGroup {
    fn path(&self) -> &str {
        paths::DEVICE_INFO
    }

    fn query(&self) -> Result<Vec<Row>, SettingsError> {
        Ok(FIELDS
            .iter()
            .map(|(key, prop)| Row::new(*key, self.props.get(prop)))
            .collect())
    }

    fn update(&self, _values: &ContentValues) -> Result<usize, SettingsError> {
        Err(SettingsError::unsupported("device_info is read-only"))
    }
}
