//! Declarative property sets with chaining builders.

use std::fmt;

use tracing::{debug, warn};

use crate::batch::{Preferences, WriteBatch};
use crate::error::SettingsError;
use crate::group::{KeyOutcome, RestoreReport};
use crate::property::Property;
use crate::value::{ContentValues, Row, SettingValue};

/// An ordered set of [`Property`] cells sharing one [`Preferences`] store
/// and one routing path.
///
/// ```ignore
/// let set = PreferencesProperties::new(paths::TIME, prefs)
///     .add_boolean(keys::CLOCK_24H, false)
///     .add_int(keys::AUTO_TIME, 1, &[0, 1, 2]);
/// ```
pub struct PreferencesProperties {
    path: String,
    prefs: Preferences,
    properties: Vec<Property>,
}

impl fmt::Debug for PreferencesProperties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreferencesProperties")
            .field("path", &self.path)
            .field("prefs", &self.prefs)
            .field("properties", &self.properties)
            .finish()
    }
}

impl PreferencesProperties {
    pub fn new(path: impl Into<String>, prefs: Preferences) -> Self {
        let path = path.into();
        assert!(!path.is_empty(), "property set path must not be empty");
        Self {
            path,
            prefs,
            properties: Vec::new(),
        }
    }

    /// Append a property. Panics on a duplicate key.
    pub fn add(mut self, property: Property) -> Self {
        assert!(
            self.property(property.key()).is_none(),
            "duplicate key '{}' in property set '{}'",
            property.key(),
            self.path
        );
        self.properties.push(property);
        self
    }

    pub fn add_boolean(self, key: &str, default: bool) -> Self {
        self.add(Property::boolean(key, default))
    }

    pub fn add_boolean_with(
        self,
        key: &str,
        supplier: impl Fn() -> bool + Send + Sync + 'static,
    ) -> Self {
        self.add(Property::boolean_with(key, supplier))
    }

    pub fn add_int(self, key: &str, default: i32, valid: &[i32]) -> Self {
        self.add(Property::int(key, default, valid))
    }

    pub fn add_int_with(
        self,
        key: &str,
        supplier: impl Fn() -> i32 + Send + Sync + 'static,
        valid: &[i32],
    ) -> Self {
        self.add(Property::int_with(key, supplier, valid))
    }

    pub fn add_long(self, key: &str, default: i64) -> Self {
        self.add(Property::long(key, default))
    }

    pub fn add_long_with(
        self,
        key: &str,
        supplier: impl Fn() -> i64 + Send + Sync + 'static,
    ) -> Self {
        self.add(Property::long_with(key, supplier))
    }

    pub fn add_string(self, key: &str, default: Option<&str>) -> Self {
        self.add(Property::string(key, default))
    }

    pub fn add_string_with(
        self,
        key: &str,
        supplier: impl Fn() -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        self.add(Property::string_with(key, supplier))
    }

    pub fn add_immutable(self, key: &str, value: impl Into<SettingValue>) -> Self {
        self.add(Property::immutable(key, value))
    }

    pub fn add_version(self, key: &str, default: i32) -> Self {
        self.add(Property::version(key, default))
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn prefs(&self) -> &Preferences {
        &self.prefs
    }

    pub fn property(&self, key: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.key() == key)
    }

    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    /// Rows in registration order.
    pub fn query(&self) -> Result<Vec<Row>, SettingsError> {
        self.properties.iter().map(|p| p.row(&self.prefs)).collect()
    }

    /// Read one member's current value.
    pub fn read(&self, key: &str) -> Result<Option<SettingValue>, SettingsError> {
        self.property(key).map(|p| p.read(&self.prefs)).transpose()
    }

    /// Apply `values` and commit once. Returns the number of changed rows.
    ///
    /// Immutable keys are logged and skipped. An invalid value aborts the
    /// whole call with nothing committed.
    pub fn update(&self, values: &ContentValues) -> Result<usize, SettingsError> {
        let mut batch = self.prefs.begin_update_batch();
        let changed = self.update_in(values, &mut batch)?;
        batch.commit()?;
        Ok(changed)
    }

    /// Queue member updates into a caller-owned batch. Used by computed
    /// groups that wrap a declarative set and commit once for both.
    pub fn update_in(
        &self,
        values: &ContentValues,
        batch: &mut WriteBatch,
    ) -> Result<usize, SettingsError> {
        let mut changed = 0;
        for (key, value) in values.iter() {
            let Some(property) = self.property(key) else {
                continue;
            };
            match property.update(&self.prefs, value, batch) {
                Ok(true) => changed += 1,
                Ok(false) => {}
                Err(e) if e.is_unsupported() => {
                    warn!("update {}: ignoring {}", self.path, e);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(changed)
    }

    /// Best-effort restore: every key gets an outcome, valid ones are
    /// committed together.
    pub fn restore(&self, values: &ContentValues) -> RestoreReport {
        let mut report = RestoreReport::default();
        let mut batch = self.prefs.begin_update_batch();
        for (key, value) in values.iter() {
            let outcome = match self.property(key) {
                None => KeyOutcome::Skipped("unknown key".to_string()),
                Some(property) => match property.update(&self.prefs, value, &mut batch) {
                    Ok(true) => KeyOutcome::Changed,
                    Ok(false) => KeyOutcome::Unchanged,
                    Err(e) => KeyOutcome::Skipped(e.to_string()),
                },
            };
            if let KeyOutcome::Skipped(reason) = &outcome {
                debug!("restore {}: skipping {}: {}", self.path, key, reason);
            }
            report.push(key, outcome);
        }

        if let Err(e) = batch.commit() {
            warn!("restore {}: commit failed: {}", self.path, e);
            for (_, outcome) in report.outcomes.iter_mut() {
                if *outcome == KeyOutcome::Changed {
                    *outcome = KeyOutcome::Skipped(e.to_string());
                }
            }
        }
        report
    }
}
