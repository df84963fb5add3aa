//! The two kinds of path-addressable property groups.

use std::fmt;

use crate::error::SettingsError;
use crate::preferences::PreferencesProperties;
use crate::value::{ContentValues, Row};

/// What happened to one key of a restore blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyOutcome {
    Changed,
    Unchanged,
    /// Not applied. Restore never fails; the reason is logged and reported.
    Skipped(String),
}

/// Per-key result of applying a restore blob to one group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreReport {
    pub outcomes: Vec<(String, KeyOutcome)>,
}

impl RestoreReport {
    pub fn push(&mut self, key: impl Into<String>, outcome: KeyOutcome) {
        self.outcomes.push((key.into(), outcome));
    }

    pub fn changed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| *o == KeyOutcome::Changed)
            .count()
    }

    pub fn skipped(&self) -> impl Iterator<Item = (&str, &str)> {
        self.outcomes.iter().filter_map(|(k, o)| match o {
            KeyOutcome::Skipped(reason) => Some((k.as_str(), reason.as_str())),
            _ => None,
        })
    }

    pub fn outcome(&self, key: &str) -> Option<&KeyOutcome> {
        self.outcomes.iter().find(|(k, _)| k == key).map(|(_, o)| o)
    }
}

/// A group whose rows are computed from external state or cross-field
/// rules instead of independent key defaults.
pub trait ComputedGroup: Send + Sync {
    fn path(&self) -> &str;

    fn query(&self) -> Result<Vec<Row>, SettingsError>;

    /// Apply `values`, returning the number of rows changed.
    fn update(&self, values: &ContentValues) -> Result<usize, SettingsError>;

    /// Extra paths whose observers are notified whenever this group changes.
    fn notify_aliases(&self) -> &[&'static str] {
        &[]
    }

    /// Rows computed from other state. They are reported by `query` but a
    /// restore never writes them back.
    fn derived_keys(&self) -> &[&'static str] {
        &[]
    }

    /// Best-effort restore. The default applies one key at a time so a
    /// rejected key does not block the rest, and skips derived keys.
    fn restore(&self, values: &ContentValues) -> RestoreReport {
        let mut report = RestoreReport::default();
        for (key, value) in values.iter() {
            if self.derived_keys().iter().any(|derived| *derived == key) {
                report.push(key, KeyOutcome::Skipped("derived".to_string()));
                continue;
            }
            let single = ContentValues::new().with(key, value.clone());
            let outcome = match self.update(&single) {
                Ok(0) => KeyOutcome::Unchanged,
                Ok(_) => KeyOutcome::Changed,
                Err(e) => {
                    tracing::warn!("restore {}: skipping {}: {}", self.path(), key, e);
                    KeyOutcome::Skipped(e.to_string())
                }
            };
            report.push(key, outcome);
        }
        report
    }
}

/// A registry entry: declarative key defaults or computed logic.
pub enum PropertyGroup {
    Declarative(PreferencesProperties),
    Computed(Box<dyn ComputedGroup>),
}

impl fmt::Debug for PropertyGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyGroup::Declarative(p) => f.debug_tuple("Declarative").field(&p.path()).finish(),
            PropertyGroup::Computed(c) => f.debug_tuple("Computed").field(&c.path()).finish(),
        }
    }
}

impl PropertyGroup {
    pub fn computed(group: impl ComputedGroup + 'static) -> Self {
        PropertyGroup::Computed(Box::new(group))
    }

    pub fn path(&self) -> &str {
        match self {
            PropertyGroup::Declarative(p) => p.path(),
            PropertyGroup::Computed(c) => c.path(),
        }
    }

    pub fn query(&self) -> Result<Vec<Row>, SettingsError> {
        match self {
            PropertyGroup::Declarative(p) => p.query(),
            PropertyGroup::Computed(c) => c.query(),
        }
    }

    pub fn update(&self, values: &ContentValues) -> Result<usize, SettingsError> {
        match self {
            PropertyGroup::Declarative(p) => p.update(values),
            PropertyGroup::Computed(c) => c.update(values),
        }
    }

    pub fn restore(&self, values: &ContentValues) -> RestoreReport {
        match self {
            PropertyGroup::Declarative(p) => p.restore(values),
            PropertyGroup::Computed(c) => c.restore(values),
        }
    }

    pub fn notify_aliases(&self) -> &[&'static str] {
        match self {
            PropertyGroup::Declarative(_) => &[],
            PropertyGroup::Computed(c) => c.notify_aliases(),
        }
    }
}

impl From<PreferencesProperties> for PropertyGroup {
    fn from(p: PreferencesProperties) -> Self {
        PropertyGroup::Declarative(p)
    }
}
