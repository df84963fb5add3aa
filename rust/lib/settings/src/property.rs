//! Single typed setting cell.

use std::fmt;
use std::sync::OnceLock;

use tracing::warn;

use crate::batch::{Preferences, WriteBatch};
use crate::error::SettingsError;
use crate::value::{Row, SettingValue};

/// Declared value type of a [`Property`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    Bool,
    Int,
    Long,
    String,
    Immutable,
}

impl fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PropertyKind::Bool => "bool",
            PropertyKind::Int => "int",
            PropertyKind::Long => "long",
            PropertyKind::String => "string",
            PropertyKind::Immutable => "immutable",
        };
        f.write_str(name)
    }
}

type Supplier<T> = Box<dyn Fn() -> T + Send + Sync>;

/// Default for a key that is absent from the backing store. Suppliers run
/// lazily and at most once per property.
enum Fallback<T> {
    Fixed(T),
    Supplied(Supplier<T>, OnceLock<T>),
}

impl<T: Clone> Fallback<T> {
    fn supplied(f: impl Fn() -> T + Send + Sync + 'static) -> Self {
        Fallback::Supplied(Box::new(f), OnceLock::new())
    }

    fn get(&self) -> T {
        match self {
            Fallback::Fixed(value) => value.clone(),
            Fallback::Supplied(f, memo) => memo.get_or_init(|| f()).clone(),
        }
    }
}

enum Cell {
    Bool(Fallback<bool>),
    Int {
        fallback: Fallback<i32>,
        valid: Vec<i32>,
    },
    Long(Fallback<i64>),
    String(Fallback<Option<String>>),
    Immutable(SettingValue),
}

/// A named, typed, defaulted setting backed by a [`Preferences`] store.
pub struct Property {
    key: String,
    cell: Cell,
    counts_when_absent: bool,
}

impl fmt::Debug for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("key", &self.key)
            .field("kind", &self.kind())
            .field("counts_when_absent", &self.counts_when_absent)
            .finish()
    }
}

impl Property {
    fn new(key: impl Into<String>, cell: Cell) -> Self {
        let key = key.into();
        assert!(!key.is_empty(), "property key must not be empty");
        Self {
            key,
            cell,
            counts_when_absent: false,
        }
    }

    pub fn boolean(key: impl Into<String>, default: bool) -> Self {
        Self::new(key, Cell::Bool(Fallback::Fixed(default)))
    }

    pub fn boolean_with(
        key: impl Into<String>,
        supplier: impl Fn() -> bool + Send + Sync + 'static,
    ) -> Self {
        Self::new(key, Cell::Bool(Fallback::supplied(supplier)))
    }

    /// Int property. An empty `valid` slice accepts any value.
    pub fn int(key: impl Into<String>, default: i32, valid: &[i32]) -> Self {
        Self::new(
            key,
            Cell::Int {
                fallback: Fallback::Fixed(default),
                valid: valid.to_vec(),
            },
        )
    }

    pub fn int_with(
        key: impl Into<String>,
        supplier: impl Fn() -> i32 + Send + Sync + 'static,
        valid: &[i32],
    ) -> Self {
        Self::new(
            key,
            Cell::Int {
                fallback: Fallback::supplied(supplier),
                valid: valid.to_vec(),
            },
        )
    }

    /// Version-tracking Int: an update equal to the default still counts as
    /// a change while the store does not hold the key yet.
    pub fn version(key: impl Into<String>, default: i32) -> Self {
        let mut property = Self::int(key, default, &[]);
        property.counts_when_absent = true;
        property
    }

    pub fn long(key: impl Into<String>, default: i64) -> Self {
        Self::new(key, Cell::Long(Fallback::Fixed(default)))
    }

    pub fn long_with(
        key: impl Into<String>,
        supplier: impl Fn() -> i64 + Send + Sync + 'static,
    ) -> Self {
        Self::new(key, Cell::Long(Fallback::supplied(supplier)))
    }

    /// Nullable string property.
    pub fn string(key: impl Into<String>, default: Option<&str>) -> Self {
        Self::new(
            key,
            Cell::String(Fallback::Fixed(default.map(str::to_string))),
        )
    }

    pub fn string_with(
        key: impl Into<String>,
        supplier: impl Fn() -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        Self::new(key, Cell::String(Fallback::supplied(supplier)))
    }

    /// Fixed value; every update fails with `Unsupported`.
    pub fn immutable(key: impl Into<String>, value: impl Into<SettingValue>) -> Self {
        Self::new(key, Cell::Immutable(value.into()))
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn kind(&self) -> PropertyKind {
        match self.cell {
            Cell::Bool(_) => PropertyKind::Bool,
            Cell::Int { .. } => PropertyKind::Int,
            Cell::Long(_) => PropertyKind::Long,
            Cell::String(_) => PropertyKind::String,
            Cell::Immutable(_) => PropertyKind::Immutable,
        }
    }

    pub fn is_mutable(&self) -> bool {
        !matches!(self.cell, Cell::Immutable(_))
    }

    fn default_value(&self) -> SettingValue {
        match &self.cell {
            Cell::Bool(f) => SettingValue::Bool(f.get()),
            Cell::Int { fallback, .. } => SettingValue::Int(fallback.get()),
            Cell::Long(f) => SettingValue::Long(f.get()),
            Cell::String(f) => f.get().into(),
            Cell::Immutable(v) => v.clone(),
        }
    }

    /// Normalize a value to this property's type, or `None` on mismatch.
    fn coerce(&self, value: &SettingValue) -> Option<SettingValue> {
        match &self.cell {
            Cell::Bool(_) => value.as_bool().map(SettingValue::Bool),
            Cell::Int { .. } => value.as_int().map(SettingValue::Int),
            Cell::Long(_) => value.as_long().map(SettingValue::Long),
            Cell::String(_) => match value {
                SettingValue::Null | SettingValue::String(_) => Some(value.clone()),
                _ => None,
            },
            Cell::Immutable(_) => None,
        }
    }

    /// Current value: the stored one if present, otherwise the default.
    pub fn read(&self, prefs: &Preferences) -> Result<SettingValue, SettingsError> {
        if let Cell::Immutable(value) = &self.cell {
            return Ok(value.clone());
        }
        match prefs.get(&self.key)? {
            Some(stored) => match self.coerce(&stored) {
                Some(value) => Ok(value),
                None => {
                    warn!(
                        "Property {}: stored {} does not match {}, using default",
                        self.key,
                        stored.type_name(),
                        self.kind()
                    );
                    Ok(self.default_value())
                }
            },
            None => Ok(self.default_value()),
        }
    }

    pub fn row(&self, prefs: &Preferences) -> Result<Row, SettingsError> {
        Ok(Row::new(self.key.clone(), self.read(prefs)?))
    }

    /// Check a candidate against type and range constraints and normalize it.
    ///
    /// Immutable properties fail with `Unsupported` before any other check.
    pub fn validate(&self, candidate: &SettingValue) -> Result<SettingValue, SettingsError> {
        if !self.is_mutable() {
            return Err(SettingsError::unsupported(format!(
                "{} is immutable",
                self.key
            )));
        }
        let value = self.coerce(candidate).ok_or_else(|| {
            if candidate.is_null() {
                let kind = self.kind();
                SettingsError::invalid(format!("{}: a {} value is required", self.key, kind))
            } else {
                SettingsError::invalid(format!(
                    "{}: expected {}, got {} '{}'",
                    self.key,
                    self.kind(),
                    candidate.type_name(),
                    candidate
                ))
            }
        })?;
        if let (Cell::Int { valid, .. }, SettingValue::Int(v)) = (&self.cell, &value) {
            if !valid.is_empty() && !valid.contains(v) {
                return Err(SettingsError::invalid(format!(
                    "{}: {} is not one of {:?}",
                    self.key, v, valid
                )));
            }
        }
        Ok(value)
    }

    /// Queue `candidate` into `batch` if it differs from the current value.
    /// Returns whether a write was queued.
    pub fn update(
        &self,
        prefs: &Preferences,
        candidate: &SettingValue,
        batch: &mut WriteBatch,
    ) -> Result<bool, SettingsError> {
        let next = self.validate(candidate)?;
        if next == self.read(prefs)? && (!self.counts_when_absent || prefs.contains(&self.key)?) {
            return Ok(false);
        }
        batch.put(&self.key, &next)?;
        Ok(true)
    }
}
