//! Typed setting values, update inputs and query rows.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A single setting value as it crosses the provider boundary.
///
/// Stored in the backing KV as a JSON scalar. `Null` is distinct from an
/// absent key: it is an explicit null entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Null,
    Bool(bool),
    Int(i32),
    Long(i64),
    String(String),
}

impl SettingValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SettingValue::Null)
    }

    /// Boolean view. Numbers are true when non-zero; strings accept
    /// `true`/`false` (any case) and `1`/`0`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SettingValue::Bool(b) => Some(*b),
            SettingValue::Int(i) => Some(*i != 0),
            SettingValue::Long(l) => Some(*l != 0),
            SettingValue::String(s) => match s.trim() {
                "1" => Some(true),
                "0" => Some(false),
                t if t.eq_ignore_ascii_case("true") => Some(true),
                t if t.eq_ignore_ascii_case("false") => Some(false),
                _ => None,
            },
            SettingValue::Null => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            SettingValue::Int(i) => Some(*i),
            SettingValue::Long(l) => i32::try_from(*l).ok(),
            SettingValue::String(s) => s.trim().parse().ok(),
            SettingValue::Bool(_) | SettingValue::Null => None,
        }
    }

    pub fn as_long(&self) -> Option<i64> {
        match self {
            SettingValue::Int(i) => Some(i64::from(*i)),
            SettingValue::Long(l) => Some(*l),
            SettingValue::String(s) => s.trim().parse().ok(),
            SettingValue::Bool(_) | SettingValue::Null => None,
        }
    }

    /// String view. Only string values qualify; numbers are not stringified.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            SettingValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Text used in backup blobs. Null becomes the literal `null`.
    pub fn to_blob_string(&self) -> String {
        match self {
            SettingValue::Null => "null".to_string(),
            SettingValue::Bool(b) => b.to_string(),
            SettingValue::Int(i) => i.to_string(),
            SettingValue::Long(l) => l.to_string(),
            SettingValue::String(s) => s.clone(),
        }
    }

    /// Short type name for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            SettingValue::Null => "null",
            SettingValue::Bool(_) => "bool",
            SettingValue::Int(_) => "int",
            SettingValue::Long(_) => "long",
            SettingValue::String(_) => "string",
        }
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_blob_string())
    }
}

impl From<bool> for SettingValue {
    fn from(v: bool) -> Self {
        SettingValue::Bool(v)
    }
}

impl From<i32> for SettingValue {
    fn from(v: i32) -> Self {
        SettingValue::Int(v)
    }
}

impl From<i64> for SettingValue {
    fn from(v: i64) -> Self {
        SettingValue::Long(v)
    }
}

impl From<&str> for SettingValue {
    fn from(v: &str) -> Self {
        SettingValue::String(v.to_string())
    }
}

impl From<String> for SettingValue {
    fn from(v: String) -> Self {
        SettingValue::String(v)
    }
}

impl<T: Into<SettingValue>> From<Option<T>> for SettingValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SettingValue::Null)
    }
}

/// Ordered key → value map handed to `update`.
///
/// Keys absent from the map are left untouched. A key mapped to
/// [`SettingValue::Null`] is present, not absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentValues {
    entries: Vec<(String, SettingValue)>,
}

impl ContentValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace. Replacing keeps the original position.
    pub fn put(&mut self, key: impl Into<String>, value: impl Into<SettingValue>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Builder form of [`put`](Self::put).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<SettingValue>) -> Self {
        self.put(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&SettingValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SettingValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<SettingValue>> FromIterator<(K, V)> for ContentValues {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut values = ContentValues::new();
        for (k, v) in iter {
            values.put(k, v);
        }
        values
    }
}

/// Column names of every query result.
pub const COLUMNS: [&str; 2] = ["key", "value"];

/// One `(key, value)` row of a query result.
///
/// Values are `String`, `Int`, `Long` or `Null`; booleans are reported as
/// `Int` 0/1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Row {
    pub key: String,
    pub value: SettingValue,
}

impl Row {
    pub fn new(key: impl Into<String>, value: impl Into<SettingValue>) -> Self {
        let value = match value.into() {
            SettingValue::Bool(b) => SettingValue::Int(i32::from(b)),
            other => other,
        };
        Self {
            key: key.into(),
            value,
        }
    }
}

/// Find a row by key.
pub fn row_value<'a>(rows: &'a [Row], key: &str) -> Option<&'a SettingValue> {
    rows.iter().find(|r| r.key == key).map(|r| &r.value)
}
