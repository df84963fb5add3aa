//! Backup blob codec.
//!
//! A blob is a JSON object with one member per row, in row order. Every
//! value is written as a string; null rows are written as `"null"` and read
//! back as an explicit null. A stored string whose text is `null` therefore
//! restores as null.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::SettingsError;
use crate::group::{PropertyGroup, RestoreReport};
use crate::value::{ContentValues, SettingValue};

const NULL_TEXT: &str = "null";

/// Encode the group's current rows.
pub fn serialize(group: &PropertyGroup) -> Result<Vec<u8>, SettingsError> {
    let object: Map<String, Value> = group
        .query()?
        .into_iter()
        .map(|row| (row.key, Value::String(row.value.to_blob_string())))
        .collect();
    serde_json::to_vec(&object).map_err(|e| SettingsError::Codec(e.to_string()))
}

/// Decode a blob into ordered values.
///
/// Empty or truncated input yields empty values. Non-string scalars are
/// accepted as typed values; nested arrays and objects are dropped.
pub fn deserialize(bytes: &[u8]) -> Result<ContentValues, SettingsError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(ContentValues::new());
    }
    let object: Map<String, Value> = match serde_json::from_slice(bytes) {
        Ok(object) => object,
        Err(e) if e.is_eof() => {
            warn!("backup blob truncated after {} byte(s), treating as empty", bytes.len());
            return Ok(ContentValues::new());
        }
        Err(e) => return Err(SettingsError::Codec(e.to_string())),
    };

    let mut values = ContentValues::new();
    for (key, value) in object {
        match decode_value(value) {
            Some(v) => values.put(key, v),
            None => warn!("backup blob: dropping non-scalar value for {}", key),
        }
    }
    Ok(values)
}

fn decode_value(value: Value) -> Option<SettingValue> {
    match value {
        Value::Null => Some(SettingValue::Null),
        Value::String(s) if s == NULL_TEXT => Some(SettingValue::Null),
        Value::String(s) => Some(SettingValue::String(s)),
        Value::Bool(b) => Some(SettingValue::Bool(b)),
        Value::Number(n) => match n.as_i64() {
            Some(l) => Some(i32::try_from(l).map_or(SettingValue::Long(l), SettingValue::Int)),
            None => Some(SettingValue::String(n.to_string())),
        },
        Value::Array(_) | Value::Object(_) => None,
    }
}

/// Decode `bytes` and apply them to `group`. Never fails: a blob that does
/// not decode restores nothing.
pub fn restore(group: &PropertyGroup, bytes: &[u8]) -> RestoreReport {
    let values = match deserialize(bytes) {
        Ok(values) => values,
        Err(e) => {
            warn!("restore {}: undecodable blob: {}", group.path(), e);
            return RestoreReport::default();
        }
    };
    let report = group.restore(&values);
    debug!(
        "restore {}: {} key(s), {} changed",
        group.path(),
        values.len(),
        report.changed()
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::Preferences;
    use crate::group::KeyOutcome;
    use crate::preferences::PreferencesProperties;
    use std::sync::Arc;
    use wear_kv::{KVStore, MemoryStore};

    fn group(kv: &Arc<dyn KVStore>) -> PropertyGroup {
        PreferencesProperties::new("setup", Preferences::new(Arc::clone(kv), "setup"))
            .add_boolean("setup_complete", false)
            .add_int("retail_mode", 0, &[0, 1])
            .add_long("last_exercise_time", 0)
            .add_string("setup_locale", None)
            .add_immutable("has_speaker", true)
            .into()
    }

    #[test]
    fn blob_is_ordered_strings() {
        let kv: Arc<dyn KVStore> = Arc::new(MemoryStore::new());
        let bytes = serialize(&group(&kv)).unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            concat!(
                r#"{"setup_complete":"0","retail_mode":"0","last_exercise_time":"0","#,
                r#""setup_locale":"null","has_speaker":"1"}"#
            )
        );
    }

    #[test]
    fn null_round_trips_as_explicit_null() {
        let values = deserialize(br#"{"setup_locale":"null"}"#).unwrap();
        assert_eq!(values.get("setup_locale"), Some(&SettingValue::Null));
        assert!(values.contains_key("setup_locale"));
    }

    #[test]
    fn round_trip_changes_nothing() {
        let kv: Arc<dyn KVStore> = Arc::new(MemoryStore::new());
        let g = group(&kv);
        g.update(
            &ContentValues::new()
                .with("setup_complete", true)
                .with("setup_locale", "en-GB")
                .with("last_exercise_time", 1_700_000_000_000i64),
        )
        .unwrap();

        let bytes = serialize(&g).unwrap();
        let report = restore(&g, &bytes);
        assert_eq!(report.changed(), 0);
        assert_eq!(report.outcome("setup_locale"), Some(&KeyOutcome::Unchanged));
    }

    #[test]
    fn restore_onto_fresh_store_reproduces_rows() {
        let source: Arc<dyn KVStore> = Arc::new(MemoryStore::new());
        let g = group(&source);
        g.update(&ContentValues::new().with("retail_mode", 1).with("setup_locale", "fr"))
            .unwrap();
        let bytes = serialize(&g).unwrap();

        let target: Arc<dyn KVStore> = Arc::new(MemoryStore::new());
        let fresh = group(&target);
        let report = restore(&fresh, &bytes);
        assert_eq!(report.changed(), 2);
        assert_eq!(fresh.query().unwrap(), g.query().unwrap());
    }

    #[test]
    fn empty_and_truncated_input_is_empty() {
        assert!(deserialize(b"").unwrap().is_empty());
        assert!(deserialize(b"  \n").unwrap().is_empty());
        assert!(deserialize(br#"{"setup_complete":"1","ret"#).unwrap().is_empty());
    }

    #[test]
    fn malformed_input_is_a_codec_error() {
        let err = deserialize(b"{not json}").unwrap_err();
        assert!(matches!(err, SettingsError::Codec(_)));

        let kv: Arc<dyn KVStore> = Arc::new(MemoryStore::new());
        assert_eq!(restore(&group(&kv), b"{not json}"), RestoreReport::default());
    }

    #[test]
    fn typed_scalars_are_accepted() {
        let values = deserialize(br#"{"a":true,"b":7,"c":4294967296,"d":null,"e":[1]}"#).unwrap();
        assert_eq!(values.get("a"), Some(&SettingValue::Bool(true)));
        assert_eq!(values.get("b"), Some(&SettingValue::Int(7)));
        assert_eq!(values.get("c"), Some(&SettingValue::Long(4_294_967_296)));
        assert_eq!(values.get("d"), Some(&SettingValue::Null));
        assert!(!values.contains_key("e"));
    }

    #[test]
    fn partial_restore_applies_valid_keys() {
        let kv: Arc<dyn KVStore> = Arc::new(MemoryStore::new());
        let g = group(&kv);
        let blob = br#"{"setup_complete":"1","retail_mode":"5","has_speaker":"0","gone":"x"}"#;

        let report = restore(&g, blob);
        assert_eq!(report.outcome("setup_complete"), Some(&KeyOutcome::Changed));
        assert!(matches!(report.outcome("retail_mode"), Some(KeyOutcome::Skipped(_))));
        assert!(matches!(report.outcome("has_speaker"), Some(KeyOutcome::Skipped(_))));
        assert!(matches!(report.outcome("gone"), Some(KeyOutcome::Skipped(_))));

        let rows = g.query().unwrap();
        assert_eq!(rows[0].value, SettingValue::Int(1));
        assert_eq!(rows[1].value, SettingValue::Int(0));
    }
}
