//! Notification channel importance, owned by the notification backend.
//!
//! One row per channel: key is the channel id, value its importance.

use std::sync::Arc;

use tracing::debug;

use crate::error::SettingsError;
use crate::group::ComputedGroup;
use crate::host::NotificationBackend;
use crate::paths;
use crate::value::{ContentValues, Row};

pub const IMPORTANCE_NONE: i32 = 0;
pub const IMPORTANCE_MAX: i32 = 5;

pub struct NotificationChannelsGroup {
    backend: Arc<dyn NotificationBackend>,
}

impl NotificationChannelsGroup {
    pub fn new(backend: Arc<dyn NotificationBackend>) -> Self {
        Self { backend }
    }
}

impl ComputedGroup for NotificationChannelsGroup {
    fn path(&self) -> &str {
        paths::NOTIFICATION_CHANNELS
    }

    fn query(&self) -> Result<Vec<Row>, SettingsError> {
        Ok(self
            .backend
            .channels()?
            .into_iter()
            .map(|c| Row::new(c.id, c.importance))
            .collect())
    }

    /// Every entry is validated before any importance is applied.
    fn update(&self, values: &ContentValues) -> Result<usize, SettingsError> {
        let channels = self.backend.channels()?;
        let mut pending = Vec::with_capacity(values.len());
        for (id, value) in values.iter() {
            let channel = channels.iter().find(|c| c.id == id).ok_or_else(|| {
                SettingsError::invalid(format!("unknown notification channel '{}'", id))
            })?;
            let importance = value
                .as_int()
                .filter(|i| (IMPORTANCE_NONE..=IMPORTANCE_MAX).contains(i))
                .ok_or_else(|| {
                    SettingsError::invalid(format!("channel {}: bad importance '{}'", id, value))
                })?;
            if channel.importance != importance {
                pending.push((id, importance));
            }
        }

        for (id, importance) in &pending {
            self.backend.set_importance(id, *importance)?;
            debug!("notification channel {} importance={}", id, importance);
        }
        Ok(pending.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::KeyOutcome;
    use crate::host::MemoryNotificationBackend;
    use crate::value::SettingValue;

    fn group() -> NotificationChannelsGroup {
        let backend = MemoryNotificationBackend::default()
            .with_channel("calls", 4)
            .with_channel("fitness", 3);
        NotificationChannelsGroup::new(Arc::new(backend))
    }

    #[test]
    fn query_lists_channels() {
        assert_eq!(
            group().query().unwrap(),
            vec![Row::new("calls", 4), Row::new("fitness", 3)]
        );
    }

    #[test]
    fn update_is_all_or_nothing() {
        let group = group();
        let values = ContentValues::new()
            .with("calls", 2)
            .with("fitness", 9);
        assert!(group.update(&values).unwrap_err().is_invalid_argument());
        assert_eq!(group.query().unwrap()[0], Row::new("calls", 4));

        let values = ContentValues::new().with("calls", 2).with("fitness", 3);
        assert_eq!(group.update(&values).unwrap(), 1);
        assert_eq!(group.query().unwrap()[0], Row::new("calls", 2));
    }

    #[test]
    fn restore_skips_channels_missing_on_this_device() {
        let group = group();
        let blob = ContentValues::new()
            .with("calls", "1")
            .with("weather", "2")
            .with("fitness", SettingValue::Null);
        let report = group.restore(&blob);
        assert_eq!(report.outcome("calls"), Some(&KeyOutcome::Changed));
        assert!(matches!(report.outcome("weather"), Some(KeyOutcome::Skipped(_))));
        assert!(matches!(report.outcome("fitness"), Some(KeyOutcome::Skipped(_))));
    }
}
