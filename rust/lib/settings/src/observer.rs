//! Content observers notified when a settings URI changes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use crate::matcher::pattern_matches;
use crate::paths;

/// Callback receiving the changed URI.
pub type ObserverFn = Arc<dyn Fn(&str) + Send + Sync>;

/// Handle returned by [`ContentObservers::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

struct ObserverEntry {
    pattern: String,
    id: ObserverId,
    handler: ObserverFn,
}

/// Observer registry keyed by path pattern (`bluetooth`, `#`, ...).
///
/// Handlers run synchronously on the notifying thread, in registration order.
pub struct ContentObservers {
    authority: String,
    handlers: RwLock<Vec<ObserverEntry>>,
    next_id: AtomicU64,
}

impl ContentObservers {
    pub fn new(authority: impl Into<String>) -> Self {
        Self {
            authority: authority.into(),
            handlers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Observe every path matching `pattern`.
    pub fn register<F>(&self, pattern: &str, handler: F) -> ObserverId
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        let id = ObserverId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(ObserverEntry {
                pattern: pattern.to_string(),
                id,
                handler: Arc::new(handler),
            });
        id
    }

    pub fn unregister(&self, pattern: &str, id: ObserverId) -> bool {
        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        let before = handlers.len();
        handlers.retain(|entry| !(entry.id == id && entry.pattern == pattern));
        handlers.len() != before
    }

    /// Notify observers of `path`. Returns how many handlers ran.
    pub fn notify(&self, path: &str) -> usize {
        let uri = paths::uri(&self.authority, path);
        // Handlers may register or unregister, so run them outside the lock.
        let matched: Vec<ObserverFn> = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|entry| pattern_matches(&entry.pattern, path))
            .map(|entry| Arc::clone(&entry.handler))
            .collect();
        debug!("observers: {} -> {} handler(s)", uri, matched.len());
        for handler in &matched {
            handler(&uri);
        }
        matched.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) + Send + Sync + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        (seen, move |uri: &str| s.lock().unwrap().push(uri.to_string()))
    }

    #[test]
    fn notify_passes_full_uri() {
        let observers = ContentObservers::new("com.wear.settings");
        let (seen, handler) = recorder();
        observers.register("bluetooth", handler);

        assert_eq!(observers.notify("bluetooth"), 1);
        assert_eq!(observers.notify("wifi"), 0);
        assert_eq!(
            *seen.lock().unwrap(),
            vec!["content://com.wear.settings/bluetooth".to_string()]
        );
    }

    #[test]
    fn wildcard_observer_sees_everything() {
        let observers = ContentObservers::new("a");
        let (seen, handler) = recorder();
        observers.register("#", handler);
        observers.notify("wifi");
        observers.notify("time");
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[test]
    fn unregister_stops_notifications() {
        let observers = ContentObservers::new("a");
        let (seen, handler) = recorder();
        let id = observers.register("wifi", handler);
        assert!(!observers.unregister("#", id));
        assert!(observers.unregister("wifi", id));
        assert!(!observers.unregister("wifi", id));
        assert_eq!(observers.notify("wifi"), 0);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn single_level_pattern_and_registration_order() {
        let observers = ContentObservers::new("a");
        let order = Arc::new(Mutex::new(Vec::new()));
        for (tag, pattern) in [(1, "#"), (2, "channels/+"), (3, "channels")] {
            let o = Arc::clone(&order);
            observers.register(pattern, move |_| o.lock().unwrap().push(tag));
        }
        assert_eq!(observers.notify("channels/calls"), 2);
        assert_eq!(*order.lock().unwrap(), vec![1, 2]);
    }
}
