//! URI dispatcher in front of the property registry.
//!
//! The provider resolves `content://{authority}/{path}` to a registered
//! group, forwards queries and updates, tracks whether a backup is pending
//! and fans change notifications out to content observers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, info, warn};

use crate::error::SettingsError;
use crate::matcher::UriMatcher;
use crate::observer::ContentObservers;
use crate::paths::{self, keys};
use crate::registry::{PropertiesMap, RegistryFactory};
use crate::signal::{Signal, SignalBus, BACKUP_PERMISSION};
use crate::value::{ContentValues, Row};

/// Matcher code of the synthetic `needs_backup` path.
const META_CODE: i32 = -1;

/// Pending-backup state.
///
/// Every change bumps a generation counter. A backup pass records the
/// generation it started from and, once finished, clears the flag only up to
/// that point: changes made while the pass was running keep it set.
#[derive(Debug, Default)]
pub struct DirtyFlag {
    generation: AtomicU64,
    backed_up: AtomicU64,
}

impl DirtyFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_set(&self) -> bool {
        self.generation.load(Ordering::SeqCst) > self.backed_up.load(Ordering::SeqCst)
    }

    /// Generation of the latest change.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn mark(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Record that everything up to `generation` is backed up.
    pub fn clear_through(&self, generation: u64) {
        self.backed_up.fetch_max(generation, Ordering::SeqCst);
    }

    /// `1` when set, `0` otherwise, as reported by the meta path.
    pub fn as_int(&self) -> i32 {
        i32::from(self.is_set())
    }
}

/// What a URI routes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Group(String),
    Meta,
    NoMatch,
}

/// Registry snapshot plus the matcher built for it.
struct Routes {
    registry: Arc<PropertiesMap>,
    matcher: UriMatcher,
}

impl Routes {
    fn new(authority: &str, registry: PropertiesMap) -> Self {
        let mut matcher = UriMatcher::new(authority);
        for (code, path) in registry.paths().enumerate() {
            matcher.add_path(path, code as i32);
        }
        matcher.add_path(paths::NEEDS_BACKUP, META_CODE);
        Self {
            registry: Arc::new(registry),
            matcher,
        }
    }

    fn resolve(&self, uri: &str) -> Resolution {
        match self.matcher.match_uri(uri) {
            Some(META_CODE) => Resolution::Meta,
            Some(code) => match self.registry.get_index(code as usize) {
                Some(group) => Resolution::Group(group.path().to_string()),
                None => Resolution::NoMatch,
            },
            None => {
                warn!("settings provider: no match for {}", uri);
                Resolution::NoMatch
            }
        }
    }
}

pub struct SettingsProvider {
    authority: String,
    routes: RwLock<Arc<Routes>>,
    factory: RegistryFactory,
    observers: ContentObservers,
    dirty: Arc<DirtyFlag>,
}

impl SettingsProvider {
    /// Build the registry and start listening for backup signals on `bus`.
    pub fn new(
        authority: impl Into<String>,
        factory: RegistryFactory,
        bus: &SignalBus,
    ) -> Arc<Self> {
        let authority = authority.into();
        let routes = Routes::new(&authority, factory());
        info!(
            "settings provider {}: {} group(s)",
            authority,
            routes.registry.len()
        );

        let provider = Arc::new(Self {
            observers: ContentObservers::new(authority.clone()),
            authority,
            routes: RwLock::new(Arc::new(routes)),
            factory,
            dirty: Arc::new(DirtyFlag::new()),
        });

        let weak = Arc::downgrade(&provider);
        bus.register(BACKUP_PERMISSION, move |signal| {
            if let Some(provider) = weak.upgrade() {
                provider.on_signal(signal);
            }
        });
        provider
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    pub fn uri_for(&self, path: &str) -> String {
        paths::uri(&self.authority, path)
    }

    /// Current registry snapshot.
    pub fn registry(&self) -> Arc<PropertiesMap> {
        Arc::clone(&self.routes().registry)
    }

    pub fn dirty_flag(&self) -> Arc<DirtyFlag> {
        Arc::clone(&self.dirty)
    }

    pub fn observers(&self) -> &ContentObservers {
        &self.observers
    }

    fn routes(&self) -> Arc<Routes> {
        Arc::clone(&self.routes.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn resolve(&self, uri: &str) -> Resolution {
        self.routes().resolve(uri)
    }

    /// Rows for `uri`, or `None` if nothing is registered there.
    pub fn query(&self, uri: &str) -> Result<Option<Vec<Row>>, SettingsError> {
        let routes = self.routes();
        match routes.resolve(uri) {
            Resolution::NoMatch => Ok(None),
            Resolution::Meta => Ok(Some(vec![Row::new(keys::NEEDS_BACKUP, self.dirty.as_int())])),
            Resolution::Group(path) => match routes.registry.get(&path) {
                Some(group) => group.query().map(Some),
                None => Ok(None),
            },
        }
    }

    /// Apply `values` to the group at `uri`. Returns the number of changed
    /// rows, or `None` if nothing is registered there.
    ///
    /// A non-zero change notifies observers of the URI and every alias the
    /// group declares, then marks the provider dirty.
    pub fn update(
        &self,
        uri: &str,
        values: &ContentValues,
    ) -> Result<Option<usize>, SettingsError> {
        let routes = self.routes();
        let path = match routes.resolve(uri) {
            Resolution::NoMatch => return Ok(None),
            Resolution::Meta => {
                debug!("settings provider: ignoring update of {}", uri);
                return Ok(Some(0));
            }
            Resolution::Group(path) => path,
        };
        let Some(group) = routes.registry.get(&path) else {
            return Ok(None);
        };

        let changed = group.update(values)?;
        if changed > 0 {
            self.observers.notify(&path);
            for alias in group.notify_aliases() {
                self.observers.notify(alias);
            }
            self.dirty.mark();
            debug!("settings provider: {} changed {} row(s)", path, changed);
        }
        Ok(Some(changed))
    }

    /// Replace the registry with a fresh build and notify every group URI.
    pub fn reload(&self) {
        let routes = Arc::new(Routes::new(&self.authority, (self.factory)()));
        *self.routes.write().unwrap_or_else(PoisonError::into_inner) = Arc::clone(&routes);
        info!("settings provider: registry reloaded");
        for group in routes.registry.iter() {
            self.observers.notify(group.path());
            for alias in group.notify_aliases() {
                self.observers.notify(alias);
            }
        }
    }

    fn on_signal(&self, signal: Signal) {
        match signal {
            Signal::BackupComplete { generation } => {
                self.dirty.clear_through(generation);
                debug!(
                    "settings provider: backup of generation {} complete, dirty={}",
                    generation,
                    self.dirty.is_set()
                );
            }
            Signal::RestoreComplete => self.reload(),
        }
    }
}
