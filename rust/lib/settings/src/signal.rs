//! Permission-gated completion signals between the backup agent and the
//! provider.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, warn};

/// Permission both sides of the backup handshake must hold.
pub const BACKUP_PERMISSION: &str = "com.wear.settings.permission.BACKUP";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    /// A backup pass that started at dirty `generation` finished.
    BackupComplete { generation: u64 },
    RestoreComplete,
}

impl Signal {
    pub fn action(&self) -> &'static str {
        match self {
            Signal::BackupComplete { .. } => "com.wear.settings.action.BACKUP_COMPLETE",
            Signal::RestoreComplete => "com.wear.settings.action.RESTORE_COMPLETE",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.action())
    }
}

type SignalHandler = Arc<dyn Fn(Signal) + Send + Sync>;

struct Receiver {
    permission: String,
    handler: SignalHandler,
}

/// In-process broadcast bus. A signal reaches only receivers registered
/// with the same permission string.
#[derive(Default)]
pub struct SignalBus {
    receivers: RwLock<Vec<Receiver>>,
}

impl SignalBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&self, permission: &str, handler: F)
    where
        F: Fn(Signal) + Send + Sync + 'static,
    {
        self.receivers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Receiver {
                permission: permission.to_string(),
                handler: Arc::new(handler),
            });
    }

    /// Deliver `signal` to receivers holding `permission`. Returns the
    /// number of receivers reached.
    pub fn send(&self, signal: Signal, permission: &str) -> usize {
        // Clone handlers out so a receiver may register or send re-entrantly.
        let handlers: Vec<SignalHandler> = self
            .receivers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|r| r.permission == permission)
            .map(|r| Arc::clone(&r.handler))
            .collect();

        if handlers.is_empty() {
            warn!("signal {} ({}): no receivers", signal, permission);
        } else {
            debug!("signal {}: {} receiver(s)", signal, handlers.len());
        }
        for handler in &handlers {
            handler(signal);
        }
        handlers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn delivery_is_permission_gated() {
        let bus = SignalBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        bus.register(BACKUP_PERMISSION, move |sig| s.lock().unwrap().push(sig));

        let done = Signal::BackupComplete { generation: 3 };
        assert_eq!(bus.send(done, "some.other.permission"), 0);
        assert_eq!(bus.send(done, BACKUP_PERMISSION), 1);
        assert_eq!(bus.send(Signal::RestoreComplete, BACKUP_PERMISSION), 1);
        assert_eq!(*seen.lock().unwrap(), vec![done, Signal::RestoreComplete]);
    }

    #[test]
    fn action_names_are_stable() {
        assert_eq!(
            Signal::BackupComplete { generation: 0 }.to_string(),
            "com.wear.settings.action.BACKUP_COMPLETE"
        );
        assert_eq!(
            Signal::RestoreComplete.action(),
            "com.wear.settings.action.RESTORE_COMPLETE"
        );
    }
}
