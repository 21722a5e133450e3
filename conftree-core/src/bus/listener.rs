//! Listener types for the change bus.
//!
//! A listener is any callback registered on a node's bus. Closures can't be
//! compared, so every registration hands back a [`ListenerId`] that is later
//! used to remove it again.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::change::Change;

/// Unique identifier for a registered listener.
///
/// Ids are process-wide unique, so an id obtained from one bus never
/// accidentally removes a listener on another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Generate a new unique listener ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ListenerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener#{}", self.0)
    }
}

/// Callback invoked with each emitted change.
pub type Callback = Arc<dyn Fn(&Change) + Send + Sync>;

/// A registered listener.
///
/// Stored behind an `Arc` so emission can snapshot the list and release the
/// bus lock before any callback runs.
#[derive(Clone)]
pub(crate) struct Listener {
    id: ListenerId,
    once: bool,
    callback: Callback,
}

impl Listener {
    pub(crate) fn new(callback: Callback, once: bool) -> Self {
        Self {
            id: ListenerId::new(),
            once,
            callback,
        }
    }

    pub(crate) fn id(&self) -> ListenerId {
        self.id
    }

    pub(crate) fn is_once(&self) -> bool {
        self.once
    }

    pub(crate) fn call(&self, change: &Change) {
        (self.callback)(change);
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("id", &self.id)
            .field("once", &self.once)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn listener_ids_are_unique() {
        let id1 = ListenerId::new();
        let id2 = ListenerId::new();
        let id3 = ListenerId::new();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
    }

    #[test]
    fn listener_call_invokes_callback() {
        let called = Arc::new(AtomicBool::new(false));
        let called_clone = called.clone();

        let listener = Listener::new(
            Arc::new(move |_: &Change| called_clone.store(true, Ordering::SeqCst)),
            false,
        );

        assert!(!called.load(Ordering::SeqCst));
        listener.call(&Change::new("k", None, None));
        assert!(called.load(Ordering::SeqCst));
    }
}
