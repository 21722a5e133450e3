//! Change Bus
//!
//! Every node in a config tree owns exactly one bus. The bus is a small
//! publish/subscribe primitive with `on`, `once`, `off` and `emit` over a
//! fixed set of event names.
//!
//! # Emission
//!
//! `emit` snapshots the listeners registered at the moment of the call and
//! releases the lock before running any of them. Listeners therefore may
//! mutate the tree (re-entering emission on this or any other bus), register
//! or remove listeners, without deadlocking. A snapshotted listener that was
//! removed by an earlier one in the same emission is skipped.
//!
//! # Relay
//!
//! A bus whose node sits inside a tree also carries one relay into the
//! parent. The relay lives apart from the listener table: it runs ahead of the
//! listeners on every `Event::Change`, and `off` / `listener_count` never see
//! it. Only attaching and detaching the node touch it.
//!
//! # Failure isolation
//!
//! A listener that panics is caught and logged, and the remaining listeners
//! for the same emission still run. The panic is not propagated to the code
//! that caused the mutation, and the bus stays usable.
//!
//! # Detaching
//!
//! When its node is cut out of a tree, the bus is detached: all listeners are
//! dropped and every later `emit` is a silent no-op. This is what keeps a
//! stale subtree from producing phantom events. Detaching is permanent.

mod listener;

pub use listener::{Callback, ListenerId};

use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::change::Change;
use listener::Listener;

/// Event names a bus can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    /// A value somewhere at or below the node changed.
    Change,
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::Change => "change",
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

struct BusInner {
    listeners: Mutex<HashMap<Event, Vec<Listener>>>,
    relay: Mutex<Option<Callback>>,
    detached: AtomicBool,
}

/// Per-node event bus.
///
/// Cloning a `ChangeBus` yields another handle to the same listener table,
/// like cloning a node handle.
#[derive(Clone)]
pub struct ChangeBus {
    inner: Arc<BusInner>,
}

impl ChangeBus {
    /// Create an empty, attached bus.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BusInner {
                listeners: Mutex::new(HashMap::new()),
                relay: Mutex::new(None),
                detached: AtomicBool::new(false),
            }),
        }
    }

    /// Register a persistent listener.
    pub fn on<F>(&self, event: Event, callback: F) -> ListenerId
    where
        F: Fn(&Change) + Send + Sync + 'static,
    {
        self.register(event, Arc::new(callback), false)
    }

    /// Register a listener that is removed before its first invocation.
    pub fn once<F>(&self, event: Event, callback: F) -> ListenerId
    where
        F: Fn(&Change) + Send + Sync + 'static,
    {
        self.register(event, Arc::new(callback), true)
    }

    fn register(&self, event: Event, callback: Callback, once: bool) -> ListenerId {
        let listener = Listener::new(callback, once);
        let id = listener.id();

        if self.is_detached() {
            tracing::trace!(%event, %id, "listener registered on detached bus; ignored");
            return id;
        }

        self.inner
            .listeners
            .lock()
            .entry(event)
            .or_default()
            .push(listener);
        id
    }

    /// Install the relay into the parent, replacing any previous one.
    /// Ignored on a detached bus.
    pub(crate) fn set_relay(&self, relay: Callback) {
        if self.is_detached() {
            return;
        }
        *self.inner.relay.lock() = Some(relay);
    }

    /// Drop the relay. Returns whether one was installed.
    pub(crate) fn clear_relay(&self) -> bool {
        self.inner.relay.lock().take().is_some()
    }

    /// Whether a relay into a parent is installed.
    pub fn has_relay(&self) -> bool {
        self.inner.relay.lock().is_some()
    }

    /// Remove one listener (`Some(id)`) or every listener (`None`) for `event`.
    ///
    /// Returns how many listeners were removed.
    pub fn off(&self, event: Event, id: Option<ListenerId>) -> usize {
        let mut listeners = self.inner.listeners.lock();
        match id {
            Some(id) => match listeners.get_mut(&event) {
                Some(list) => {
                    let before = list.len();
                    list.retain(|listener| listener.id() != id);
                    before - list.len()
                }
                None => 0,
            },
            None => listeners.remove(&event).map_or(0, |list| list.len()),
        }
    }

    /// Run the relay, then every listener currently registered for `event`
    /// in registration order. Returns the number of listeners invoked, not
    /// counting the relay.
    pub fn emit(&self, event: Event, change: &Change) -> usize {
        if self.is_detached() {
            tracing::trace!(%event, path = %change.path(), "emit on detached bus; dropped");
            return 0;
        }

        if event == Event::Change {
            let relay = self.inner.relay.lock().clone();
            if let Some(relay) = relay {
                guarded(event, change, &"relay", || relay(change));
            }
        }

        let snapshot = match self.inner.listeners.lock().get(&event) {
            Some(list) => list.clone(),
            None => return 0,
        };

        let mut invoked = 0;
        for listener in &snapshot {
            if !self.claim(event, listener) {
                continue;
            }
            invoked += 1;
            guarded(event, change, &listener.id(), || listener.call(change));
        }

        invoked
    }

    /// Whether `listener` is still registered. A `once` listener is removed
    /// as it is claimed, so it runs at most once even under re-entrancy.
    fn claim(&self, event: Event, listener: &Listener) -> bool {
        let mut listeners = self.inner.listeners.lock();
        let Some(list) = listeners.get_mut(&event) else {
            return false;
        };
        let Some(position) = list.iter().position(|l| l.id() == listener.id()) else {
            return false;
        };
        if listener.is_once() {
            list.remove(position);
        }
        true
    }

    /// Number of listeners registered for `event`.
    pub fn listener_count(&self, event: Event) -> usize {
        self.inner
            .listeners
            .lock()
            .get(&event)
            .map_or(0, Vec::len)
    }

    /// Whether this bus has been detached.
    pub fn is_detached(&self) -> bool {
        self.inner.detached.load(Ordering::SeqCst)
    }

    /// Permanently silence the bus and drop all of its listeners.
    pub fn detach(&self) {
        self.inner.detached.store(true, Ordering::SeqCst);
        self.inner.relay.lock().take();
        let dropped = std::mem::take(&mut *self.inner.listeners.lock());
        tracing::trace!(
            listeners = dropped.values().map(Vec::len).sum::<usize>(),
            "bus detached"
        );
    }

    /// Weak handle, used by relays so a child never keeps its parent alive.
    pub(crate) fn downgrade(&self) -> WeakBus {
        WeakBus {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Whether two handles refer to the same bus.
    pub fn ptr_eq(&self, other: &ChangeBus) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for ChangeBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ChangeBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeBus")
            .field("listeners", &self.listener_count(Event::Change))
            .field("relay", &self.has_relay())
            .field("detached", &self.is_detached())
            .finish()
    }
}

/// Non-owning handle to a [`ChangeBus`].
#[derive(Clone)]
pub(crate) struct WeakBus {
    inner: Weak<BusInner>,
}

impl WeakBus {
    pub(crate) fn upgrade(&self) -> Option<ChangeBus> {
        self.inner.upgrade().map(|inner| ChangeBus { inner })
    }
}

/// Run one callback, logging instead of propagating a panic.
fn guarded(event: Event, change: &Change, who: &dyn fmt::Display, call: impl FnOnce()) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(call)) {
        tracing::error!(
            %event,
            listener = %who,
            path = %change.path(),
            panic = panic_message(&*payload),
            "change listener panicked; continuing with remaining listeners"
        );
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "<non-string panic payload>"
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};

    fn change() -> Change {
        Change::new("key", None, None)
    }

    #[test]
    fn on_listener_runs_every_emit() {
        let bus = ChangeBus::new();
        let call_count = Arc::new(AtomicI32::new(0));
        let call_count_clone = call_count.clone();

        bus.on(Event::Change, move |_| {
            call_count_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(bus.emit(Event::Change, &change()), 1);
        assert_eq!(bus.emit(Event::Change, &change()), 1);
        assert_eq!(call_count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn once_listener_runs_once() {
        let bus = ChangeBus::new();
        let call_count = Arc::new(AtomicI32::new(0));
        let call_count_clone = call_count.clone();

        bus.once(Event::Change, move |_| {
            call_count_clone.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(bus.listener_count(Event::Change), 1);

        bus.emit(Event::Change, &change());
        bus.emit(Event::Change, &change());

        assert_eq!(call_count.load(Ordering::SeqCst), 1);
        assert_eq!(bus.listener_count(Event::Change), 0);
    }

    #[test]
    fn listeners_run_in_registration_order() {
        let bus = ChangeBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..3 {
            let order = order.clone();
            bus.on(Event::Change, move |_| order.lock().push(i));
        }

        bus.emit(Event::Change, &change());
        assert_eq!(*order.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn off_removes_one_or_all() {
        let bus = ChangeBus::new();
        let call_count = Arc::new(AtomicI32::new(0));

        let ids: Vec<_> = (0..3)
            .map(|_| {
                let call_count = call_count.clone();
                bus.on(Event::Change, move |_| {
                    call_count.fetch_add(1, Ordering::SeqCst);
                })
            })
            .collect();

        assert_eq!(bus.off(Event::Change, Some(ids[1])), 1);
        assert_eq!(bus.off(Event::Change, Some(ids[1])), 0);
        bus.emit(Event::Change, &change());
        assert_eq!(call_count.load(Ordering::SeqCst), 2);

        assert_eq!(bus.off(Event::Change, None), 2);
        bus.emit(Event::Change, &change());
        assert_eq!(call_count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn panicking_listener_does_not_stop_others() {
        let bus = ChangeBus::new();
        let call_count = Arc::new(AtomicI32::new(0));

        bus.on(Event::Change, |_| panic!("listener failure"));
        let call_count_clone = call_count.clone();
        bus.on(Event::Change, move |_| {
            call_count_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(bus.emit(Event::Change, &change()), 2);
        assert_eq!(call_count.load(Ordering::SeqCst), 1);

        // The bus keeps working afterwards.
        bus.emit(Event::Change, &change());
        assert_eq!(call_count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn detached_bus_is_silent() {
        let bus = ChangeBus::new();
        let call_count = Arc::new(AtomicI32::new(0));
        let call_count_clone = call_count.clone();

        bus.on(Event::Change, move |_| {
            call_count_clone.fetch_add(1, Ordering::SeqCst);
        });
        bus.detach();

        assert!(bus.is_detached());
        assert_eq!(bus.listener_count(Event::Change), 0);
        assert_eq!(bus.emit(Event::Change, &change()), 0);

        // Late registrations are ignored as well.
        let call_count_clone = call_count.clone();
        bus.on(Event::Change, move |_| {
            call_count_clone.fetch_add(1, Ordering::SeqCst);
        });
        bus.emit(Event::Change, &change());
        assert_eq!(call_count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn listener_may_reenter_the_bus() {
        let bus = ChangeBus::new();
        let call_count = Arc::new(AtomicI32::new(0));

        let inner_bus = bus.clone();
        let call_count_clone = call_count.clone();
        bus.once(Event::Change, move |change| {
            call_count_clone.fetch_add(1, Ordering::SeqCst);
            inner_bus.emit(Event::Change, change);
        });
        let call_count_clone = call_count.clone();
        bus.on(Event::Change, move |_| {
            call_count_clone.fetch_add(10, Ordering::SeqCst);
        });

        bus.emit(Event::Change, &change());
        // once (1) + nested persistent (10) + outer persistent (10)
        assert_eq!(call_count.load(Ordering::SeqCst), 21);
    }

    #[test]
    fn listener_removed_mid_emit_is_skipped() {
        let bus = ChangeBus::new();
        let call_count = Arc::new(AtomicI32::new(0));
        let victim = Arc::new(Mutex::new(None));

        let remover_bus = bus.clone();
        let victim_clone = victim.clone();
        bus.on(Event::Change, move |_| {
            if let Some(id) = victim_clone.lock().take() {
                remover_bus.off(Event::Change, Some(id));
            }
        });
        let call_count_clone = call_count.clone();
        let id = bus.on(Event::Change, move |_| {
            call_count_clone.fetch_add(1, Ordering::SeqCst);
        });
        *victim.lock() = Some(id);

        assert_eq!(bus.emit(Event::Change, &change()), 1);
        assert_eq!(call_count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn relay_is_separate_from_listeners() {
        let bus = ChangeBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let order_clone = order.clone();
        bus.on(Event::Change, move |_| order_clone.lock().push("listener"));
        let order_clone = order.clone();
        bus.set_relay(Arc::new(move |_: &Change| order_clone.lock().push("relay")));

        assert!(bus.has_relay());
        assert_eq!(bus.listener_count(Event::Change), 1);
        assert_eq!(bus.emit(Event::Change, &change()), 1);
        assert_eq!(*order.lock(), vec!["relay", "listener"]);

        // Removing every listener leaves the relay in place.
        assert_eq!(bus.off(Event::Change, None), 1);
        bus.emit(Event::Change, &change());
        assert_eq!(*order.lock(), vec!["relay", "listener", "relay"]);

        assert!(bus.clear_relay());
        bus.emit(Event::Change, &change());
        assert_eq!(order.lock().len(), 3);
    }

    #[test]
    fn detach_drops_the_relay() {
        let bus = ChangeBus::new();
        bus.set_relay(Arc::new(|_: &Change| {}));
        bus.detach();
        assert!(!bus.has_relay());

        bus.set_relay(Arc::new(|_: &Change| {}));
        assert!(!bus.has_relay());
    }

    #[test]
    fn weak_bus_does_not_keep_bus_alive() {
        let bus = ChangeBus::new();
        let weak = bus.downgrade();
        assert!(weak.upgrade().is_some_and(|b| b.ptr_eq(&bus)));

        drop(bus);
        assert!(weak.upgrade().is_none());
    }
}
