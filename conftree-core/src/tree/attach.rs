//! Propagation Chain
//!
//! Children never point at their parents. Instead, when a composite child is
//! placed in a slot, the parent installs a *relay* on the child's bus. The
//! relay sits beside the user listeners, so `off` on the child can't cut it. The relay holds a weak handle to the parent's bus and the child's
//! current slot, and re-emits every child change on the parent with that slot
//! prefixed to the path. Chained relays carry a change from the mutated node
//! all the way to the root, one emission per level.
//!
//! Each composite keeps its attachment record on its own state. Detaching
//! removes the relay, clears the record and silences the bus, recursively for
//! the whole subtree.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::bus::{ChangeBus, Event};
use crate::change::{Change, PathSegment};

use super::id::NodeId;
use super::Value;

/// The link between a child and the parent slot that currently holds it.
#[derive(Debug)]
struct Attachment {
    slot: Arc<Mutex<PathSegment>>,
}

/// State shared by every composite node: identity, bus and attachment.
#[derive(Debug)]
pub(crate) struct NodeCore {
    id: NodeId,
    bus: ChangeBus,
    attachment: Mutex<Option<Attachment>>,
}

impl NodeCore {
    pub(crate) fn new() -> Self {
        Self {
            id: NodeId::new(),
            bus: ChangeBus::new(),
            attachment: Mutex::new(None),
        }
    }

    pub(crate) fn id(&self) -> NodeId {
        self.id
    }

    pub(crate) fn bus(&self) -> &ChangeBus {
        &self.bus
    }

    pub(crate) fn is_attached(&self) -> bool {
        self.attachment.lock().is_some()
    }

    /// Slot currently holding this node in its parent, if attached.
    pub(crate) fn slot(&self) -> Option<PathSegment> {
        self.attachment
            .lock()
            .as_ref()
            .map(|attachment| attachment.slot.lock().clone())
    }
}

/// Subscribe `parent` to `child`'s changes through `segment`.
///
/// Primitives are ignored. A child placed under an already detached parent
/// is detached immediately, since nothing above it can hear it anyway.
pub(crate) fn attach(parent: &ChangeBus, child: &Value, segment: PathSegment) {
    let Some(core) = child.core() else {
        return;
    };

    if parent.is_detached() {
        detach(child);
        return;
    }

    let slot = Arc::new(Mutex::new(segment));
    let relay_slot = slot.clone();
    let upstream = parent.downgrade();
    core.bus.set_relay(Arc::new(move |change: &Change| {
        if let Some(parent) = upstream.upgrade() {
            let segment = relay_slot.lock().clone();
            parent.emit(Event::Change, &change.prefixed(segment));
        }
    }));

    *core.attachment.lock() = Some(Attachment { slot });
}

/// Point an attached child at a new array index after a shift.
pub(crate) fn reindex(child: &Value, index: usize) {
    if let Some(core) = child.core() {
        if let Some(attachment) = core.attachment.lock().as_ref() {
            *attachment.slot.lock() = PathSegment::Index(index);
        }
    }
}

/// Cut `value` and everything below it out of the notification graph.
pub(crate) fn detach(value: &Value) {
    let Some(core) = value.core() else {
        return;
    };

    core.attachment.lock().take();
    core.bus.clear_relay();
    core.bus.detach();
    tracing::trace!(node = %core.id, "detached");

    for child in value.children() {
        detach(&child);
    }
}
