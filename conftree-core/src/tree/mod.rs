//! Reactive Tree
//!
//! This module implements the config tree itself: composite [`Node`]s and
//! [`ArrayNode`]s holding [`Value`]s, the materializer that builds them from
//! plain data, and the propagation chain that carries changes upward.
//!
//! # Ownership
//!
//! Ownership is strictly top-down. A parent owns its children; a child holds
//! no reference to its parent. Upward notification works because the parent
//! subscribes to each child's bus (see `attach`), so a mutation at depth *d*
//! is observed as exactly *d + 1* emissions, one per level, each with the
//! path relative to that level.
//!
//! # Writes
//!
//! All writes take plain values (`serde_json::Value` or anything convertible
//! into one) and materialize them. A live subtree can therefore never end up
//! in two places, and moving data means snapshotting it with `to_plain()`.

mod array;
mod attach;
mod id;
mod materialize;
mod node;
mod value;

pub use array::{ArrayNode, MAX_PADDING};
pub use id::NodeId;
pub use materialize::materialize;
pub use node::Node;
pub use value::Value;

use serde_json::Value as JsonValue;

use crate::bus::{ChangeBus, Event, ListenerId};
use crate::change::Change;

/// Anything that owns a change bus.
///
/// Implemented by [`Node`], [`ArrayNode`] and [`Root`](crate::Root).
pub trait Observable {
    /// The node's own bus.
    fn bus(&self) -> &ChangeBus;

    /// Register a persistent listener.
    fn on<F>(&self, event: Event, callback: F) -> ListenerId
    where
        F: Fn(&Change) + Send + Sync + 'static,
    {
        self.bus().on(event, callback)
    }

    /// Register a listener that fires at most once.
    fn once<F>(&self, event: Event, callback: F) -> ListenerId
    where
        F: Fn(&Change) + Send + Sync + 'static,
    {
        self.bus().once(event, callback)
    }

    /// Remove one listener, or all of them with `None`. The relay into the
    /// parent is not a listener and stays in place.
    fn off(&self, event: Event, id: Option<ListenerId>) -> usize {
        self.bus().off(event, id)
    }

    /// Number of registered listeners.
    fn listener_count(&self, event: Event) -> usize {
        self.bus().listener_count(event)
    }
}

impl Observable for Node {
    fn bus(&self) -> &ChangeBus {
        Node::bus(self)
    }
}

impl Observable for ArrayNode {
    fn bus(&self) -> &ChangeBus {
        ArrayNode::bus(self)
    }
}

/// The `$set` operation, shared by nodes and arrays.
pub trait Assign {
    /// `String` for nodes, `usize` for arrays.
    type Key;

    /// Write through the full detach/materialize/emit pipeline and return
    /// the target for chaining.
    fn assign<K, V>(&self, key: K, value: V) -> &Self
    where
        K: Into<Self::Key>,
        V: Into<JsonValue>;
}

impl Assign for Node {
    type Key = String;

    fn assign<K, V>(&self, key: K, value: V) -> &Self
    where
        K: Into<Self::Key>,
        V: Into<JsonValue>,
    {
        let key: String = key.into();
        self.set(key, value);
        self
    }
}

impl Assign for ArrayNode {
    type Key = usize;

    fn assign<K, V>(&self, key: K, value: V) -> &Self
    where
        K: Into<Self::Key>,
        V: Into<JsonValue>,
    {
        self.set(key.into(), value);
        self
    }
}
