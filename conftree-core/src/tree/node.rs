//! Node Implementation
//!
//! A [`Node`] is the reactive wrapper around a key-value mapping. Reads are
//! transparent. Every write goes through the same pipeline:
//!
//! 1. The plain value being written is materialized (composites become fresh
//!    nodes, attached to this node through the slot's key).
//! 2. The slot is swapped under the node's lock.
//! 3. A composite that previously occupied the slot is detached, silencing
//!    its whole subtree.
//! 4. A [`Change`] for the slot is emitted on this node's bus, from where it
//!    bubbles to every attached ancestor.
//!
//! The lock is released before step 3, so listeners are free to read and
//! write the tree.
//!
//! Writing a primitive equal to the one already stored under an existing key
//! changes nothing and emits nothing.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::{Mutex, MutexGuard};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value as JsonValue};

use super::attach::{self, NodeCore};
use super::id::NodeId;
use super::{materialize, Value};
use crate::bus::{ChangeBus, Event};
use crate::change::{Change, PathSegment};
use crate::error::{ConfigError, Result};

struct NodeState {
    core: NodeCore,
    entries: Mutex<IndexMap<String, Value>>,
}

/// Reactive key-value node.
///
/// Cloning a `Node` yields another handle to the same node. Use
/// [`Node::to_plain`] for an independent copy of the data.
///
/// # Example
///
/// ```rust,ignore
/// let server = Node::from_plain(json!({"dev": {"host": "dev-host"}}))?;
///
/// server.on(Event::Change, |change| println!("{change}"));
///
/// server.get("dev").unwrap().as_node().unwrap().set("host", "localhost");
/// // Prints: "dev.host: \"dev-host\" -> \"localhost\""
/// ```
#[derive(Clone)]
pub struct Node {
    state: Arc<NodeState>,
}

impl Node {
    /// Create an empty root node.
    pub fn new() -> Self {
        Self {
            state: Arc::new(NodeState {
                core: NodeCore::new(),
                entries: Mutex::new(IndexMap::new()),
            }),
        }
    }

    /// Materialize a plain object into a new root node.
    ///
    /// Fails with [`ConfigError::InvalidInput`] for anything but an object.
    pub fn from_plain(plain: JsonValue) -> Result<Self> {
        match plain {
            JsonValue::Object(map) => Ok(Self::from_map(map)),
            other => Err(ConfigError::invalid_input(&other)),
        }
    }

    pub(crate) fn from_map(map: Map<String, JsonValue>) -> Self {
        let node = Self::new();
        {
            let mut entries = node.entries();
            entries.reserve(map.len());
            for (key, plain) in map {
                let child = materialize(plain);
                attach::attach(node.bus(), &child, PathSegment::Key(key.clone()));
                entries.insert(key, child);
            }
        }
        node
    }

    fn entries(&self) -> MutexGuard<'_, IndexMap<String, Value>> {
        self.state.entries.lock()
    }

    pub(crate) fn core(&self) -> &NodeCore {
        &self.state.core
    }

    pub fn id(&self) -> NodeId {
        self.state.core.id()
    }

    pub fn bus(&self) -> &ChangeBus {
        self.state.core.bus()
    }

    /// Whether this node currently sits in a parent slot.
    ///
    /// Roots are never attached; detached nodes never are again.
    pub fn is_attached(&self) -> bool {
        self.state.core.is_attached()
    }

    /// Whether this node was cut out of its tree. Detached nodes never emit.
    pub fn is_detached(&self) -> bool {
        self.bus().is_detached()
    }

    /// The key (or index) under which the parent holds this node.
    pub fn slot(&self) -> Option<PathSegment> {
        self.state.core.slot()
    }

    /// Whether two handles refer to the same node.
    pub fn ptr_eq(&self, other: &Node) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.entries().get(key).cloned()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> Vec<String> {
        self.entries().keys().cloned().collect()
    }

    pub fn values(&self) -> Vec<Value> {
        self.entries().values().cloned().collect()
    }

    /// Snapshot of all entries in insertion order.
    pub fn entries_snapshot(&self) -> Vec<(String, Value)> {
        self.entries()
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    /// Write `value` under `key`. Returns the previous value.
    pub fn set(&self, key: impl Into<String>, value: impl Into<JsonValue>) -> Option<Value> {
        let key: String = key.into();
        let new = materialize(value.into());
        attach::attach(self.bus(), &new, PathSegment::Key(key.clone()));

        let old = {
            let mut entries = self.entries();
            if let Some(existing) = entries.get(&key) {
                if !new.is_composite() && existing.same(&new) {
                    return Some(existing.clone());
                }
            }
            entries.insert(key.clone(), new.clone())
        };

        if let Some(old) = &old {
            attach::detach(old);
        }
        self.bus()
            .emit(Event::Change, &Change::new(key, old.clone(), Some(new)));
        old
    }

    /// The `$set` operation: [`Node::set`], returning the node for chaining.
    pub fn assign(&self, key: impl Into<String>, value: impl Into<JsonValue>) -> &Self {
        self.set(key, value);
        self
    }

    /// Delete `key`. Removing an absent key emits nothing.
    pub fn remove(&self, key: &str) -> Option<Value> {
        let old = self.entries().shift_remove(key)?;
        attach::detach(&old);
        self.bus().emit(
            Event::Change,
            &Change::new(key, Some(old.clone()), None),
        );
        Some(old)
    }

    /// Remove every key, emitting one change per key in insertion order.
    pub fn clear(&self) {
        let removed = std::mem::take(&mut *self.entries());
        for (key, old) in removed {
            attach::detach(&old);
            self.bus()
                .emit(Event::Change, &Change::new(key, Some(old), None));
        }
    }

    /// Deep snapshot as a plain object.
    pub fn to_plain(&self) -> JsonValue {
        JsonValue::Object(
            self.entries_snapshot()
                .into_iter()
                .map(|(key, value)| (key, value.to_plain()))
                .collect(),
        )
    }

    /// JSON Pointer lookup relative to this node.
    pub fn pointer(&self, pointer: &str) -> Option<Value> {
        Value::Node(self.clone()).pointer(pointer)
    }
}

impl Default for Node {
    fn default() -> Self {
        Self::new()
    }
}

/// Structural equality over entries. Key order is ignored, like for plain
/// objects.
impl PartialEq for Node {
    fn eq(&self, other: &Node) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        let mine = self.entries_snapshot();
        mine.len() == other.len()
            && mine
                .iter()
                .all(|(key, value)| other.get(key).is_some_and(|theirs| *value == theirs))
    }
}

impl PartialEq<JsonValue> for Node {
    fn eq(&self, other: &JsonValue) -> bool {
        let JsonValue::Object(map) = other else {
            return false;
        };
        let mine = self.entries_snapshot();
        mine.len() == map.len()
            && mine
                .iter()
                .all(|(key, value)| map.get(key).is_some_and(|theirs| value == theirs))
    }
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let entries = self.entries_snapshot();
        let mut map = serializer.serialize_map(Some(entries.len()))?;
        for (key, value) in &entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id())
            .field("entries", &self.entries_snapshot())
            .field("detached", &self.is_detached())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(node: &Node) -> Arc<Mutex<Vec<Change>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        node.bus().on(Event::Change, move |change| {
            seen_clone.lock().push(change.clone());
        });
        seen
    }

    fn child(node: &Node, key: &str) -> Node {
        node.get(key).and_then(|v| v.as_node().cloned()).unwrap()
    }

    #[test]
    fn from_plain_rejects_non_objects() {
        for bad in [json!(null), json!("test"), json!(1), json!([1])] {
            assert!(matches!(
                Node::from_plain(bad),
                Err(ConfigError::InvalidInput { .. })
            ));
        }
    }

    #[test]
    fn set_emits_local_change() {
        let node = Node::from_plain(json!({"type": "test"})).unwrap();
        let seen = record(&node);

        let old = node.set("type", "dev");

        assert_eq!(old.unwrap(), "test");
        assert_eq!(node.get("type").unwrap(), "dev");
        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].path(), &["type"][..]);
        assert_eq!(seen[0].old_value().unwrap(), "test");
        assert_eq!(seen[0].new_value().unwrap(), "dev");
    }

    #[test]
    fn equal_primitive_write_is_silent() {
        let node = Node::from_plain(json!({"port": 30})).unwrap();
        let seen = record(&node);

        node.set("port", 30);
        assert!(seen.lock().is_empty());

        node.set("port", 31);
        assert_eq!(seen.lock().len(), 1);
    }

    #[test]
    fn new_key_has_no_old_value() {
        let node = Node::new();
        let seen = record(&node);

        node.set("webrtc", json!({}));

        let seen = seen.lock();
        assert!(seen[0].old_value().is_none());
        assert!(seen[0].new_value().unwrap().as_node().is_some());
    }

    #[test]
    fn remove_emits_absent_new_value() {
        let node = Node::from_plain(json!({"a": 1})).unwrap();
        let seen = record(&node);

        assert!(node.remove("missing").is_none());
        assert!(seen.lock().is_empty());

        assert_eq!(node.remove("a").unwrap().as_i64(), Some(1));
        assert!(seen.lock()[0].is_removal());
        assert!(node.is_empty());
    }

    #[test]
    fn children_are_attached_under_their_key() {
        let node = Node::from_plain(json!({"server": {"dev": {}}})).unwrap();
        let server = child(&node, "server");
        let dev = child(&server, "dev");

        assert!(!node.is_attached());
        assert!(server.is_attached());
        assert_eq!(dev.slot(), Some(PathSegment::from("dev")));
        assert!(dev.bus().has_relay());
        assert!(!node.bus().has_relay());
        assert_eq!(dev.bus().listener_count(Event::Change), 0);
    }

    #[test]
    fn replacing_a_child_detaches_it() {
        let node = Node::from_plain(json!({"server": {"dev": {"host": "h"}}})).unwrap();
        let server = child(&node, "server");
        let dev = child(&server, "dev");
        let seen = record(&node);

        node.set("server", "x");
        assert_eq!(seen.lock().len(), 1);

        assert!(server.is_detached());
        assert!(dev.is_detached());
        assert!(!server.is_attached());

        dev.set("host", "y");
        server.set("other", 1);
        assert_eq!(seen.lock().len(), 1);
        // Data stays readable on the detached subtree.
        assert_eq!(dev.get("host").unwrap(), "y");
    }

    #[test]
    fn clear_emits_per_key() {
        let node = Node::from_plain(json!({"a": 1, "b": {"c": 2}})).unwrap();
        let b = child(&node, "b");
        let seen = record(&node);

        node.clear();

        let seen = seen.lock();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].path(), &["a"][..]);
        assert_eq!(seen[1].path(), &["b"][..]);
        assert!(b.is_detached());
    }

    #[test]
    fn assign_chains() {
        let node = Node::new();
        node.assign("a", 1).assign("b", json!({"c": true}));

        assert_eq!(node.to_plain(), json!({"a": 1, "b": {"c": true}}));
    }

    #[test]
    fn key_order_is_preserved() {
        let node = Node::from_plain(json!({"z": 1, "a": 2, "m": 3})).unwrap();
        assert_eq!(node.keys(), vec!["z", "a", "m"]);
    }
}
