//! ArrayNode Implementation
//!
//! [`ArrayNode`] is the reactive wrapper around a sequence. Every mutating
//! operation is expressed as a splice, and every splice is reported as the
//! minimal set of per-index changes: one [`Change`] for each index whose
//! content differs afterwards, in ascending index order.
//!
//! Composite elements that only move (because something was inserted or
//! removed before them) stay attached. Their relay is re-pointed at the new
//! index so changes bubbling out of them carry the right path.

use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};
use serde_json::Value as JsonValue;

use super::attach::{self, NodeCore};
use super::id::NodeId;
use super::{materialize, Value};
use crate::bus::{ChangeBus, Event};
use crate::change::{Change, PathSegment};
use crate::error::{ConfigError, Result};

/// Widest gap of `null`s a single [`ArrayNode::set`] or
/// [`ArrayNode::set_len`] will fill.
pub const MAX_PADDING: usize = 1 << 16;

struct ArrayState {
    core: NodeCore,
    items: Mutex<Vec<Value>>,
}

/// Reactive sequence node.
#[derive(Clone)]
pub struct ArrayNode {
    state: Arc<ArrayState>,
}

impl ArrayNode {
    /// Create an empty root array.
    pub fn new() -> Self {
        Self {
            state: Arc::new(ArrayState {
                core: NodeCore::new(),
                items: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Materialize a plain array into a new root array node.
    ///
    /// Fails with [`ConfigError::InvalidInput`] for anything but an array.
    pub fn from_plain(plain: JsonValue) -> Result<Self> {
        match plain {
            JsonValue::Array(items) => Ok(Self::from_vec(items)),
            other => Err(ConfigError::invalid_input(&other)),
        }
    }

    pub(crate) fn from_vec(plain: Vec<JsonValue>) -> Self {
        let array = Self::new();
        {
            let mut items = array.items();
            items.reserve(plain.len());
            for (index, plain) in plain.into_iter().enumerate() {
                let child = materialize(plain);
                attach::attach(array.bus(), &child, PathSegment::Index(index));
                items.push(child);
            }
        }
        array
    }

    fn items(&self) -> MutexGuard<'_, Vec<Value>> {
        self.state.items.lock()
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

    pub fn is_attached(&self) -> bool {
        self.state.core.is_attached()
    }

    pub fn is_detached(&self) -> bool {
        self.bus().is_detached()
    }

    pub fn slot(&self) -> Option<PathSegment> {
        self.state.core.slot()
    }

    pub fn ptr_eq(&self, other: &ArrayNode) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.items().get(index).cloned()
    }

    pub fn len(&self) -> usize {
        self.items().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items().is_empty()
    }

    pub fn first(&self) -> Option<Value> {
        self.items().first().cloned()
    }

    pub fn last(&self) -> Option<Value> {
        self.items().last().cloned()
    }

    /// Snapshot of the elements.
    pub fn to_vec(&self) -> Vec<Value> {
        self.items().clone()
    }

    /// Write `value` at `index`. Returns the previous element.
    ///
    /// `index == len` appends. A larger index first pads the gap with
    /// `null`, reporting each padded index as a change. A gap wider than
    /// [`MAX_PADDING`] is refused: nothing is written and a warning is logged.
    pub fn set(&self, index: usize, value: impl Into<JsonValue>) -> Option<Value> {
        let value: JsonValue = value.into();
        let (removed, _) = self.edit(|len| {
            if index < len {
                return Some(Edit::new(index, 1, vec![value]));
            }
            let mut tail = padding(len, index)?;
            tail.push(value);
            Some(Edit::new(len, 0, tail))
        });
        removed.into_iter().next()
    }

    /// The `$set` operation: [`ArrayNode::set`], returning the array.
    pub fn assign(&self, index: usize, value: impl Into<JsonValue>) -> &Self {
        self.set(index, value);
        self
    }

    /// Append and return the new length.
    pub fn push(&self, value: impl Into<JsonValue>) -> usize {
        let value: JsonValue = value.into();
        self.edit(|len| Some(Edit::new(len, 0, vec![value]))).1
    }

    pub fn pop(&self) -> Option<Value> {
        self.edit(|len| len.checked_sub(1).map(|last| Edit::new(last, 1, Vec::new())))
            .0
            .pop()
    }

    /// Insert before `index`. Indices past the end append.
    pub fn insert(&self, index: usize, value: impl Into<JsonValue>) {
        let value: JsonValue = value.into();
        self.edit(|_| Some(Edit::new(index, 0, vec![value])));
    }

    pub fn remove(&self, index: usize) -> Option<Value> {
        self.edit(|len| (index < len).then(|| Edit::new(index, 1, Vec::new())))
            .0
            .pop()
    }

    /// Shrink to `len` elements. Does nothing if already shorter.
    pub fn truncate(&self, len: usize) {
        self.edit(|_| Some(Edit::new(len, usize::MAX, Vec::new())));
    }

    /// Change the length: shrink like [`truncate`](Self::truncate), or grow
    /// by padding with `null` (up to [`MAX_PADDING`] at a time).
    pub fn set_len(&self, len: usize) {
        self.edit(|current| {
            if len <= current {
                return Some(Edit::new(len, usize::MAX, Vec::new()));
            }
            padding(current, len).map(|tail| Edit::new(current, 0, tail))
        });
    }

    pub fn clear(&self) {
        self.truncate(0);
    }

    /// Remove `delete_count` elements starting at `start` and insert `items`
    /// in their place. Both bounds are clamped to the array. Returns the
    /// removed elements.
    pub fn splice<I>(&self, start: usize, delete_count: usize, items: I) -> Vec<Value>
    where
        I: IntoIterator,
        I::Item: Into<JsonValue>,
    {
        let items: Vec<JsonValue> = items.into_iter().map(Into::into).collect();
        self.edit(|_| Some(Edit::new(start, delete_count, items))).0
    }

    /// Apply the edit `plan` picks for the current length, all under one
    /// lock, then detach what was removed and emit. Returns the removed
    /// elements and the resulting length.
    fn edit<F>(&self, plan: F) -> (Vec<Value>, usize)
    where
        F: FnOnce(usize) -> Option<Edit>,
    {
        let (removed, changes, len) = {
            let mut current = self.items();
            let Some(edit) = plan(current.len()) else {
                return (Vec::new(), current.len());
            };

            let before = current.clone();
            let start = edit.start.min(before.len());
            let end = start.saturating_add(edit.delete).min(before.len());

            let inserted: Vec<Value> = edit.items.into_iter().map(materialize).collect();
            for (offset, value) in inserted.iter().enumerate() {
                attach::attach(self.bus(), value, PathSegment::Index(start + offset));
            }
            let inserted_len = inserted.len();
            let removed: Vec<Value> = current.splice(start..end, inserted).collect();

            if removed.len() != inserted_len {
                for (index, value) in current.iter().enumerate().skip(start + inserted_len) {
                    attach::reindex(value, index);
                }
            }

            let changes = diff(&before, &current, start);
            (removed, changes, current.len())
        };

        for value in &removed {
            attach::detach(value);
        }
        for change in &changes {
            self.bus().emit(Event::Change, change);
        }
        (removed, len)
    }

    /// Deep snapshot as a plain array.
    pub fn to_plain(&self) -> JsonValue {
        JsonValue::Array(self.to_vec().iter().map(Value::to_plain).collect())
    }

    /// JSON Pointer lookup relative to this array.
    pub fn pointer(&self, pointer: &str) -> Option<Value> {
        Value::Array(self.clone()).pointer(pointer)
    }
}

/// One splice, planned against the length seen under the lock.
struct Edit {
    start: usize,
    delete: usize,
    items: Vec<JsonValue>,
}

impl Edit {
    fn new(start: usize, delete: usize, items: Vec<JsonValue>) -> Self {
        Self {
            start,
            delete,
            items,
        }
    }
}

/// `null`s needed to grow from `len` to `target`, or `None` past the limit.
fn padding(len: usize, target: usize) -> Option<Vec<JsonValue>> {
    let gap = target - len;
    if gap > MAX_PADDING {
        tracing::warn!(len, target, limit = MAX_PADDING, "array padding limit exceeded; write ignored");
        return None;
    }
    Some(vec![JsonValue::Null; gap])
}

/// Per-index changes between `before` and `after`, from `start` onwards.
fn diff(before: &[Value], after: &[Value], start: usize) -> Vec<Change> {
    let span: Range<usize> = start..before.len().max(after.len());
    span.filter_map(|index| {
        let old = before.get(index);
        let new = after.get(index);
        let unchanged = match (old, new) {
            (Some(old), Some(new)) => old.same(new),
            (None, None) => true,
            _ => false,
        };
        (!unchanged).then(|| Change::new(index, old.cloned(), new.cloned()))
    })
    .collect()
}

impl Default for ArrayNode {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for ArrayNode {
    fn eq(&self, other: &ArrayNode) -> bool {
        self.ptr_eq(other) || self.to_vec() == other.to_vec()
    }
}

impl PartialEq<JsonValue> for ArrayNode {
    fn eq(&self, other: &JsonValue) -> bool {
        let JsonValue::Array(theirs) = other else {
            return false;
        };
        let mine = self.to_vec();
        mine.len() == theirs.len() && mine.iter().zip(theirs).all(|(a, b)| a == b)
    }
}

impl Serialize for ArrayNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let items = self.to_vec();
        let mut seq = serializer.serialize_seq(Some(items.len()))?;
        for item in &items {
            seq.serialize_element(item)?;
        }
        seq.end()
    }
}

impl fmt::Debug for ArrayNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrayNode")
            .field("id", &self.id())
            .field("items", &self.to_vec())
            .field("detached", &self.is_detached())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
