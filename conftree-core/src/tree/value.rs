//! Tree values.
//!
//! A [`Value`] is what a slot in a config tree holds: a primitive stored
//! as-is, or a handle to a composite [`Node`] / [`ArrayNode`]. Handles are
//! cheap to clone and share state with the tree they came from.

use serde::{Serialize, Serializer};
use serde_json::{Number, Value as JsonValue};

use super::array::ArrayNode;
use super::attach::NodeCore;
use super::node::Node;
use crate::bus::ChangeBus;

/// A value in a config tree.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Node(Node),
    Array(ArrayNode),
}

impl Value {
    /// Whether this value is a `Node` or an `ArrayNode`.
    pub fn is_composite(&self) -> bool {
        matches!(self, Value::Node(_) | Value::Array(_))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Number(n) => n.as_u64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Value::Node(node) => Some(node),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayNode> {
        match self {
            Value::Array(array) => Some(array),
            _ => None,
        }
    }

    /// The bus of a composite value.
    pub fn bus(&self) -> Option<&ChangeBus> {
        self.core().map(NodeCore::bus)
    }

    pub(crate) fn core(&self) -> Option<&NodeCore> {
        match self {
            Value::Node(node) => Some(node.core()),
            Value::Array(array) => Some(array.core()),
            _ => None,
        }
    }

    /// Snapshot of the direct children of a composite value.
    pub(crate) fn children(&self) -> Vec<Value> {
        match self {
            Value::Node(node) => node.values(),
            Value::Array(array) => array.to_vec(),
            _ => Vec::new(),
        }
    }

    /// Identity comparison: the same composite handle, or equal primitives.
    ///
    /// Two separately materialized but structurally equal nodes are not the
    /// same; use `==` for structural equality.
    pub fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Node(a), Value::Node(b)) => a.ptr_eq(b),
            (Value::Array(a), Value::Array(b)) => a.ptr_eq(b),
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            _ => false,
        }
    }

    /// Deep snapshot as a plain value.
    pub fn to_plain(&self) -> JsonValue {
        match self {
            Value::Null => JsonValue::Null,
            Value::Bool(b) => JsonValue::Bool(*b),
            Value::Number(n) => JsonValue::Number(n.clone()),
            Value::String(s) => JsonValue::String(s.clone()),
            Value::Node(node) => node.to_plain(),
            Value::Array(array) => array.to_plain(),
        }
    }

    /// Look up a value by JSON Pointer (RFC 6901), e.g. `/server/dev/host`
    /// or `/plugins/0/name`. The empty pointer returns the value itself.
    pub fn pointer(&self, pointer: &str) -> Option<Value> {
        if pointer.is_empty() {
            return Some(self.clone());
        }
        if !pointer.starts_with('/') {
            return None;
        }

        let mut current = self.clone();
        for token in pointer.split('/').skip(1) {
            let token = token.replace("~1", "/").replace("~0", "~");
            current = match &current {
                Value::Node(node) => node.get(&token)?,
                Value::Array(array) => array.get(parse_index(&token)?)?,
                _ => return None,
            };
        }
        Some(current)
    }
}

fn parse_index(token: &str) -> Option<usize> {
    if token.len() > 1 && token.starts_with('0') {
        return None;
    }
    token.parse().ok()
}

/// Structural equality, ignoring identity and event capability.
impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Node(a), Value::Node(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            _ => self.same(other),
        }
    }
}

impl PartialEq<JsonValue> for Value {
    fn eq(&self, other: &JsonValue) -> bool {
        match (self, other) {
            (Value::Node(node), _) => node == other,
            (Value::Array(array), _) => array == other,
            (Value::Null, JsonValue::Null) => true,
            (Value::Bool(a), JsonValue::Bool(b)) => a == b,
            (Value::Number(a), JsonValue::Number(b)) => a == b,
            (Value::String(a), JsonValue::String(b)) => a == b,
            _ => false,
        }
    }
}

impl PartialEq<&str> for Value {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == Some(*other)
    }
}

impl PartialEq<str> for Value {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == Some(other)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) => n.serialize(serializer),
            Value::String(s) => serializer.serialize_str(s),
            Value::Node(node) => node.serialize(serializer),
            Value::Array(array) => array.serialize(serializer),
        }
    }
}

impl From<Node> for Value {
    fn from(node: Node) -> Self {
        Value::Node(node)
    }
}

impl From<ArrayNode> for Value {
    fn from(array: ArrayNode) -> Self {
        Value::Array(array)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n.into())
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::Number(n.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::materialize;
    use serde_json::json;

    #[test]
    fn accessors() {
        assert_eq!(Value::from("a").as_str(), Some("a"));
        assert_eq!(Value::from(3i64).as_i64(), Some(3));
        assert_eq!(Value::from(true).as_bool(), Some(true));
        assert!(Value::Null.is_null());
        assert!(Value::from(3u64).as_str().is_none());
    }

    #[test]
    fn composites_are_same_only_by_identity() {
        let a = materialize(json!({"x": 1}));
        let b = materialize(json!({"x": 1}));

        assert!(a.same(&a.clone()));
        assert!(!a.same(&b));
        assert_eq!(a, b);
    }

    #[test]
    fn pointer_walks_nodes_and_arrays() {
        let value = materialize(json!({
            "server": {"dev": {"host": "dev-host"}},
            "plugins": [{"name": "analytics"}],
            "a/b": {"~": 1}
        }));

        assert_eq!(value.pointer("/server/dev/host").unwrap(), "dev-host");
        assert_eq!(value.pointer("/plugins/0/name").unwrap(), "analytics");
        assert_eq!(value.pointer("/a~1b/~0").unwrap().as_i64(), Some(1));
        assert!(value.pointer("").unwrap().same(&value));
        assert!(value.pointer("/plugins/01").is_none());
        assert!(value.pointer("/missing").is_none());
        assert!(value.pointer("server").is_none());
    }

    #[test]
    fn serializes_like_the_plain_input() {
        let plain = json!({"a": [1, "two", null, {"b": false}]});
        let value = materialize(plain.clone());

        assert_eq!(serde_json::to_value(&value).unwrap(), plain);
        assert_eq!(value.to_plain(), plain);
        assert_eq!(value, plain);
    }
}
