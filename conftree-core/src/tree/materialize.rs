//! Node Materializer
//!
//! Recursive conversion of plain values into tree values. Objects become
//! [`Node`]s, arrays become [`ArrayNode`]s, primitives pass through. Each
//! composite gets its own bus, and its relay into the producing parent is
//! installed before the parent is returned.

use serde_json::Value as JsonValue;

use super::{ArrayNode, Node, Value};

/// Convert a plain value into a tree value.
///
/// Every call builds a brand-new subtree: materializing the same input twice
/// yields two trees that share no state.
pub fn materialize(plain: JsonValue) -> Value {
    match plain {
        JsonValue::Null => Value::Null,
        JsonValue::Bool(b) => Value::Bool(b),
        JsonValue::Number(n) => Value::Number(n),
        JsonValue::String(s) => Value::String(s),
        JsonValue::Array(items) => Value::Array(ArrayNode::from_vec(items)),
        JsonValue::Object(map) => Value::Node(Node::from_map(map)),
    }
}
