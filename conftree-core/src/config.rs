//! Root Config Facade
//!
//! Entry point of the crate. [`construct`] takes either a plain value or a
//! document path, materializes it and hands back the [`Root`] of the tree.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Serialize, Serializer};
use serde_json::Value as JsonValue;

use crate::bus::ChangeBus;
use crate::error::{ConfigError, Result};
use crate::loader::{DocumentLoader, FileLoader};
use crate::tree::{ArrayNode, Assign, Node, NodeId, Observable, Value};

/// What to build a config tree from.
#[derive(Debug, Clone)]
pub enum Source {
    /// An in-memory plain value.
    Value(JsonValue),
    /// A document on disk, resolved through a [`DocumentLoader`].
    Path(PathBuf),
}

impl From<JsonValue> for Source {
    fn from(value: JsonValue) -> Self {
        Source::Value(value)
    }
}

impl From<PathBuf> for Source {
    fn from(path: PathBuf) -> Self {
        Source::Path(path)
    }
}

impl From<&Path> for Source {
    fn from(path: &Path) -> Self {
        Source::Path(path.to_path_buf())
    }
}

/// Root of a config tree: an object or an array.
#[derive(Clone, PartialEq)]
pub enum Root {
    Node(Node),
    Array(ArrayNode),
}

impl Root {
    pub fn id(&self) -> NodeId {
        match self {
            Root::Node(node) => node.id(),
            Root::Array(array) => array.id(),
        }
    }

    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Root::Node(node) => Some(node),
            Root::Array(_) => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayNode> {
        match self {
            Root::Array(array) => Some(array),
            Root::Node(_) => None,
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Root::Array(_))
    }

    /// Deep snapshot as a plain value.
    pub fn to_plain(&self) -> JsonValue {
        match self {
            Root::Node(node) => node.to_plain(),
            Root::Array(array) => array.to_plain(),
        }
    }

    /// JSON Pointer lookup from the root.
    pub fn pointer(&self, pointer: &str) -> Option<Value> {
        Value::from(self.clone()).pointer(pointer)
    }
}

impl Observable for Root {
    fn bus(&self) -> &ChangeBus {
        match self {
            Root::Node(node) => node.bus(),
            Root::Array(array) => array.bus(),
        }
    }
}

impl From<Root> for Value {
    fn from(root: Root) -> Self {
        match root {
            Root::Node(node) => Value::Node(node),
            Root::Array(array) => Value::Array(array),
        }
    }
}

impl PartialEq<JsonValue> for Root {
    fn eq(&self, other: &JsonValue) -> bool {
        match self {
            Root::Node(node) => node == other,
            Root::Array(array) => array == other,
        }
    }
}

impl Serialize for Root {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Root::Node(node) => node.serialize(serializer),
            Root::Array(array) => array.serialize(serializer),
        }
    }
}

impl fmt::Debug for Root {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Root::Node(node) => fmt::Debug::fmt(node, f),
            Root::Array(array) => fmt::Debug::fmt(array, f),
        }
    }
}

/// Build a config tree, reading paths with the default [`FileLoader`].
///
/// # Example
///
/// ```rust,ignore
/// let root = construct(json!({"server": {"dev": {"host": "dev-host"}}}))?;
///
/// root.on(Event::Change, |change| println!("{change}"));
///
/// let dev = root.pointer("/server/dev").unwrap();
/// dev.as_node().unwrap().set("host", "localhost");
/// // Prints: "server.dev.host: \"dev-host\" -> \"localhost\""
/// ```
pub fn construct(source: impl Into<Source>) -> Result<Root> {
    construct_with(source, &FileLoader::new())
}

/// Build a config tree, reading paths with `loader`.
pub fn construct_with<L>(source: impl Into<Source>, loader: &L) -> Result<Root>
where
    L: DocumentLoader + ?Sized,
{
    let plain = match source.into() {
        Source::Value(value) => value,
        Source::Path(path) => loader.load(&path)?,
    };

    let root = match plain {
        JsonValue::Object(map) => Root::Node(Node::from_map(map)),
        JsonValue::Array(items) => Root::Array(ArrayNode::from_vec(items)),
        other => return Err(ConfigError::invalid_input(&other)),
    };

    tracing::debug!(root = %root.id(), array = root.is_array(), "config tree constructed");
    Ok(root)
}

/// The `$set` operation as a free function: write `value` under `key` and
/// return `node` for chaining. Same as calling `node.assign(key, value)`.
pub fn assign<N, K, V>(node: &N, key: K, value: V) -> &N
where
    N: Assign,
    K: Into<N::Key>,
    V: Into<JsonValue>,
{
    Assign::assign(node, key, value)
}
