//! Conftree Core
//!
//! This crate builds hierarchical, mutation-observable configuration trees
//! out of nested plain data (objects and arrays, usually loaded from a YAML
//! or JSON document). It implements:
//!
//! - A per-node change bus (`on`, `once`, `off`, `emit`)
//! - Reactive object and array nodes whose writes are intercepted
//! - Upward propagation of every change to all ancestors, with paths
//! - Detaching of replaced or deleted subtrees, so they can't leak events
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `bus`: Change bus and listener management
//! - `change`: Mutation records and paths
//! - `tree`: Nodes, arrays, the materializer and the propagation chain
//! - `loader`: Document loading from disk
//! - `config`: The `construct` / `assign` entry points
//!
//! # Example
//!
//! ```rust,ignore
//! use conftree_core::{construct, Event, Observable};
//! use serde_json::json;
//!
//! let root = construct(json!({"server": {"dev": {"host": "dev-host"}}}))?;
//!
//! // Listen at the root
//! root.on(Event::Change, |change| println!("{change}"));
//!
//! // Mutate deep inside the tree
//! let dev = root.pointer("/server/dev").unwrap();
//! dev.as_node().unwrap().set("host", "localhost");
//! // Listener runs, prints: "server.dev.host: \"dev-host\" -> \"localhost\""
//! ```

pub mod bus;
pub mod change;
pub mod config;
pub mod error;
pub mod loader;
pub mod tree;

pub use bus::{ChangeBus, Event, ListenerId};
pub use change::{Change, Path, PathSegment};
pub use config::{assign, construct, construct_with, Root, Source};
pub use error::{ConfigError, DocumentParseSource, Result};
pub use loader::{DocumentFormat, DocumentLoader, FileLoader};
pub use tree::{materialize, ArrayNode, Assign, Node, NodeId, Observable, Value};
