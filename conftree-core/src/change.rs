//! Mutation records.
//!
//! A [`Change`] describes one mutation as seen from the node that emits it:
//! the path from that node down to the slot that changed, and the values
//! before and after. Every ancestor re-emits the record with its own slot
//! prefixed to the path.

use std::fmt;

use serde::Serialize;
use smallvec::SmallVec;

use crate::tree::Value;

/// One step of a change path: an object key or an array index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        Self::Key(key.to_string())
    }
}

impl From<String> for PathSegment {
    fn from(key: String) -> Self {
        Self::Key(key)
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => f.write_str(key),
            Self::Index(index) => write!(f, "[{}]", index),
        }
    }
}

/// Ordered path from the observing node to the mutated slot.
///
/// Config trees are shallow, so paths stay inline up to four segments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Path(SmallVec<[PathSegment; 4]>);

impl Path {
    /// A path of a single segment.
    pub fn single(segment: impl Into<PathSegment>) -> Self {
        let mut segments = SmallVec::new();
        segments.push(segment.into());
        Self(segments)
    }

    /// Return a new path with `segment` in front of this one.
    pub fn prefixed(&self, segment: PathSegment) -> Self {
        let mut segments = SmallVec::with_capacity(self.0.len() + 1);
        segments.push(segment);
        segments.extend(self.0.iter().cloned());
        Self(segments)
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn first(&self) -> Option<&PathSegment> {
        self.0.first()
    }

    pub fn last(&self) -> Option<&PathSegment> {
        self.0.last()
    }
}

impl<S: Into<PathSegment>> FromIterator<S> for Path {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Dotted rendering, e.g. `server.dev.host` or `plugins[0].name`.
impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            match segment {
                PathSegment::Key(key) if i > 0 => write!(f, ".{}", key)?,
                other => write!(f, "{}", other)?,
            }
        }
        Ok(())
    }
}

impl PartialEq<[&str]> for Path {
    fn eq(&self, other: &[&str]) -> bool {
        self.0.len() == other.len()
            && self.0.iter().zip(other).all(|(segment, key)| {
                matches!(segment, PathSegment::Key(k) if k == key)
            })
    }
}

/// A single mutation record.
///
/// `old`/`new` are `None` when the slot was absent before or after the
/// mutation (a fresh key, or a removal).
#[derive(Debug, Clone, Serialize)]
pub struct Change {
    path: Path,
    old: Option<Value>,
    new: Option<Value>,
}

impl Change {
    /// A change local to the emitting node.
    pub fn new(segment: impl Into<PathSegment>, old: Option<Value>, new: Option<Value>) -> Self {
        Self {
            path: Path::single(segment),
            old,
            new,
        }
    }

    /// The same change as seen one level up, through `segment`.
    pub fn prefixed(&self, segment: PathSegment) -> Self {
        Self {
            path: self.path.prefixed(segment),
            old: self.old.clone(),
            new: self.new.clone(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn old_value(&self) -> Option<&Value> {
        self.old.as_ref()
    }

    pub fn new_value(&self) -> Option<&Value> {
        self.new.as_ref()
    }

    /// Whether the slot no longer exists after this change.
    pub fn is_removal(&self) -> bool {
        self.old.is_some() && self.new.is_none()
    }

    /// Split into the `(path, old, new)` triple.
    pub fn into_parts(self) -> (Path, Option<Value>, Option<Value>) {
        (self.path, self.old, self.new)
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |value: &Option<Value>| match value {
            Some(value) => value.to_plain().to_string(),
            None => "<absent>".to_string(),
        };
        write!(f, "{}: {} -> {}", self.path, show(&self.old), show(&self.new))
    }
}
