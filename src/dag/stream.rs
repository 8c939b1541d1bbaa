//! Stream references: one output of one node.

use crate::dag::error::{GraphError, GraphResult};
use crate::dag::node::{MediaKind, NodeKind, NodeRef};
use std::fmt;
use std::sync::Arc;

/// Immutable reference to one output of a node.
///
/// Streams from input, output, merge and global nodes have no index. Filter
/// streams always carry the output index and the media kind the filter
/// declared for it.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Stream {
    node: NodeRef,
    index: Option<usize>,
    kind: MediaKind,
}

impl Stream {
    /// Callers are the node output accessors, which validate `index`.
    pub(crate) fn from_parts(node: NodeRef, index: Option<usize>, kind: MediaKind) -> Self {
        Self { node, index, kind }
    }

    pub fn node(&self) -> &NodeRef {
        &self.node
    }

    pub fn index(&self) -> Option<usize> {
        self.index
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    /// Whether this stream may feed a filter or an output.
    pub fn is_filterable(&self) -> bool {
        matches!(
            self.node.kind(),
            NodeKind::Input { .. } | NodeKind::Filter { .. }
        )
    }

    /// Same node by pointer and same output.
    pub fn ptr_eq(&self, other: &Stream) -> bool {
        Arc::ptr_eq(&self.node, &other.node) && self.index == other.index && self.kind == other.kind
    }

    /// Video-only view of an input file.
    pub fn video(&self) -> GraphResult<Stream> {
        self.narrow(MediaKind::Video)
    }

    /// Audio-only view of an input file.
    pub fn audio(&self) -> GraphResult<Stream> {
        self.narrow(MediaKind::Audio)
    }

    fn narrow(&self, kind: MediaKind) -> GraphResult<Stream> {
        if !self.node.is_input() {
            return Err(GraphError::NoTypedView {
                node: self.node.to_string(),
                kind,
            });
        }
        Ok(Stream::from_parts(Arc::clone(&self.node), None, kind))
    }

    /// The same output taken from `node`, typically a rebuilt copy of this
    /// stream's node.
    pub fn rebind(&self, node: NodeRef) -> GraphResult<Stream> {
        if Arc::ptr_eq(&node, &self.node) {
            return Ok(self.clone());
        }
        match self.index {
            Some(index) => node.output(index),
            None if node.is_input() => Ok(Stream::from_parts(node, None, self.kind)),
            None => node.stream(),
        }
    }
}

impl fmt::Debug for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream")
            .field("node", &self.node.to_string())
            .field("index", &self.index)
            .field("kind", &self.kind)
            .finish()
    }
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.index {
            Some(index) => write!(f, "{}[{}]", self.node, index),
            None => write!(f, "{}", self.node),
        }
    }
}
