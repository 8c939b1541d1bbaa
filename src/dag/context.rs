//! Derived, read-only analysis of a rooted graph.
//!
//! Nodes only know their inputs. The context walks the graph once from the
//! root and records the reverse edges (who consumes a stream, which streams a
//! node produces), a stable depth order, and the per-variant ids that labels
//! are made from.
//!
//! A context is never patched: any rewrite of the graph means building a new
//! one.

use crate::dag::node::{MediaKind, Node, NodeKind, NodeRef};
use crate::dag::stream::Stream;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Reverse-edge and labeling view of a graph.
#[derive(Debug, Clone)]
pub struct Context {
    /// All reachable nodes, sorted by (depth, variant, first seen).
    nodes: Vec<NodeRef>,
    /// All streams used as an input somewhere, in node order then index.
    streams: Vec<Stream>,
    /// Position of each node in `nodes`.
    order: HashMap<NodeRef, usize>,
    /// Per-variant sequential id.
    ids: HashMap<NodeRef, usize>,
    outgoing_streams: HashMap<NodeRef, Vec<Stream>>,
    outgoing_nodes: HashMap<Stream, Vec<(NodeRef, usize)>>,
}

impl Context {
    /// Analyse the graph rooted at `root`.
    pub fn build(root: &NodeRef) -> Self {
        // Pre-order, first occurrence wins.
        let visited = root.upstream_nodes();

        let mut seen_streams: HashSet<Stream> = HashSet::new();
        let mut first_seen_streams = Vec::new();
        let mut outgoing_nodes: HashMap<Stream, Vec<(NodeRef, usize)>> = HashMap::new();

        for node in &visited {
            for (slot, stream) in node.inputs().iter().enumerate() {
                if seen_streams.insert(stream.clone()) {
                    first_seen_streams.push(stream.clone());
                }
                outgoing_nodes
                    .entry(stream.clone())
                    .or_default()
                    .push((Arc::clone(node), slot));
            }
        }

        // Stable sort keeps first-seen order among equals.
        let mut nodes = visited;
        nodes.sort_by_key(|node| (node.depth(), node.kind().rank()));

        let order: HashMap<NodeRef, usize> = nodes
            .iter()
            .enumerate()
            .map(|(pos, node)| (Arc::clone(node), pos))
            .collect();

        let mut counters: HashMap<u8, usize> = HashMap::new();
        let mut ids = HashMap::with_capacity(nodes.len());
        for node in &nodes {
            let counter = counters.entry(node.kind().rank()).or_insert(0);
            ids.insert(Arc::clone(node), *counter);
            *counter += 1;
        }

        let mut streams = first_seen_streams;
        streams.sort_by_key(|s| (order.get(s.node()).copied().unwrap_or(usize::MAX), s.index()));

        let mut outgoing_streams: HashMap<NodeRef, Vec<Stream>> = HashMap::new();
        for stream in &streams {
            outgoing_streams
                .entry(Arc::clone(stream.node()))
                .or_default()
                .push(stream.clone());
        }

        tracing::debug!(
            "Context built: {} nodes, {} streams (root {})",
            nodes.len(),
            streams.len(),
            root
        );

        Self {
            nodes,
            streams,
            order,
            ids,
            outgoing_streams,
            outgoing_nodes,
        }
    }

    /// Every node in depth order.
    pub fn all_nodes(&self) -> &[NodeRef] {
        &self.nodes
    }

    /// Every consumed stream in depth order of its producer.
    pub fn all_streams(&self) -> &[Stream] {
        &self.streams
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, node: &Node) -> bool {
        self.order.contains_key(node)
    }

    /// Nodes of one variant, in depth order.
    pub fn nodes_where<'a>(
        &'a self,
        pred: impl Fn(&NodeKind) -> bool + 'a,
    ) -> impl Iterator<Item = &'a NodeRef> + 'a {
        self.nodes.iter().filter(move |n| pred(n.kind()))
    }

    /// Streams produced by `node` that something consumes, ordered by index.
    pub fn outgoing_streams(&self, node: &Node) -> &[Stream] {
        self.outgoing_streams
            .get(node)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Every `(consumer, input slot)` reading `stream`, in discovery order.
    pub fn outgoing_nodes(&self, stream: &Stream) -> &[(NodeRef, usize)] {
        self.outgoing_nodes
            .get(stream)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn depth(&self, node: &Node) -> usize {
        node.depth()
    }

    /// Per-variant sequential id, `None` if `node` is not part of this graph.
    pub fn node_id(&self, node: &Node) -> Option<usize> {
        self.ids.get(node).copied()
    }

    /// Label of a node as the external tool sees it.
    ///
    /// # Panics
    ///
    /// For nodes outside this graph and for global/merge nodes, which have no
    /// external representation.
    pub fn node_label(&self, node: &Node) -> String {
        let id = match self.node_id(node) {
            Some(id) => id,
            None => panic!("node {} is not part of this context", node),
        };
        match node.kind() {
            NodeKind::Input { .. } => id.to_string(),
            NodeKind::Filter { .. } => format!("s{}", id),
            NodeKind::Output { .. } => "out".to_string(),
            NodeKind::Global | NodeKind::MergeOutputs => {
                panic!("{} nodes have no label", node.kind().variant_name())
            }
        }
    }

    /// Label of a stream inside the filter graph and in `-map`.
    ///
    /// # Panics
    ///
    /// For streams of output, merge and global nodes.
    pub fn stream_label(&self, stream: &Stream) -> String {
        let node = stream.node();
        match node.kind() {
            NodeKind::Input { .. } => {
                let base = self.node_label(node);
                match stream.kind() {
                    MediaKind::Video => format!("{}:v", base),
                    MediaKind::Audio => format!("{}:a", base),
                    MediaKind::Generic => base,
                }
            }
            NodeKind::Filter { .. } => self.pad_label(node, stream.index().unwrap_or(0)),
            other => panic!("{} streams have no label", other.variant_name()),
        }
    }

    /// Label of output pad `index` of a filter: `s<id>`, or `s<id>#<index>`
    /// when the filter has several outputs.
    ///
    /// # Panics
    ///
    /// For nodes outside this graph and for non-filter nodes.
    pub fn pad_label(&self, node: &Node, index: usize) -> String {
        let base = self.node_label(node);
        if node.output_arity() > 1 {
            format!("{}#{}", base, index)
        } else {
            base
        }
    }

    /// Position of `node` in [`all_nodes`](Self::all_nodes).
    pub fn position(&self, node: &Node) -> Option<usize> {
        self.order.get(node).copied()
    }
}
