//! Immutable graph nodes.
//!
//! A node owns its incoming edges (`inputs`) and nothing else; who consumes a
//! node is answered by [`Context`](crate::dag::Context). Nodes are shared
//! through `Arc` and never mutated: a "changed" node is a new value, and every
//! ancestor on the path to the root is rebuilt with it.
//!
//! Equality and hashing are structural. A content hash is computed once at
//! construction from the node's fields and the hashes of its input streams, so
//! comparing two large subgraphs is cheap when they differ and hashing a node
//! never walks the graph.

use crate::dag::acyclic;
use crate::dag::error::{GraphError, GraphResult};
use crate::dag::stream::Stream;
use crate::dag::value::Options;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Shared handle to an immutable node.
pub type NodeRef = Arc<Node>;

/// Media kind carried by a stream or declared by a filter slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Audio,
    /// Untyped: a whole input file, an output, or an untyped filter slot.
    Generic,
}

impl MediaKind {
    /// Whether a slot declared as `self` accepts a stream of kind `actual`.
    pub fn accepts(self, actual: MediaKind) -> bool {
        self == MediaKind::Generic || actual == MediaKind::Generic || self == actual
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
            MediaKind::Generic => "generic",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Variant-specific node data.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Input {
        filename: String,
    },
    Filter {
        name: String,
        input_typings: Vec<MediaKind>,
        output_typings: Vec<MediaKind>,
    },
    Output {
        filename: String,
    },
    Global,
    MergeOutputs,
}

impl NodeKind {
    /// Short variant name used in errors and logs.
    pub fn variant_name(&self) -> &'static str {
        match self {
            NodeKind::Input { .. } => "input",
            NodeKind::Filter { .. } => "filter",
            NodeKind::Output { .. } => "output",
            NodeKind::Global => "global",
            NodeKind::MergeOutputs => "merge_outputs",
        }
    }

    /// Tie-breaker between nodes of equal depth.
    pub(crate) fn rank(&self) -> u8 {
        match self {
            NodeKind::Input { .. } => 0,
            NodeKind::Filter { .. } => 1,
            NodeKind::Output { .. } => 2,
            NodeKind::MergeOutputs => 3,
            NodeKind::Global => 4,
        }
    }
}

/// One operation in the pipeline graph.
pub struct Node {
    kind: NodeKind,
    args: Vec<String>,
    kwargs: Options,
    inputs: Vec<Stream>,
    /// Longest path from a node without inputs.
    depth: usize,
    content_hash: u64,
}

impl Node {
    // ── Construction ──

    /// An input file. Inputs have no incoming edges, so this cannot fail.
    pub fn input(filename: impl Into<String>, args: Vec<String>, kwargs: Options) -> NodeRef {
        Arc::new(Self::assemble(
            NodeKind::Input {
                filename: filename.into(),
            },
            args,
            kwargs,
            Vec::new(),
        ))
    }

    /// A filter with declared input/output typings. Dynamic-arity filters
    /// pass typings already expanded from their options.
    pub fn filter(
        name: impl Into<String>,
        inputs: Vec<Stream>,
        input_typings: Vec<MediaKind>,
        output_typings: Vec<MediaKind>,
        args: Vec<String>,
        kwargs: Options,
    ) -> GraphResult<NodeRef> {
        Self::build(
            NodeKind::Filter {
                name: name.into(),
                input_typings,
                output_typings,
            },
            args,
            kwargs,
            inputs,
        )
    }

    /// An output file fed by `inputs`, one `-map` each.
    pub fn output_file(
        inputs: Vec<Stream>,
        filename: impl Into<String>,
        args: Vec<String>,
        kwargs: Options,
    ) -> GraphResult<NodeRef> {
        Self::build(
            NodeKind::Output {
                filename: filename.into(),
            },
            args,
            kwargs,
            inputs,
        )
    }

    pub fn merge_outputs(inputs: Vec<Stream>) -> GraphResult<NodeRef> {
        Self::build(NodeKind::MergeOutputs, Vec::new(), Options::new(), inputs)
    }

    pub fn global(inputs: Vec<Stream>, args: Vec<String>, kwargs: Options) -> GraphResult<NodeRef> {
        Self::build(NodeKind::Global, args, kwargs, inputs)
    }

    /// Validate and wrap a node of any variant.
    pub fn build(
        kind: NodeKind,
        args: Vec<String>,
        kwargs: Options,
        inputs: Vec<Stream>,
    ) -> GraphResult<NodeRef> {
        validate_inputs(&kind, &inputs)?;
        let node = Self::assemble(kind, args, kwargs, inputs);
        acyclic::check_inputs(&node)?;
        Ok(Arc::new(node))
    }

    fn assemble(kind: NodeKind, args: Vec<String>, kwargs: Options, inputs: Vec<Stream>) -> Self {
        let depth = inputs
            .iter()
            .map(|s| s.node().depth + 1)
            .max()
            .unwrap_or(0);

        let mut hasher = DefaultHasher::new();
        kind.hash(&mut hasher);
        args.hash(&mut hasher);
        kwargs.hash(&mut hasher);
        inputs.len().hash(&mut hasher);
        for stream in &inputs {
            stream.hash(&mut hasher);
        }

        Self {
            kind,
            args,
            kwargs,
            inputs,
            depth,
            content_hash: hasher.finish(),
        }
    }

    // ── Accessors ──

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn kwargs(&self) -> &Options {
        &self.kwargs
    }

    pub fn inputs(&self) -> &[Stream] {
        &self.inputs
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn content_hash(&self) -> u64 {
        self.content_hash
    }

    /// Short display id derived from the content hash.
    pub fn hex(&self) -> String {
        format!("{:016x}", self.content_hash)[..8].to_string()
    }

    pub fn is_input(&self) -> bool {
        matches!(self.kind, NodeKind::Input { .. })
    }

    pub fn is_filter(&self) -> bool {
        matches!(self.kind, NodeKind::Filter { .. })
    }

    /// Filter name, `None` for other variants.
    pub fn filter_name(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Filter { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Declared output typings of a filter, empty for other variants.
    pub fn output_typings(&self) -> &[MediaKind] {
        match &self.kind {
            NodeKind::Filter { output_typings, .. } => output_typings,
            _ => &[],
        }
    }

    /// Number of distinct outputs this node exposes.
    pub fn output_arity(&self) -> usize {
        match &self.kind {
            NodeKind::Filter { output_typings, .. } => output_typings.len(),
            _ => 1,
        }
    }

    // ── Output accessors ──

    /// The sole output of an input, output, merge or global node, or of a
    /// single-output filter.
    pub fn stream(self: &Arc<Self>) -> GraphResult<Stream> {
        match &self.kind {
            NodeKind::Filter { output_typings, .. } => {
                if output_typings.len() != 1 {
                    return Err(self.output_index_error(0));
                }
                self.output(0)
            }
            _ => Ok(Stream::from_parts(Arc::clone(self), None, MediaKind::Generic)),
        }
    }

    /// Filter output by absolute index.
    pub fn output(self: &Arc<Self>, index: usize) -> GraphResult<Stream> {
        match self.output_typings().get(index) {
            Some(&kind) if self.is_filter() => {
                Ok(Stream::from_parts(Arc::clone(self), Some(index), kind))
            }
            _ => Err(self.output_index_error(index)),
        }
    }

    /// The `nth` video output of a filter (counting only video outputs).
    pub fn video(self: &Arc<Self>, nth: usize) -> GraphResult<Stream> {
        self.typed_output(MediaKind::Video, nth)
    }

    /// The `nth` audio output of a filter (counting only audio outputs).
    pub fn audio(self: &Arc<Self>, nth: usize) -> GraphResult<Stream> {
        self.typed_output(MediaKind::Audio, nth)
    }

    fn typed_output(self: &Arc<Self>, kind: MediaKind, nth: usize) -> GraphResult<Stream> {
        let index = self
            .output_typings()
            .iter()
            .enumerate()
            .filter(|(_, t)| **t == kind)
            .nth(nth)
            .map(|(i, _)| i)
            .ok_or_else(|| self.output_index_error(nth))?;
        self.output(index)
    }

    fn output_index_error(&self, index: usize) -> GraphError {
        GraphError::OutputIndex {
            node: self.to_string(),
            arity: self.output_typings().len(),
            index,
        }
    }

    // ── Graph operations ──

    /// Transitive closure of this node's inputs, itself included, in
    /// first-visit (pre-order) order.
    pub fn upstream_nodes(self: &Arc<Self>) -> Vec<NodeRef> {
        let mut seen: HashSet<NodeRef> = HashSet::new();
        let mut order = Vec::new();
        let mut stack = vec![Arc::clone(self)];

        while let Some(node) = stack.pop() {
            if !seen.insert(Arc::clone(&node)) {
                continue;
            }
            // Reverse so the first input is visited first.
            for stream in node.inputs.iter().rev() {
                stack.push(Arc::clone(stream.node()));
            }
            order.push(node);
        }

        order
    }

    /// Same node, different incoming edges. Returns `self` unchanged when
    /// every new input is pointer-identical to the old one.
    pub fn with_inputs(self: &Arc<Self>, inputs: Vec<Stream>) -> GraphResult<NodeRef> {
        let unchanged = inputs.len() == self.inputs.len()
            && inputs
                .iter()
                .zip(&self.inputs)
                .all(|(new, old)| new.ptr_eq(old));
        if unchanged {
            return Ok(Arc::clone(self));
        }
        Self::build(self.kind.clone(), self.args.clone(), self.kwargs.clone(), inputs)
    }

    /// Rewrite the graph rooted here, substituting `new` for every node equal
    /// to `old`. Untouched subtrees are returned by the same `Arc`.
    pub fn replace(self: &Arc<Self>, old: &Node, new: &NodeRef) -> GraphResult<NodeRef> {
        let mut memo = HashMap::new();
        replace_in(self, old, new, &mut memo)
    }
}

fn replace_in(
    node: &NodeRef,
    old: &Node,
    new: &NodeRef,
    memo: &mut HashMap<*const Node, NodeRef>,
) -> GraphResult<NodeRef> {
    if **node == *old {
        return Ok(Arc::clone(new));
    }
    if let Some(done) = memo.get(&Arc::as_ptr(node)) {
        return Ok(Arc::clone(done));
    }

    let mut inputs = Vec::with_capacity(node.inputs.len());
    for stream in &node.inputs {
        let upstream = replace_in(stream.node(), old, new, memo)?;
        inputs.push(stream.rebind(upstream)?);
    }
    let rebuilt = node.with_inputs(inputs)?;

    memo.insert(Arc::as_ptr(node), Arc::clone(&rebuilt));
    Ok(rebuilt)
}

/// Per-variant checks on incoming streams.
fn validate_inputs(kind: &NodeKind, inputs: &[Stream]) -> GraphResult<()> {
    let reject = |stream: &Stream| GraphError::InvalidSource {
        source_kind: stream.node().kind.variant_name(),
        target: kind.variant_name(),
    };

    match kind {
        NodeKind::Input { .. } => {
            if let Some(stream) = inputs.first() {
                return Err(reject(stream));
            }
        }
        NodeKind::Filter {
            name,
            input_typings,
            ..
        } => {
            if inputs.len() != input_typings.len() {
                return Err(GraphError::InputArity {
                    filter: name.clone(),
                    expected: input_typings.len(),
                    actual: inputs.len(),
                });
            }
            for (slot, (stream, expected)) in inputs.iter().zip(input_typings).enumerate() {
                if !stream.is_filterable() {
                    return Err(reject(stream));
                }
                if !expected.accepts(stream.kind()) {
                    return Err(GraphError::InputKind {
                        filter: name.clone(),
                        slot,
                        expected: *expected,
                        actual: stream.kind(),
                    });
                }
            }
        }
        NodeKind::Output { .. } => {
            if let Some(stream) = inputs.iter().find(|s| !s.is_filterable()) {
                return Err(reject(stream));
            }
        }
        NodeKind::MergeOutputs => {
            if let Some(stream) = inputs
                .iter()
                .find(|s| !matches!(s.node().kind, NodeKind::Output { .. }))
            {
                return Err(reject(stream));
            }
        }
        NodeKind::Global => {
            if let Some(stream) = inputs.iter().find(|s| {
                !matches!(
                    s.node().kind,
                    NodeKind::Output { .. } | NodeKind::MergeOutputs
                )
            }) {
                return Err(reject(stream));
            }
        }
    }
    Ok(())
}

/// Structural equality. Walks both graphs in lockstep with an explicit
/// stack and compares each pair of nodes once, so shared subgraphs built
/// separately cost linear rather than path-count time.
impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        if self.content_hash != other.content_hash {
            return false;
        }

        let mut compared: HashSet<(*const Node, *const Node)> = HashSet::new();
        let mut stack: Vec<(&Node, &Node)> = vec![(self, other)];

        while let Some((a, b)) = stack.pop() {
            if std::ptr::eq(a, b) || !compared.insert((a as *const Node, b as *const Node)) {
                continue;
            }
            if a.content_hash != b.content_hash
                || a.kind != b.kind
                || a.args != b.args
                || a.kwargs != b.kwargs
                || a.inputs.len() != b.inputs.len()
            {
                return false;
            }
            for (left, right) in a.inputs.iter().zip(&b.inputs) {
                if left.index() != right.index() || left.kind() != right.kind() {
                    return false;
                }
                stack.push((left.node().as_ref(), right.node().as_ref()));
            }
        }

        true
    }
}

impl Eq for Node {}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.content_hash);
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.hex())
            .field("kind", &self.kind)
            .field("args", &self.args)
            .field("kwargs", &self.kwargs)
            .field("inputs", &self.inputs.len())
            .finish()
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            NodeKind::Input { filename } => write!(f, "input({})#{}", filename, self.hex()),
            NodeKind::Filter { name, .. } => write!(f, "{}#{}", name, self.hex()),
            NodeKind::Output { filename } => write!(f, "output({})#{}", filename, self.hex()),
            NodeKind::Global => write!(f, "global#{}", self.hex()),
            NodeKind::MergeOutputs => write!(f, "merge_outputs#{}", self.hex()),
        }
    }
}
