//! Graph-specific error types.

use crate::dag::node::MediaKind;
use thiserror::Error;

/// Errors raised while building, repairing or emitting a graph.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    #[error("Filter '{filter}' expects {expected} inputs, got {actual}")]
    InputArity {
        filter: String,
        expected: usize,
        actual: usize,
    },

    #[error("Filter '{filter}' input {slot} expects a {expected} stream, got {actual}")]
    InputKind {
        filter: String,
        slot: usize,
        expected: MediaKind,
        actual: MediaKind,
    },

    #[error("A {source_kind} stream cannot feed a {target} node")]
    InvalidSource {
        source_kind: &'static str,
        target: &'static str,
    },

    #[error("Node {node} has {arity} outputs, index {index} is out of range")]
    OutputIndex {
        node: String,
        arity: usize,
        index: usize,
    },

    #[error("{node} has no {kind} view; only input streams can be narrowed")]
    NoTypedView { node: String, kind: MediaKind },

    #[error("Cycle detected in filter graph")]
    CycleDetected,

    #[error("Cannot split a {kind} stream produced by {node}")]
    UnsplittableStream { node: String, kind: MediaKind },

    #[error("Cannot evaluate option '{key}': {message}")]
    LazyEval { key: String, message: String },

    #[error("Repair invariant violated: {0}")]
    Repair(String),

    #[error("Code generation error: {0}")]
    Codegen(String),
}

pub type GraphResult<T> = std::result::Result<T, GraphError>;
