//! Graph intermediate representation.
//!
//! Nodes are immutable and shared through `Arc`; equality and hashing are
//! structural. Everything that needs reverse edges goes through a
//! [`Context`] built for one root.

pub mod acyclic;
pub mod context;
pub mod error;
pub mod node;
pub mod repair;
pub mod stream;
pub mod value;

pub use context::Context;
pub use error::{GraphError, GraphResult};
pub use node::{MediaKind, Node, NodeKind, NodeRef};
pub use repair::{remove_splits, repair, repair_with_stats, RepairStats};
pub use stream::Stream;
pub use value::{LazyValue, Options, Value};
