//! Code generation backends.
//!
//! Both emitters take a [`Context`](crate::dag::Context) built on an already
//! repaired graph and either produce a complete artifact or fail; there is no
//! partial output.
//!
//! - [`cli`]: the argument list for the external tool
//! - [`source`]: the builder script that reconstructs the graph
//! - [`parse`]: reads a builder script back into a graph

pub mod cli;
pub mod parse;
pub mod source;

pub use cli::generate_args;
pub use parse::{parse, ParseError, ParseResult};
pub use source::generate_source;
