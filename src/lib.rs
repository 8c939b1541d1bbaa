//! # ffgraph-rs: media filter-graph compiler
//!
//! Build a media pipeline as an immutable graph of inputs, filters and
//! outputs, then compile it to an argument list for `ffmpeg` and to an
//! equivalent builder script.
//!
//! ## Architecture
//!
//! - **Graph** ([`dag`]): `Arc`-shared immutable nodes with structural
//!   equality, plus a derived [`Context`] that supplies reverse edges, ids and
//!   labels
//! - **Repair** ([`dag::repair`]): makes every fan-out of a filter output
//!   explicit with `split`/`asplit`, since the tool allows each filter output
//!   to be consumed once
//! - **Code generation** ([`codegen`]): argument-list and builder-script
//!   emitters, and a parser that reads the script back
//! - **Compiler** ([`compiler`]): runs the passes using a [`CompilerConfig`]
//!
//! ## Example
//!
//! ```
//! use ffgraph_rs::builder::{concat, input};
//! use ffgraph_rs::{Compiler, Options};
//!
//! let reversed = input("A.mp4").vfilter("reverse", Options::new())?;
//! let head = reversed.vfilter("trim", Options::new().with("end", 5))?;
//! let tail = reversed.vfilter("trim", Options::new().with("start", 10))?;
//! let out = concat(&[head, tail], 2, 1, 0)?
//!     .video(0)?
//!     .output("out.mp4", Options::new())?;
//!
//! let command = Compiler::default().compile(&out)?;
//! assert_eq!(command.stats.splits_inserted, 1);
//! # Ok::<(), ffgraph_rs::FfgraphError>(())
//! ```

pub mod builder;
pub mod catalog;
pub mod codegen;
pub mod compiler;
pub mod config;
pub mod dag;
pub mod error;
pub mod runner;

// Re-export commonly used types
pub use catalog::{BuiltinCatalog, FilterCatalog, FilterMetadata};
pub use codegen::{parse, ParseError};
pub use compiler::{CompileStats, CompiledCommand, Compiler};
pub use config::CompilerConfig;
pub use dag::{
    repair, Context, GraphError, GraphResult, LazyValue, MediaKind, Node, NodeKind, NodeRef,
    Options, Stream, Value,
};
pub use error::{FfgraphError, Result, ResultExt};
pub use runner::{ProcessRunner, RunOutput, Runner};
