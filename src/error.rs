//! Error handling for ffgraph-rs
//!
//! This module defines the crate-level error type and a Result alias. Graph
//! construction and code generation have their own narrower error types,
//! which convert into [`FfgraphError`].

use crate::codegen::ParseError;
use crate::dag::GraphError;
use thiserror::Error;

/// Main error type for ffgraph-rs operations
#[derive(Error, Debug)]
pub enum FfgraphError {
    /// Errors raised while building, repairing or emitting a graph
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    /// Errors reading a builder script back
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors from running the external tool
    #[error("Process error: {0}")]
    Process(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<FfgraphError>,
    },
}

impl FfgraphError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        FfgraphError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, skipping context wrappers.
    pub fn root_cause(&self) -> &FfgraphError {
        match self {
            FfgraphError::WithContext { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Result type alias for ffgraph-rs operations
pub type Result<T> = std::result::Result<T, FfgraphError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<FfgraphError>,
{
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.into().with_context(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FfgraphError::Config("missing binary".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing binary");
    }

    #[test]
    fn test_error_with_context() {
        let err = FfgraphError::Process("exit 1".to_string());
        let with_ctx = err.with_context("Failed to run ffmpeg");
        assert!(with_ctx.to_string().contains("Failed to run ffmpeg"));
        assert!(matches!(with_ctx.root_cause(), FfgraphError::Process(_)));
    }

    #[test]
    fn test_graph_error_converts() {
        let result: std::result::Result<(), GraphError> = Err(GraphError::CycleDetected);
        let err = result.context("Compiling graph").unwrap_err();
        assert_eq!(err.to_string(), "Compiling graph: Graph error: Cycle detected in filter graph");
        assert!(matches!(err.root_cause(), FfgraphError::Graph(GraphError::CycleDetected)));
    }
}
