//! Compiler entry point.
//!
//! `Compiler` ties the passes together:
//!
//! 1. legality repair (when `auto_fix` is on)
//! 2. a fresh [`Context`] on the repaired graph
//! 3. the argument-list and builder-script emitters

use crate::catalog::{BuiltinCatalog, FilterCatalog};
use crate::codegen::{generate_args, generate_source};
use crate::config::CompilerConfig;
use crate::dag::acyclic::check_graph;
use crate::dag::{repair_with_stats, Context, NodeKind, RepairStats, Stream};
use crate::error::{Result, ResultExt};
use crate::runner::{RunOutput, Runner};
use serde::Serialize;
use std::sync::Arc;

/// Statistics about one compilation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CompileStats {
    /// Nodes in the compiled graph
    pub total_nodes: usize,

    /// Filter nodes, inserted splits included
    pub filter_nodes: usize,

    /// Splits removed by the repair pass
    pub splits_removed: usize,

    /// Splits inserted by the repair pass
    pub splits_inserted: usize,

    /// Compilation time in microseconds
    pub compile_time_us: u64,
}

/// Both artifacts for one graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompiledCommand {
    /// Executable to run, from the config
    pub binary: String,

    /// Argument list, binary excluded
    pub args: Vec<String>,

    /// Builder script reconstructing the compiled graph
    pub source: String,

    pub stats: CompileStats,
}

impl CompiledCommand {
    /// Binary followed by the arguments.
    pub fn command_line(&self) -> Vec<String> {
        std::iter::once(self.binary.clone())
            .chain(self.args.iter().cloned())
            .collect()
    }
}

/// Compiles graphs to commands.
#[derive(Clone)]
pub struct Compiler {
    config: CompilerConfig,
    catalog: Arc<dyn FilterCatalog>,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::from_config(CompilerConfig::default())
    }
}

impl std::fmt::Debug for Compiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compiler")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Compiler {
    pub fn new(config: CompilerConfig, catalog: impl FilterCatalog + 'static) -> Self {
        Self {
            config,
            catalog: Arc::new(catalog),
        }
    }

    /// Builtin catalog extended with the filters declared in `config`.
    pub fn from_config(config: CompilerConfig) -> Self {
        let catalog = BuiltinCatalog::new().with_filters(
            config
                .filters
                .iter()
                .map(|(name, meta)| (name.clone(), *meta)),
        );
        Self::new(config, catalog)
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Repair (if enabled) and analyse the graph ending in `root`.
    fn prepare(&self, root: &Stream) -> Result<(Stream, Context, RepairStats)> {
        let (graph, repair_stats) = if self.config.auto_fix {
            repair_with_stats(root).context("Failed to repair graph")?
        } else {
            (root.clone(), RepairStats::default())
        };

        if repair_stats.splits_inserted > 0 {
            tracing::warn!(
                "Inserted {} split node(s) for reused filter outputs",
                repair_stats.splits_inserted
            );
        }

        check_graph(graph.node()).context("Graph is not acyclic")?;
        let context = Context::build(graph.node());
        Ok((graph, context, repair_stats))
    }

    fn overwrite_flag(&self) -> Option<&'static str> {
        match self.config.overwrite_output {
            Some(true) => Some("-y"),
            Some(false) => Some("-n"),
            None => None,
        }
    }

    fn args_for(&self, context: &Context) -> Result<Vec<String>> {
        let mut args: Vec<String> = self.overwrite_flag().map(str::to_string).into_iter().collect();
        args.extend(generate_args(context).context("Failed to generate arguments")?);
        Ok(args)
    }

    /// Compile `root` to both artifacts.
    pub fn compile(&self, root: &Stream) -> Result<CompiledCommand> {
        let start_time = std::time::Instant::now();

        let (graph, context, repair_stats) = self.prepare(root)?;
        let args = self.args_for(&context)?;
        let source = generate_source(&context, &graph, self.catalog.as_ref())
            .context("Failed to generate builder source")?;

        let stats = CompileStats {
            total_nodes: context.len(),
            filter_nodes: context
                .nodes_where(|k| matches!(k, NodeKind::Filter { .. }))
                .count(),
            splits_removed: repair_stats.splits_removed,
            splits_inserted: repair_stats.splits_inserted,
            compile_time_us: start_time.elapsed().as_micros() as u64,
        };

        tracing::info!(
            "Compiled graph: {} nodes ({} filters), {} arguments in {}us",
            stats.total_nodes,
            stats.filter_nodes,
            args.len(),
            stats.compile_time_us
        );

        Ok(CompiledCommand {
            binary: self.config.binary.clone(),
            args,
            source,
            stats,
        })
    }

    /// Only the argument list.
    pub fn compile_args(&self, root: &Stream) -> Result<Vec<String>> {
        let (_, context, _) = self.prepare(root)?;
        self.args_for(&context)
    }

    /// Only the builder script.
    pub fn compile_source(&self, root: &Stream) -> Result<String> {
        let (graph, context, _) = self.prepare(root)?;
        generate_source(&context, &graph, self.catalog.as_ref())
            .context("Failed to generate builder source")
    }

    /// Compile and hand the command to `runner`. A non-zero exit is an error.
    pub fn run(&self, root: &Stream, runner: &dyn Runner) -> Result<RunOutput> {
        let command = self.compile(root)?;
        runner
            .run(&command.binary, &command.args)?
            .into_result()
            .with_context(|| format!("{} failed", command.binary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::input;
    use crate::catalog::FilterMetadata;
    use crate::dag::Options;
    use crate::runner::MockRunner;

    fn diamond() -> Stream {
        let reversed = input("A.mp4").vfilter("reverse", Options::new()).unwrap();
        let a = reversed.vfilter("hflip", Options::new()).unwrap();
        let b = reversed.vfilter("vflip", Options::new()).unwrap();
        crate::builder::output(&[a, b], "out.mkv", &[], Options::new()).unwrap()
    }

    #[test]
    fn test_compile_stats() {
        let command = Compiler::default().compile(&diamond()).unwrap();
        assert_eq!(command.binary, "ffmpeg");
        assert_eq!(command.stats.splits_inserted, 1);
        assert_eq!(command.stats.filter_nodes, 4);
        assert_eq!(command.stats.total_nodes, 6);
        assert_eq!(command.command_line()[0], "ffmpeg");
    }

    #[test]
    fn test_overwrite_flag() {
        let mut config = CompilerConfig::default();
        config.overwrite_output = Some(true);
        let args = Compiler::from_config(config.clone())
            .compile_args(&diamond())
            .unwrap();
        assert_eq!(args[0], "-y");

        config.overwrite_output = Some(false);
        let args = Compiler::from_config(config).compile_args(&diamond()).unwrap();
        assert_eq!(args[0], "-n");
    }

    #[test]
    fn test_auto_fix_off_keeps_graph() {
        let mut config = CompilerConfig::default();
        config.auto_fix = false;
        let command = Compiler::from_config(config).compile(&diamond()).unwrap();
        assert_eq!(command.stats.splits_inserted, 0);
        assert!(!command.args.iter().any(|a| a.contains("split")));
    }

    #[test]
    fn test_config_filters_reach_catalog() {
        let root = input("A.mp4").vfilter("myfilter", Options::new()).unwrap();

        let plain = Compiler::default().compile_source(&root).unwrap();
        assert!(plain.contains("vfilter([input_0], \"myfilter\""));

        let mut config = CompilerConfig::default();
        config
            .filters
            .insert("myfilter".to_string(), FilterMetadata::dynamic(false, true));
        let source = Compiler::from_config(config).compile_source(&root).unwrap();
        assert!(source.contains("filter_multi_output([input_0], \"myfilter\""));
    }

    #[test]
    fn test_run_uses_configured_binary() {
        let mut config = CompilerConfig::default();
        config.binary = "ffmpeg7".to_string();
        let compiler = Compiler::from_config(config);

        let mut runner = MockRunner::new();
        runner
            .expect_run()
            .withf(|binary, args| {
                binary == "ffmpeg7" && args.last().map(String::as_str) == Some("out.mkv")
            })
            .times(1)
            .returning(|_, _| {
                Ok(RunOutput {
                    exit_code: Some(0),
                    ..Default::default()
                })
            });

        assert!(compiler.run(&diamond(), &runner).is_ok());
    }

    #[test]
    fn test_run_reports_failure() {
        let mut runner = MockRunner::new();
        runner.expect_run().returning(|_, _| {
            Ok(RunOutput {
                exit_code: Some(1),
                stdout: String::new(),
                stderr: "Invalid argument".to_string(),
            })
        });

        let err = Compiler::default().run(&diamond(), &runner).unwrap_err();
        assert!(err.to_string().contains("ffmpeg failed"));
        assert!(err.to_string().contains("Invalid argument"));
    }
}
