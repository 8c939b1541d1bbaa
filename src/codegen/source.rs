//! Builder-script emitter.
//!
//! Writes the graph back out as the builder calls that construct it, one
//! `let` per node in depth order, followed by the root stream as a tail
//! expression:
//!
//! ```text
//! let input_0 = input("A.mp4", [], []);
//! let node_0 = vfilter([input_0], "reverse", [video], [], []);
//! let output_0 = output([node_0], "out.mp4", [], []);
//! output_0
//! ```
//!
//! The script is what [`parse`](super::parse::parse) reads back.

use crate::catalog::FilterCatalog;
use crate::dag::{
    Context, GraphError, GraphResult, MediaKind, Node, NodeKind, Options, Stream, Value,
};
use std::fmt::Write;

/// Emit the builder script for `root`, whose graph is described by `ctx`.
pub fn generate_source(
    ctx: &Context,
    root: &Stream,
    catalog: &dyn FilterCatalog,
) -> GraphResult<String> {
    let emitter = SourceEmitter { ctx, catalog };
    let mut out = String::new();

    for node in ctx.all_nodes() {
        let line = emitter.statement(node)?;
        out.push_str(&line);
        out.push('\n');
    }
    out.push_str(&emitter.stream_ref(root)?);
    out.push('\n');

    Ok(out)
}

struct SourceEmitter<'a> {
    ctx: &'a Context,
    catalog: &'a dyn FilterCatalog,
}

impl SourceEmitter<'_> {
    fn var(&self, node: &Node) -> GraphResult<String> {
        let id = self
            .ctx
            .node_id(node)
            .ok_or_else(|| GraphError::Codegen(format!("{} is not part of the graph", node)))?;
        let prefix = match node.kind() {
            NodeKind::Input { .. } => "input",
            NodeKind::Filter { .. } => "node",
            NodeKind::Output { .. } => "output",
            NodeKind::MergeOutputs => "merge",
            NodeKind::Global => "global",
        };
        Ok(format!("{}_{}", prefix, id))
    }

    /// Whether a filter is written as `vfilter`/`afilter` rather than
    /// `filter_multi_output`.
    fn is_single_output(&self, node: &Node) -> bool {
        match node.kind() {
            NodeKind::Filter {
                name,
                output_typings,
                ..
            } => {
                output_typings.len() == 1
                    && output_typings[0] != MediaKind::Generic
                    && !self.catalog.has_dynamic_outputs(name)
            }
            _ => false,
        }
    }

    fn statement(&self, node: &Node) -> GraphResult<String> {
        let var = self.var(node)?;
        let call = match node.kind() {
            NodeKind::Input { filename } => format!(
                "input({:?}, {}, {})",
                filename,
                render_args(node.args()),
                render_kwargs(node.kwargs())
            ),
            NodeKind::Filter {
                name,
                input_typings,
                output_typings,
            } => {
                let inputs = self.stream_list(node.inputs())?;
                if self.is_single_output(node) {
                    let function = match output_typings[0] {
                        MediaKind::Audio => "afilter",
                        _ => "vfilter",
                    };
                    format!(
                        "{}({}, {:?}, {}, {}, {})",
                        function,
                        inputs,
                        name,
                        render_typings(input_typings),
                        render_args(node.args()),
                        render_kwargs(node.kwargs())
                    )
                } else {
                    format!(
                        "filter_multi_output({}, {:?}, {}, {}, {}, {})",
                        inputs,
                        name,
                        render_typings(input_typings),
                        render_typings(output_typings),
                        render_args(node.args()),
                        render_kwargs(node.kwargs())
                    )
                }
            }
            NodeKind::Output { filename } => format!(
                "output({}, {:?}, {}, {})",
                self.stream_list(node.inputs())?,
                filename,
                render_args(node.args()),
                render_kwargs(node.kwargs())
            ),
            NodeKind::MergeOutputs => {
                format!("merge_outputs({})", self.stream_list(node.inputs())?)
            }
            NodeKind::Global => format!(
                "global_args({}, {}, {})",
                self.stream_list(node.inputs())?,
                render_args(node.args()),
                render_kwargs(node.kwargs())
            ),
        };
        Ok(format!("let {} = {};", var, call))
    }

    fn stream_list(&self, streams: &[Stream]) -> GraphResult<String> {
        let refs = streams
            .iter()
            .map(|s| self.stream_ref(s))
            .collect::<GraphResult<Vec<_>>>()?;
        Ok(format!("[{}]", refs.join(", ")))
    }

    fn stream_ref(&self, stream: &Stream) -> GraphResult<String> {
        let node = stream.node();
        let var = self.var(node)?;

        match node.kind() {
            NodeKind::Input { .. } => Ok(match stream.kind() {
                MediaKind::Video => format!("{}.video()", var),
                MediaKind::Audio => format!("{}.audio()", var),
                MediaKind::Generic => var,
            }),
            NodeKind::Filter { output_typings, .. } => {
                if self.is_single_output(node) {
                    return Ok(var);
                }
                let index = stream.index().ok_or_else(|| {
                    GraphError::Codegen(format!("filter stream of {} has no index", node))
                })?;
                Ok(match stream.kind() {
                    MediaKind::Generic => format!("{}.output({})", var, index),
                    kind => {
                        let nth = output_typings[..index].iter().filter(|t| **t == kind).count();
                        format!("{}.{}({})", var, kind, nth)
                    }
                })
            }
            NodeKind::Output { .. } | NodeKind::MergeOutputs | NodeKind::Global => Ok(var),
        }
    }
}

fn render_typings(typings: &[MediaKind]) -> String {
    let names: Vec<&str> = typings.iter().map(|t| t.as_str()).collect();
    format!("[{}]", names.join(", "))
}

fn render_args(args: &[String]) -> String {
    let quoted: Vec<String> = args.iter().map(|a| format!("{:?}", a)).collect();
    format!("[{}]", quoted.join(", "))
}

fn render_kwargs(options: &Options) -> String {
    let pairs: Vec<String> = options
        .iter()
        .map(|(key, value)| format!("({:?}, {})", key, render_value(value)))
        .collect();
    format!("[{}]", pairs.join(", "))
}

/// Literal form of a value. Floats keep a `.` or exponent so they read back
/// as floats.
pub fn render_value(value: &Value) -> String {
    match value {
        Value::Str(v) => format!("{:?}", v),
        Value::Int(v) => v.to_string(),
        Value::Float(v) => format!("{:?}", v),
        Value::Bool(v) => v.to_string(),
        Value::Lazy(v) => format!("lazy({})", v),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{concat, input, input_with};
    use crate::catalog::BuiltinCatalog;
    use crate::dag::{repair, LazyValue};

    fn source_for(root: &Stream) -> String {
        let repaired = repair(root).unwrap();
        let ctx = Context::build(repaired.node());
        generate_source(&ctx, &repaired, &BuiltinCatalog::new()).unwrap()
    }

    #[test]
    fn test_single_filter_script() {
        let out = input_with("A.mp4", &[], Options::new().with("ss", 10))
            .video()
            .unwrap()
            .vfilter("hflip", Options::new())
            .unwrap()
            .output("out.mp4", Options::new())
            .unwrap();

        assert_eq!(
            source_for(&out),
            "let input_0 = input(\"A.mp4\", [], [(\"ss\", 10)]);\n\
             let node_0 = vfilter([input_0.video()], \"hflip\", [video], [], []);\n\
             let output_0 = output([node_0], \"out.mp4\", [], []);\n\
             output_0\n"
        );
    }

    #[test]
    fn test_split_uses_multi_output_form() {
        let reversed = input("A.mp4").vfilter("reverse", Options::new()).unwrap();
        let a = reversed.vfilter("trim", Options::new().with("end", 5)).unwrap();
        let b = reversed.vfilter("trim", Options::new().with("start", 10)).unwrap();
        let joined = concat(&[a, b], 2, 1, 0).unwrap().video(0).unwrap();

        let source = source_for(&joined);
        assert!(source.contains(
            "let node_1 = filter_multi_output([node_0], \"split\", [video], [video, video], [\"2\"], []);"
        ));
        assert!(source.contains("vfilter([node_1.video(0)], \"trim\""));
        assert!(source.contains("vfilter([node_1.video(1)], \"trim\""));
        // concat has a single output here but a dynamic count in general.
        assert!(source.contains("filter_multi_output([node_2, node_3], \"concat\""));
        assert!(source.ends_with("node_4.video(0)\n"));
    }

    #[test]
    fn test_value_literals() {
        assert_eq!(render_value(&Value::from("a \"b\"")), "\"a \\\"b\\\"\"");
        assert_eq!(render_value(&Value::from(2.0)), "2.0");
        assert_eq!(render_value(&Value::from(false)), "false");
        assert_eq!(
            render_value(&Value::from(LazyValue::reference("n").mul(2))),
            "lazy(mul(ref(\"n\"), 2))"
        );
    }

    #[test]
    fn test_unknown_node_is_codegen_error() {
        let a = input("a.mp4").output("a.mp4", Options::new()).unwrap();
        let b = input("b.mp4").output("b.mp4", Options::new()).unwrap();
        let ctx = Context::build(a.node());

        let err = generate_source(&ctx, &b, &BuiltinCatalog::new()).unwrap_err();
        assert!(matches!(err, GraphError::Codegen(_)));
    }
}
