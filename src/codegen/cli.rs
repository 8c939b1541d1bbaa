//! Argument-list emitter.
//!
//! Token order follows what the external tool expects:
//!
//! 1. global options
//! 2. per input: `[args] -key value ... -i <file>`
//! 3. one `-filter_complex` argument when the graph has any filter
//! 4. per output: `-map <label>` per stream, `[args]`, options, `<file>`
//!
//! The list never contains the binary itself and is never shell-quoted.

use crate::dag::{Context, GraphResult, Node, NodeKind, Options, Stream, Value};

/// Characters escaped inside a single filter option value.
const VALUE_SPECIALS: &[char] = &['\\', '\'', '=', ':'];

/// Characters escaped in a filter's joined option string.
const GRAPH_SPECIALS: &[char] = &['\\', '\'', '[', ']', ',', ';'];

/// Emit the argument list for an already repaired graph.
pub fn generate_args(ctx: &Context) -> GraphResult<Vec<String>> {
    let mut args = Vec::new();

    for node in ctx.nodes_where(|k| matches!(k, NodeKind::Global)) {
        push_node_args(&mut args, node)?;
    }

    for node in ctx.nodes_where(|k| matches!(k, NodeKind::Input { .. })) {
        if let NodeKind::Input { filename } = node.kind() {
            push_node_args(&mut args, node)?;
            args.push("-i".to_string());
            args.push(filename.clone());
        }
    }

    let filters = ctx
        .nodes_where(|k| matches!(k, NodeKind::Filter { .. }))
        .map(|node| render_filter(ctx, node))
        .collect::<GraphResult<Vec<_>>>()?;
    if !filters.is_empty() {
        args.push("-filter_complex".to_string());
        args.push(filters.join(";"));
    }

    for node in ctx.nodes_where(|k| matches!(k, NodeKind::Output { .. })) {
        if let NodeKind::Output { filename } = node.kind() {
            for stream in node.inputs() {
                args.push("-map".to_string());
                args.push(map_label(ctx, stream));
            }
            push_node_args(&mut args, node)?;
            args.push(filename.clone());
        }
    }

    tracing::debug!("Generated {} arguments", args.len());
    Ok(args)
}

/// Positional tokens followed by `-key value` pairs.
fn push_node_args(out: &mut Vec<String>, node: &Node) -> GraphResult<()> {
    out.extend(node.args().iter().cloned());
    let options = node.kwargs().resolved()?;
    push_options(out, &options);
    Ok(())
}

fn push_options(out: &mut Vec<String>, options: &Options) {
    for (key, value) in options.iter() {
        match value {
            Value::Bool(true) => out.push(format!("-{}", key)),
            Value::Bool(false) => out.push(format!("-no{}", key)),
            other => {
                out.push(format!("-{}", key));
                out.push(other.to_string());
            }
        }
    }
}

/// `-map` argument: input streams by bare label, filter streams bracketed.
pub fn map_label(ctx: &Context, stream: &Stream) -> String {
    if stream.node().is_input() {
        ctx.stream_label(stream)
    } else {
        format!("[{}]", ctx.stream_label(stream))
    }
}

/// One filter-graph segment: `[in]...name=opts[out]...`.
fn render_filter(ctx: &Context, node: &Node) -> GraphResult<String> {
    let name = node.filter_name().unwrap_or_default();
    let mut segment = String::new();

    for stream in node.inputs() {
        segment.push('[');
        segment.push_str(&ctx.stream_label(stream));
        segment.push(']');
    }

    segment.push_str(name);
    let options = filter_options(node)?;
    if !options.is_empty() {
        segment.push('=');
        segment.push_str(&escape(&options, GRAPH_SPECIALS));
    }

    // Labels bind to pads by position, so every pad up to the last consumed
    // one is labeled.
    let last_used = ctx
        .outgoing_streams(node)
        .iter()
        .filter_map(Stream::index)
        .max();
    if let Some(last) = last_used {
        for index in 0..=last {
            segment.push('[');
            segment.push_str(&ctx.pad_label(node, index));
            segment.push(']');
        }
    }

    Ok(segment)
}

/// Positional args then `key=value`, each value escaped, joined with `:`.
fn filter_options(node: &Node) -> GraphResult<String> {
    let resolved = node.kwargs().resolved()?;
    let mut parts: Vec<String> = node
        .args()
        .iter()
        .map(|arg| escape(arg, VALUE_SPECIALS))
        .collect();

    for (key, value) in resolved.iter() {
        let text = match value {
            Value::Bool(v) => if *v { "1" } else { "0" }.to_string(),
            other => other.to_string(),
        };
        parts.push(format!("{}={}", key, escape(&text, VALUE_SPECIALS)));
    }

    Ok(parts.join(":"))
}

/// Backslash-escape every character of `text` found in `specials`.
pub fn escape(text: &str, specials: &[char]) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if specials.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
