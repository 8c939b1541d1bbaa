//! Builder surface for constructing graphs.
//!
//! These are the calls a caller chains to describe a pipeline, and the same
//! calls the source emitter writes out, so a generated script replays through
//! exactly this module.
//!
//! ```
//! use ffgraph_rs::builder::{input, concat};
//! use ffgraph_rs::Options;
//!
//! let reversed = input("A.mp4").vfilter("reverse", Options::new())?;
//! let a = reversed.vfilter("trim", Options::new())?;
//! let b = reversed.vfilter("trim", Options::new())?;
//! let joined = concat(&[a, b], 2, 1, 0)?.video(0)?;
//! let out = joined.output("out.mp4", Options::new())?;
//! # Ok::<(), ffgraph_rs::GraphError>(())
//! ```

use crate::dag::{GraphResult, MediaKind, Node, NodeRef, Options, Stream};

fn owned(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

/// Open an input file with no options.
pub fn input(filename: impl Into<String>) -> Stream {
    input_with(filename, &[], Options::new())
}

/// Open an input file with positional tokens and options (`-ss`, `-t`, ...).
pub fn input_with(filename: impl Into<String>, args: &[&str], kwargs: Options) -> Stream {
    let node = Node::input(filename, owned(args), kwargs);
    Stream::from_parts(node, None, MediaKind::Generic)
}

/// A filter with a single video output.
pub fn vfilter(
    inputs: &[Stream],
    name: &str,
    input_typings: &[MediaKind],
    args: &[&str],
    kwargs: Options,
) -> GraphResult<Stream> {
    single_output(inputs, name, input_typings, MediaKind::Video, args, kwargs)
}

/// A filter with a single audio output.
pub fn afilter(
    inputs: &[Stream],
    name: &str,
    input_typings: &[MediaKind],
    args: &[&str],
    kwargs: Options,
) -> GraphResult<Stream> {
    single_output(inputs, name, input_typings, MediaKind::Audio, args, kwargs)
}

fn single_output(
    inputs: &[Stream],
    name: &str,
    input_typings: &[MediaKind],
    output: MediaKind,
    args: &[&str],
    kwargs: Options,
) -> GraphResult<Stream> {
    Node::filter(
        name,
        inputs.to_vec(),
        input_typings.to_vec(),
        vec![output],
        owned(args),
        kwargs,
    )?
    .output(0)
}

/// A filter with any number of outputs. Outputs are taken from the returned
/// node with [`Node::video`], [`Node::audio`] or [`Node::output`].
pub fn filter_multi_output(
    inputs: &[Stream],
    name: &str,
    input_typings: &[MediaKind],
    output_typings: &[MediaKind],
    args: &[&str],
    kwargs: Options,
) -> GraphResult<NodeRef> {
    Node::filter(
        name,
        inputs.to_vec(),
        input_typings.to_vec(),
        output_typings.to_vec(),
        owned(args),
        kwargs,
    )
}

/// Write `inputs` to `filename`. Each input becomes one `-map`.
pub fn output(
    inputs: &[Stream],
    filename: impl Into<String>,
    args: &[&str],
    kwargs: Options,
) -> GraphResult<Stream> {
    Node::output_file(inputs.to_vec(), filename, owned(args), kwargs)?.stream()
}

/// Combine several outputs into one command.
pub fn merge_outputs(outputs: &[Stream]) -> GraphResult<Stream> {
    Node::merge_outputs(outputs.to_vec())?.stream()
}

/// Attach global options (`-y`, `-loglevel`, ...) to outputs.
pub fn global_args(inputs: &[Stream], args: &[&str], kwargs: Options) -> GraphResult<Stream> {
    Node::global(inputs.to_vec(), owned(args), kwargs)?.stream()
}

/// Duplicate a video stream into `outputs` copies.
pub fn split(stream: &Stream, outputs: usize) -> GraphResult<NodeRef> {
    fan_out("split", MediaKind::Video, stream, outputs)
}

/// Duplicate an audio stream into `outputs` copies.
pub fn asplit(stream: &Stream, outputs: usize) -> GraphResult<NodeRef> {
    fan_out("asplit", MediaKind::Audio, stream, outputs)
}

fn fan_out(name: &str, kind: MediaKind, stream: &Stream, outputs: usize) -> GraphResult<NodeRef> {
    let count = outputs.to_string();
    Node::filter(
        name,
        vec![stream.clone()],
        vec![kind],
        vec![kind; outputs],
        vec![count],
        Options::new(),
    )
}

/// Concatenate `n` segments of `v` video and `a` audio streams each.
///
/// Input and output arity are computed from the options: `n * (v + a)`
/// inputs, `v + a` outputs.
pub fn concat(streams: &[Stream], n: usize, v: usize, a: usize) -> GraphResult<NodeRef> {
    let segment: Vec<MediaKind> = std::iter::repeat(MediaKind::Video)
        .take(v)
        .chain(std::iter::repeat(MediaKind::Audio).take(a))
        .collect();
    let input_typings: Vec<MediaKind> = segment
        .iter()
        .copied()
        .cycle()
        .take(n * segment.len())
        .collect();

    Node::filter(
        "concat",
        streams.to_vec(),
        input_typings,
        segment,
        Vec::new(),
        Options::new().with("n", n).with("v", v).with("a", a),
    )
}

/// Chaining shortcuts for single-stream pipelines.
impl Stream {
    /// Single video in, single video out.
    pub fn vfilter(&self, name: &str, kwargs: Options) -> GraphResult<Stream> {
        vfilter(std::slice::from_ref(self), name, &[MediaKind::Video], &[], kwargs)
    }

    /// Single audio in, single audio out.
    pub fn afilter(&self, name: &str, kwargs: Options) -> GraphResult<Stream> {
        afilter(std::slice::from_ref(self), name, &[MediaKind::Audio], &[], kwargs)
    }

    pub fn output(&self, filename: impl Into<String>, kwargs: Options) -> GraphResult<Stream> {
        output(std::slice::from_ref(self), filename, &[], kwargs)
    }

    pub fn global_args(&self, args: &[&str], kwargs: Options) -> GraphResult<Stream> {
        global_args(std::slice::from_ref(self), args, kwargs)
    }

    /// Explicit fan-out, picking `split` or `asplit` from the stream kind.
    pub fn split(&self, outputs: usize) -> GraphResult<NodeRef> {
        match self.kind() {
            MediaKind::Audio => asplit(self, outputs),
            _ => split(self, outputs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::{GraphError, NodeKind};

    #[test]
    fn test_chain() {
        let out = input("a.mp4")
            .vfilter("hflip", Options::new())
            .unwrap()
            .output("out.mp4", Options::new())
            .unwrap();

        assert!(matches!(out.node().kind(), NodeKind::Output { .. }));
        assert_eq!(out.node().depth(), 2);
    }

    #[test]
    fn test_split_uses_positional_count() {
        let node = split(&input("a.mp4"), 3).unwrap();
        assert_eq!(node.args(), &["3".to_string()]);
        assert_eq!(node.output_arity(), 3);
        assert!(node.video(2).is_ok());
        assert!(node.video(3).is_err());
    }

    #[test]
    fn test_concat_dynamic_arity() {
        let a = input("a.mp4");
        let b = input("b.mp4");
        let node = concat(
            &[a.video().unwrap(), a.audio().unwrap(), b.video().unwrap(), b.audio().unwrap()],
            2,
            1,
            1,
        )
        .unwrap();

        assert_eq!(node.output_typings(), &[MediaKind::Video, MediaKind::Audio]);
        assert_eq!(node.audio(0).unwrap().index(), Some(1));

        let err = concat(&[a.video().unwrap()], 2, 1, 0).unwrap_err();
        assert!(matches!(err, GraphError::InputArity { expected: 2, actual: 1, .. }));
    }

    #[test]
    fn test_audio_stream_splits_with_asplit() {
        let node = input("a.mp4").audio().unwrap().split(2).unwrap();
        assert_eq!(node.filter_name(), Some("asplit"));
    }

    #[test]
    fn test_merge_requires_outputs() {
        let src = input("a.mp4");
        assert!(matches!(
            merge_outputs(&[src]),
            Err(GraphError::InvalidSource { .. })
        ));
    }
}
