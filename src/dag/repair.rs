//! Legality repair: make every fan-out explicit.
//!
//! The external tool lets a filter output feed exactly one input slot. A
//! graph that reuses a filter output must route it through a `split` (video)
//! or `asplit` (audio) with one output per consumer. Input-file streams are
//! exempt: the tool lets a label like `0:v` be referenced any number of times.
//!
//! Repair runs in two passes:
//!
//! 1. **Remove** every existing split, wiring its consumers straight to the
//!    split's upstream stream.
//! 2. **Add** exactly one split per over-consumed stream, using a context
//!    built on the cleaned graph to count consumers.
//!
//! Hand-split and naturally reused graphs converge to the same canonical
//! form, which makes `repair` idempotent.

use crate::builder::{asplit, split};
use crate::dag::context::Context;
use crate::dag::error::{GraphError, GraphResult};
use crate::dag::node::{MediaKind, NodeRef};
use crate::dag::stream::Stream;
use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::Arc;

/// Counts reported by a repair run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepairStats {
    /// Split nodes spliced out by the remove pass.
    pub splits_removed: usize,
    /// Split nodes inserted by the add pass.
    pub splits_inserted: usize,
    /// Nodes in the repaired graph.
    pub nodes: usize,
}

/// Remove-then-add repair of the graph ending in `root`.
pub fn repair(root: &Stream) -> GraphResult<Stream> {
    repair_with_stats(root).map(|(stream, _)| stream)
}

/// [`repair`], also returning what changed.
pub fn repair_with_stats(root: &Stream) -> GraphResult<(Stream, RepairStats)> {
    let mut remove = RemovePass::default();
    let cleaned = remove.visit(root)?;

    let context = Context::build(cleaned.node());
    let mut add = AddPass::new(&context);
    let repaired = add.visit(&cleaned, None)?;

    let stats = RepairStats {
        splits_removed: remove.removed,
        splits_inserted: add.inserted,
        nodes: repaired.node().upstream_nodes().len(),
    };
    tracing::debug!(
        "Repair: removed {} splits, inserted {} ({} nodes)",
        stats.splits_removed,
        stats.splits_inserted,
        stats.nodes
    );
    Ok((repaired, stats))
}

/// Only the remove pass of [`repair`]: a graph without any split nodes.
pub fn remove_splits(root: &Stream) -> GraphResult<Stream> {
    RemovePass::default().visit(root)
}

fn is_split(node: &NodeRef) -> bool {
    matches!(node.filter_name(), Some("split") | Some("asplit")) && node.inputs().len() == 1
}

/// Memoised "number of upstream nodes", the processing-order key.
#[derive(Default)]
struct UpstreamCounts(HashMap<NodeRef, usize>);

impl UpstreamCounts {
    fn get(&mut self, node: &NodeRef) -> usize {
        if let Some(&count) = self.0.get(node) {
            return count;
        }
        let count = node.upstream_nodes().len();
        self.0.insert(Arc::clone(node), count);
        count
    }

    /// Input slots of `node`, largest upstream subtree first. Ties keep slot
    /// order.
    fn input_order(&mut self, node: &NodeRef) -> Vec<usize> {
        let mut slots: Vec<(usize, usize)> = node
            .inputs()
            .iter()
            .enumerate()
            .map(|(slot, stream)| (slot, self.get(stream.node())))
            .collect();
        slots.sort_by_key(|&(_, count)| Reverse(count));
        slots.into_iter().map(|(slot, _)| slot).collect()
    }
}

/// Rebuild `node` with inputs produced by `visit`, visiting slots in
/// upstream-size order and putting the results back in slot order.
fn rebuild_with<F>(
    node: &NodeRef,
    counts: &mut UpstreamCounts,
    mut visit: F,
) -> GraphResult<NodeRef>
where
    F: FnMut(&Stream, usize) -> GraphResult<Stream>,
{
    let mut inputs: Vec<Option<Stream>> = vec![None; node.inputs().len()];
    for slot in counts.input_order(node) {
        inputs[slot] = Some(visit(&node.inputs()[slot], slot)?);
    }
    node.with_inputs(inputs.into_iter().flatten().collect())
}

// ── Remove pass ──

#[derive(Default)]
struct RemovePass {
    /// Original stream -> cleaned stream.
    memo: HashMap<Stream, Stream>,
    /// Original node -> cleaned node, so sibling outputs share one rebuild.
    rebuilt: HashMap<NodeRef, NodeRef>,
    counts: UpstreamCounts,
    removed: usize,
}

impl RemovePass {
    fn visit(&mut self, stream: &Stream) -> GraphResult<Stream> {
        if let Some(done) = self.memo.get(stream) {
            return Ok(done.clone());
        }

        let node = stream.node();
        let result = if is_split(node) {
            // Every output of a split resolves to the split's own input.
            let upstream = self.visit(&node.inputs()[0])?;
            if !self.rebuilt.contains_key(node) {
                self.rebuilt.insert(Arc::clone(node), Arc::clone(upstream.node()));
                self.removed += 1;
            }
            upstream
        } else {
            let rebuilt = self.rebuild(node)?;
            stream.rebind(rebuilt)?
        };

        self.memo.insert(stream.clone(), result.clone());
        Ok(result)
    }

    fn rebuild(&mut self, node: &NodeRef) -> GraphResult<NodeRef> {
        if let Some(done) = self.rebuilt.get(node) {
            return Ok(Arc::clone(done));
        }
        let mut counts = std::mem::take(&mut self.counts);
        let rebuilt = rebuild_with(node, &mut counts, |input, _| self.visit(input));
        self.counts = counts;
        let rebuilt = rebuilt?;
        self.rebuilt.insert(Arc::clone(node), Arc::clone(&rebuilt));
        Ok(rebuilt)
    }
}

// ── Add pass ──

/// Memo key: the same stream resolves differently per consumer.
type AddKey = (Stream, Option<NodeRef>, Option<usize>);

struct AddPass<'a> {
    context: &'a Context,
    memo: HashMap<AddKey, Stream>,
    rebuilt: HashMap<NodeRef, NodeRef>,
    counts: UpstreamCounts,
    inserted: usize,
}

impl<'a> AddPass<'a> {
    fn new(context: &'a Context) -> Self {
        Self {
            context,
            memo: HashMap::new(),
            rebuilt: HashMap::new(),
            counts: UpstreamCounts::default(),
            inserted: 0,
        }
    }

    /// Resolve `stream` as seen by `down` (consumer node and slot), or as the
    /// root when `down` is `None`.
    fn visit(&mut self, stream: &Stream, down: Option<(&NodeRef, usize)>) -> GraphResult<Stream> {
        let key: AddKey = (
            stream.clone(),
            down.map(|(node, _)| Arc::clone(node)),
            down.map(|(_, slot)| slot),
        );
        if let Some(done) = self.memo.get(&key) {
            return Ok(done.clone());
        }

        let node = stream.node();
        let rebuilt = self.rebuild(node)?;
        let new_stream = stream.rebind(rebuilt)?;
        let consumers = self.context.outgoing_nodes(stream).to_vec();

        if node.is_input() {
            for (consumer, slot) in consumers {
                self.memo
                    .insert((stream.clone(), Some(consumer), Some(slot)), new_stream.clone());
            }
            self.memo.insert(key, new_stream.clone());
            return Ok(new_stream);
        }

        if consumers.len() < 2 {
            self.memo.insert(key, new_stream.clone());
            return Ok(new_stream);
        }

        let fan_out = match new_stream.kind() {
            MediaKind::Video => split(&new_stream, consumers.len())?,
            MediaKind::Audio => asplit(&new_stream, consumers.len())?,
            MediaKind::Generic => {
                return Err(GraphError::UnsplittableStream {
                    node: node.to_string(),
                    kind: MediaKind::Generic,
                })
            }
        };
        self.inserted += 1;
        tracing::debug!(
            "Inserted {} with {} outputs after {}",
            fan_out,
            consumers.len(),
            node
        );

        for (i, (consumer, slot)) in consumers.into_iter().enumerate() {
            self.memo
                .insert((stream.clone(), Some(consumer), Some(slot)), fan_out.output(i)?);
        }

        self.memo.get(&key).cloned().ok_or_else(|| {
            GraphError::Repair(format!("{} is not a recorded consumer of {}", stream, node))
        })
    }

    fn rebuild(&mut self, node: &NodeRef) -> GraphResult<NodeRef> {
        if let Some(done) = self.rebuilt.get(node) {
            return Ok(Arc::clone(done));
        }
        let mut counts = std::mem::take(&mut self.counts);
        let rebuilt = rebuild_with(node, &mut counts, |input, slot| {
            self.visit(input, Some((node, slot)))
        });
        self.counts = counts;
        let rebuilt = rebuilt?;
        self.rebuilt.insert(Arc::clone(node), Arc::clone(&rebuilt));
        Ok(rebuilt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{concat, input, output};
    use crate::dag::Options;

    fn count_filters(root: &Stream, name: &str) -> Vec<NodeRef> {
        root.node()
            .upstream_nodes()
            .into_iter()
            .filter(|n| n.filter_name() == Some(name))
            .collect()
    }

    fn reverse_trim_concat() -> Stream {
        let reversed = input("A.mp4").vfilter("reverse", Options::new()).unwrap();
        let a = reversed.vfilter("trim", Options::new().with("end", 5)).unwrap();
        let b = reversed.vfilter("trim", Options::new().with("start", 10)).unwrap();
        concat(&[a, b], 2, 1, 0)
            .unwrap()
            .video(0)
            .unwrap()
            .output("out.mp4", Options::new())
            .unwrap()
    }

    #[test]
    fn test_inserts_single_split_after_reused_filter() {
        let (repaired, stats) = repair_with_stats(&reverse_trim_concat()).unwrap();

        let splits = count_filters(&repaired, "split");
        assert_eq!(splits.len(), 1);
        assert_eq!(splits[0].output_arity(), 2);
        assert_eq!(splits[0].inputs()[0].node().filter_name(), Some("reverse"));
        assert_eq!(stats.splits_inserted, 1);
        assert_eq!(stats.splits_removed, 0);
    }

    #[test]
    fn test_input_fan_out_needs_no_split() {
        let src = input("A.mp4");
        let a = src.vfilter("hflip", Options::new()).unwrap();
        let b = src.vfilter("vflip", Options::new()).unwrap();
        let out = output(&[a, b], "out.mkv", &[], Options::new()).unwrap();

        let repaired = repair(&out).unwrap();
        assert!(count_filters(&repaired, "split").is_empty());
        assert_eq!(repaired, out);
    }

    #[test]
    fn test_idempotent() {
        let once = repair(&reverse_trim_concat()).unwrap();
        let twice = repair(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_manual_split_is_normalised() {
        let reversed = input("A.mp4").vfilter("reverse", Options::new()).unwrap();
        // Three outputs, only two used.
        let manual = reversed.split(3).unwrap();
        let a = manual.video(0).unwrap().vfilter("trim", Options::new().with("end", 5)).unwrap();
        let b = manual.video(2).unwrap().vfilter("trim", Options::new().with("start", 10)).unwrap();
        let out = concat(&[a, b], 2, 1, 0)
            .unwrap()
            .video(0)
            .unwrap()
            .output("out.mp4", Options::new())
            .unwrap();

        let (repaired, stats) = repair_with_stats(&out).unwrap();
        assert_eq!(stats.splits_removed, 1);
        assert_eq!(repaired, repair(&reverse_trim_concat()).unwrap());
    }

    #[test]
    fn test_consumers_get_outputs_in_order() {
        let src = input("A.mp4");
        let reversed = src.vfilter("reverse", Options::new()).unwrap();
        let first = reversed.vfilter("hflip", Options::new()).unwrap();
        let second = reversed.vfilter("vflip", Options::new()).unwrap();
        let third = reversed.vfilter("negate", Options::new()).unwrap();
        let out = output(&[first, second, third], "out.mkv", &[], Options::new()).unwrap();

        let repaired = repair(&out).unwrap();
        let names: Vec<_> = repaired
            .node()
            .inputs()
            .iter()
            .map(|s| {
                let consumer = s.node();
                let feed = &consumer.inputs()[0];
                (consumer.filter_name().unwrap().to_string(), feed.index())
            })
            .collect();

        assert_eq!(
            names,
            vec![
                ("hflip".to_string(), Some(0)),
                ("vflip".to_string(), Some(1)),
                ("negate".to_string(), Some(2)),
            ]
        );
    }

    #[test]
    fn test_same_stream_twice_in_one_consumer() {
        let f = input("A.mp4").vfilter("hflip", Options::new()).unwrap();
        let stacked = crate::builder::vfilter(
            &[f.clone(), f],
            "hstack",
            &[MediaKind::Video, MediaKind::Video],
            &[],
            Options::new(),
        )
        .unwrap();

        let repaired = repair(&stacked).unwrap();
        let inputs = repaired.node().inputs();
        assert_eq!(inputs[0].node().filter_name(), Some("split"));
        assert_eq!(inputs[0].index(), Some(0));
        assert_eq!(inputs[1].index(), Some(1));
        assert!(Arc::ptr_eq(inputs[0].node(), inputs[1].node()));
    }

    #[test]
    fn test_identical_branches_are_one_node() {
        // Two structurally equal trims are the same node, so the reuse sits
        // on the trim output rather than on the reverse output.
        let reversed = input("A.mp4").vfilter("reverse", Options::new()).unwrap();
        let a = reversed.vfilter("trim", Options::new()).unwrap();
        let b = reversed.vfilter("trim", Options::new()).unwrap();
        let out = concat(&[a, b], 2, 1, 0).unwrap().video(0).unwrap();

        let repaired = repair(&out).unwrap();
        let splits = count_filters(&repaired, "split");
        assert_eq!(splits.len(), 1);
        assert_eq!(splits[0].inputs()[0].node().filter_name(), Some("trim"));
    }

    #[test]
    fn test_audio_fan_out_uses_asplit() {
        let volume = input("A.mp4")
            .audio()
            .unwrap()
            .afilter("volume", Options::new().with("volume", 0.5))
            .unwrap();
        let a = volume.afilter("aecho", Options::new()).unwrap();
        let b = volume.afilter("areverse", Options::new()).unwrap();
        let out = output(&[a, b], "out.mka", &[], Options::new()).unwrap();

        let repaired = repair(&out).unwrap();
        assert_eq!(count_filters(&repaired, "asplit").len(), 1);
        assert!(count_filters(&repaired, "split").is_empty());
    }

    #[test]
    fn test_reused_output_cannot_be_split() {
        let out = input("A.mp4").output("a.mp4", Options::new()).unwrap();
        let merged = crate::builder::merge_outputs(&[out.clone(), out]).unwrap();

        assert!(matches!(
            repair(&merged),
            Err(GraphError::UnsplittableStream { .. })
        ));
    }
}
