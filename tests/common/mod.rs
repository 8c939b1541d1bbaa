//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;

use ffgraph_rs::{Context, NodeKind, NodeRef, Stream};

/// Filter nodes named `name` reachable from `root`.
pub fn filters_named(root: &Stream, name: &str) -> Vec<NodeRef> {
    root.node()
        .upstream_nodes()
        .into_iter()
        .filter(|n| n.filter_name() == Some(name))
        .collect()
}

/// Every split and asplit reachable from `root`.
pub fn all_splits(root: &Stream) -> Vec<NodeRef> {
    let mut splits = filters_named(root, "split");
    splits.extend(filters_named(root, "asplit"));
    splits
}

/// Assert that no stream other than an input-file stream has more than one
/// consumer.
pub fn assert_single_consumer(root: &Stream) {
    let ctx = Context::build(root.node());
    for stream in ctx.all_streams() {
        if matches!(stream.node().kind(), NodeKind::Input { .. }) {
            continue;
        }
        let consumers = ctx.outgoing_nodes(stream);
        assert!(
            consumers.len() <= 1,
            "{} has {} consumers",
            stream,
            consumers.len()
        );
    }
}
