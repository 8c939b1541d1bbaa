//! Acyclicity checks for node input closures.
//!
//! Nodes are immutable and only reference nodes that already exist, so a
//! cycle cannot be built through the public API. The adjacency map is keyed
//! by content hash, and a hash collision between distinct nodes would
//! surface here as a cycle rather than as silently merged graph nodes.
//!
//! Construction only looks at the new node's own edges ([`check_inputs`]);
//! its inputs were checked when they were built. The whole closure is
//! checked once per compile ([`check_graph`]).

use crate::dag::error::{GraphError, GraphResult};
use crate::dag::node::Node;
use std::collections::{HashMap, HashSet, VecDeque};
use std::hash::Hash;

/// Reject a node that collides with one of its direct inputs.
pub fn check_inputs(node: &Node) -> GraphResult<()> {
    let own = node.content_hash();
    if node.inputs().iter().any(|s| s.node().content_hash() == own) {
        tracing::error!("Cycle detected while constructing {}", node);
        return Err(GraphError::CycleDetected);
    }
    Ok(())
}

/// Verify that `node`'s whole input closure forms a DAG.
pub fn check_graph(node: &Node) -> GraphResult<()> {
    let adjacency = adjacency_of(node);
    if topological_order(&adjacency).is_some() {
        Ok(())
    } else {
        tracing::error!("Cycle detected in the graph ending in {}", node);
        Err(GraphError::CycleDetected)
    }
}

/// Map each node (by content hash) to the hashes of the nodes it reads from.
fn adjacency_of(node: &Node) -> HashMap<u64, Vec<u64>> {
    let mut adjacency: HashMap<u64, Vec<u64>> = HashMap::new();
    let mut visited: HashSet<*const Node> = HashSet::new();
    let mut stack = vec![node];

    while let Some(current) = stack.pop() {
        if !visited.insert(current as *const Node) {
            continue;
        }
        let targets = adjacency.entry(current.content_hash()).or_default();
        for stream in current.inputs() {
            let upstream = stream.node().as_ref();
            targets.push(upstream.content_hash());
            stack.push(upstream);
        }
    }

    adjacency
}

/// Kahn's algorithm over an adjacency map (`key -> keys it points to`).
///
/// Every key mentioned anywhere, as source or target, takes part. Returns
/// `None` when some nodes never reach in-degree zero, i.e. the graph has a
/// cycle.
pub fn topological_order<K>(adjacency: &HashMap<K, Vec<K>>) -> Option<Vec<K>>
where
    K: Hash + Eq + Clone,
{
    let mut in_degree: HashMap<K, usize> = HashMap::new();
    for (from, targets) in adjacency {
        in_degree.entry(from.clone()).or_insert(0);
        for to in targets {
            *in_degree.entry(to.clone()).or_insert(0) += 1;
        }
    }

    let mut queue: VecDeque<K> = in_degree
        .iter()
        .filter(|&(_, &degree)| degree == 0)
        .map(|(k, _)| k.clone())
        .collect();
    let mut order = Vec::with_capacity(in_degree.len());

    while let Some(key) = queue.pop_front() {
        if let Some(targets) = adjacency.get(&key) {
            for to in targets {
                if let Some(degree) = in_degree.get_mut(to) {
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(to.clone());
                    }
                }
            }
        }
        order.push(key);
    }

    if order.len() == in_degree.len() {
        Some(order)
    } else {
        None
    }
}

/// Convenience predicate over [`topological_order`].
pub fn is_acyclic<K>(adjacency: &HashMap<K, Vec<K>>) -> bool
where
    K: Hash + Eq + Clone,
{
    topological_order(adjacency).is_some()
}
