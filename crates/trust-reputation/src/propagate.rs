//! Power-iteration trust propagation.

use std::collections::{BTreeMap, HashMap};

use trust_core::ReputationEdge;

/// Propagate trust over a weighted directed graph.
///
/// Every node starts at `1/N`. Each pass seeds every node with
/// `(1 - damping)/N`, then each node with outgoing weight forwards
/// `damping * score * weight / total_out` along every edge. Nodes without
/// outgoing weight forward nothing, so their mass is not redistributed.
///
/// # Arguments
/// * `nodes` - Node ids; duplicates are ignored
/// * `edges` - Edges; those with an endpoint outside `nodes` are ignored
/// * `iterations` - Number of passes; zero returns the uniform start
/// * `damping` - Fraction of a node's score forwarded each pass
///
/// # Returns
/// Score per node id
pub fn propagate(
    nodes: &[String],
    edges: &[ReputationEdge],
    iterations: u32,
    damping: f64,
) -> BTreeMap<String, f64> {
    let index: HashMap<&str, usize> = {
        let mut index = HashMap::new();
        for id in nodes {
            let next = index.len();
            index.entry(id.as_str()).or_insert(next);
        }
        index
    };
    let n = index.len();
    if n == 0 {
        return BTreeMap::new();
    }

    // Adjacency by position, restricted to edges inside the node set
    let mut outgoing: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n];
    let mut total_out: Vec<f64> = vec![0.0; n];
    for edge in edges {
        let (Some(&src), Some(&dst)) = (index.get(edge.src.as_str()), index.get(edge.dst.as_str()))
        else {
            continue;
        };
        outgoing[src].push((dst, edge.weight));
        total_out[src] += edge.weight;
    }

    let uniform = 1.0 / n as f64;
    let jump = (1.0 - damping) / n as f64;
    let mut scores = vec![uniform; n];

    for _ in 0..iterations {
        let mut next = vec![jump; n];
        for (src, targets) in outgoing.iter().enumerate() {
            let total = total_out[src];
            if targets.is_empty() || total <= 0.0 {
                continue;
            }
            let share = damping * scores[src] / total;
            for &(dst, weight) in targets {
                next[dst] += share * weight;
            }
        }
        scores = next;
    }

    index
        .into_iter()
        .map(|(id, pos)| (id.to_string(), scores[pos]))
        .collect()
}
