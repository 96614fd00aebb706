//! Graph contraction along a round's labelling.
//!
//! Contracting a labelled graph sums member node weights per cluster and
//! aggregates every surviving inter-cluster edge according to the configured
//! aggregation mode. Average and cut-sparsity modes scale contributions by the
//! original node weights before aggregation and divide by the compressed node
//! weights afterwards; max and sum emit the aggregate directly.

use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;

use crate::affinity::EdgeAggregation;
use crate::clustering::{NodeId, NONE_ID};
use crate::error::{Result, ShoalError};
use crate::graph::{CsrGraph, Neighbour};
use crate::parallel::{boundary_indices, exclusive_scan_inplace, parallel_reduce, parallel_sort};

/// One contraction's output: the smaller graph and its node weights.
#[derive(Clone, Debug, PartialEq)]
pub struct CompressedGraph {
    /// The contracted graph over `0..cluster_count` vertices.
    pub graph: CsrGraph,
    /// Per-cluster node weight: the sum of member weights.
    pub node_weights: Vec<u32>,
}

/// Contracts `graph` along `labels`, aggregating inter-cluster edge weights.
///
/// `node_weights` may be empty, in which case every vertex weighs one.
/// Vertices labelled [`NONE_ID`] are dropped from the contraction entirely.
///
/// # Errors
/// Returns [`ShoalError::Unimplemented`] for
/// [`EdgeAggregation::Percentile`].
pub fn compress_graph(
    graph: &CsrGraph,
    node_weights: &[u32],
    labels: &[NodeId],
    aggregation: EdgeAggregation,
) -> Result<CompressedGraph> {
    if aggregation == EdgeAggregation::Percentile {
        return Err(ShoalError::Unimplemented {
            feature: "percentile edge aggregation",
        });
    }

    let n = graph.vertex_count();
    let max_label = parallel_reduce(labels, NONE_ID, |a, b| {
        if a == NONE_ID {
            b
        } else if b == NONE_ID {
            a
        } else {
            a.max(b)
        }
    });
    let cluster_count = if max_label == NONE_ID {
        0
    } else {
        max_label as usize + 1
    };

    let mut compressed_weights = vec![0u32; cluster_count];
    for (vertex, &label) in labels.iter().enumerate() {
        if label != NONE_ID {
            compressed_weights[label as usize] +=
                node_weights.get(vertex).copied().unwrap_or(1);
        }
    }

    let has_weights = !node_weights.is_empty();
    let scaled = |source: usize, target: u32, weight: f32| -> f32 {
        match aggregation {
            EdgeAggregation::DefaultAverage if has_weights => {
                weight * node_weights[source] as f32 * node_weights[target as usize] as f32
            }
            EdgeAggregation::CutSparsity if has_weights => {
                weight * node_weights[source].min(node_weights[target as usize]) as f32
            }
            _ => weight,
        }
    };

    let mut contributions: Vec<(NodeId, NodeId, f32)> = (0..n)
        .into_par_iter()
        .flat_map_iter(|source| {
            let source_label = labels[source];
            graph.neighbours(source as u32).iter().filter_map(move |edge| {
                let target_label = labels[edge.id as usize];
                (source_label != NONE_ID
                    && target_label != NONE_ID
                    && source_label != target_label)
                    .then(|| (source_label, target_label, scaled(source, edge.id, edge.weight)))
            })
        })
        .collect();

    if contributions.is_empty() {
        let graph = CsrGraph::from_csr_parts(vec![0; cluster_count + 1], Vec::new());
        return Ok(CompressedGraph {
            graph,
            node_weights: compressed_weights,
        });
    }

    parallel_sort(&mut contributions, |a, b| {
        (a.0, a.1).cmp(&(b.0, b.1)).then(a.2.total_cmp(&b.2))
    });
    let bounds = boundary_indices(contributions.len(), |i, j| {
        contributions[i].0 == contributions[j].0 && contributions[i].1 == contributions[j].1
    });

    let mut aggregated: Vec<(NodeId, NodeId, f32)> = bounds
        .par_windows(2)
        .map(|run| {
            let (source, target, first) = contributions[run[0]];
            let combined = contributions[run[0] + 1..run[1]]
                .iter()
                .map(|contribution| contribution.2)
                .fold(first, |acc, weight| match aggregation {
                    EdgeAggregation::Max => acc.max(weight),
                    _ => acc + weight,
                });
            (source, target, combined)
        })
        .collect();

    if matches!(
        aggregation,
        EdgeAggregation::DefaultAverage | EdgeAggregation::CutSparsity
    ) {
        aggregated.par_iter_mut().for_each(|(source, target, weight)| {
            let source_weight = compressed_weights[*source as usize] as f32;
            let target_weight = compressed_weights[*target as usize] as f32;
            let factor = match aggregation {
                EdgeAggregation::DefaultAverage => source_weight * target_weight,
                _ => source_weight.min(target_weight),
            };
            *weight /= factor;
        });
    }

    let counts: Vec<AtomicUsize> = (0..cluster_count).map(|_| AtomicUsize::new(0)).collect();
    aggregated.par_iter().for_each(|&(source, _, _)| {
        counts[source as usize].fetch_add(1, Ordering::Relaxed);
    });
    let mut offsets: Vec<usize> = counts.into_iter().map(AtomicUsize::into_inner).collect();
    let total = exclusive_scan_inplace(&mut offsets);
    offsets.push(total);
    let edges: Vec<Neighbour> = aggregated
        .par_iter()
        .map(|&(_, target, weight)| Neighbour { id: target, weight })
        .collect();

    Ok(CompressedGraph {
        graph: CsrGraph::from_csr_parts(offsets, edges),
        node_weights: compressed_weights,
    })
}
