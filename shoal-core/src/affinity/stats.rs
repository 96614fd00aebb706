//! Per-cluster quality statistics and finished-cluster extraction.
//!
//! Density and conductance are computed from per-vertex contributions: each
//! vertex's weighted degree, its intra-cluster weight (counting each internal
//! edge once), and its inter-cluster weight. Contributions are sorted by
//! cluster id, split into runs, and reduced per run. Node weights, when
//! supplied, give contracted vertices their original mass in the density
//! size term, so densities stay comparable across contraction rounds.
//!
//! A cluster is *finished* when it satisfies none of the configured
//! active-cluster conditions; finished clusters are emitted as output and
//! their vertices removed from the labelling.

use rayon::prelude::*;

use crate::affinity::ActiveClusterCondition;
use crate::clustering::{group_by_label, Clustering, NodeId, NONE_ID};
use crate::graph::CsrGraph;
use crate::parallel::{boundary_indices, pack_index, parallel_reduce, parallel_sort};

/// Density and conductance of one cluster.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClusterQuality {
    /// Intra-cluster weight over the number of possible internal edges;
    /// zero for clusters of fewer than two vertices.
    pub density: f32,
    /// Inter-cluster weight over `min(volume, total volume - volume)`;
    /// defined as `1.0` when that denominator vanishes.
    pub conductance: f32,
}

#[derive(Clone, Copy, Debug)]
struct VertexContribution {
    cluster: NodeId,
    size: f32,
    volume: f32,
    intra: f32,
    inter: f32,
}

const ZERO_CONTRIBUTION: VertexContribution = VertexContribution {
    cluster: 0,
    size: 0.0,
    volume: 0.0,
    intra: 0.0,
    inter: 0.0,
};

/// Computes per-cluster quality for every labelled cluster of `graph`.
///
/// Every vertex weighs one. The result is indexed by cluster id over
/// `0..cluster_count` where `cluster_count` is one past the highest label;
/// clusters without members report zero density and conductance.
#[must_use]
pub fn cluster_quality(graph: &CsrGraph, labels: &[NodeId]) -> Vec<ClusterQuality> {
    cluster_quality_with_weights(graph, &[], labels)
}

/// As [`cluster_quality`], with `node_weights` giving each vertex its
/// contracted mass.
///
/// The density denominator counts pairs of mass rather than pairs of
/// vertices, so clusters of contracted super-vertices are scored against
/// their original membership.
pub(crate) fn cluster_quality_with_weights(
    graph: &CsrGraph,
    node_weights: &[u32],
    labels: &[NodeId],
) -> Vec<ClusterQuality> {
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
    aggregate_cluster_quality(graph, node_weights, labels, cluster_count)
}

fn aggregate_cluster_quality(
    graph: &CsrGraph,
    node_weights: &[u32],
    labels: &[NodeId],
    cluster_count: usize,
) -> Vec<ClusterQuality> {
    debug_assert_eq!(
        labels.len(),
        graph.vertex_count(),
        "labelling must index the graph it is scored against"
    );
    debug_assert!(
        node_weights.is_empty() || node_weights.len() == labels.len(),
        "node weights must cover every vertex when supplied"
    );
    let n = graph.vertex_count();
    let mut contributions: Vec<VertexContribution> = (0..n)
        .into_par_iter()
        .map(|vertex| {
            let cluster = labels[vertex];
            let size = node_weights.get(vertex).copied().unwrap_or(1) as f32;
            let volume = graph.weighted_degree(vertex as u32);
            if cluster == NONE_ID {
                return VertexContribution {
                    cluster,
                    size,
                    volume,
                    intra: 0.0,
                    inter: 0.0,
                };
            }
            let mut intra = 0.0;
            let mut inter = 0.0;
            for edge in graph.neighbours(vertex as u32) {
                if labels[edge.id as usize] == cluster {
                    // Count each internal edge from its higher endpoint only.
                    if edge.id as usize <= vertex {
                        intra += edge.weight;
                    }
                } else {
                    inter += edge.weight;
                }
            }
            VertexContribution {
                cluster,
                size,
                volume,
                intra,
                inter,
            }
        })
        .collect();

    let graph_volume = parallel_reduce(&contributions, ZERO_CONTRIBUTION, |a, b| {
        VertexContribution {
            cluster: 0,
            size: 0.0,
            volume: a.volume + b.volume,
            intra: 0.0,
            inter: 0.0,
        }
    })
    .volume;

    parallel_sort(&mut contributions, |a, b| a.cluster.cmp(&b.cluster));
    let bounds = boundary_indices(n, |i, j| contributions[i].cluster == contributions[j].cluster);

    let per_cluster: Vec<(NodeId, ClusterQuality)> = bounds
        .par_windows(2)
        .filter_map(|run| {
            let members = &contributions[run[0]..run[1]];
            let cluster = members[0].cluster;
            if cluster == NONE_ID {
                return None;
            }
            let sums = parallel_reduce(members, ZERO_CONTRIBUTION, |a, b| VertexContribution {
                cluster: 0,
                size: a.size + b.size,
                volume: a.volume + b.volume,
                intra: a.intra + b.intra,
                inter: a.inter + b.inter,
            });
            let size = sums.size;
            let density = if size >= 2.0 {
                sums.intra / (size * (size - 1.0) / 2.0)
            } else {
                0.0
            };
            let denominator = sums.volume.min(graph_volume - sums.volume);
            let conductance = if denominator < 1e-6 {
                1.0
            } else {
                sums.inter / denominator
            };
            Some((cluster, ClusterQuality { density, conductance }))
        })
        .collect();

    let mut quality = vec![
        ClusterQuality {
            density: 0.0,
            conductance: 0.0,
        };
        cluster_count
    ];
    for (cluster, entry) in per_cluster {
        quality[cluster as usize] = entry;
    }
    quality
}

/// Emits every finished cluster and removes its vertices from `labels`.
///
/// A cluster stays active while any condition is satisfied; with no
/// conditions at all, nothing finishes and the result is empty.
#[must_use]
pub fn find_finished_clusters(
    graph: &CsrGraph,
    conditions: &[ActiveClusterCondition],
    labels: &mut [NodeId],
) -> Clustering {
    debug_assert_eq!(
        labels.len(),
        graph.vertex_count(),
        "labelling must index the graph it is scored against"
    );
    if conditions.is_empty() {
        return Vec::new();
    }

    let quality = cluster_quality(graph, labels);
    let finished = finished_flags(&quality, conditions);

    let members = pack_index(labels.len(), |vertex| {
        labels[vertex] != NONE_ID && finished[labels[vertex] as usize]
    });
    let clusters = group_by_label(members, labels);

    labels.par_iter_mut().for_each(|label| {
        if *label != NONE_ID && finished[*label as usize] {
            *label = NONE_ID;
        }
    });

    clusters
}

pub(crate) fn finished_flags(
    quality: &[ClusterQuality],
    conditions: &[ActiveClusterCondition],
) -> Vec<bool> {
    quality
        .par_iter()
        .map(|entry| {
            !conditions.iter().any(|condition| {
                let density_holds = condition
                    .min_density
                    .map_or(true, |bound| entry.density >= bound);
                let conductance_holds = condition
                    .min_conductance
                    .map_or(true, |bound| entry.conductance >= bound);
                density_holds && conductance_holds
            })
        })
        .collect()
}
