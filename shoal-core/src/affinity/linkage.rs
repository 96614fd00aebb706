//! Nearest-neighbour edge selection and selection-graph collapse.
//!
//! Each vertex independently selects its heaviest incident edge above the
//! weight threshold, breaking ties towards the higher neighbour id so that
//! mutual picks agree. The selected edges (and their reverses) induce an
//! unweighted sub-graph whose connected components become the round's
//! clusters.

use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;

use crate::clustering::{NodeId, NONE_ID};
use crate::graph::CsrGraph;
use crate::parallel::{exclusive_scan_inplace, filter_out, pack_index, parallel_sort};
use crate::union_find::AsyncUnionFind;

/// Selects each vertex's heaviest neighbour and collapses the selection graph
/// into a labelling.
///
/// A neighbour qualifies when its edge weight exceeds `weight_threshold`,
/// comparing `(weight, neighbour id)` lexicographically; an edge at exactly
/// the threshold is admissible only while no candidate has been found.
/// Vertices without a qualifying neighbour stay unselected, and when nothing
/// is selected at all every vertex becomes its own cluster.
///
/// The returned labels are dense cluster ids in `0..cluster_count`, ordered
/// by each cluster's representative vertex.
#[must_use]
pub fn nearest_neighbour_linkage(graph: &CsrGraph, weight_threshold: f32) -> Vec<NodeId> {
    let n = graph.vertex_count();
    let picks: Vec<NodeId> = (0..n)
        .into_par_iter()
        .map(|vertex| heaviest_neighbour(graph, vertex as u32, weight_threshold))
        .collect();

    let mut marked: Vec<(NodeId, NodeId)> = Vec::with_capacity(2 * n);
    marked.extend((0..n).map(|vertex| (vertex as u32, picks[vertex])));
    marked.extend((0..n).map(|vertex| (picks[vertex], vertex as u32)));
    let mut selected = filter_out(&marked, |&(source, target)| {
        source != NONE_ID && target != NONE_ID
    });

    if selected.is_empty() {
        return (0..n as u32).collect();
    }

    parallel_sort(&mut selected, |a, b| a.cmp(b));

    let counts: Vec<AtomicUsize> = (0..n).map(|_| AtomicUsize::new(0)).collect();
    selected.par_iter().for_each(|&(source, _)| {
        counts[source as usize].fetch_add(1, Ordering::Relaxed);
    });
    let mut offsets: Vec<usize> = counts.into_iter().map(AtomicUsize::into_inner).collect();
    let total = exclusive_scan_inplace(&mut offsets);
    offsets.push(total);
    let targets: Vec<NodeId> = selected.par_iter().map(|&(_, target)| target).collect();

    let components = AsyncUnionFind::new(n);
    (0..n).into_par_iter().for_each(|vertex| {
        for &target in &targets[offsets[vertex]..offsets[vertex + 1]] {
            components.unite(vertex as u32, target);
        }
    });

    compact_labels(&components.finish())
}

fn heaviest_neighbour(graph: &CsrGraph, vertex: u32, weight_threshold: f32) -> NodeId {
    let mut best = NONE_ID;
    let mut best_weight = weight_threshold;
    for edge in graph.neighbours(vertex) {
        let beats_current = edge.weight > best_weight
            || (edge.weight == best_weight && best != NONE_ID && edge.id > best);
        if beats_current || (edge.weight == weight_threshold && best == NONE_ID) {
            best_weight = edge.weight;
            best = edge.id;
        }
    }
    best
}

/// Renames representative-valued labels to dense ranks, preserving order.
fn compact_labels(labels: &[NodeId]) -> Vec<NodeId> {
    let representatives = pack_index(labels.len(), |vertex| labels[vertex] == vertex as u32);
    labels
        .par_iter()
        .map(|&label| {
            representatives
                .binary_search(&label)
                .expect("every label names a representative vertex") as u32
        })
        .collect()
}
