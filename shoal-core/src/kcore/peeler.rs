//! Bucket-based parallel k-core peeling.
//!
//! Peeling proceeds in rounds keyed by the current minimum degree `k`: the
//! vertices of the lowest non-empty bucket are finalised at coreness `k`,
//! their edges towards still-live neighbours are counted atomically, and each
//! touched neighbour's degree drops by its count (clamped to `k`) before it
//! moves to the matching bucket. A connectivity hook observes the rounds to
//! build the merge hierarchy inline.

use std::sync::atomic::{AtomicU32, Ordering};

use rayon::prelude::*;
use tracing::debug;

use crate::graph::CsrGraph;
use crate::kcore::bucketing::BucketQueue;
use crate::kcore::hierarchy::ConnectivityHook;

/// Hook that records nothing; used when no hierarchy is requested.
#[derive(Debug, Default)]
pub(crate) struct NoHook;

impl ConnectivityHook for NoHook {
    fn init(&mut self, _core: u32) {}

    fn link(&self, _a: u32, _b: u32, _cores: &(dyn Fn(u32) -> u32 + Sync)) {}
}

/// Peels `graph` and returns each vertex's coreness.
///
/// When `inline_hierarchy` is set, the hook receives `init(k)` whenever a new
/// non-zero bucket id is entered and `link(u, v, cores)` for every edge from
/// an active vertex `u` into already-peeled territory, before the round's
/// degree reductions. `cores(a)` reports `a`'s degree when it is at or below
/// the current bucket, and `n + 1` ("not yet peeled") otherwise.
pub(crate) fn peel<H: ConnectivityHook + Sync>(
    graph: &CsrGraph,
    hook: &mut H,
    num_buckets: usize,
    inline_hierarchy: bool,
) -> Vec<u32> {
    let n = graph.vertex_count();
    let degrees: Vec<AtomicU32> = (0..n)
        .map(|vertex| AtomicU32::new(graph.degree(vertex as u32) as u32))
        .collect();
    let initial: Vec<u32> = degrees
        .iter()
        .map(|degree| degree.load(Ordering::Relaxed))
        .collect();
    let mut queue = BucketQueue::new(&initial, num_buckets);
    let removals: Vec<AtomicU32> = (0..n).map(|_| AtomicU32::new(0)).collect();

    let mut finished = 0usize;
    let mut previous_bucket = 0u32;
    let mut k_max = 0u32;
    let mut rounds = 0usize;

    while finished < n {
        let Some((k, active)) = queue.next_bucket() else {
            break;
        };
        finished += active.len();
        k_max = k_max.max(k);

        if inline_hierarchy && previous_bucket != k && k != 0 {
            hook.init(k);
        }

        if inline_hierarchy {
            let cores = |vertex: u32| -> u32 {
                let degree = degrees[vertex as usize].load(Ordering::Relaxed);
                if degree > k {
                    n as u32 + 1
                } else {
                    degree
                }
            };
            let observer: &H = hook;
            active.par_iter().for_each(|&vertex| {
                for edge in graph.neighbours(vertex) {
                    if vertex != edge.id
                        && degrees[edge.id as usize].load(Ordering::Relaxed) <= k
                    {
                        observer.link(vertex, edge.id, &cores);
                    }
                }
            });
        }

        let touched: Vec<u32> = active
            .par_iter()
            .flat_map_iter(|&vertex| {
                graph.neighbours(vertex).iter().filter_map(|edge| {
                    (degrees[edge.id as usize].load(Ordering::Relaxed) > k).then(|| {
                        removals[edge.id as usize].fetch_add(1, Ordering::Relaxed);
                        edge.id
                    })
                })
            })
            .collect();

        let moved: Vec<(u32, u32)> = touched
            .par_iter()
            .filter_map(|&vertex| {
                let count = removals[vertex as usize].swap(0, Ordering::Relaxed);
                if count == 0 {
                    return None;
                }
                let degree = degrees[vertex as usize].load(Ordering::Relaxed);
                if degree <= k {
                    return None;
                }
                let new_degree = degree.saturating_sub(count).max(k);
                degrees[vertex as usize].store(new_degree, Ordering::Relaxed);
                Some((vertex, new_degree))
            })
            .collect();
        for (vertex, new_degree) in moved {
            queue.update(vertex, new_degree);
        }

        rounds += 1;
        previous_bucket = k;
    }

    debug!(rounds, k_max, "k-core peeling complete");
    degrees.into_iter().map(AtomicU32::into_inner).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn cores(edges: &[(u32, u32)], n: usize) -> Vec<u32> {
        let weighted: Vec<(u32, u32, f32)> =
            edges.iter().map(|&(u, v)| (u, v, 1.0)).collect();
        let graph = CsrGraph::from_undirected_edges(n, &weighted).expect("valid graph");
        peel(&graph, &mut NoHook, 16, false)
    }

    #[rstest]
    #[case::clique(
        &[(0, 1), (0, 2), (0, 3), (1, 2), (1, 3), (2, 3)],
        4,
        vec![3, 3, 3, 3],
    )]
    #[case::path(&[(0, 1), (1, 2), (2, 3)], 4, vec![1, 1, 1, 1])]
    #[case::star(&[(0, 1), (0, 2), (0, 3)], 4, vec![1, 1, 1, 1])]
    #[case::cycle(&[(0, 1), (1, 2), (2, 3), (3, 0)], 4, vec![2, 2, 2, 2])]
    #[case::isolated(&[], 3, vec![0, 0, 0])]
    fn computes_expected_coreness(
        #[case] edges: &[(u32, u32)],
        #[case] n: usize,
        #[case] expected: Vec<u32>,
    ) {
        assert_eq!(cores(edges, n), expected);
    }

    #[test]
    fn clique_with_pendant_peels_in_two_stages() {
        let edges = [(0, 1), (0, 2), (0, 3), (1, 2), (1, 3), (2, 3), (4, 0)];
        assert_eq!(cores(&edges, 5), vec![3, 3, 3, 3, 1]);
    }

    #[test]
    fn single_open_bucket_still_peels_correctly() {
        let edges = [(0, 1), (0, 2), (0, 3), (1, 2), (1, 3), (2, 3)];
        let weighted: Vec<(u32, u32, f32)> =
            edges.iter().map(|&(u, v)| (u, v, 1.0)).collect();
        let graph = CsrGraph::from_undirected_edges(4, &weighted).expect("valid graph");
        assert_eq!(peel(&graph, &mut NoHook, 1, false), vec![3, 3, 3, 3]);
    }
}
