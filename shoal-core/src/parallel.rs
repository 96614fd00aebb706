//! Shared parallel sequence primitives.
//!
//! The clustering pipelines are built from a small vocabulary of data-parallel
//! operations: associative reduction, comparator-driven sorting, equivalence-run
//! boundary extraction, predicate filtering and index packing, and an exclusive
//! prefix sum. All of them are pure; empty inputs produce empty outputs (or the
//! identity, for reduction).
//!
//! The reduction tree shape and the sort's handling of equal elements are
//! unspecified, so comparators must impose a total order whenever downstream
//! code depends on the output ordering.

use std::cmp::Ordering;

use rayon::prelude::*;

/// Reduces `items` with an associative `combine`, returning `identity` for an
/// empty slice.
///
/// The combination order is unspecified beyond associativity; callers must not
/// rely on a particular evaluation tree.
pub fn parallel_reduce<T, F>(items: &[T], identity: T, combine: F) -> T
where
    T: Copy + Send + Sync,
    F: Fn(T, T) -> T + Send + Sync,
{
    items.par_iter().copied().reduce(|| identity, &combine)
}

/// Sorts `items` in place using the supplied comparator.
///
/// The sort is not stable: elements that compare equal may appear in any
/// order, so ties must be broken inside `compare` when the output order
/// matters.
pub fn parallel_sort<T, F>(items: &mut [T], compare: F)
where
    T: Send,
    F: Fn(&T, &T) -> Ordering + Sync,
{
    items.par_sort_unstable_by(compare);
}

/// Returns the sorted run boundaries of an equivalence-classed sequence.
///
/// `eq(i, j)` reports whether positions `i` and `j` belong to the same run.
/// The result contains every index `i` where `eq(i, i - 1)` is false (always
/// including `0` for non-empty input), followed by `len`, so that consecutive
/// result pairs bound one run each.
pub fn boundary_indices<F>(len: usize, eq: F) -> Vec<usize>
where
    F: Fn(usize, usize) -> bool + Sync,
{
    let mut bounds: Vec<usize> = (0..len)
        .into_par_iter()
        .filter(|&i| i == 0 || !eq(i, i - 1))
        .collect();
    bounds.push(len);
    bounds
}

/// Returns the elements of `items` satisfying `keep`, in their original order.
pub fn filter_out<T, F>(items: &[T], keep: F) -> Vec<T>
where
    T: Clone + Send + Sync,
    F: Fn(&T) -> bool + Sync,
{
    items.par_iter().filter(|item| keep(item)).cloned().collect()
}

/// Returns the indices `i < len` with `pred(i)` true, in increasing order.
pub fn pack_index<F>(len: usize, pred: F) -> Vec<u32>
where
    F: Fn(usize) -> bool + Sync,
{
    (0..len)
        .into_par_iter()
        .filter(|&i| pred(i))
        .map(|i| i as u32)
        .collect()
}

/// Replaces `values` with its exclusive prefix sum and returns the total.
///
/// Runs as a chunked two-pass scan: per-chunk totals are scanned serially and
/// then pushed back through each chunk in parallel.
pub fn exclusive_scan_inplace(values: &mut [usize]) -> usize {
    const CHUNK: usize = 2048;
    if values.is_empty() {
        return 0;
    }

    let mut chunk_offsets: Vec<usize> = values
        .par_chunks(CHUNK)
        .map(|chunk| chunk.iter().sum())
        .collect();
    let mut running = 0usize;
    for offset in &mut chunk_offsets {
        let total = *offset;
        *offset = running;
        running += total;
    }

    values
        .par_chunks_mut(CHUNK)
        .zip(chunk_offsets.par_iter())
        .for_each(|(chunk, &offset)| {
            let mut acc = offset;
            for value in chunk {
                let total = *value;
                *value = acc;
                acc += total;
            }
        });

    running
}
