//! Lock-free asynchronous union-find.
//!
//! Both clustering pipelines resolve connectivity through concurrent merges:
//! the affinity round collapses the nearest-neighbour selection graph, and the
//! k-core hierarchy records merges while peeling proceeds. This union-find
//! supports `unite` and `find_compress` from many threads at once using only
//! atomic loads, stores, and compare-and-swap on the parent array.
//!
//! The linking policy hangs the lower-id root beneath the higher-id root, so
//! parent chains are strictly increasing and a set's representative is its
//! highest member id. After the structure quiesces, [`AsyncUnionFind::finish`]
//! yields a representative array consistent with the transitive closure of
//! every `unite` call.

use std::sync::atomic::{AtomicU32, Ordering};

use rayon::prelude::*;

/// Concurrent disjoint-set structure over a fixed universe.
///
/// # Examples
/// ```
/// use shoal_core::AsyncUnionFind;
///
/// let sets = AsyncUnionFind::new(4);
/// sets.unite(0, 1);
/// sets.unite(2, 3);
/// let parents = sets.finish();
/// assert_eq!(parents[0], parents[1]);
/// assert_eq!(parents[2], parents[3]);
/// assert_ne!(parents[0], parents[2]);
/// ```
#[derive(Debug)]
pub struct AsyncUnionFind {
    parents: Vec<AtomicU32>,
}

impl AsyncUnionFind {
    /// Creates `len` singleton sets.
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self {
            parents: (0..len as u32).map(AtomicU32::new).collect(),
        }
    }

    /// Returns the universe size.
    #[must_use]
    pub fn len(&self) -> usize {
        self.parents.len()
    }

    /// Returns `true` when the universe is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }

    /// Merges the sets containing `a` and `b`.
    ///
    /// Safe to call concurrently with other `unite` and `find_compress`
    /// calls. The merge links the lower of the two current roots beneath the
    /// higher one, retrying when a compare-and-swap loses a race.
    pub fn unite(&self, a: u32, b: u32) {
        let mut low = self.find_compress(a);
        let mut high = self.find_compress(b);
        while low != high {
            if low > high {
                std::mem::swap(&mut low, &mut high);
            }
            if self.parents[low as usize]
                .compare_exchange(low, high, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return;
            }
            low = self.find_compress(low);
            high = self.find_compress(high);
        }
    }

    /// Returns the current representative of `node`, compressing the path it
    /// walked.
    ///
    /// Concurrent merges may change the representative while this runs; the
    /// returned id is some ancestor of `node` that was a root during the call.
    pub fn find_compress(&self, node: u32) -> u32 {
        let mut root = node;
        loop {
            let parent = self.parents[root as usize].load(Ordering::Acquire);
            if parent == root {
                break;
            }
            root = parent;
        }

        let mut current = node;
        loop {
            let parent = self.parents[current as usize].load(Ordering::Acquire);
            if parent >= root {
                break;
            }
            self.parents[current as usize].store(root, Ordering::Release);
            current = parent;
        }

        root
    }

    /// Returns the stored parent of `node` without compressing.
    #[must_use]
    pub fn parent(&self, node: u32) -> u32 {
        self.parents[node as usize].load(Ordering::Acquire)
    }

    /// Fully compresses every element and returns the representative array.
    ///
    /// Must only be called after all concurrent `unite` calls have completed;
    /// the result then partitions the universe by the transitive closure of
    /// every merge performed.
    #[must_use]
    pub fn finish(&self) -> Vec<u32> {
        (0..self.parents.len())
            .into_par_iter()
            .map(|node| self.find_compress(node as u32))
            .collect()
    }
}
