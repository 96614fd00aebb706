//! Merge-hierarchy construction for k-core peeling.
//!
//! The peeling order induces a merge hierarchy across decreasing core values:
//! walking parents from any leaf visits later and later merge events. The
//! hierarchy is encoded as a flat parent array of length `>= n` where entries
//! `< n` are vertices, higher entries are internal merge nodes, and roots
//! carry [`NONE_ID`].
//!
//! Two hooks observe peeling inline: [`LevelUnionHook`] keeps one union-find
//! per peeling level and broadcasts each link to every level it reaches, and
//! [`LinkChainHook`] keeps a single union-find plus per-vertex link chains
//! updated by compare-and-swap. A post-hoc builder reconstructs the same tree
//! from the finished coreness array by scanning buckets in descending core
//! order.

use std::sync::atomic::{fence, AtomicU32, AtomicUsize, Ordering};

use rayon::prelude::*;

use crate::clustering::{NodeId, NONE_ID};
use crate::graph::CsrGraph;
use crate::parallel::{boundary_indices, exclusive_scan_inplace, parallel_sort};
use crate::union_find::AsyncUnionFind;

/// Observer of peeling rounds used to build a hierarchy inline.
///
/// `init(k)` announces entry into bucket `k`; `link(a, b, cores)` reports an
/// edge from an active vertex `a` to an already-peeled vertex `b`, where
/// `cores` maps a vertex to its settled degree or to "above the current
/// bucket".
pub(crate) trait ConnectivityHook {
    fn init(&mut self, core: u32);

    fn link(&self, a: u32, b: u32, cores: &(dyn Fn(u32) -> u32 + Sync));
}

/// One union-find per peeling level; links broadcast to every level whose
/// core value the linked vertex reaches.
#[derive(Debug)]
pub(crate) struct LevelUnionHook {
    universe: usize,
    level_sets: Vec<AsyncUnionFind>,
    level_cores: Vec<u32>,
}

impl LevelUnionHook {
    pub(crate) fn new(universe: usize) -> Self {
        Self {
            universe,
            level_sets: Vec::new(),
            level_cores: Vec::new(),
        }
    }

    /// Builds the parent array by walking levels from the highest core value
    /// (the finest merges) down to the lowest, threading each vertex's
    /// previous representative to its representative at the next level.
    pub(crate) fn into_tree(self) -> Vec<NodeId> {
        let n = self.universe;
        let mut tree: Vec<AtomicU32> = (0..n).map(|_| AtomicU32::new(NONE_ID)).collect();
        let mut previous: Vec<NodeId> = (0..n as u32).collect();
        let mut next_node = n;

        for level in self.level_sets.iter().rev() {
            tree.resize_with(next_node, || AtomicU32::new(NONE_ID));
            let parents = level.finish();
            let offset = next_node as u32;
            previous.par_iter_mut().enumerate().for_each(|(vertex, slot)| {
                let merged = offset + parents[vertex];
                tree[*slot as usize].store(merged, Ordering::Relaxed);
                *slot = merged;
            });
            next_node += n;
        }

        tree.resize_with(next_node, || AtomicU32::new(NONE_ID));
        tree.into_iter().map(AtomicU32::into_inner).collect()
    }
}

impl ConnectivityHook for LevelUnionHook {
    fn init(&mut self, core: u32) {
        self.level_sets.push(AsyncUnionFind::new(self.universe));
        self.level_cores.push(core);
    }

    fn link(&self, a: u32, b: u32, cores: &(dyn Fn(u32) -> u32 + Sync)) {
        let reach = cores(b);
        for (level, &core) in self.level_sets.iter().zip(&self.level_cores) {
            if reach >= core {
                level.unite(a, b);
            }
        }
    }
}

/// Single union-find plus per-vertex link chains.
///
/// Equal-core endpoints unite; a lower-core endpoint is installed into the
/// higher endpoint's link slot by compare-and-swap, displacing (and
/// re-linking) any occupant of still lower core. Installs that race with a
/// merge of their holder are re-delivered to the holder's live root.
#[derive(Debug)]
pub(crate) struct LinkChainHook {
    sets: AsyncUnionFind,
    links: Vec<AtomicU32>,
}

impl LinkChainHook {
    pub(crate) fn new(universe: usize) -> Self {
        Self {
            sets: AsyncUnionFind::new(universe),
            links: (0..universe).map(|_| AtomicU32::new(NONE_ID)).collect(),
        }
    }

    fn link_pair(&self, a: u32, b: u32, cores: &(dyn Fn(u32) -> u32 + Sync)) {
        // Re-entrant links are driven from an explicit work list; depth is
        // bounded by the number of distinct core values.
        let mut work = vec![(a, b)];
        while let Some((a, b)) = work.pop() {
            let a = self.sets.find_compress(a);
            let b = self.sets.find_compress(b);
            if a == b {
                continue;
            }
            let core_a = cores(a);
            let core_b = cores(b);
            if core_a == core_b {
                self.sets.unite(a, b);
                fence(Ordering::SeqCst);
                let parent = self.sets.find_compress(a);
                let link_a = self.links[a as usize].load(Ordering::Acquire);
                if link_a != NONE_ID && parent != a {
                    work.push((link_a, parent));
                }
                let link_b = self.links[b as usize].load(Ordering::Acquire);
                if link_b != NONE_ID && parent != b {
                    work.push((link_b, parent));
                }
            } else if core_a < core_b {
                loop {
                    let occupant = self.links[b as usize].load(Ordering::Acquire);
                    if occupant == NONE_ID {
                        if self.links[b as usize]
                            .compare_exchange(
                                NONE_ID,
                                a,
                                Ordering::AcqRel,
                                Ordering::Acquire,
                            )
                            .is_ok()
                        {
                            self.redeliver_if_absorbed(a, b, &mut work);
                            break;
                        }
                    } else if cores(occupant) < core_a {
                        if self.links[b as usize]
                            .compare_exchange(occupant, a, Ordering::AcqRel, Ordering::Acquire)
                            .is_ok()
                        {
                            self.redeliver_if_absorbed(a, b, &mut work);
                            work.push((a, occupant));
                            break;
                        }
                    } else {
                        work.push((a, occupant));
                        break;
                    }
                }
            } else {
                work.push((b, a));
            }
        }
    }

    /// Re-delivers a freshly installed link when its holder stopped being a
    /// root mid-install.
    ///
    /// A merge that absorbs `holder` re-reads its link slot after uniting
    /// (behind the fence in the equal-core branch), and an installer
    /// re-reads the holder's root here after publishing; the paired fences
    /// guarantee at least one side observes the other, so no pending link
    /// is stranded on an absorbed root.
    fn redeliver_if_absorbed(&self, link: u32, holder: u32, work: &mut Vec<(u32, u32)>) {
        fence(Ordering::SeqCst);
        let root = self.sets.find_compress(holder);
        if root != holder {
            work.push((link, root));
        }
    }

    /// Conservative link: unites only equal-core endpoints, following `b`'s
    /// chain while its links stay at or above `a`'s core.
    pub(crate) fn check_equal_for_merge(
        &self,
        a: u32,
        mut b: u32,
        cores: &(dyn Fn(u32) -> u32 + Sync),
    ) {
        loop {
            if cores(a) == cores(b) {
                self.sets.unite(a, b);
                return;
            }
            let next = self.links[b as usize].load(Ordering::Acquire);
            if next == NONE_ID || cores(next) < cores(a) {
                return;
            }
            b = next;
        }
    }

    /// Builds the parent array: vertices group under their set's node, and
    /// each root group is stitched beneath the group of its link target.
    pub(crate) fn into_tree(self) -> Vec<NodeId> {
        let n = self.links.len();
        let parents = self.sets.finish();

        let mut sorted: Vec<u32> = (0..n as u32).collect();
        parallel_sort(&mut sorted, |a, b| {
            parents[*a as usize]
                .cmp(&parents[*b as usize])
                .then(a.cmp(b))
        });
        let bounds = boundary_indices(n, |i, j| {
            parents[sorted[i] as usize] == parents[sorted[j] as usize]
        });
        let group_count = bounds.len().saturating_sub(1);

        let grouped: Vec<AtomicU32> = (0..n).map(|_| AtomicU32::new(NONE_ID)).collect();
        (0..group_count).into_par_iter().for_each(|group| {
            let node = (n + group) as u32;
            for &vertex in &sorted[bounds[group]..bounds[group + 1]] {
                grouped[vertex as usize].store(node, Ordering::Relaxed);
            }
        });

        let mut tree: Vec<NodeId> = grouped.into_iter().map(AtomicU32::into_inner).collect();
        tree.resize(n + group_count, NONE_ID);

        for vertex in 0..n {
            let target = self.links[vertex].load(Ordering::Acquire);
            if target == NONE_ID || parents[vertex] != vertex as u32 {
                continue;
            }
            let own_group = tree[vertex] as usize;
            tree[own_group] = tree[target as usize];
        }
        tree
    }
}

impl ConnectivityHook for LinkChainHook {
    fn init(&mut self, _core: u32) {}

    fn link(&self, a: u32, b: u32, cores: &(dyn Fn(u32) -> u32 + Sync)) {
        self.link_pair(a, b, cores);
    }
}

/// Builds the merge hierarchy from a finished coreness array.
///
/// Vertices are scanned bucket by bucket in descending core order; each
/// bucket unites its members with neighbours of equal or higher core, and
/// then appends one tree level holding the components among all vertices at
/// or above the bucket's core, compacted to dense node ids by a prefix sum
/// over a membership bitmask.
pub(crate) fn posthoc_connectivity_tree(graph: &CsrGraph, cores: &[u32]) -> Vec<NodeId> {
    let n = graph.vertex_count();
    let mut sorted: Vec<u32> = (0..n as u32).collect();
    parallel_sort(&mut sorted, |a, b| {
        cores[*b as usize]
            .cmp(&cores[*a as usize])
            .then(a.cmp(b))
    });
    let bounds = boundary_indices(n, |i, j| {
        cores[sorted[i] as usize] == cores[sorted[j] as usize]
    });

    let sets = AsyncUnionFind::new(n);
    let mut tree: Vec<AtomicU32> = (0..n).map(|_| AtomicU32::new(NONE_ID)).collect();
    let mut previous: Vec<NodeId> = (0..n as u32).collect();
    let mut next_node = n;

    for bucket in bounds.windows(2) {
        let current_core = cores[sorted[bucket[0]] as usize];
        if current_core != 0 {
            sorted[bucket[0]..bucket[1]].par_iter().for_each(|&vertex| {
                for edge in graph.neighbours(vertex) {
                    if cores[edge.id as usize] >= current_core {
                        sets.unite(vertex, edge.id);
                    }
                }
            });
        }

        tree.resize_with(next_node, || AtomicU32::new(NONE_ID));
        (0..n as u32).into_par_iter().for_each(|vertex| {
            sets.find_compress(vertex);
        });

        let members: Vec<AtomicUsize> = (0..n).map(|_| AtomicUsize::new(0)).collect();
        (0..n).into_par_iter().for_each(|vertex| {
            if cores[vertex] >= current_core {
                members[sets.parent(vertex as u32) as usize].store(1, Ordering::Relaxed);
            }
        });
        let mut compact: Vec<usize> = members.into_iter().map(AtomicUsize::into_inner).collect();
        let level_groups = exclusive_scan_inplace(&mut compact);

        let offset = next_node as u32;
        previous.par_iter_mut().enumerate().for_each(|(vertex, slot)| {
            if cores[vertex] >= current_core {
                let merged = offset + compact[sets.parent(vertex as u32) as usize] as u32;
                tree[*slot as usize].store(merged, Ordering::Relaxed);
                *slot = merged;
            }
        });
        next_node += level_groups;
    }

    tree.resize_with(next_node, || AtomicU32::new(NONE_ID));
    tree.into_iter().map(AtomicU32::into_inner).collect()
}
