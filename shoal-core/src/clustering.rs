//! Labelling and clustering output types.
//!
//! A labelling is a dense array mapping each vertex to its current cluster id,
//! with [`NONE_ID`] marking vertices that have been emitted and removed from
//! further processing. Finished output is a nested clustering: a sequence of
//! vertex-id sequences.

use rayon::prelude::*;

use crate::parallel::{boundary_indices, pack_index, parallel_sort};

/// Vertex identifier.
pub type NodeId = u32;

/// Reserved id meaning "no cluster", "no neighbour", or "removed".
pub const NONE_ID: NodeId = NodeId::MAX;

/// A clustering as a sequence of member lists.
pub type Clustering = Vec<Vec<NodeId>>;

/// Groups every labelled vertex into a nested clustering.
///
/// Vertices labelled [`NONE_ID`] are skipped. Clusters are ordered by label
/// and members by id.
#[must_use]
pub fn dense_to_nested(labels: &[NodeId]) -> Clustering {
    let members = pack_index(labels.len(), |i| labels[i] != NONE_ID);
    group_by_label(members, labels)
}

/// Groups the given vertices by their label.
///
/// All members must carry a label other than [`NONE_ID`]. Clusters are
/// ordered by label and members by id.
#[must_use]
pub fn group_by_label(mut members: Vec<NodeId>, labels: &[NodeId]) -> Clustering {
    parallel_sort(&mut members, |a, b| {
        labels[*a as usize]
            .cmp(&labels[*b as usize])
            .then(a.cmp(b))
    });
    let bounds = boundary_indices(members.len(), |i, j| {
        labels[members[i] as usize] == labels[members[j] as usize]
    });
    bounds
        .par_windows(2)
        .map(|run| members[run[0]..run[1]].to_vec())
        .collect()
}

/// Composes a cumulative labelling with one round's labelling.
///
/// Every entry of `outer` other than [`NONE_ID`] is replaced by the `inner`
/// label of the cluster it pointed at; [`NONE_ID`] entries stay removed.
pub fn flatten_labels(outer: &mut [NodeId], inner: &[NodeId]) {
    outer.par_iter_mut().for_each(|label| {
        if *label != NONE_ID {
            *label = inner[*label as usize];
        }
    });
}
