//! Error types for the shoal core library.
//!
//! Defines the error enum exposed by the public API, its stable error codes,
//! and a convenient result alias.

use std::fmt;

use thiserror::Error;

/// Stable codes describing [`ShoalError`] variants.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum ShoalErrorCode {
    /// The requested behaviour is not implemented.
    Unimplemented,
    /// An edge referenced a vertex id outside the graph.
    VertexOutOfRange,
    /// An edge weight was NaN, infinite, or negative.
    InvalidWeight,
    /// An edge connected a vertex to itself.
    SelfLoop,
    /// A vertex listed the same neighbour more than once.
    DuplicateNeighbour,
    /// An edge had no mirrored counterpart.
    AsymmetricEdge,
    /// An active-cluster condition carried no bounds.
    EmptyClusterCondition,
}

impl ShoalErrorCode {
    /// Return the stable machine-readable representation of this error code.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unimplemented => "SHOAL_UNIMPLEMENTED",
            Self::VertexOutOfRange => "SHOAL_VERTEX_OUT_OF_RANGE",
            Self::InvalidWeight => "SHOAL_INVALID_WEIGHT",
            Self::SelfLoop => "SHOAL_SELF_LOOP",
            Self::DuplicateNeighbour => "SHOAL_DUPLICATE_NEIGHBOUR",
            Self::AsymmetricEdge => "SHOAL_ASYMMETRIC_EDGE",
            Self::EmptyClusterCondition => "SHOAL_EMPTY_CLUSTER_CONDITION",
        }
    }
}

impl fmt::Display for ShoalErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error type produced by graph construction and clustering runs.
///
/// The variants fall into two families: [`ShoalError::Unimplemented`] for
/// requested-but-absent behaviour, and input-validation failures for graphs
/// or configurations that violate a documented invariant.
#[non_exhaustive]
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ShoalError {
    /// The requested behaviour is not implemented.
    #[error("{feature} is not implemented")]
    Unimplemented {
        /// Human-readable name of the missing behaviour.
        feature: &'static str,
    },
    /// An edge referenced a vertex id outside the graph.
    #[error("vertex {vertex} is out of range for a graph of {vertex_count} vertices")]
    VertexOutOfRange {
        /// The offending vertex id.
        vertex: u32,
        /// Number of vertices in the graph.
        vertex_count: usize,
    },
    /// An edge weight was NaN, infinite, or negative.
    #[error("edge ({source_vertex}, {target}) has invalid weight {weight}")]
    InvalidWeight {
        /// Source endpoint of the offending edge.
        source_vertex: u32,
        /// Target endpoint of the offending edge.
        target: u32,
        /// The invalid weight value.
        weight: f32,
    },
    /// An edge connected a vertex to itself.
    #[error("vertex {vertex} has a self-loop")]
    SelfLoop {
        /// The vertex carrying the self-loop.
        vertex: u32,
    },
    /// A vertex listed the same neighbour more than once.
    #[error("vertex {vertex} repeats neighbour {neighbour}")]
    DuplicateNeighbour {
        /// The vertex with the duplicated adjacency entry.
        vertex: u32,
        /// The repeated neighbour id.
        neighbour: u32,
    },
    /// An edge had no mirrored counterpart with an identical weight.
    #[error("edge ({source_vertex}, {target}, {weight}) has no symmetric counterpart")]
    AsymmetricEdge {
        /// Source endpoint of the unmirrored edge.
        source_vertex: u32,
        /// Target endpoint of the unmirrored edge.
        target: u32,
        /// Weight of the unmirrored edge.
        weight: f32,
    },
    /// An active-cluster condition specified neither bound.
    #[error("active-cluster condition {index} must set min_density or min_conductance")]
    EmptyClusterCondition {
        /// Position of the offending condition in the configured list.
        index: usize,
    },
}

impl ShoalError {
    /// Retrieve the stable [`ShoalErrorCode`] for this error.
    pub const fn code(&self) -> ShoalErrorCode {
        match self {
            Self::Unimplemented { .. } => ShoalErrorCode::Unimplemented,
            Self::VertexOutOfRange { .. } => ShoalErrorCode::VertexOutOfRange,
            Self::InvalidWeight { .. } => ShoalErrorCode::InvalidWeight,
            Self::SelfLoop { .. } => ShoalErrorCode::SelfLoop,
            Self::DuplicateNeighbour { .. } => ShoalErrorCode::DuplicateNeighbour,
            Self::AsymmetricEdge { .. } => ShoalErrorCode::AsymmetricEdge,
            Self::EmptyClusterCondition { .. } => ShoalErrorCode::EmptyClusterCondition,
        }
    }
}

/// Convenient alias for results returned by the core API.
pub type Result<T> = core::result::Result<T, ShoalError>;
