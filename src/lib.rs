//! # parnc
//!
//! parnc is the distributed consistency core for adaptively refined,
//! non-conforming ("hanging node") meshes partitioned across cooperating
//! ranks. For every shared edge or face on a partition boundary it decides
//! which rank owns it and which ranks must exchange DOF information about
//! it, and it assembles the distributed P matrix mapping the reduced set of
//! true (independent) DOFs to the full local DOF set, dependent DOFs
//! included.
//!
//! ## What lives here
//! - Deterministic entity ownership and rank-group tables built from one
//!   neighbor exchange round (lowest rank owns; no global reduction).
//! - A tagged, variable-length message transport abstraction with an
//!   in-process backend for multi-rank tests and an MPI backend behind the
//!   `mpi-support` feature.
//! - `ElementSet`: a compact, tree-relative encoding of refinement-forest
//!   node subsets, decodable on any rank holding a structurally compatible
//!   forest.
//! - Neighbor DOF / row messages and the two-phase P-matrix construction.
//!
//! The serial refinement tree, the FE space (what a DOF means, which
//! interpolation coefficients slaves need), and the final consumption of the
//! P matrix are external collaborators reached through the
//! [`topology::entity::MeshTopology`] and [`algs::pmatrix::DofSpace`]
//! capability traits.
//!
//! ## Determinism
//! Ownership never depends on message arrival order: collected
//! `(index, rank)` pairs are sorted before grouping, so every rank sharing
//! an entity computes the same owner from the same multiset.
//!
//! Every failure is fatal for the current pass (a synchronous collective
//! computation, not a long-lived service); errors carry the offending
//! entity, rank, and phase context instead of retry machinery.

pub mod algs;
pub mod error;
pub mod overlap;
pub mod topology;

pub use error::ParNcError;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::algs::dof_exchange::{DofId, NeighborDofMessage};
    pub use crate::algs::pmatrix::{
        DofSpace, PMatrix, Row, SlaveInterpolation, TrueDof, build_pmatrix,
    };
    pub use crate::algs::row_exchange::NeighborRowMessage;
    pub use crate::algs::transport::{CommTag, LocalCluster, LocalTransport, Transport, Wait};
    #[cfg(feature = "mpi-support")]
    pub use crate::algs::transport::MpiTransport;
    pub use crate::error::ParNcError;
    pub use crate::overlap::boundary::SharedBoundary;
    pub use crate::overlap::groups::{GroupTable, IndexRank};
    pub use crate::topology::element_set::ElementSet;
    pub use crate::topology::entity::{
        EntityId, EntityKind, EntityRole, MeshTopology, SharedEntity, SharedList,
    };
    pub use crate::topology::tree::{ElementArena, NodeId};
}
