//! Shared-boundary coordinator: per-kind owner/group tables.
//!
//! A [`SharedBoundary`] is (re)computed once per mesh-topology change via
//! [`SharedBoundary::on_mesh_updated`] and is read-only between such events;
//! any phase may query it without locking.

use crate::algs::transport::Transport;
use crate::error::ParNcError;
use crate::overlap::groups::{GroupTable, exchange_shared_ranks};
use crate::topology::entity::{EntityKind, MeshTopology};

/// Ownership and rank groups for every shared edge and face of one rank.
#[derive(Clone, Debug)]
pub struct SharedBoundary {
    edges: GroupTable,
    faces: GroupTable,
}

impl SharedBoundary {
    /// Recompute both tables after the mesh signalled a topology change.
    ///
    /// Runs the single neighbor exchange round of the ownership protocol;
    /// every rank that shares an entity derives the same owner and the same
    /// group from it.
    pub fn on_mesh_updated<T, M>(topo: &M, transport: &T) -> Result<Self, ParNcError>
    where
        T: Transport,
        M: MeshTopology,
    {
        let (edges, faces) = exchange_shared_ranks(topo, transport)?;
        log::debug!(
            "rank {}: boundary rebuilt ({} shared edges, {} shared faces)",
            transport.rank(),
            edges.len(),
            faces.len()
        );
        Ok(SharedBoundary { edges, faces })
    }

    /// Build from precomputed tables (tests, replay).
    pub fn from_tables(edges: GroupTable, faces: GroupTable) -> Self {
        SharedBoundary { edges, faces }
    }

    pub fn edge_owner(&self, index: u32) -> Result<usize, ParNcError> {
        self.edges.owner(index)
    }

    pub fn face_owner(&self, index: u32) -> Result<usize, ParNcError> {
        self.faces.owner(index)
    }

    pub fn edge_group(&self, index: u32) -> Result<&[usize], ParNcError> {
        self.edges.group(index)
    }

    pub fn face_group(&self, index: u32) -> Result<&[usize], ParNcError> {
        self.faces.group(index)
    }

    /// Kind-dispatch owner accessor.
    pub fn owner(&self, kind: EntityKind, index: u32) -> Result<usize, ParNcError> {
        self.table(kind).owner(index)
    }

    /// Kind-dispatch group accessor.
    pub fn group(&self, kind: EntityKind, index: u32) -> Result<&[usize], ParNcError> {
        self.table(kind).group(index)
    }

    pub fn table(&self, kind: EntityKind) -> &GroupTable {
        match kind {
            EntityKind::Edge => &self.edges,
            EntityKind::Face => &self.faces,
        }
    }
}
