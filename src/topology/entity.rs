//! Shared-entity model for partition boundaries.
//!
//! A shared entity is an edge or face incident to elements owned by more than
//! one rank. Each rank keeps a [`SharedList`] per kind; entities are addressed
//! by their position in that list, while cross-rank identity is carried by an
//! opaque [`EntityId`] that every sharing rank derives identically (e.g. from
//! sorted global vertex numbers), independent of local numbering.

use std::fmt;

/// Entity kind discriminant: shared boundaries consist of edges and faces.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[derive(serde::Serialize, serde::Deserialize)]
pub enum EntityKind {
    Edge,
    Face,
}

impl EntityKind {
    /// All kinds, in the order used for combined edge+face exchanges.
    pub const ALL: [EntityKind; 2] = [EntityKind::Edge, EntityKind::Face];

    /// Wire discriminant (0 = edge, 1 = face).
    #[inline]
    pub const fn as_u16(self) -> u16 {
        match self {
            EntityKind::Edge => 0,
            EntityKind::Face => 1,
        }
    }

    /// Inverse of [`EntityKind::as_u16`].
    #[inline]
    pub const fn from_u16(raw: u16) -> Option<Self> {
        match raw {
            0 => Some(EntityKind::Edge),
            1 => Some(EntityKind::Face),
            _ => None,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Edge => write!(f, "edge"),
            EntityKind::Face => write!(f, "face"),
        }
    }
}

/// Opaque, globally comparable identifier for a shared edge or face.
///
/// The mesh collaborator must derive the same value on every rank that shares
/// the entity; parnc only compares and transmits it.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[derive(serde::Serialize, serde::Deserialize)]
#[repr(transparent)]
pub struct EntityId(u64);

impl EntityId {
    #[inline]
    pub const fn new(raw: u64) -> Self {
        EntityId(raw)
    }

    #[inline]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EntityId").field(&self.0).finish()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Role of a shared entity on the non-conforming interface.
///
/// The classification is consistent across ranks: the refinement history of
/// the boundary region is replicated on every rank that touches it, so each
/// rank derives the same role for the same entity.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum EntityRole {
    /// Plain partition boundary, same view on both sides.
    Conforming,
    /// Coarse side of a non-conforming interface; its dofs are independent.
    Master,
    /// Fine side; dofs interpolate from the master entity at the given
    /// position in the same shared list.
    Slave { master: u32 },
}

/// One entry of a rank's shared-entity list.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SharedEntity {
    pub id: EntityId,
    pub role: EntityRole,
}

impl SharedEntity {
    pub fn conforming(id: EntityId) -> Self {
        SharedEntity {
            id,
            role: EntityRole::Conforming,
        }
    }

    pub fn master(id: EntityId) -> Self {
        SharedEntity {
            id,
            role: EntityRole::Master,
        }
    }

    pub fn slave(id: EntityId, master: u32) -> Self {
        SharedEntity {
            id,
            role: EntityRole::Slave { master },
        }
    }
}

/// Ordered list of shared entities of one kind; entity "index" means the
/// position in this list.
#[derive(Clone, Debug, Default)]
pub struct SharedList {
    entries: Vec<SharedEntity>,
}

impl SharedList {
    pub fn new(entries: Vec<SharedEntity>) -> Self {
        SharedList { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: u32) -> Option<&SharedEntity> {
        self.entries.get(index as usize)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &SharedEntity)> {
        self.entries.iter().enumerate().map(|(i, e)| (i as u32, e))
    }

    /// Position of the entity with the given id, if this rank shares it.
    pub fn position(&self, id: EntityId) -> Option<u32> {
        self.entries.iter().position(|e| e.id == id).map(|i| i as u32)
    }
}

/// Capability interface onto the serial mesh/tree collaborator.
///
/// The mesh layer rebuilds its shared lists on refinement; parnc pulls them
/// here whenever
/// [`crate::overlap::boundary::SharedBoundary::on_mesh_updated`] runs, so no
/// update hooks point back into the mesh.
pub trait MeshTopology {
    fn shared_edges(&self) -> &SharedList;
    fn shared_faces(&self) -> &SharedList;

    /// Ranks this rank is already in contact with. Sharing any entity implies
    /// the two ranks are neighbors, so this set bounds every exchange round.
    fn neighbor_ranks(&self) -> &[usize];

    fn shared(&self, kind: EntityKind) -> &SharedList {
        match kind {
            EntityKind::Edge => self.shared_edges(),
            EntityKind::Face => self.shared_faces(),
        }
    }
}
