//! Entity ownership and rank-group tables.
//!
//! Each rank collects, per shared entity, the multiset of ranks that report
//! the entity in their own shared list. One exchange round with the immediate
//! neighbors suffices: sharing any entity implies the two ranks are already
//! in contact. The tables are deterministic in the input multiset — pairs are
//! sorted before grouping, so the owner (lowest rank number) never depends on
//! message arrival order.

use crate::algs::transport::{CommTag, Transport, Wait};
use crate::algs::wire::{KIND_SHARED_RANKS, WireCount, WireEntityRef, WireReader, WireWriter};
use crate::error::ParNcError;
use crate::topology::entity::{EntityKind, MeshTopology};
use itertools::Itertools;
use std::collections::BTreeSet;

/// "Rank `rank` also touches the entity at shared-list position `index`."
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct IndexRank {
    pub index: u32,
    pub rank: usize,
}

impl IndexRank {
    pub fn new(index: u32, rank: usize) -> Self {
        IndexRank { index, rank }
    }
}

/// Owner and rank group per shared entity of one kind.
///
/// Read-only once built; recomputed only when the mesh topology changes.
#[derive(Clone, Debug, PartialEq, Eq)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct GroupTable {
    kind: EntityKind,
    owner: Vec<usize>,
    groups: Vec<Vec<usize>>,
}

impl GroupTable {
    /// Build the table from the collected `(index, rank)` multiset.
    ///
    /// Every index in `0..n_entities` must be reported by at least two ranks
    /// (a "shared" entity seen by one rank is an upstream partitioning bug).
    pub fn build(
        kind: EntityKind,
        n_entities: usize,
        mut pairs: Vec<IndexRank>,
        my_rank: usize,
    ) -> Result<Self, ParNcError> {
        pairs.sort_unstable();
        let mut owner = vec![usize::MAX; n_entities];
        let mut groups = vec![Vec::new(); n_entities];

        for (index, chunk) in &pairs.iter().chunk_by(|p| p.index) {
            let ranks: Vec<usize> = chunk.map(|p| p.rank).dedup().collect();
            let Some(slot) = groups.get_mut(index as usize) else {
                return Err(ParNcError::UnknownEntityIndex { kind, index });
            };
            // Sorted input makes the first rank the minimum.
            owner[index as usize] = ranks[0];
            *slot = ranks;
        }

        for (index, group) in groups.iter().enumerate() {
            if group.len() < 2 {
                return Err(ParNcError::EntityNotShared {
                    kind,
                    index: index as u32,
                    rank: my_rank,
                });
            }
        }
        Ok(GroupTable {
            kind,
            owner,
            groups,
        })
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.owner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owner.is_empty()
    }

    /// Rank owning the entity at `index` (the group minimum).
    pub fn owner(&self, index: u32) -> Result<usize, ParNcError> {
        self.owner
            .get(index as usize)
            .copied()
            .ok_or(ParNcError::UnknownEntityIndex {
                kind: self.kind,
                index,
            })
    }

    /// Ordered set of ranks sharing the entity at `index`.
    pub fn group(&self, index: u32) -> Result<&[usize], ParNcError> {
        self.groups
            .get(index as usize)
            .map(Vec::as_slice)
            .ok_or(ParNcError::UnknownEntityIndex {
                kind: self.kind,
                index,
            })
    }
}

/// Run the neighbor exchange round and build both per-kind tables.
///
/// Every rank sends its shared `(kind, id)` list to every neighbor and
/// receives exactly one such list from each; ids present in both lists
/// contribute an [`IndexRank`] pair on each side, so group membership comes
/// out symmetric without further traffic.
pub fn exchange_shared_ranks<T, M>(
    topo: &M,
    transport: &T,
) -> Result<(GroupTable, GroupTable), ParNcError>
where
    T: Transport,
    M: MeshTopology,
{
    let my_rank = transport.rank();

    let mut writer = WireWriter::with_header(KIND_SHARED_RANKS);
    let total: usize = EntityKind::ALL
        .iter()
        .map(|&kind| topo.shared(kind).len())
        .sum();
    writer.push(WireCount::new(total));
    for kind in EntityKind::ALL {
        for (_, ent) in topo.shared(kind).iter() {
            writer.push(WireEntityRef::new(kind.as_u16(), ent.id.get()));
        }
    }
    let payload = writer.freeze();

    let mut handles = Vec::new();
    for &nbr in topo.neighbor_ranks() {
        if nbr == my_rank {
            continue;
        }
        handles.push(transport.isend(payload.clone(), nbr, CommTag::SHARED_RANKS)?);
    }

    // Seed with our own rank, then fold in each neighbor's list.
    let mut edge_pairs: Vec<IndexRank> = topo
        .shared_edges()
        .iter()
        .map(|(i, _)| IndexRank::new(i, my_rank))
        .collect();
    let mut face_pairs: Vec<IndexRank> = topo
        .shared_faces()
        .iter()
        .map(|(i, _)| IndexRank::new(i, my_rank))
        .collect();

    let mut expected: BTreeSet<usize> = topo
        .neighbor_ranks()
        .iter()
        .copied()
        .filter(|&r| r != my_rank)
        .collect();
    while !expected.is_empty() {
        let (src, size) = transport.probe_any(CommTag::SHARED_RANKS)?;
        if !expected.remove(&src) {
            return Err(ParNcError::UnexpectedSender {
                rank: src,
                tag: CommTag::SHARED_RANKS.as_u16(),
            });
        }
        let data = transport.recv(src, size, CommTag::SHARED_RANKS)?;
        let mut reader = WireReader::with_header(&data, src, KIND_SHARED_RANKS)?;
        let count: WireCount = reader.pull()?;
        for _ in 0..count.get() {
            let entry: WireEntityRef = reader.pull()?;
            let Some(kind) = EntityKind::from_u16(entry.kind()) else {
                return Err(reader.malformed(format!("entity kind {}", entry.kind())));
            };
            let id = crate::topology::entity::EntityId::new(entry.id());
            let pairs = match kind {
                EntityKind::Edge => &mut edge_pairs,
                EntityKind::Face => &mut face_pairs,
            };
            if let Some(index) = topo.shared(kind).position(id) {
                pairs.push(IndexRank::new(index, src));
            }
        }
        reader.finish()?;
        log::trace!("rank {my_rank}: folded shared-entity list from rank {src}");
    }

    for handle in handles {
        handle.wait()?;
    }

    let edges = GroupTable::build(
        EntityKind::Edge,
        topo.shared_edges().len(),
        edge_pairs,
        my_rank,
    )?;
    let faces = GroupTable::build(
        EntityKind::Face,
        topo.shared_faces().len(),
        face_pairs,
        my_rank,
    )?;
    Ok((edges, faces))
}
