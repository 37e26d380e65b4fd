//! Neighbor DOF message: per-entity dof dictionaries for Phase 1.
//!
//! Carries, for a set of shared edges and faces, the dof indices local to the
//! sender, keyed by the cross-rank [`EntityId`] so the receiver can match
//! them against its own shared lists. Constructed per destination rank, sent
//! once, consumed once.

use crate::algs::transport::{CommTag, Transport};
use crate::algs::wire::{KIND_NEIGHBOR_DOFS, WireCount, WireDof, WireEntityKey, WireReader, WireWriter};
use crate::error::ParNcError;
use crate::topology::entity::{EntityId, EntityKind};
use bytes::Bytes;
use std::collections::BTreeMap;

/// Local dof index on some rank.
pub type DofId = u32;

/// Dictionary `EntityId -> ordered dof list`, one per entity kind.
///
/// Edge and face keys live in separate dictionaries: an edge and a face may
/// legitimately carry the same id without colliding.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NeighborDofMessage {
    edge_dofs: BTreeMap<EntityId, Vec<DofId>>,
    face_dofs: BTreeMap<EntityId, Vec<DofId>>,
}

impl NeighborDofMessage {
    pub fn add_edge_dofs(&mut self, id: EntityId, dofs: &[DofId]) {
        debug_assert!(!dofs.is_empty(), "entity announced with no dofs");
        self.edge_dofs.insert(id, dofs.to_vec());
    }

    pub fn add_face_dofs(&mut self, id: EntityId, dofs: &[DofId]) {
        debug_assert!(!dofs.is_empty(), "entity announced with no dofs");
        self.face_dofs.insert(id, dofs.to_vec());
    }

    /// Kind-dispatch add, so higher layers need a single call site.
    pub fn add_dofs(&mut self, kind: EntityKind, id: EntityId, dofs: &[DofId]) {
        match kind {
            EntityKind::Edge => self.add_edge_dofs(id, dofs),
            EntityKind::Face => self.add_face_dofs(id, dofs),
        }
    }

    pub fn get_edge_dofs(&self, id: EntityId) -> Option<&[DofId]> {
        self.edge_dofs.get(&id).map(Vec::as_slice)
    }

    pub fn get_face_dofs(&self, id: EntityId) -> Option<&[DofId]> {
        self.face_dofs.get(&id).map(Vec::as_slice)
    }

    /// Kind-dispatch lookup.
    pub fn get_dofs(&self, kind: EntityKind, id: EntityId) -> Option<&[DofId]> {
        match kind {
            EntityKind::Edge => self.get_edge_dofs(id),
            EntityKind::Face => self.get_face_dofs(id),
        }
    }

    /// Lookup that treats a missing key as the protocol error it is.
    pub fn require_dofs(
        &self,
        kind: EntityKind,
        id: EntityId,
        sender: usize,
    ) -> Result<&[DofId], ParNcError> {
        self.get_dofs(kind, id).ok_or(ParNcError::MissingEntityDofs {
            kind,
            id,
            rank: sender,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.edge_dofs.is_empty() && self.face_dofs.is_empty()
    }

    /// Every dof announced in this message, across both dictionaries.
    pub fn announced_dofs(&self) -> impl Iterator<Item = DofId> + '_ {
        self.edge_dofs
            .values()
            .chain(self.face_dofs.values())
            .flatten()
            .copied()
    }

    /// Flatten into the `(EntityId, count, dof[count])*` payload, one section
    /// per kind, keys in ascending id order.
    pub fn encode(&self) -> Bytes {
        let mut writer = WireWriter::with_header(KIND_NEIGHBOR_DOFS);
        for dict in [&self.edge_dofs, &self.face_dofs] {
            writer.push(WireCount::new(dict.len()));
            for (id, dofs) in dict {
                writer.push(WireEntityKey::new(id.get(), dofs.len()));
                writer.push_all(dofs.iter().map(|&d| WireDof::new(d)));
            }
        }
        writer.freeze()
    }

    /// Inverse of [`NeighborDofMessage::encode`]; `sender` is used for error
    /// context only.
    pub fn decode(data: &[u8], sender: usize) -> Result<Self, ParNcError> {
        let mut reader = WireReader::with_header(data, sender, KIND_NEIGHBOR_DOFS)?;
        let mut message = NeighborDofMessage::default();
        for kind in EntityKind::ALL {
            let count: WireCount = reader.pull()?;
            for _ in 0..count.get() {
                let key: WireEntityKey = reader.pull()?;
                let mut dofs = Vec::with_capacity(key.ndofs());
                for _ in 0..key.ndofs() {
                    dofs.push(reader.pull::<WireDof>()?.get());
                }
                message.add_dofs(kind, EntityId::new(key.id()), &dofs);
            }
        }
        reader.finish()?;
        Ok(message)
    }

    /// Non-blocking send on the Phase 1 channel.
    pub fn send<T: Transport>(&self, transport: &T, peer: usize) -> Result<T::SendHandle, ParNcError> {
        transport.isend(self.encode(), peer, CommTag::DOF_EXCHANGE)
    }

    /// Blocking any-source receive on the Phase 1 channel.
    pub fn recv_any<T: Transport>(transport: &T) -> Result<(usize, Self), ParNcError> {
        let (src, size) = transport.probe_any(CommTag::DOF_EXCHANGE)?;
        let data = transport.recv(src, size, CommTag::DOF_EXCHANGE)?;
        Ok((src, NeighborDofMessage::decode(&data, src)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dictionary_fidelity() {
        let f1 = EntityId::new(101);
        let e1 = EntityId::new(55);
        let mut msg = NeighborDofMessage::default();
        msg.add_face_dofs(f1, &[3, 7, 9]);
        msg.add_edge_dofs(e1, &[2, 4]);

        let decoded = NeighborDofMessage::decode(&msg.encode(), 0).unwrap();
        assert_eq!(decoded.get_face_dofs(f1), Some(&[3, 7, 9][..]));
        assert_eq!(decoded.get_edge_dofs(e1), Some(&[2, 4][..]));
        assert_eq!(decoded, msg);
    }

    #[test]
    fn edge_and_face_dictionaries_do_not_mix() {
        let id = EntityId::new(5);
        let mut msg = NeighborDofMessage::default();
        msg.add_dofs(EntityKind::Edge, id, &[1]);
        let decoded = NeighborDofMessage::decode(&msg.encode(), 0).unwrap();
        assert_eq!(decoded.get_edge_dofs(id), Some(&[1][..]));
        assert_eq!(decoded.get_face_dofs(id), None);
    }

    #[test]
    fn announced_dofs_span_both_dictionaries() {
        let mut msg = NeighborDofMessage::default();
        msg.add_edge_dofs(EntityId::new(1), &[2, 4]);
        msg.add_face_dofs(EntityId::new(2), &[7]);
        let mut dofs: Vec<DofId> = msg.announced_dofs().collect();
        dofs.sort_unstable();
        assert_eq!(dofs, vec![2, 4, 7]);
        assert!(NeighborDofMessage::default().announced_dofs().next().is_none());
    }

    #[test]
    fn missing_key_is_a_protocol_error() {
        let msg = NeighborDofMessage::default();
        assert!(matches!(
            msg.require_dofs(EntityKind::Face, EntityId::new(9), 3),
            Err(ParNcError::MissingEntityDofs { rank: 3, .. })
        ));
    }

    #[test]
    fn truncated_payload_rejected() {
        let mut msg = NeighborDofMessage::default();
        msg.add_edge_dofs(EntityId::new(1), &[1, 2, 3]);
        let payload = msg.encode();
        let cut = &payload[..payload.len() - 2];
        assert!(NeighborDofMessage::decode(cut, 0).is_err());
    }
}
