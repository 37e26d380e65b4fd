//! Neighbor row message: finalized P-matrix rows for Phase 2.
//!
//! Once a rank resolves a dof it announced during Phase 1, it sends the
//! finalized row to every rank the dof was announced to. Rows are keyed by
//! the sender-local dof index the receiver already holds from the Phase 1
//! dictionary, and their terms reference global true dofs, so combinations
//! compose across ranks.

use crate::algs::dof_exchange::DofId;
use crate::algs::pmatrix::rows::{Row, TrueDof};
use crate::algs::transport::{CommTag, Transport};
use crate::algs::wire::{KIND_NEIGHBOR_ROWS, WireCount, WireReader, WireRowHdr, WireRowTerm, WireWriter};
use crate::error::ParNcError;
use bytes::Bytes;
use std::collections::BTreeMap;

/// Batch of finalized rows, keyed by sender-local dof.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NeighborRowMessage {
    rows: BTreeMap<DofId, Row>,
}

impl NeighborRowMessage {
    pub fn add_row(&mut self, dof: DofId, row: Row) {
        self.rows.insert(dof, row);
    }

    pub fn rows(&self) -> impl Iterator<Item = (DofId, &Row)> {
        self.rows.iter().map(|(&d, r)| (d, r))
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Flatten into the `(dof, count, (rank, ordinal, coef)[count])*` payload.
    pub fn encode(&self) -> Bytes {
        let mut writer = WireWriter::with_header(KIND_NEIGHBOR_ROWS);
        writer.push(WireCount::new(self.rows.len()));
        for (&dof, row) in &self.rows {
            writer.push(WireRowHdr::new(dof, row.terms().len()));
            writer.push_all(
                row.terms()
                    .iter()
                    .map(|&(key, coef)| WireRowTerm::new(key.rank, key.ordinal, coef)),
            );
        }
        writer.freeze()
    }

    pub fn decode(data: &[u8], sender: usize) -> Result<Self, ParNcError> {
        let mut reader = WireReader::with_header(data, sender, KIND_NEIGHBOR_ROWS)?;
        let count: WireCount = reader.pull()?;
        let mut message = NeighborRowMessage::default();
        for _ in 0..count.get() {
            let hdr: WireRowHdr = reader.pull()?;
            let mut terms = Vec::with_capacity(hdr.nterms());
            for _ in 0..hdr.nterms() {
                let term: WireRowTerm = reader.pull()?;
                terms.push((
                    TrueDof {
                        rank: term.rank(),
                        ordinal: term.ordinal(),
                    },
                    term.coef(),
                ));
            }
            message.add_row(hdr.dof(), Row::from_terms(terms));
        }
        reader.finish()?;
        Ok(message)
    }

    /// Non-blocking send on the Phase 2 channel.
    pub fn send<T: Transport>(&self, transport: &T, peer: usize) -> Result<T::SendHandle, ParNcError> {
        transport.isend(self.encode(), peer, CommTag::ROW_EXCHANGE)
    }

    /// Blocking any-source receive on the Phase 2 channel.
    pub fn recv_any<T: Transport>(transport: &T) -> Result<(usize, Self), ParNcError> {
        let (src, size) = transport.probe_any(CommTag::ROW_EXCHANGE)?;
        let data = transport.recv(src, size, CommTag::ROW_EXCHANGE)?;
        Ok((src, NeighborRowMessage::decode(&data, src)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_preserves_rows() {
        let mut msg = NeighborRowMessage::default();
        msg.add_row(4, Row::identity(TrueDof::new(1, 0)));
        msg.add_row(
            9,
            Row::from_terms([(TrueDof::new(0, 2), 0.5), (TrueDof::new(2, 1), 0.5)]),
        );
        let decoded = NeighborRowMessage::decode(&msg.encode(), 7).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn empty_message_is_valid() {
        let msg = NeighborRowMessage::default();
        let decoded = NeighborRowMessage::decode(&msg.encode(), 0).unwrap();
        assert!(decoded.is_empty());
    }
}
