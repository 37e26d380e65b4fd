//! Fixed, versioned, little-endian wire records for neighbor exchanges.
//!
//! All multi-byte integers are little-endian on the wire: fields are stored
//! pre-LE with `.to_le()` and decoded with `::from_le`. Payloads are built by
//! a [`WireWriter`] and consumed by a bounds-checked [`WireReader`]; nothing
//! outside this module touches raw bytes.

use crate::error::ParNcError;
use bytemuck::{Pod, Zeroable};
use bytes::Bytes;
use std::mem::size_of;

/// Bump when the layout or semantics change in incompatible ways.
pub const WIRE_VERSION: u16 = 1;

/// Message kinds carried in [`WireHdr`].
pub const KIND_SHARED_RANKS: u16 = 1;
pub const KIND_NEIGHBOR_DOFS: u16 = 2;
pub const KIND_NEIGHBOR_ROWS: u16 = 3;

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct WireHdr {
    pub version_le: u16,
    pub kind_le: u16,
    pub reserved_le: u32, // future use; keep zero
}

impl WireHdr {
    pub fn new(kind: u16) -> Self {
        Self {
            version_le: WIRE_VERSION.to_le(),
            kind_le: kind.to_le(),
            reserved_le: 0,
        }
    }
    pub fn version(&self) -> u16 {
        u16::from_le(self.version_le)
    }
    pub fn kind(&self) -> u16 {
        u16::from_le(self.kind_le)
    }
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct WireCount {
    pub n_le: u32,
}

impl WireCount {
    pub fn new(n: usize) -> Self {
        Self {
            n_le: (n as u32).to_le(),
        }
    }
    pub fn get(&self) -> usize {
        u32::from_le(self.n_le) as usize
    }
}

/// A `(kind, id)` entity reference, used by the shared-rank exchange.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct WireEntityRef {
    pub id_le: u64,
    pub kind_le: u16,
    pub _pad: u16,
    pub _pad2: u32,
}

impl WireEntityRef {
    pub fn new(kind: u16, id: u64) -> Self {
        Self {
            id_le: id.to_le(),
            kind_le: kind.to_le(),
            _pad: 0,
            _pad2: 0,
        }
    }
    pub fn id(&self) -> u64 {
        u64::from_le(self.id_le)
    }
    pub fn kind(&self) -> u16 {
        u16::from_le(self.kind_le)
    }
}

/// Dictionary entry header: `(EntityId, count)`, followed by `count` dofs.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct WireEntityKey {
    pub id_le: u64,
    pub ndofs_le: u32,
    pub _pad: u32,
}

impl WireEntityKey {
    pub fn new(id: u64, ndofs: usize) -> Self {
        Self {
            id_le: id.to_le(),
            ndofs_le: (ndofs as u32).to_le(),
            _pad: 0,
        }
    }
    pub fn id(&self) -> u64 {
        u64::from_le(self.id_le)
    }
    pub fn ndofs(&self) -> usize {
        u32::from_le(self.ndofs_le) as usize
    }
}

/// One dof index local to the sender.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct WireDof {
    pub dof_le: u32,
}

impl WireDof {
    pub fn new(dof: u32) -> Self {
        Self {
            dof_le: dof.to_le(),
        }
    }
    pub fn get(&self) -> u32 {
        u32::from_le(self.dof_le)
    }
}

/// Row entry header: `(sender-local dof, term count)`.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct WireRowHdr {
    pub dof_le: u32,
    pub nterms_le: u32,
}

impl WireRowHdr {
    pub fn new(dof: u32, nterms: usize) -> Self {
        Self {
            dof_le: dof.to_le(),
            nterms_le: (nterms as u32).to_le(),
        }
    }
    pub fn dof(&self) -> u32 {
        u32::from_le(self.dof_le)
    }
    pub fn nterms(&self) -> usize {
        u32::from_le(self.nterms_le) as usize
    }
}

/// One weighted true-dof reference of a finalized row.
///
/// The coefficient travels as `f64::to_bits` so the record stays `Pod`.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct WireRowTerm {
    pub rank_le: u32,
    pub ordinal_le: u32,
    pub coef_bits_le: u64,
}

impl WireRowTerm {
    pub fn new(rank: u32, ordinal: u32, coef: f64) -> Self {
        Self {
            rank_le: rank.to_le(),
            ordinal_le: ordinal.to_le(),
            coef_bits_le: coef.to_bits().to_le(),
        }
    }
    pub fn rank(&self) -> u32 {
        u32::from_le(self.rank_le)
    }
    pub fn ordinal(&self) -> u32 {
        u32::from_le(self.ordinal_le)
    }
    pub fn coef(&self) -> f64 {
        f64::from_bits(u64::from_le(self.coef_bits_le))
    }
}

// ===== Writer / reader =====================================================

/// Append-only payload builder.
#[derive(Default)]
pub struct WireWriter {
    buf: Vec<u8>,
}

impl WireWriter {
    pub fn with_header(kind: u16) -> Self {
        let mut w = WireWriter::default();
        w.push(WireHdr::new(kind));
        w
    }

    pub fn push<T: Pod>(&mut self, record: T) {
        self.buf.extend_from_slice(bytemuck::bytes_of(&record));
    }

    pub fn push_all<T: Pod>(&mut self, records: impl IntoIterator<Item = T>) {
        for record in records {
            self.push(record);
        }
    }

    pub fn freeze(self) -> Bytes {
        Bytes::from(self.buf)
    }
}

/// Bounds-checked record reader; every failure names the sending rank.
pub struct WireReader<'a> {
    data: &'a [u8],
    pos: usize,
    rank: usize,
}

impl<'a> WireReader<'a> {
    /// Start reading a payload from `rank`, validating the header.
    pub fn with_header(data: &'a [u8], rank: usize, kind: u16) -> Result<Self, ParNcError> {
        let mut reader = WireReader { data, pos: 0, rank };
        let hdr: WireHdr = reader.pull()?;
        if hdr.version() != WIRE_VERSION {
            return Err(reader.malformed(format!(
                "wire version {} (expected {WIRE_VERSION})",
                hdr.version()
            )));
        }
        if hdr.kind() != kind {
            return Err(reader.malformed(format!(
                "message kind {} (expected {kind})",
                hdr.kind()
            )));
        }
        Ok(reader)
    }

    pub fn pull<T: Pod>(&mut self) -> Result<T, ParNcError> {
        let end = self.pos + size_of::<T>();
        if end > self.data.len() {
            return Err(self.malformed(format!(
                "truncated at byte {} (need {}, have {})",
                self.pos,
                size_of::<T>(),
                self.data.len() - self.pos
            )));
        }
        let record = bytemuck::pod_read_unaligned(&self.data[self.pos..end]);
        self.pos = end;
        Ok(record)
    }

    /// All input consumed?
    pub fn finish(self) -> Result<(), ParNcError> {
        if self.pos != self.data.len() {
            let trailing = self.data.len() - self.pos;
            return Err(self.malformed(format!("{trailing} trailing bytes")));
        }
        Ok(())
    }

    pub fn malformed(&self, detail: String) -> ParNcError {
        ParNcError::MalformedPayload {
            rank: self.rank,
            detail,
        }
    }
}

// ===== Compile-time sanity checks ==========================================

const _: () = {
    assert!(size_of::<WireHdr>() == 8);
    assert!(size_of::<WireCount>() == 4);
    assert!(size_of::<WireEntityRef>() == 16);
    assert!(size_of::<WireEntityKey>() == 16);
    assert!(size_of::<WireDof>() == 4);
    assert!(size_of::<WireRowHdr>() == 8);
    assert!(size_of::<WireRowTerm>() == 16);
};
