//! ParNcError: unified error type for parnc public APIs.
//!
//! Every failure in this crate is fatal for the current pass: a malformed
//! message or inconsistent partition reflects an upstream bug, not a
//! recoverable condition. The error therefore carries enough context to
//! diagnose the offending entity, rank, and phase rather than any retry
//! machinery.

use crate::topology::entity::{EntityId, EntityKind};
use thiserror::Error;

/// Unified error type for parnc operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParNcError {
    /// An entity appeared in the shared lists of fewer than two ranks.
    #[error("topology error: {kind} {index} reported shared by a single rank {rank}")]
    EntityNotShared {
        kind: EntityKind,
        index: u32,
        rank: usize,
    },

    /// A group table was queried with an out-of-range entity index.
    #[error("topology error: no group entry for {kind} index {index}")]
    UnknownEntityIndex { kind: EntityKind, index: u32 },

    /// A received dictionary had no entry for an entity we expected.
    #[error("protocol error: no {kind} dofs for entity {id} in message from rank {rank}")]
    MissingEntityDofs {
        kind: EntityKind,
        id: EntityId,
        rank: usize,
    },

    /// A received payload did not have the probed/declared size.
    #[error("protocol error: message from rank {rank} declared {expected} bytes, got {actual}")]
    SizeMismatch {
        rank: usize,
        expected: usize,
        actual: usize,
    },

    /// A message arrived from a rank we were not expecting in this phase.
    #[error("protocol error: unexpected message from rank {rank} on tag {tag}")]
    UnexpectedSender { rank: usize, tag: u16 },

    /// A wire payload was truncated or structurally invalid.
    #[error("protocol error: malformed payload from rank {rank}: {detail}")]
    MalformedPayload { rank: usize, detail: String },

    /// Received dof correspondence disagrees with the local dof count.
    #[error(
        "protocol error: {kind} {id}: owner rank {rank} sent {remote} dofs, local entity has {local}"
    )]
    DofCountMismatch {
        kind: EntityKind,
        id: EntityId,
        rank: usize,
        remote: usize,
        local: usize,
    },

    /// An element-set byte stream ran out of bytes or used an invalid flag.
    #[error("topology error: element set decode failed at byte {pos}: {detail}")]
    ElementSetDecode { pos: usize, detail: String },

    /// An embedded-integer access fell outside the element-set buffer.
    #[error("element set: integer access at {pos} out of bounds (len {len})")]
    ElementSetBounds { pos: usize, len: usize },

    /// A dependency referenced a dof index outside the local dof range.
    #[error("dependency for dof {dof} references out-of-range local dof {reference}")]
    DofOutOfRange { dof: u32, reference: u32 },

    /// Phase 2 stalled: a dof still awaits a dependency but no row can arrive.
    #[error("liveness failure: rank {rank} has {pending} unresolved dofs and no pending senders")]
    Stalled { rank: usize, pending: usize },

    /// Error surfaced from the underlying transport.
    #[error("transport error communicating with rank {neighbor}: {detail}")]
    Transport { neighbor: usize, detail: String },
}
