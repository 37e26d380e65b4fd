//! Point-to-point message transport abstraction.
//!
//! Messages are tagged, variable-length byte payloads. The contract mirrors
//! the classic Isend / Probe / Recv triple: [`Transport::isend`] is
//! non-blocking and transfers ownership of the payload until the returned
//! handle is waited on; [`Transport::probe_any`] blocks until a message with
//! the given tag is available from *some* rank and reports `(source, size)`
//! without consuming it; [`Transport::recv`] must be paired with a matching
//! probe. Tags separate conceptual channels, so different phases never
//! consume each other's messages; no cross-tag ordering is guaranteed or
//! required.
//!
//! Any transport-level failure is fatal for the pass; there is no retry.
//!
//! Two backends: [`LocalCluster`] endpoints for in-process multi-rank runs
//! (tests simulate ranks with one thread each), and an MPI transport behind
//! the `mpi-support` feature.

use crate::error::ParNcError;
use bytes::Bytes;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;

/// Channel tag: one conceptual message stream.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct CommTag(u16);

impl CommTag {
    /// Shared-entity rank exchange (ownership/group construction).
    pub const SHARED_RANKS: CommTag = CommTag(0x11);
    /// Phase 1 neighbor dof dictionaries.
    pub const DOF_EXCHANGE: CommTag = CommTag(0x12);
    /// Phase 2 finalized row broadcasts.
    pub const ROW_EXCHANGE: CommTag = CommTag(0x13);

    pub const fn new(raw: u16) -> Self {
        CommTag(raw)
    }

    pub const fn as_u16(self) -> u16 {
        self.0
    }
}

/// Anything that can be waited on for send completion.
pub trait Wait {
    fn wait(self) -> Result<(), ParNcError>;
}

impl Wait for () {
    fn wait(self) -> Result<(), ParNcError> {
        Ok(())
    }
}

/// Blocking-probe message transport between ranks.
pub trait Transport: Send + Sync {
    type SendHandle: Wait;

    /// This participant's rank number.
    fn rank(&self) -> usize;

    /// Number of participating ranks.
    fn n_ranks(&self) -> usize;

    /// Non-blocking send of `payload` to `peer` on channel `tag`. The buffer
    /// belongs to the transport until the handle's `wait` returns.
    fn isend(
        &self,
        payload: Bytes,
        peer: usize,
        tag: CommTag,
    ) -> Result<Self::SendHandle, ParNcError>;

    /// Block until a message tagged `tag` is available from some rank;
    /// report its source and byte size without consuming it.
    fn probe_any(&self, tag: CommTag) -> Result<(usize, usize), ParNcError>;

    /// Blocking receive of the previously probed `(peer, size)` message.
    fn recv(&self, peer: usize, size: usize, tag: CommTag) -> Result<Bytes, ParNcError>;
}

// --- In-process backend -----------------------------------------------------

struct Envelope {
    src: usize,
    tag: u16,
    payload: Bytes,
}

#[derive(Default)]
struct Mailbox {
    queue: Mutex<VecDeque<Envelope>>,
    ready: Condvar,
}

/// Shared mailbox hub for a fixed set of in-process ranks.
///
/// Each simulated rank takes one [`LocalTransport`] endpoint; sends append to
/// the destination mailbox and wake its probes.
#[derive(Clone)]
pub struct LocalCluster {
    mailboxes: Arc<Vec<Mailbox>>,
}

impl LocalCluster {
    pub fn new(n_ranks: usize) -> Self {
        LocalCluster {
            mailboxes: Arc::new((0..n_ranks).map(|_| Mailbox::default()).collect()),
        }
    }

    pub fn n_ranks(&self) -> usize {
        self.mailboxes.len()
    }

    pub fn endpoint(&self, rank: usize) -> LocalTransport {
        assert!(rank < self.mailboxes.len(), "rank out of range");
        LocalTransport {
            rank,
            mailboxes: Arc::clone(&self.mailboxes),
        }
    }
}

/// One rank's endpoint of a [`LocalCluster`].
#[derive(Clone)]
pub struct LocalTransport {
    rank: usize,
    mailboxes: Arc<Vec<Mailbox>>,
}

impl LocalTransport {
    fn mailbox(&self, rank: usize) -> Result<&Mailbox, ParNcError> {
        self.mailboxes.get(rank).ok_or(ParNcError::Transport {
            neighbor: rank,
            detail: format!("rank {rank} outside cluster of {}", self.mailboxes.len()),
        })
    }
}

impl Transport for LocalTransport {
    type SendHandle = ();

    fn rank(&self) -> usize {
        self.rank
    }

    fn n_ranks(&self) -> usize {
        self.mailboxes.len()
    }

    fn isend(&self, payload: Bytes, peer: usize, tag: CommTag) -> Result<(), ParNcError> {
        let mailbox = self.mailbox(peer)?;
        mailbox.queue.lock().push_back(Envelope {
            src: self.rank,
            tag: tag.as_u16(),
            payload,
        });
        mailbox.ready.notify_all();
        Ok(())
    }

    fn probe_any(&self, tag: CommTag) -> Result<(usize, usize), ParNcError> {
        let mailbox = self.mailbox(self.rank)?;
        let mut queue = mailbox.queue.lock();
        loop {
            if let Some(env) = queue.iter().find(|e| e.tag == tag.as_u16()) {
                return Ok((env.src, env.payload.len()));
            }
            mailbox.ready.wait(&mut queue);
        }
    }

    fn recv(&self, peer: usize, size: usize, tag: CommTag) -> Result<Bytes, ParNcError> {
        let mailbox = self.mailbox(self.rank)?;
        let mut queue = mailbox.queue.lock();
        loop {
            let at = queue
                .iter()
                .position(|e| e.src == peer && e.tag == tag.as_u16());
            if let Some(env) = at.and_then(|at| queue.remove(at)) {
                if env.payload.len() != size {
                    return Err(ParNcError::SizeMismatch {
                        rank: peer,
                        expected: size,
                        actual: env.payload.len(),
                    });
                }
                return Ok(env.payload);
            }
            mailbox.ready.wait(&mut queue);
        }
    }
}

// --- MPI backend (feature = "mpi-support") ----------------------------------

#[cfg(feature = "mpi-support")]
mod mpi_backend {
    use super::*;
    use mpi::request::{Request, StaticScope};
    use mpi::topology::SimpleCommunicator;
    use mpi::traits::*;

    pub struct MpiTransport {
        world: SimpleCommunicator,
        rank: usize,
        size: usize,
    }

    impl MpiTransport {
        pub fn new(world: SimpleCommunicator) -> Self {
            let rank = world.rank() as usize;
            let size = world.size() as usize;
            Self { world, rank, size }
        }
    }

    pub struct MpiHandle {
        // Keeps the send buffer alive until the request completes.
        _payload: Bytes,
        request: Request<'static, [u8], StaticScope>,
    }

    impl Wait for MpiHandle {
        fn wait(self) -> Result<(), ParNcError> {
            self.request.wait_without_status();
            Ok(())
        }
    }

    impl Transport for MpiTransport {
        type SendHandle = MpiHandle;

        fn rank(&self) -> usize {
            self.rank
        }

        fn n_ranks(&self) -> usize {
            self.size
        }

        fn isend(&self, payload: Bytes, peer: usize, tag: CommTag) -> Result<MpiHandle, ParNcError> {
            // The payload is moved into the handle, so the borrow below lives
            // until `wait` consumes the handle.
            let buf: &'static [u8] = unsafe { std::mem::transmute::<&[u8], &'static [u8]>(&payload) };
            let request = self
                .world
                .process_at_rank(peer as i32)
                .immediate_send_with_tag(StaticScope, buf, tag.as_u16() as i32);
            Ok(MpiHandle {
                _payload: payload,
                request,
            })
        }

        fn probe_any(&self, tag: CommTag) -> Result<(usize, usize), ParNcError> {
            let status = self
                .world
                .any_process()
                .probe_with_tag(tag.as_u16() as i32);
            let size = status
                .count(u8::equivalent_datatype())
                .max(0) as usize;
            Ok((status.source_rank() as usize, size))
        }

        fn recv(&self, peer: usize, size: usize, tag: CommTag) -> Result<Bytes, ParNcError> {
            let (data, _status) = self
                .world
                .process_at_rank(peer as i32)
                .receive_vec_with_tag::<u8>(tag.as_u16() as i32);
            if data.len() != size {
                return Err(ParNcError::SizeMismatch {
                    rank: peer,
                    expected: size,
                    actual: data.len(),
                });
            }
            Ok(Bytes::from(data))
        }
    }
}

#[cfg(feature = "mpi-support")]
pub use mpi_backend::{MpiHandle, MpiTransport};
