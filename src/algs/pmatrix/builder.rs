//! Two-phase distributed P-matrix construction.
//!
//! Phase 1 (dependency discovery): owners of master and conforming shared
//! entities announce their local dof indices to the other group members;
//! every rank derives the set of senders it must wait for from the same
//! group tables, so the receive loop needs no handshake. Received dofs plus
//! the local slave→master interpolation yield a dependency list per dof.
//!
//! Phase 2 (row finalization): dofs with empty dependency lists become true
//! dofs immediately; the rest resolve bottom-up as the rows of their
//! dependencies arrive. Newly finalized rows of Phase-1-announced dofs are
//! sent to exactly the ranks they were announced to, and each receiver
//! drains one row per dof announced to it, dropping those nothing depended
//! on, so no Phase 2 message outlives the pass. The cross-rank dependency
//! graph is acyclic (slaves depend on strictly coarser entities), so the
//! sweep/receive loop terminates within the depth of the non-conforming
//! hierarchy.

use crate::algs::dof_exchange::{DofId, NeighborDofMessage};
use crate::algs::pmatrix::dependency::{DepList, Dependency, DofSpace};
use crate::algs::pmatrix::rows::{PMatrix, Row, TrueDof};
use crate::algs::row_exchange::NeighborRowMessage;
use crate::algs::transport::{Transport, Wait};
use crate::error::ParNcError;
use crate::overlap::boundary::SharedBoundary;
use crate::topology::entity::{EntityKind, EntityRole, MeshTopology};
use smallvec::SmallVec;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Run both phases and finalize every local dof.
pub fn build_pmatrix<T, M, F>(
    topo: &M,
    space: &F,
    boundary: &SharedBoundary,
    transport: &T,
) -> Result<PMatrix, ParNcError>
where
    T: Transport,
    M: MeshTopology,
    F: DofSpace,
{
    let my_rank = transport.rank();
    let n_dofs = space.n_dofs();

    // --- Phase 1: announce owned entity dofs, collect neighbor dofs. -------

    let mut outgoing: BTreeMap<usize, NeighborDofMessage> = BTreeMap::new();
    let mut row_targets: HashMap<DofId, BTreeSet<usize>> = HashMap::new();
    let mut expected: BTreeSet<usize> = BTreeSet::new();

    for kind in EntityKind::ALL {
        for (index, ent) in topo.shared(kind).iter() {
            if matches!(ent.role, EntityRole::Slave { .. }) {
                continue;
            }
            let owner = boundary.owner(kind, index)?;
            if owner != my_rank {
                expected.insert(owner);
                continue;
            }
            let dofs = space.entity_dofs(kind, index);
            for &nbr in boundary.group(kind, index)? {
                if nbr == my_rank {
                    continue;
                }
                // The group member expects one message from us even when
                // every entity announced to it carries no dofs (lowest-order
                // spaces have no edge/face-interior dofs), so the entry is
                // created first and zero-dof entities stay out of it.
                let message = outgoing.entry(nbr).or_default();
                if dofs.is_empty() {
                    continue;
                }
                message.add_dofs(kind, ent.id, &dofs);
                for &dof in &dofs {
                    row_targets.entry(dof).or_default().insert(nbr);
                }
            }
        }
    }

    let mut dof_send_handles = Vec::with_capacity(outgoing.len());
    for (&nbr, message) in &outgoing {
        dof_send_handles.push(message.send(transport, nbr)?);
    }
    log::debug!(
        "rank {my_rank}: phase 1 announced to {} neighbors, expecting {}",
        outgoing.len(),
        expected.len()
    );

    let mut incoming: HashMap<usize, NeighborDofMessage> = HashMap::new();
    while !expected.is_empty() {
        let (src, message) = NeighborDofMessage::recv_any(transport)?;
        if !expected.remove(&src) {
            return Err(ParNcError::UnexpectedSender {
                rank: src,
                tag: crate::algs::transport::CommTag::DOF_EXCHANGE.as_u16(),
            });
        }
        incoming.insert(src, message);
    }
    for handle in dof_send_handles {
        handle.wait()?;
    }

    let deps = build_dependency_lists(topo, space, boundary, &incoming, my_rank, n_dofs)?;

    // --- Phase 2: finalize rows bottom-up. ----------------------------------

    let mut rows: Vec<Option<Row>> = vec![None; n_dofs];
    let mut true_dofs: Vec<DofId> = Vec::new();
    let mut true_ordinals: Vec<Option<u32>> = vec![None; n_dofs];
    let mut awaiting: Vec<DofId> = Vec::new();
    let mut newly: Vec<DofId> = Vec::new();

    for dof in 0..n_dofs as DofId {
        if deps[dof as usize].is_independent() {
            let ordinal = true_dofs.len() as u32;
            true_dofs.push(dof);
            true_ordinals[dof as usize] = Some(ordinal);
            rows[dof as usize] = Some(Row::identity(TrueDof::new(my_rank, ordinal)));
            newly.push(dof);
        } else {
            awaiting.push(dof);
        }
    }

    // A row will arrive for every dof announced to us, needed or not; all of
    // them must be drained before the pass returns, or they would surface in
    // a later pass (and under MPI the sender's final wait could block on an
    // unmatched send).
    let mut pending_rows: BTreeSet<(usize, DofId)> = incoming
        .iter()
        .flat_map(|(&src, message)| message.announced_dofs().map(move |dof| (src, dof)))
        .collect();

    let mut remote_rows: HashMap<(usize, DofId), Row> = HashMap::new();
    let mut row_send_handles = Vec::new();

    loop {
        // Local sweep: finalize everything whose dependencies are resolved.
        let mut progress = true;
        while progress {
            progress = false;
            let mut still = Vec::with_capacity(awaiting.len());
            'next: for &dof in &awaiting {
                let mut acc: BTreeMap<TrueDof, f64> = BTreeMap::new();
                for dep in deps[dof as usize].entries() {
                    let row = if dep.rank == my_rank {
                        rows.get(dep.dof as usize)
                            .ok_or(ParNcError::DofOutOfRange {
                                dof,
                                reference: dep.dof,
                            })?
                            .as_ref()
                    } else {
                        remote_rows.get(&(dep.rank, dep.dof))
                    };
                    match row {
                        Some(row) => row.accumulate_into(dep.coef, &mut acc),
                        None => {
                            still.push(dof);
                            continue 'next;
                        }
                    }
                }
                rows[dof as usize] = Some(Row::from_terms(acc));
                newly.push(dof);
                progress = true;
            }
            awaiting = still;
        }

        // Broadcast newly finalized rows to the ranks they were announced to.
        if !newly.is_empty() {
            let mut batches: BTreeMap<usize, NeighborRowMessage> = BTreeMap::new();
            for &dof in &newly {
                let Some(targets) = row_targets.get(&dof) else {
                    continue;
                };
                let row = rows[dof as usize].clone().ok_or(ParNcError::Stalled {
                    rank: my_rank,
                    pending: awaiting.len(),
                })?;
                for &nbr in targets {
                    batches.entry(nbr).or_default().add_row(dof, row.clone());
                }
            }
            for (&nbr, batch) in &batches {
                row_send_handles.push(batch.send(transport, nbr)?);
            }
            newly.clear();
        }

        if awaiting.is_empty() && pending_rows.is_empty() {
            break;
        }

        // Blocked with nothing left in flight: the dependency graph is
        // cyclic, which the refinement hierarchy rules out.
        if pending_rows.is_empty() {
            return Err(ParNcError::Stalled {
                rank: my_rank,
                pending: awaiting.len(),
            });
        }
        let (src, message) = NeighborRowMessage::recv_any(transport)?;
        log::trace!("rank {my_rank}: received {} rows from rank {src}", message.len());
        for (dof, row) in message.rows() {
            pending_rows.remove(&(src, dof));
            remote_rows.insert((src, dof), row.clone());
        }
    }

    for handle in row_send_handles {
        handle.wait()?;
    }

    let rows: Vec<Row> = rows
        .into_iter()
        .collect::<Option<Vec<_>>>()
        .ok_or(ParNcError::Stalled {
            rank: my_rank,
            pending: 0,
        })?;
    log::debug!(
        "rank {my_rank}: P matrix finalized, {} true of {} local dofs",
        true_dofs.len(),
        n_dofs
    );
    Ok(PMatrix::new(my_rank, rows, true_dofs, true_ordinals))
}

/// Turn received neighbor dofs plus the local non-conforming relationships
/// into a dependency list per local dof.
fn build_dependency_lists<M, F>(
    topo: &M,
    space: &F,
    boundary: &SharedBoundary,
    incoming: &HashMap<usize, NeighborDofMessage>,
    my_rank: usize,
    n_dofs: usize,
) -> Result<Vec<DepList>, ParNcError>
where
    M: MeshTopology,
    F: DofSpace,
{
    let mut deps = vec![DepList::default(); n_dofs];

    for kind in EntityKind::ALL {
        let list = topo.shared(kind);
        for (index, ent) in list.iter() {
            match ent.role {
                EntityRole::Master => {}
                EntityRole::Conforming => {
                    let owner = boundary.owner(kind, index)?;
                    if owner == my_rank {
                        continue;
                    }
                    let message =
                        incoming
                            .get(&owner)
                            .ok_or(ParNcError::MissingEntityDofs {
                                kind,
                                id: ent.id,
                                rank: owner,
                            })?;
                    let local = space.entity_dofs(kind, index);
                    // Zero-dof entities are announced as absent entries.
                    let remote = if local.is_empty() {
                        message.get_dofs(kind, ent.id).unwrap_or(&[])
                    } else {
                        message.require_dofs(kind, ent.id, owner)?
                    };
                    if remote.len() != local.len() {
                        return Err(ParNcError::DofCountMismatch {
                            kind,
                            id: ent.id,
                            rank: owner,
                            remote: remote.len(),
                            local: local.len(),
                        });
                    }
                    for (&ldof, &rdof) in local.iter().zip(remote) {
                        deps[ldof as usize].set_one_to_one(Dependency::one_to_one(owner, rdof));
                    }
                }
                EntityRole::Slave { master } => {
                    let m_ent = list.get(master).ok_or(ParNcError::UnknownEntityIndex {
                        kind,
                        index: master,
                    })?;
                    let m_owner = boundary.owner(kind, master)?;
                    let master_dofs: Vec<(usize, DofId)> = if m_owner == my_rank {
                        space
                            .entity_dofs(kind, master)
                            .into_iter()
                            .map(|d| (my_rank, d))
                            .collect()
                    } else {
                        let message =
                            incoming
                                .get(&m_owner)
                                .ok_or(ParNcError::MissingEntityDofs {
                                    kind,
                                    id: m_ent.id,
                                    rank: m_owner,
                                })?;
                        // Absent entry means the master has no dofs; any
                        // interpolation term referencing one fails the
                        // position bounds check below.
                        message
                            .get_dofs(kind, m_ent.id)
                            .unwrap_or(&[])
                            .iter()
                            .map(|&d| (m_owner, d))
                            .collect()
                    };

                    let slave_dofs = space.entity_dofs(kind, index);
                    let interp = space.slave_interpolation(kind, index);
                    if interp.rows.len() != slave_dofs.len() {
                        return Err(ParNcError::DofCountMismatch {
                            kind,
                            id: ent.id,
                            rank: my_rank,
                            remote: interp.rows.len(),
                            local: slave_dofs.len(),
                        });
                    }
                    for (&sdof, terms) in slave_dofs.iter().zip(&interp.rows) {
                        let mut entries: SmallVec<[Dependency; 4]> = SmallVec::new();
                        for &(position, coef) in terms {
                            let &(rank, dof) = master_dofs.get(position).ok_or(
                                ParNcError::DofCountMismatch {
                                    kind,
                                    id: m_ent.id,
                                    rank: m_owner,
                                    remote: master_dofs.len(),
                                    local: position + 1,
                                },
                            )?;
                            entries.push(Dependency::new(rank, dof, coef));
                        }
                        deps[sdof as usize].set_constrained(entries);
                    }
                }
            }
        }
    }
    Ok(deps)
}
