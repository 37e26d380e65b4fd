//! End-to-end two-phase P-matrix construction over simulated ranks.

mod util;

use parnc::prelude::*;
use util::{MockDofSpace, MockTopology, run_ranks};

fn assemble(
    topo: MockTopology,
    space: MockDofSpace,
    transport: &LocalTransport,
) -> PMatrix {
    let boundary = SharedBoundary::on_mesh_updated(&topo, transport).unwrap();
    build_pmatrix(&topo, &space, &boundary, transport).unwrap()
}

#[test]
fn conforming_boundary_yields_one_to_one_rows() {
    // One conforming shared edge; rank 0 owns it, so rank 1's two edge dofs
    // become unit rows over rank 0's corresponding true dofs.
    let edge = EntityId::new(5);
    let results = run_ranks(2, move |rank, transport| {
        let topo = MockTopology::new(
            vec![SharedEntity::conforming(edge)],
            vec![],
            vec![1 - rank],
        );
        let space = if rank == 0 {
            MockDofSpace::new(3).with_entity_dofs(EntityKind::Edge, 0, vec![0, 1])
        } else {
            MockDofSpace::new(3).with_entity_dofs(EntityKind::Edge, 0, vec![1, 2])
        };
        assemble(topo, space, &transport)
    });

    let p0 = &results[0];
    assert_eq!(p0.n_true_dofs(), 3);
    assert_eq!(p0.true_dofs(), &[0, 1, 2]);
    for dof in 0..3 {
        assert_eq!(
            p0.row(dof).unwrap().as_identity(),
            Some(TrueDof::new(0, p0.true_ordinal(dof).unwrap()))
        );
    }

    let p1 = &results[1];
    assert_eq!(p1.n_true_dofs(), 1);
    assert_eq!(p1.true_dofs(), &[0]);
    // Edge dofs follow rank 0's announcement order: local 1 pairs with
    // remote 0, local 2 with remote 1.
    assert_eq!(p1.row(1).unwrap().as_identity(), Some(TrueDof::new(0, 0)));
    assert_eq!(p1.row(2).unwrap().as_identity(), Some(TrueDof::new(0, 1)));
    assert_eq!(p1.true_ordinal(1), None);
}

#[test]
fn slave_dofs_interpolate_from_remote_master() {
    // Rank 0 owns the master edge; rank 1 holds the slave side, where both
    // local dofs constrain onto the master's dofs.
    let master = EntityId::new(10);
    let slave = EntityId::new(11);
    let results = run_ranks(2, move |rank, transport| {
        let topo = MockTopology::new(
            vec![
                SharedEntity::master(master),
                SharedEntity::slave(slave, 0),
            ],
            vec![],
            vec![1 - rank],
        );
        let space = if rank == 0 {
            // The slave entity carries no dofs on the coarse side.
            MockDofSpace::new(2).with_entity_dofs(EntityKind::Edge, 0, vec![0, 1])
        } else {
            MockDofSpace::new(2)
                .with_entity_dofs(EntityKind::Edge, 1, vec![0, 1])
                .with_interpolation(
                    EntityKind::Edge,
                    1,
                    vec![vec![(0, 0.5), (1, 0.5)], vec![(1, 1.0)]],
                )
        };
        assemble(topo, space, &transport)
    });

    let p0 = &results[0];
    assert_eq!(p0.n_true_dofs(), 2);

    let p1 = &results[1];
    assert_eq!(p1.n_true_dofs(), 0);
    // Midpoint dof averages the master endpoints.
    assert_eq!(
        p1.row(0).unwrap().terms(),
        &[(TrueDof::new(0, 0), 0.5), (TrueDof::new(0, 1), 0.5)]
    );
    // Coincident-endpoint dof collapses to the single master dof.
    assert_eq!(p1.row(1).unwrap().as_identity(), Some(TrueDof::new(0, 1)));
}

#[test]
fn rows_compose_across_three_ranks() {
    // Rank 1's only dof is a slave of rank 0's master edge A, and that same
    // dof sits on master edge B whose slave lives on rank 2. Rank 2's row
    // must come out as the composed weight 0.25 on rank 0's true dof, which
    // requires rank 1 to forward its finalized (non-identity) row.
    let edge_a = EntityId::new(20);
    let edge_b = EntityId::new(21);
    let slave_a = EntityId::new(22);
    let slave_b = EntityId::new(23);
    let results = run_ranks(3, move |rank, transport| {
        let (edges, neighbors) = match rank {
            0 => (
                vec![
                    SharedEntity::master(edge_a),
                    SharedEntity::slave(slave_a, 0),
                ],
                vec![1],
            ),
            1 => (
                vec![
                    SharedEntity::master(edge_a),
                    SharedEntity::slave(slave_a, 0),
                    SharedEntity::master(edge_b),
                    SharedEntity::slave(slave_b, 2),
                ],
                vec![0, 2],
            ),
            _ => (
                vec![
                    SharedEntity::master(edge_b),
                    SharedEntity::slave(slave_b, 0),
                ],
                vec![1],
            ),
        };
        let topo = MockTopology::new(edges, vec![], neighbors);
        let space = match rank {
            0 => MockDofSpace::new(1).with_entity_dofs(EntityKind::Edge, 0, vec![0]),
            1 => MockDofSpace::new(1)
                .with_entity_dofs(EntityKind::Edge, 1, vec![0])
                .with_entity_dofs(EntityKind::Edge, 2, vec![0])
                .with_interpolation(EntityKind::Edge, 1, vec![vec![(0, 0.5)]]),
            _ => MockDofSpace::new(1)
                .with_entity_dofs(EntityKind::Edge, 1, vec![0])
                .with_interpolation(EntityKind::Edge, 1, vec![vec![(0, 0.5)]]),
        };
        assemble(topo, space, &transport)
    });

    assert_eq!(results[0].n_true_dofs(), 1);
    assert_eq!(results[1].n_true_dofs(), 0);
    assert_eq!(results[2].n_true_dofs(), 0);

    let origin = TrueDof::new(0, 0);
    assert_eq!(results[0].row(0).unwrap().as_identity(), Some(origin));
    assert_eq!(results[1].row(0).unwrap().terms(), &[(origin, 0.5)]);
    assert_eq!(results[2].row(0).unwrap().terms(), &[(origin, 0.25)]);
}

#[test]
fn interior_dofs_stay_untouched() {
    // Dofs not on any shared entity remain true dofs with local identity
    // rows, interleaved with the dependent ones in announcement order.
    let edge = EntityId::new(7);
    let results = run_ranks(2, move |rank, transport| {
        let topo = MockTopology::new(
            vec![SharedEntity::conforming(edge)],
            vec![],
            vec![1 - rank],
        );
        // Dof 1 sits on the shared edge, dofs 0 and 2 are interior.
        let space = MockDofSpace::new(3).with_entity_dofs(EntityKind::Edge, 0, vec![1]);
        assemble(topo, space, &transport)
    });

    let p1 = &results[1];
    assert_eq!(p1.true_dofs(), &[0, 2]);
    assert_eq!(p1.row(0).unwrap().as_identity(), Some(TrueDof::new(1, 0)));
    assert_eq!(p1.row(2).unwrap().as_identity(), Some(TrueDof::new(1, 1)));
    // The shared dof maps onto rank 0's copy, which is that rank's second
    // true dof.
    assert_eq!(p1.row(1).unwrap().as_identity(), Some(TrueDof::new(0, 1)));
}

#[test]
fn zero_dof_shared_entities_still_complete() {
    // Lowest-order spaces have no edge-interior dofs. The owner still sends
    // its (empty) dictionary so the receive accounting stays symmetric, and
    // every local dof comes out true.
    let edge = EntityId::new(7);
    let results = run_ranks(2, move |rank, transport| {
        let topo = MockTopology::new(
            vec![SharedEntity::conforming(edge)],
            vec![],
            vec![1 - rank],
        );
        assemble(topo, MockDofSpace::new(2), &transport)
    });

    for (rank, p) in results.iter().enumerate() {
        assert_eq!(p.true_dofs(), &[0, 1]);
        assert_eq!(
            p.row(0).unwrap().as_identity(),
            Some(TrueDof::new(rank, 0))
        );
        assert_eq!(
            p.row(1).unwrap().as_identity(),
            Some(TrueDof::new(rank, 1))
        );
    }
}

#[test]
fn unneeded_rows_are_drained_within_the_pass() {
    // Rank 1 announces both dofs of master edge B to rank 2, but rank 2's
    // interpolation uses only the first. On rank 1 the two rows finalize in
    // different sweeps (dof 0 immediately, dof 1 only after rank 0's row
    // arrives), so they leave in separate batches and the second batch
    // carries nothing rank 2 depends on. It must still be consumed before
    // the pass returns: a marker sent right after the pass has to be the
    // next message rank 2 sees on the row channel.
    let edge_a = EntityId::new(1);
    let slave_a = EntityId::new(2);
    let edge_b = EntityId::new(3);
    let slave_b = EntityId::new(4);
    let results = run_ranks(3, move |rank, transport| {
        let (edges, neighbors) = match rank {
            0 => (
                vec![
                    SharedEntity::master(edge_a),
                    SharedEntity::slave(slave_a, 0),
                ],
                vec![1],
            ),
            1 => (
                vec![
                    SharedEntity::master(edge_a),
                    SharedEntity::slave(slave_a, 0),
                    SharedEntity::master(edge_b),
                    SharedEntity::slave(slave_b, 2),
                ],
                vec![0, 2],
            ),
            _ => (
                vec![
                    SharedEntity::master(edge_b),
                    SharedEntity::slave(slave_b, 0),
                ],
                vec![1],
            ),
        };
        let topo = MockTopology::new(edges, vec![], neighbors);
        let space = match rank {
            0 => MockDofSpace::new(1).with_entity_dofs(EntityKind::Edge, 0, vec![0]),
            1 => MockDofSpace::new(2)
                .with_entity_dofs(EntityKind::Edge, 1, vec![1])
                .with_interpolation(EntityKind::Edge, 1, vec![vec![(0, 0.5)]])
                .with_entity_dofs(EntityKind::Edge, 2, vec![0, 1]),
            _ => MockDofSpace::new(1)
                .with_entity_dofs(EntityKind::Edge, 1, vec![0])
                .with_interpolation(EntityKind::Edge, 1, vec![vec![(0, 0.5)]]),
        };
        let pmat = assemble(topo, space, &transport);

        let marker = match rank {
            1 => {
                let mut msg = NeighborRowMessage::default();
                msg.add_row(99, Row::identity(TrueDof::new(1, 7)));
                msg.send(&transport, 2).unwrap().wait().unwrap();
                None
            }
            2 => Some(NeighborRowMessage::recv_any(&transport).unwrap()),
            _ => None,
        };
        (pmat, marker)
    });

    // The constructions themselves are correct.
    assert_eq!(results[1].0.true_dofs(), &[0]);
    assert_eq!(
        results[1].0.row(1).unwrap().terms(),
        &[(TrueDof::new(0, 0), 0.5)]
    );
    assert_eq!(
        results[2].0.row(0).unwrap().terms(),
        &[(TrueDof::new(1, 0), 0.5)]
    );

    // And the first row-channel message after the pass is the marker, not a
    // leftover batch from it.
    let (src, marker) = results[2].1.as_ref().unwrap();
    assert_eq!(*src, 1);
    assert_eq!(marker.len(), 1);
    assert_eq!(
        marker.rows().next().map(|(dof, row)| (dof, row.as_identity())),
        Some((99, Some(TrueDof::new(1, 7))))
    );
}
