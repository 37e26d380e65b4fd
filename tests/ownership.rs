//! Ownership and group-table scenarios across simulated rank partitions.

mod util;

use parnc::prelude::*;
use proptest::prelude::*;
use util::{MockTopology, run_ranks};

fn conforming_edges(ids: &[u64]) -> Vec<SharedEntity> {
    ids.iter()
        .map(|&id| SharedEntity::conforming(EntityId::new(id)))
        .collect()
}

#[test]
fn two_rank_shared_edge_owner_and_group() {
    // Both ranks report eight shared edges; edge index 7 must come out owned
    // by rank 0 with group {0, 1} on both sides.
    let results = run_ranks(2, |rank, transport| {
        let ids: Vec<u64> = (100..108).collect();
        let topo = MockTopology::new(conforming_edges(&ids), vec![], vec![1 - rank]);
        let boundary = SharedBoundary::on_mesh_updated(&topo, &transport).unwrap();
        (
            boundary.edge_owner(7).unwrap(),
            boundary.edge_group(7).unwrap().to_vec(),
        )
    });
    for (owner, group) in results {
        assert_eq!(owner, 0);
        assert_eq!(group, vec![0, 1]);
    }
}

#[test]
fn three_rank_groups_are_symmetric() {
    // Edge A shared by {0,1}, B by {1,2}, C by everyone.
    const A: u64 = 1;
    const B: u64 = 2;
    const C: u64 = 3;
    let results = run_ranks(3, |rank, transport| {
        let (ids, neighbors): (Vec<u64>, Vec<usize>) = match rank {
            0 => (vec![A, C], vec![1, 2]),
            1 => (vec![A, B, C], vec![0, 2]),
            _ => (vec![B, C], vec![0, 1]),
        };
        let topo = MockTopology::new(conforming_edges(&ids), vec![], neighbors);
        let boundary = SharedBoundary::on_mesh_updated(&topo, &transport).unwrap();
        ids.iter()
            .enumerate()
            .map(|(i, &id)| {
                (
                    id,
                    boundary.edge_owner(i as u32).unwrap(),
                    boundary.edge_group(i as u32).unwrap().to_vec(),
                )
            })
            .collect::<Vec<_>>()
    });

    for per_rank in &results {
        for (id, owner, group) in per_rank {
            match *id {
                A => {
                    assert_eq!(*owner, 0);
                    assert_eq!(group, &vec![0, 1]);
                }
                B => {
                    assert_eq!(*owner, 1);
                    assert_eq!(group, &vec![1, 2]);
                }
                C => {
                    assert_eq!(*owner, 0);
                    assert_eq!(group, &vec![0, 1, 2]);
                }
                _ => unreachable!(),
            }
        }
    }
}

#[test]
fn faces_and_edges_use_separate_tables() {
    let results = run_ranks(2, |rank, transport| {
        // Same id on an edge and a face; they must not interfere.
        let edges = conforming_edges(&[9]);
        let faces = vec![SharedEntity::conforming(EntityId::new(9))];
        let topo = MockTopology::new(edges, faces, vec![1 - rank]);
        let boundary = SharedBoundary::on_mesh_updated(&topo, &transport).unwrap();
        (
            boundary.owner(EntityKind::Edge, 0).unwrap(),
            boundary.owner(EntityKind::Face, 0).unwrap(),
            boundary.group(EntityKind::Face, 0).unwrap().to_vec(),
        )
    });
    for (edge_owner, face_owner, face_group) in results {
        assert_eq!(edge_owner, 0);
        assert_eq!(face_owner, 0);
        assert_eq!(face_group, vec![0, 1]);
    }
}

#[test]
fn entity_shared_by_one_rank_is_fatal() {
    // Rank 0 reports an edge rank 1 does not know about.
    let results = run_ranks(2, |rank, transport| {
        let ids: Vec<u64> = if rank == 0 { vec![1, 99] } else { vec![1] };
        let topo = MockTopology::new(conforming_edges(&ids), vec![], vec![1 - rank]);
        SharedBoundary::on_mesh_updated(&topo, &transport).map(|_| ())
    });
    assert!(matches!(
        results[0],
        Err(ParNcError::EntityNotShared {
            kind: EntityKind::Edge,
            index: 1,
            ..
        })
    ));
    assert!(results[1].is_ok());
}

proptest! {
    /// The same multiset of (index, rank) pairs yields the same tables no
    /// matter in which order the pairs were collected.
    #[test]
    fn owner_independent_of_arrival_order(
        groups in prop::collection::vec(prop::collection::btree_set(0usize..8, 2..5), 1..6),
        rotation in 0usize..32,
    ) {
        let pairs: Vec<IndexRank> = groups
            .iter()
            .enumerate()
            .flat_map(|(index, ranks)| {
                ranks.iter().map(move |&rank| IndexRank::new(index as u32, rank))
            })
            .collect();

        let mut reordered = pairs.clone();
        reordered.reverse();
        reordered.rotate_left(rotation % pairs.len().max(1));

        let reference =
            GroupTable::build(EntityKind::Edge, groups.len(), pairs, 0).unwrap();
        let shuffled =
            GroupTable::build(EntityKind::Edge, groups.len(), reordered, 0).unwrap();
        prop_assert_eq!(&reference, &shuffled);

        for (index, ranks) in groups.iter().enumerate() {
            let index = index as u32;
            prop_assert_eq!(
                reference.owner(index).unwrap(),
                *ranks.iter().min().unwrap()
            );
            let expect: Vec<usize> = ranks.iter().copied().collect();
            prop_assert_eq!(reference.group(index).unwrap(), &expect[..]);
        }
    }
}
