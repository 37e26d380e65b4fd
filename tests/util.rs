//! Shared helpers for multi-rank integration tests: mock mesh/FE-space
//! collaborators and a thread-per-rank harness over the in-process transport.
#![allow(dead_code)]

use parnc::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;
use std::thread;

/// Fixed shared lists + neighbor set standing in for the mesh collaborator.
pub struct MockTopology {
    edges: SharedList,
    faces: SharedList,
    neighbors: Vec<usize>,
}

impl MockTopology {
    pub fn new(
        edges: Vec<SharedEntity>,
        faces: Vec<SharedEntity>,
        neighbors: Vec<usize>,
    ) -> Self {
        MockTopology {
            edges: SharedList::new(edges),
            faces: SharedList::new(faces),
            neighbors,
        }
    }
}

impl MeshTopology for MockTopology {
    fn shared_edges(&self) -> &SharedList {
        &self.edges
    }
    fn shared_faces(&self) -> &SharedList {
        &self.faces
    }
    fn neighbor_ranks(&self) -> &[usize] {
        &self.neighbors
    }
}

/// Table-driven stand-in for the FE-space collaborator.
#[derive(Clone, Default)]
pub struct MockDofSpace {
    n_dofs: usize,
    entity_dofs: HashMap<(EntityKind, u32), Vec<DofId>>,
    interpolation: HashMap<(EntityKind, u32), Vec<Vec<(usize, f64)>>>,
}

impl MockDofSpace {
    pub fn new(n_dofs: usize) -> Self {
        MockDofSpace {
            n_dofs,
            ..Default::default()
        }
    }

    pub fn with_entity_dofs(mut self, kind: EntityKind, index: u32, dofs: Vec<DofId>) -> Self {
        self.entity_dofs.insert((kind, index), dofs);
        self
    }

    pub fn with_interpolation(
        mut self,
        kind: EntityKind,
        index: u32,
        rows: Vec<Vec<(usize, f64)>>,
    ) -> Self {
        self.interpolation.insert((kind, index), rows);
        self
    }
}

impl DofSpace for MockDofSpace {
    fn n_dofs(&self) -> usize {
        self.n_dofs
    }

    fn entity_dofs(&self, kind: EntityKind, index: u32) -> Vec<DofId> {
        self.entity_dofs
            .get(&(kind, index))
            .cloned()
            .unwrap_or_default()
    }

    fn slave_interpolation(&self, kind: EntityKind, index: u32) -> SlaveInterpolation {
        SlaveInterpolation::new(
            self.interpolation
                .get(&(kind, index))
                .cloned()
                .unwrap_or_default(),
        )
    }
}

/// Run `body(rank, endpoint)` on one thread per rank and collect the results
/// in rank order.
pub fn run_ranks<R, F>(n_ranks: usize, body: F) -> Vec<R>
where
    R: Send + 'static,
    F: Fn(usize, LocalTransport) -> R + Send + Sync + 'static,
{
    let cluster = LocalCluster::new(n_ranks);
    let body = Arc::new(body);
    let handles: Vec<_> = (0..n_ranks)
        .map(|rank| {
            let transport = cluster.endpoint(rank);
            let body = Arc::clone(&body);
            thread::spawn(move || body(rank, transport))
        })
        .collect();
    handles
        .into_iter()
        .map(|h| h.join().expect("rank thread panicked"))
        .collect()
}
