//! Arena-backed refinement forest.
//!
//! The refinement hierarchy is stored as an arena of nodes addressed by
//! stable [`NodeId`] indices, with parent/child relationships kept as index
//! pairs and a fixed ordered array of roots. [`ElementSet`](crate::topology::
//! element_set::ElementSet) encoding navigates purely by child position from
//! the roots, so two ranks that applied the same refinement operations to the
//! same root array can exchange node subsets even though their arena indices
//! differ.

use std::fmt;

/// Stable handle of a node in an [`ElementArena`].
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[derive(serde::Serialize, serde::Deserialize)]
#[repr(transparent)]
pub struct NodeId(u32);

impl NodeId {
    #[inline]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NodeId").field(&self.0).finish()
    }
}

#[derive(Clone, Debug)]
struct TreeNode {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Refinement forest over a fixed ordered root array.
#[derive(Clone, Debug, Default)]
pub struct ElementArena {
    nodes: Vec<TreeNode>,
    roots: Vec<NodeId>,
}

impl ElementArena {
    /// Create an empty forest with `n_roots` root elements.
    pub fn with_roots(n_roots: usize) -> Self {
        let mut arena = ElementArena::default();
        for _ in 0..n_roots {
            let id = arena.push_node(None);
            arena.roots.push(id);
        }
        arena
    }

    fn push_node(&mut self, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(TreeNode {
            parent,
            children: Vec::new(),
        });
        id
    }

    /// The fixed root array the encoding is relative to.
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Refine `node` into `n_children` children, appended in order.
    ///
    /// Refinement order must match on every rank holding a compatible tree;
    /// child position is the only cross-rank-stable address.
    pub fn refine(&mut self, node: NodeId, n_children: usize) -> Vec<NodeId> {
        debug_assert!(
            self.nodes[node.0 as usize].children.is_empty(),
            "node already refined"
        );
        let children: Vec<NodeId> = (0..n_children).map(|_| self.push_node(Some(node))).collect();
        self.nodes[node.0 as usize].children = children.clone();
        children
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.0 as usize].parent
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node.0 as usize].children
    }

    pub fn is_leaf(&self, node: NodeId) -> bool {
        self.children(node).is_empty()
    }

    /// All leaves, in pre-order from the root array.
    pub fn leaves(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.roots.iter().rev().copied().collect();
        while let Some(node) = stack.pop() {
            let children = self.children(node);
            if children.is_empty() {
                out.push(node);
            } else {
                stack.extend(children.iter().rev());
            }
        }
        out
    }
}
