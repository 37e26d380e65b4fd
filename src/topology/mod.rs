//! Shared-entity model and tree-relative element addressing.

pub mod element_set;
pub mod entity;
pub mod tree;

pub use element_set::ElementSet;
pub use entity::{EntityId, EntityKind, EntityRole, MeshTopology, SharedEntity, SharedList};
pub use tree::{ElementArena, NodeId};
