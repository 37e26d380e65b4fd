//! Ownership and sharing relationships between partitions.

pub mod boundary;
pub mod groups;

pub use boundary::SharedBoundary;
pub use groups::{GroupTable, IndexRank, exchange_shared_ranks};
