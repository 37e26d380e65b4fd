//! Distributed P-matrix construction: dependency discovery and row
//! finalization over the shared boundary.

pub mod builder;
pub mod dependency;
pub mod rows;

pub use builder::build_pmatrix;
pub use dependency::{DepList, Dependency, DofSpace, SlaveInterpolation};
pub use rows::{PMatrix, Row, TrueDof};
