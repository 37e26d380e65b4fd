//! Communication layer and distributed algorithms.

pub mod dof_exchange;
pub mod pmatrix;
pub mod row_exchange;
pub mod transport;
pub mod wire;
