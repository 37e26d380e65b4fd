//! Per-dof dependency lists and the FE-space capability interface.

use crate::algs::dof_exchange::DofId;
use crate::topology::entity::EntityKind;
use smallvec::SmallVec;

/// One dependency entry: the dependent dof interpolates from dof `dof` local
/// to rank `rank`, weighted by `coef`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Dependency {
    pub rank: usize,
    pub dof: DofId,
    pub coef: f64,
}

impl Dependency {
    pub fn new(rank: usize, dof: DofId, coef: f64) -> Self {
        Dependency { rank, dof, coef }
    }

    /// Unit-coefficient dependency of a conforming one-to-one match.
    pub fn one_to_one(rank: usize, dof: DofId) -> Self {
        Dependency::new(rank, dof, 1.0)
    }
}

/// Dependency list of a single local dof.
///
/// An independent dof has no entries and becomes a true dof. A one-to-one
/// entry comes from a conforming boundary match and can be overruled by
/// non-conforming constraints discovered later; constrained entries are
/// final.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum DepList {
    #[default]
    Independent,
    OneToOne(Dependency),
    Constrained(SmallVec<[Dependency; 4]>),
}

impl DepList {
    /// Record a conforming one-to-one match. Never downgrades an existing
    /// non-conforming constraint.
    pub fn set_one_to_one(&mut self, dep: Dependency) {
        if matches!(self, DepList::Independent) {
            *self = DepList::OneToOne(dep);
        }
    }

    /// Record non-conforming constraint terms, overruling any one-to-one
    /// entry. Empty term lists are ignored (an unconstrained dof stays
    /// independent).
    pub fn set_constrained(&mut self, deps: SmallVec<[Dependency; 4]>) {
        if !deps.is_empty() {
            *self = DepList::Constrained(deps);
        }
    }

    pub fn is_independent(&self) -> bool {
        matches!(self, DepList::Independent)
    }

    pub fn entries(&self) -> &[Dependency] {
        match self {
            DepList::Independent => &[],
            DepList::OneToOne(dep) => std::slice::from_ref(dep),
            DepList::Constrained(deps) => deps,
        }
    }
}

/// Interpolation of one slave entity's dofs from its master entity's dofs:
/// `rows[i]` lists `(master dof position, coefficient)` terms for the i-th
/// slave dof.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SlaveInterpolation {
    pub rows: Vec<Vec<(usize, f64)>>,
}

impl SlaveInterpolation {
    pub fn new(rows: Vec<Vec<(usize, f64)>>) -> Self {
        SlaveInterpolation { rows }
    }
}

/// Capability interface onto the FE-space collaborator: local dof
/// enumeration per shared entity and slave→master interpolation weights.
/// Geometry/orientation lookups stay behind this trait as explicit read-only
/// configuration of the dependency-discovery step.
pub trait DofSpace {
    /// Total number of local dofs on this rank.
    fn n_dofs(&self) -> usize;

    /// Ordered dofs of the shared entity at `index` of the given kind.
    fn entity_dofs(&self, kind: EntityKind, index: u32) -> Vec<DofId>;

    /// Interpolation weights for a slave entity, aligned with
    /// `entity_dofs(kind, slave)` on the slave side and with the master
    /// entity's dof order on the master side.
    fn slave_interpolation(&self, kind: EntityKind, slave: u32) -> SlaveInterpolation;
}
