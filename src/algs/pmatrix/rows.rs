//! Sparse P-matrix rows over global true-dof references.

use crate::algs::dof_exchange::DofId;
use smallvec::SmallVec;
use std::collections::BTreeMap;

/// Global reference to a true (independent) dof: the rank whose P-matrix
/// column it is, plus its ordinal among that rank's true dofs. Contiguous
/// global numbering is an offset scan owned by the downstream FE space.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct TrueDof {
    pub rank: u32,
    pub ordinal: u32,
}

impl TrueDof {
    pub fn new(rank: usize, ordinal: u32) -> Self {
        TrueDof {
            rank: rank as u32,
            ordinal,
        }
    }
}

/// One finalized P-matrix row: a coefficient-weighted combination of true
/// dofs. Rows are kept sorted by true-dof key with like terms merged, so
/// equality is structural.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Row {
    terms: SmallVec<[(TrueDof, f64); 4]>,
}

impl Row {
    /// The identity row of a true dof.
    pub fn identity(dof: TrueDof) -> Self {
        Row {
            terms: SmallVec::from_slice(&[(dof, 1.0)]),
        }
    }

    /// Build a normalized row from arbitrary terms (merges duplicates, drops
    /// exact zeros, sorts by key).
    pub fn from_terms(terms: impl IntoIterator<Item = (TrueDof, f64)>) -> Self {
        let mut acc: BTreeMap<TrueDof, f64> = BTreeMap::new();
        for (key, coef) in terms {
            *acc.entry(key).or_insert(0.0) += coef;
        }
        Row {
            terms: acc.into_iter().filter(|(_, c)| *c != 0.0).collect(),
        }
    }

    pub fn terms(&self) -> &[(TrueDof, f64)] {
        &self.terms
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// `true` iff this row is exactly `1.0 *` a single true dof.
    pub fn as_identity(&self) -> Option<TrueDof> {
        match self.terms.as_slice() {
            [(dof, coef)] if *coef == 1.0 => Some(*dof),
            _ => None,
        }
    }

    /// Accumulate `coef * self` into a term map.
    pub fn accumulate_into(&self, coef: f64, acc: &mut BTreeMap<TrueDof, f64>) {
        for (key, weight) in &self.terms {
            *acc.entry(*key).or_insert(0.0) += coef * weight;
        }
    }
}

/// Finalized classification of every local dof.
///
/// A local dof is either a true dof (one column of the matrix, identity row)
/// or dependent, with its row a weighted combination of true dofs possibly
/// owned by several ranks.
#[derive(Clone, Debug)]
pub struct PMatrix {
    rank: usize,
    rows: Vec<Row>,
    true_dofs: Vec<DofId>,
    true_ordinals: Vec<Option<u32>>,
}

impl PMatrix {
    pub(crate) fn new(
        rank: usize,
        rows: Vec<Row>,
        true_dofs: Vec<DofId>,
        true_ordinals: Vec<Option<u32>>,
    ) -> Self {
        PMatrix {
            rank,
            rows,
            true_dofs,
            true_ordinals,
        }
    }

    /// Rank whose local dofs these rows describe.
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Number of local dofs (rows).
    pub fn n_dofs(&self) -> usize {
        self.rows.len()
    }

    /// Number of local true dofs (locally owned columns).
    pub fn n_true_dofs(&self) -> usize {
        self.true_dofs.len()
    }

    /// Local dof ids that are true dofs, in ordinal order.
    pub fn true_dofs(&self) -> &[DofId] {
        &self.true_dofs
    }

    /// This dof's true ordinal, if it is a true dof.
    pub fn true_ordinal(&self, dof: DofId) -> Option<u32> {
        self.true_ordinals.get(dof as usize).copied().flatten()
    }

    /// The finalized row of a local dof, `None` if `dof` is out of range.
    pub fn row(&self, dof: DofId) -> Option<&Row> {
        self.rows.get(dof as usize)
    }

    pub fn rows(&self) -> impl Iterator<Item = (DofId, &Row)> {
        self.rows.iter().enumerate().map(|(i, r)| (i as DofId, r))
    }
}
