//! The branch store: an explicit sum-of-configurations representation of
//! the simulated state, and the invariants that keep it a valid unit
//! vector (normalization, schema uniformity, pruning).

use num_complex::Complex64;
use std::collections::HashMap;

use crate::branch::{Branch, RegisterId};
use crate::error::{NumericalError, QregResult, ReversibilityError};
use crate::expr::Expression;
use crate::sm_int::SignedInt;

pub const DEFAULT_EPSILON: f64 = 1e-10;

#[derive(Debug, Clone)]
pub struct BranchStore {
    branches: Vec<Branch>,
    next_id: u64,
    epsilon: f64,
}

impl BranchStore {
    pub fn new(epsilon: f64) -> Self {
        Self {
            branches: vec![Branch::empty(Complex64::new(1.0, 0.0))],
            next_id: 0,
            epsilon,
        }
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    pub fn branches(&self) -> &[Branch] {
        &self.branches
    }

    pub fn len(&self) -> usize {
        self.branches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }

    /// Replace the branch vector wholesale -- the usual shape for a
    /// primitive: read `branches()`, compute a new vector, write it back.
    pub fn set_branches(&mut self, branches: Vec<Branch>) {
        self.branches = branches;
    }

    /// Indices of branches on which every guard evaluates non-zero.
    pub fn controlled_indices(&self, guards: &[Expression]) -> QregResult<Vec<usize>> {
        let mut out = Vec::with_capacity(self.branches.len());
        'branch: for (i, b) in self.branches.iter().enumerate() {
            for g in guards {
                if !g.eval(b)?.is_truthy() {
                    continue 'branch;
                }
            }
            out.push(i);
        }
        Ok(out)
    }

    /// Allocates a fresh register id and creates its (zeroed) column in
    /// every branch, independent of any active controls, so the schema
    /// stays uniform.
    pub fn alloc(&mut self) -> RegisterId {
        let id = RegisterId(self.next_id);
        self.next_id += 1;
        for b in &mut self.branches {
            b.set(id, SignedInt::ZERO);
        }
        id
    }

    /// Deallocates a register. The zero-check runs only over
    /// `controlled_indices`; the column is removed from every branch.
    pub fn dealloc(&mut self, id: RegisterId, controlled: &[usize]) -> QregResult<()> {
        for &i in controlled {
            if self.branches[i].get(id) != SignedInt::ZERO {
                return Err(ReversibilityError::DeallocateNonZero.into());
            }
        }
        for b in &mut self.branches {
            b.remove(id);
        }
        Ok(())
    }

    /// Merge configuration-equal branches (summing amplitudes), drop
    /// amplitudes at or below epsilon, then renormalize so the total
    /// probability is exactly 1.
    pub fn prune(&mut self) -> QregResult<()> {
        let mut merged: Vec<Branch> = Vec::with_capacity(self.branches.len());
        'outer: for b in self.branches.drain(..) {
            for m in merged.iter_mut() {
                if m.same_configuration(&b) {
                    m.amplitude += b.amplitude;
                    continue 'outer;
                }
            }
            merged.push(b);
        }
        merged.retain(|b| b.amplitude.norm() > self.epsilon);

        let total: f64 = merged.iter().map(|b| b.amplitude.norm_sqr()).sum();
        if merged.is_empty() || total <= 0.0 {
            return Err(NumericalError::EmptyStore.into());
        }
        let scale = total.sqrt();
        for b in &mut merged {
            b.amplitude /= scale;
        }

        self.branches = merged;
        Ok(())
    }

    /// Sum of |amp|^2 across all branches -- should stay within
    /// tolerance of 1 after every `prune()`.
    pub fn total_probability(&self) -> f64 {
        self.branches.iter().map(|b| b.amplitude.norm_sqr()).sum()
    }

    /// Every branch shares the same register id set (a crude but cheap
    /// self-check used by tests and assertions, not the hot path).
    pub fn schema_uniform(&self) -> bool {
        let Some(first) = self.branches.first() else { return true };
        let ids: Vec<_> = first.register_ids().copied().collect();
        self.branches
            .iter()
            .all(|b| b.register_ids().copied().collect::<Vec<_>>() == ids)
    }

    /// Groups branch indices by the tuple of values the given
    /// expressions take on each branch -- used by dictionary-form init
    /// and distribution/measurement.
    pub fn group_by(&self, exprs: &[Expression]) -> QregResult<HashMap<Vec<i128>, Vec<usize>>> {
        let mut groups: HashMap<Vec<i128>, Vec<usize>> = HashMap::new();
        for (i, b) in self.branches.iter().enumerate() {
            let mut key = Vec::with_capacity(exprs.len());
            for e in exprs {
                key.push(e.eval(b)?.as_int().to_i128());
            }
            groups.entry(key).or_default().push(i);
        }
        Ok(groups)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_store_is_normalized_single_branch() {
        let store = BranchStore::new(DEFAULT_EPSILON);
        assert_eq!(store.len(), 1);
        assert!((store.total_probability() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn alloc_adds_zeroed_column_everywhere() {
        let mut store = BranchStore::new(DEFAULT_EPSILON);
        store.set_branches(vec![
            Branch::empty(Complex64::new(0.6, 0.0)),
            Branch::empty(Complex64::new(0.8, 0.0)),
        ]);
        let id = store.alloc();
        assert!(store.branches().iter().all(|b| b.get(id) == SignedInt::ZERO));
    }

    #[test]
    fn prune_merges_equal_configurations_and_renormalizes() {
        let mut store = BranchStore::new(DEFAULT_EPSILON);
        let id = store.alloc();
        let mut b1 = Branch::empty(Complex64::new(0.6, 0.0));
        b1.set(id, SignedInt::from(1));
        let mut b2 = Branch::empty(Complex64::new(0.6, 0.0));
        b2.set(id, SignedInt::from(1));
        let mut b3 = Branch::empty(Complex64::new(0.1, 0.0));
        b3.set(id, SignedInt::from(2));
        store.set_branches(vec![b1, b2, b3]);
        store.prune().unwrap();
        assert_eq!(store.len(), 2);
        assert!((store.total_probability() - 1.0).abs() < 1e-8);
    }

    #[test]
    fn prune_drops_below_threshold_amplitudes() {
        let mut store = BranchStore::new(DEFAULT_EPSILON);
        store.set_branches(vec![
            Branch::empty(Complex64::new(0.9999999999, 0.0)),
            Branch::empty(Complex64::new(1e-12, 0.0)),
        ]);
        store.prune().unwrap();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn dealloc_rejects_nonzero_column() {
        let mut store = BranchStore::new(DEFAULT_EPSILON);
        let id = store.alloc();
        store.branches[0].set(id, SignedInt::from(1));
        let all: Vec<usize> = (0..store.len()).collect();
        assert!(store.dealloc(id, &all).is_err());
    }
}
