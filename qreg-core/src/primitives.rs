//! Gate-like primitives -- Hadamard, QFT, phase, and CNOT -- each acting
//! in place on whichever branches the active control guards select.

use num_complex::Complex64;
use std::collections::HashSet;
use std::f64::consts::PI;

use crate::branch::RegisterId;
use crate::error::{QregResult, UsageError};
use crate::expr::Expression;
use crate::sm_int::SignedInt;
use crate::store::BranchStore;

/// Hadamard on bit `idx` of `target`: splits each controlled branch into
/// the two settings of that bit, each scaled by `1/sqrt(2)`, with a sign
/// flip on the branch where the bit was already set.
pub fn had(store: &mut BranchStore, controls: &[Expression], target: RegisterId, idx: &Expression) -> QregResult<()> {
    let controlled: HashSet<usize> = store.controlled_indices(controls)?.into_iter().collect();
    let scale = Complex64::new(std::f64::consts::FRAC_1_SQRT_2, 0.0);

    let mut out = Vec::with_capacity(store.len() * 2);
    for (i, branch) in store.branches().iter().enumerate() {
        if !controlled.contains(&i) {
            out.push(branch.clone());
            continue;
        }
        let bit_idx = idx.eval(branch)?.as_int().to_i128() as i64;
        let was_set = branch.get(target).bit(bit_idx);

        let mut unset = branch.clone();
        unset.set(target, branch.get(target).with_bit(bit_idx, false));
        unset.amplitude *= scale;

        let mut set = branch.clone();
        set.set(target, branch.get(target).with_bit(bit_idx, true));
        set.amplitude *= scale;
        if was_set {
            set.amplitude = -set.amplitude;
        }

        out.push(unset);
        out.push(set);
    }
    store.set_branches(out);
    store.prune()
}

/// Quantum Fourier transform of `target` modulo `modulus`, holding the
/// part of the value above the modulus fixed.
pub fn qft(
    store: &mut BranchStore,
    controls: &[Expression],
    target: RegisterId,
    modulus: &Expression,
    inverse: bool,
) -> QregResult<()> {
    let controlled: HashSet<usize> = store.controlled_indices(controls)?.into_iter().collect();
    let mut out = Vec::new();
    for (i, branch) in store.branches().iter().enumerate() {
        if !controlled.contains(&i) {
            out.push(branch.clone());
            continue;
        }
        let d = modulus.eval(branch)?.as_int().to_i128();
        if d <= 1 {
            return Err(UsageError::QftModulusInvalid.into());
        }
        let current = branch.get(target).to_i128();
        let base = current - current.rem_euclid(d);
        let scale = 1.0 / (d as f64).sqrt();
        let sign = branch.get(target).sign();
        let direction = if inverse { -1.0 } else { 1.0 };

        for i_val in 0..d {
            let mut nb = branch.clone();
            let theta = direction * (current as f64) * (i_val as f64) * 2.0 * PI / (d as f64);
            nb.amplitude *= Complex64::new(scale * theta.cos(), scale * theta.sin());
            let mag = (i_val + base).unsigned_abs() as u64;
            nb.set(target, SignedInt::new(sign, mag));
            out.push(nb);
        }
    }
    store.set_branches(out);
    store.prune()
}

/// Multiplies every controlled branch's amplitude by `e^{i theta}`.
pub fn phase(store: &mut BranchStore, controls: &[Expression], theta: &Expression) -> QregResult<()> {
    let controlled = store.controlled_indices(controls)?;
    let mut branches = store.branches().to_vec();
    for &i in &controlled {
        let t = theta.eval(&branches[i])?.as_f64();
        branches[i].amplitude *= Complex64::new(t.cos(), t.sin());
    }
    store.set_branches(branches);
    Ok(())
}

/// Flips bit `idx2` of `target` whenever bit `idx1` is set.
pub fn cnot(store: &mut BranchStore, controls: &[Expression], target: RegisterId, idx1: &Expression, idx2: &Expression) -> QregResult<()> {
    let controlled = store.controlled_indices(controls)?;
    let mut branches = store.branches().to_vec();
    for &i in &controlled {
        let v1 = idx1.eval(&branches[i])?.as_int().to_i128() as i64;
        let v2 = idx2.eval(&branches[i])?.as_int().to_i128() as i64;
        if v1 == v2 {
            return Err(UsageError::CnotSameIndex.into());
        }
        if branches[i].get(target).bit(v1) {
            let flipped = !branches[i].get(target).bit(v2);
            let v = branches[i].get(target).with_bit(v2, flipped);
            branches[i].set(target, v);
        }
    }
    store.set_branches(branches);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hadamard_on_zero_gives_uniform_superposition() {
        let mut store = BranchStore::new(1e-10);
        let id = store.alloc();
        had(&mut store, &[], id, &Expression::int(0)).unwrap();
        assert_eq!(store.len(), 2);
        for b in store.branches() {
            assert!((b.amplitude.norm() - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-9);
        }
    }

    #[test]
    fn double_hadamard_is_identity() {
        let mut store = BranchStore::new(1e-10);
        let id = store.alloc();
        had(&mut store, &[], id, &Expression::int(0)).unwrap();
        had(&mut store, &[], id, &Expression::int(0)).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.branches()[0].get(id), SignedInt::ZERO);
    }

    #[test]
    fn qft_rejects_modulus_of_one() {
        let mut store = BranchStore::new(1e-10);
        let id = store.alloc();
        assert!(qft(&mut store, &[], id, &Expression::int(1), false).is_err());
    }

    #[test]
    fn cnot_rejects_identical_indices() {
        let mut store = BranchStore::new(1e-10);
        let id = store.alloc();
        assert!(cnot(&mut store, &[], id, &Expression::int(0), &Expression::int(0)).is_err());
    }
}
