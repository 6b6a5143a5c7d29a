//! Initialization and uninitialization of a register in the three forms
//! a target value can take: a plain expression, a uniform superposition
//! over a list of literals, or a QRAM-style weighted superposition from
//! a value table. Uninit is init run backwards with a guess to verify.
//!
//! Neither form requires the target to already read zero: `init_expr`
//! rotates whatever value is already there into place via a cyclic
//! permutation, and `init_dict`/`init_list` apply their completed
//! unitary to whichever domain position the target currently occupies.

use num_complex::Complex64;
use std::collections::{HashMap, HashSet};

use crate::branch::{Branch, RegisterId};
use crate::error::{NumericalError, QregResult, ReversibilityError};
use crate::expr::Expression;
use crate::sm_int::SignedInt;
use crate::store::BranchStore;

/// `target` rotates by the cyclic permutation (0, v, other existing
/// values in sorted order): 0 maps to v, v maps to the next entry, and
/// so on back around to 0. A target that was already 0 ends up at v;
/// one unrelated to both just advances one step. `v == 0` collapses the
/// cycle to the identity, matching "assigning zero to zero".
pub fn init_expr(store: &mut BranchStore, controls: &[Expression], target: RegisterId, value: &Expression) -> QregResult<()> {
    cyclic_step(store, controls, target, value, false)
}

/// Runs the expression-form cycle backwards.
pub fn uninit_expr(store: &mut BranchStore, controls: &[Expression], target: RegisterId, value: &Expression) -> QregResult<()> {
    cyclic_step(store, controls, target, value, true)
}

fn cyclic_step(
    store: &mut BranchStore,
    controls: &[Expression],
    target: RegisterId,
    value: &Expression,
    backward: bool,
) -> QregResult<()> {
    let controlled: HashSet<usize> = store.controlled_indices(controls)?.into_iter().collect();
    let mut branches = store.branches().to_vec();

    // "Other existing values" is fixed once per call, from the
    // controlled branches' state before any of them move.
    let mut existing: Vec<i128> = branches
        .iter()
        .enumerate()
        .filter(|(i, _)| controlled.contains(i))
        .map(|(_, b)| b.get(target).to_i128())
        .collect();
    existing.sort_unstable();
    existing.dedup();

    for (i, branch) in branches.iter_mut().enumerate() {
        if !controlled.contains(&i) {
            continue;
        }
        let v = value.eval(branch)?.as_int().to_i128();
        let h = branch.get(target).to_i128();

        let mut cycle = vec![0i128];
        if v != 0 {
            cycle.push(v);
        }
        for x in &existing {
            if *x != 0 && *x != v {
                cycle.push(*x);
            }
        }

        let pos = match cycle.iter().position(|x| *x == h) {
            Some(p) => p,
            None => {
                cycle.push(h);
                cycle.len() - 1
            }
        };
        let len = cycle.len();
        let new_pos = if backward { (pos + len - 1) % len } else { (pos + 1) % len };
        branch.set(target, SignedInt::from_i128(cycle[new_pos]));
    }
    store.set_branches(branches);
    Ok(())
}

pub fn init_list(store: &mut BranchStore, controls: &[Expression], target: RegisterId, values: &[i128]) -> QregResult<()> {
    let table: Vec<(i128, Expression)> = values.iter().map(|v| (*v, Expression::int(1))).collect();
    init_dict(store, controls, target, &table)
}

pub fn uninit_list(store: &mut BranchStore, controls: &[Expression], target: RegisterId, values: &[i128]) -> QregResult<()> {
    let table: Vec<(i128, Expression)> = values.iter().map(|v| (*v, Expression::int(1))).collect();
    uninit_dict(store, controls, target, &table)
}

pub fn init_dict(store: &mut BranchStore, controls: &[Expression], target: RegisterId, table: &[(i128, Expression)]) -> QregResult<()> {
    apply_dict_unitary(store, controls, target, table, false)
}

/// Guesses that `target` was produced by `init_dict(table)` from a
/// starting value of 0, and verifies that applying the completed
/// unitary's adjoint lands every branch back there.
pub fn uninit_dict(store: &mut BranchStore, controls: &[Expression], target: RegisterId, table: &[(i128, Expression)]) -> QregResult<()> {
    apply_dict_unitary(store, controls, target, table, true)
}

/// Domain order: 0 first (so column 0 of the completed unitary is the
/// one applied to a zero-valued target), then every other value either
/// already held by the target or named in the table, ascending.
fn domain_for(existing: &[i128], table: &[(i128, Expression)]) -> Vec<i128> {
    let mut rest: Vec<i128> = existing.iter().copied().chain(table.iter().map(|(k, _)| *k)).filter(|v| *v != 0).collect();
    rest.sort_unstable();
    rest.dedup();
    let mut domain = vec![0i128];
    domain.extend(rest);
    domain
}

/// Gram-Schmidt completion of a unitary whose first column is `d`
/// (already unit norm): seeds the remaining columns from the standard
/// basis, in domain order, so a seed that's already orthogonal to
/// everything built so far comes out as an untouched identity column.
fn complete_unitary(d: &[f64]) -> QregResult<Vec<Vec<f64>>> {
    let n = d.len();
    let mut cols: Vec<Vec<f64>> = vec![d.to_vec()];
    for seed in 1..n {
        let mut v = vec![0.0; n];
        v[seed] = 1.0;
        for c in &cols {
            let dot: f64 = c.iter().zip(v.iter()).map(|(a, b)| a * b).sum();
            for (vj, cj) in v.iter_mut().zip(c.iter()) {
                *vj -= dot * cj;
            }
        }
        let norm = v.iter().map(|x| x * x).sum::<f64>().sqrt();
        if norm < 1e-9 {
            return Err(NumericalError::GramSchmidtUnderflow.into());
        }
        for x in v.iter_mut() {
            *x /= norm;
        }
        cols.push(v);
    }
    Ok(cols)
}

/// A class's weight vector is the bit pattern of each table entry's
/// evaluated amplitude on a representative branch -- branches agreeing
/// on every entry share the same completed unitary.
fn class_signature(table: &[(i128, Expression)], branch: &Branch) -> QregResult<Vec<u64>> {
    table.iter().map(|(_, e)| Ok(e.eval(branch)?.as_f64().to_bits())).collect()
}

fn apply_dict_unitary(
    store: &mut BranchStore,
    controls: &[Expression],
    target: RegisterId,
    table: &[(i128, Expression)],
    inverse: bool,
) -> QregResult<()> {
    let epsilon = store.epsilon();
    let controlled: HashSet<usize> = store.controlled_indices(controls)?.into_iter().collect();
    let branches = store.branches().to_vec();

    let mut classes: HashMap<Vec<u64>, Vec<usize>> = HashMap::new();
    let mut order: Vec<Vec<u64>> = Vec::new();
    for &i in controlled.iter() {
        let sig = class_signature(table, &branches[i])?;
        if !classes.contains_key(&sig) {
            order.push(sig.clone());
        }
        classes.entry(sig).or_default().push(i);
    }

    let mut out: Vec<Branch> = Vec::new();
    for sig in &order {
        let indices = &classes[sig];
        let existing: Vec<i128> = indices.iter().map(|&i| branches[i].get(target).to_i128()).collect();
        let domain = domain_for(&existing, table);
        let n = domain.len();
        let zero_pos = domain.iter().position(|v| *v == 0).expect("domain always contains 0");

        let rep = &branches[indices[0]];
        let mut norm = 0.0;
        for (_, e) in table {
            norm += e.eval(rep)?.as_f64().powi(2);
        }
        if norm.abs() < epsilon {
            return Err(NumericalError::ZeroNormInitializer.into());
        }
        let mut d = vec![0.0; n];
        for (k, e) in table {
            let pos = domain.iter().position(|v| v == k).expect("table key is always in its own domain");
            d[pos] = e.eval(rep)?.as_f64() / norm.sqrt();
        }
        let cols = complete_unitary(&d)?;

        if !inverse {
            for &i in indices {
                let branch = &branches[i];
                let h = branch.get(target).to_i128();
                let src = domain.iter().position(|v| *v == h).unwrap_or(zero_pos);
                let column = &cols[src];
                for (row, amp) in column.iter().enumerate() {
                    if amp.abs() < epsilon {
                        continue;
                    }
                    let mut nb = branch.clone();
                    nb.set(target, SignedInt::from_i128(domain[row]));
                    nb.amplitude *= Complex64::new(*amp, 0.0);
                    out.push(nb);
                }
            }
        } else {
            // Sub-group by everything except the target: each subgroup
            // is the set of rows one original (pre-split) branch landed
            // on, which `init_dict`'s forward pass is the only thing
            // that could have produced.
            let mut groups: Vec<(Branch, Vec<Complex64>)> = Vec::new();
            for &i in indices {
                let branch = &branches[i];
                let h = branch.get(target).to_i128();
                let row = domain.iter().position(|v| *v == h).ok_or(ReversibilityError::UninitValueMismatch)?;
                let mut stripped = branch.clone();
                stripped.set(target, SignedInt::ZERO);
                let group = groups.iter_mut().find(|(g, _)| g.same_configuration(&stripped));
                let slot = match group {
                    Some((_, amps)) => amps,
                    None => {
                        groups.push((stripped, vec![Complex64::new(0.0, 0.0); n]));
                        &mut groups.last_mut().unwrap().1
                    }
                };
                slot[row] += branch.amplitude;
            }

            for (stripped, amp_by_row) in groups {
                let mut recovered = vec![Complex64::new(0.0, 0.0); n];
                for (c, entry) in recovered.iter_mut().enumerate() {
                    let mut acc = Complex64::new(0.0, 0.0);
                    for r in 0..n {
                        if cols[c][r].abs() > epsilon {
                            acc += amp_by_row[r] * Complex64::new(cols[c][r], 0.0);
                        }
                    }
                    *entry = acc;
                }
                for (c, amp) in recovered.iter().enumerate() {
                    if c != zero_pos && amp.norm() > 1e-6 {
                        return Err(ReversibilityError::UninitValueMismatch.into());
                    }
                }
                if recovered[zero_pos].norm() < epsilon {
                    return Err(ReversibilityError::UninitValueMismatch.into());
                }
                let mut nb = stripped;
                nb.set(target, SignedInt::ZERO);
                nb.amplitude = recovered[zero_pos];
                out.push(nb);
            }
        }
    }

    for (i, branch) in branches.iter().enumerate() {
        if !controlled.contains(&i) {
            out.push(branch.clone());
        }
    }

    store.set_branches(out);
    if !inverse {
        store.prune()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh_store() -> (BranchStore, RegisterId) {
        let mut store = BranchStore::new(1e-10);
        let id = store.alloc();
        (store, id)
    }

    #[test]
    fn init_expr_from_zero_lands_on_the_given_value() {
        let (mut store, id) = fresh_store();
        init_expr(&mut store, &[], id, &Expression::int(3)).unwrap();
        assert_eq!(store.branches()[0].get(id), SignedInt::from(3));
    }

    #[test]
    fn init_expr_rotates_an_already_nonzero_target() {
        let (mut store, id) = fresh_store();
        let mut branches = store.branches().to_vec();
        branches[0].set(id, SignedInt::from(1));
        store.set_branches(branches);
        // cycle is (0, 3, 1): starting at 1 (unrelated to 0 and 3)
        // advances to the next entry after it, which wraps to 0.
        init_expr(&mut store, &[], id, &Expression::int(3)).unwrap();
        assert_eq!(store.branches()[0].get(id), SignedInt::ZERO);
    }

    #[test]
    fn init_then_uninit_expr_round_trips() {
        let (mut store, id) = fresh_store();
        init_expr(&mut store, &[], id, &Expression::int(7)).unwrap();
        assert_eq!(store.branches()[0].get(id), SignedInt::from(7));
        uninit_expr(&mut store, &[], id, &Expression::int(7)).unwrap();
        assert_eq!(store.branches()[0].get(id), SignedInt::ZERO);
    }

    #[test]
    fn init_expr_starting_from_v_returns_to_zero() {
        let (mut store, id) = fresh_store();
        let mut branches = store.branches().to_vec();
        branches[0].set(id, SignedInt::from(3));
        store.set_branches(branches);
        init_expr(&mut store, &[], id, &Expression::int(3)).unwrap();
        assert_eq!(store.branches()[0].get(id), SignedInt::ZERO);
    }

    #[test]
    fn init_then_uninit_list_round_trips() {
        let (mut store, id) = fresh_store();
        init_list(&mut store, &[], id, &[1, 2, 3]).unwrap();
        assert_eq!(store.len(), 3);
        uninit_list(&mut store, &[], id, &[1, 2, 3]).unwrap();
        assert_eq!(store.len(), 1);
        assert!((store.total_probability() - 1.0).abs() < 1e-9);
        assert_eq!(store.branches()[0].get(id), SignedInt::ZERO);
    }

    #[test]
    fn uninit_dict_rejects_wrong_guess() {
        let (mut store, id) = fresh_store();
        init_list(&mut store, &[], id, &[1, 2]).unwrap();
        assert!(uninit_list(&mut store, &[], id, &[9, 10]).is_err());
    }

    #[test]
    fn dict_init_rejects_zero_norm() {
        let (mut store, id) = fresh_store();
        let table = vec![(1i128, Expression::int(0)), (2, Expression::int(0))];
        assert!(init_dict(&mut store, &[], id, &table).is_err());
    }
}
