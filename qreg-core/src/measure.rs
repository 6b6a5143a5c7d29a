//! Measurement, postselection, and the distribution/printing primitives
//! built on top of it. All three are top-level only: they collapse or
//! inspect the store directly and have no inverse to replay.

use num_complex::Complex64;
use rand::Rng;

use crate::branch::Branch;
use crate::error::{NumericalError, QregResult};
use crate::expr::Expression;
use crate::store::BranchStore;

/// One row of a distribution: the tuple of expression values observed
/// together, their combined probability, and which branch indices
/// produced it.
#[derive(Debug, Clone)]
pub struct DistRow {
    pub values: Vec<f64>,
    pub probability: f64,
    pub branches: Vec<usize>,
}

/// Groups branches by the tuple of values `exprs` take, summing
/// probability within each group and sorting by value.
pub fn dist(store: &BranchStore, exprs: &[Expression]) -> QregResult<Vec<DistRow>> {
    let mut rows: Vec<DistRow> = Vec::new();
    for (i, branch) in store.branches().iter().enumerate() {
        let values: Vec<f64> = exprs
            .iter()
            .map(|e| e.eval(branch).map(|v| v.as_f64()))
            .collect::<QregResult<_>>()?;
        let prob = branch.amplitude.norm_sqr();
        if let Some(row) = rows.iter_mut().find(|r| r.values == values) {
            row.probability += prob;
            row.branches.push(i);
        } else {
            rows.push(DistRow { values, probability: prob, branches: vec![i] });
        }
    }
    rows.sort_by(|a, b| a.values.partial_cmp(&b.values).unwrap_or(std::cmp::Ordering::Equal));
    Ok(rows)
}

/// Samples one outcome by probability, collapses the store to the
/// branches that produced it, and renormalizes.
pub fn measure(store: &mut BranchStore, exprs: &[Expression], rng: &mut impl Rng) -> QregResult<Vec<f64>> {
    let rows = dist(store, exprs)?;
    let r: f64 = rng.r#gen();
    let mut cumulative = 0.0;
    let mut picked = rows.len().saturating_sub(1);
    for (i, row) in rows.iter().enumerate() {
        cumulative += row.probability;
        if cumulative > r {
            picked = i;
            break;
        }
    }
    let row = rows[picked].clone();
    let mut keep: Vec<Branch> = row.branches.iter().map(|&i| store.branches()[i].clone()).collect();
    let scale = row.probability.sqrt();
    for b in &mut keep {
        b.amplitude /= Complex64::new(scale, 0.0);
    }
    store.set_branches(keep);
    Ok(row.values)
}

/// Keeps only the branches where `expr` is nonzero, renormalizing.
/// Returns the surviving probability mass.
pub fn postselect(store: &mut BranchStore, expr: &Expression) -> QregResult<f64> {
    let mut kept = Vec::new();
    let mut prob = 0.0;
    for branch in store.branches() {
        if expr.eval(branch)?.is_truthy() {
            prob += branch.amplitude.norm_sqr();
            kept.push(branch.clone());
        }
    }
    if kept.is_empty() {
        return Err(NumericalError::ZeroProbabilityPostselect.into());
    }
    let scale = prob.sqrt();
    for b in &mut kept {
        b.amplitude /= Complex64::new(scale, 0.0);
    }
    store.set_branches(kept);
    Ok(prob)
}

/// Renders a distribution as `value(s) w.p. probability` lines.
pub fn format_dist(rows: &[DistRow], digits: usize) -> String {
    rows.iter()
        .map(|row| {
            let vals = row.values.iter().map(|v| format!("{:.*}", digits, v)).collect::<Vec<_>>().join(" ");
            format!("{} w.p. {:.*}", vals, digits, row.probability)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Renders per-branch amplitudes grouped by value, as `value(s) w.a. amp, amp, ...`.
pub fn format_amplitudes(store: &BranchStore, exprs: &[Expression], digits: usize) -> QregResult<String> {
    let mut groups: Vec<(Vec<f64>, Vec<Complex64>)> = Vec::new();
    for branch in store.branches() {
        let values: Vec<f64> = exprs
            .iter()
            .map(|e| e.eval(branch).map(|v| v.as_f64()))
            .collect::<QregResult<_>>()?;
        if let Some(g) = groups.iter_mut().find(|g| g.0 == values) {
            g.1.push(branch.amplitude);
        } else {
            groups.push((values, vec![branch.amplitude]));
        }
    }
    groups.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
    let lines: Vec<String> = groups
        .into_iter()
        .map(|(values, amps)| {
            let vals = values.iter().map(|v| format!("{:.*}", digits, v)).collect::<Vec<_>>().join(" ");
            let amp_str = amps
                .iter()
                .map(|a| format!("{:.*}{:+.*}i", digits, a.re, digits, a.im))
                .collect::<Vec<_>>()
                .join(", ");
            format!("{} w.a. {}", vals, amp_str)
        })
        .collect();
    Ok(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sm_int::SignedInt;
    use rand::rngs::mock::StepRng;

    #[test]
    fn dist_merges_equal_values_and_sums_probability() {
        let mut store = BranchStore::new(1e-10);
        let id = store.alloc();
        let mut branches = store.branches().to_vec();
        branches[0].amplitude = Complex64::new(0.6, 0.0);
        let mut extra = branches[0].clone();
        extra.amplitude = Complex64::new(0.8, 0.0);
        store.set_branches(vec![branches[0].clone(), extra]);
        let rows = dist(&store, &[Expression::reg(crate::register::KeyId(0), id)]).unwrap();
        assert_eq!(rows.len(), 1);
        assert!((rows[0].probability - 1.0).abs() < 1e-9);
    }

    #[test]
    fn measure_collapses_to_a_single_branch() {
        let mut store = BranchStore::new(1e-10);
        let id = store.alloc();
        crate::primitives::had(&mut store, &[], id, &Expression::int(0)).unwrap();
        let mut rng = StepRng::new(0, 1);
        let outcome = measure(&mut store, &[Expression::reg(crate::register::KeyId(0), id)], &mut rng).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(outcome.len(), 1);
    }

    #[test]
    fn postselect_on_impossible_branch_fails() {
        let mut store = BranchStore::new(1e-10);
        let _ = store.alloc();
        let expr = Expression::int(0).ne(Expression::int(0));
        assert!(postselect(&mut store, &expr).is_err());
    }

    #[test]
    fn postselect_keeps_matching_branches_and_renormalizes() {
        let mut store = BranchStore::new(1e-10);
        let id = store.alloc();
        crate::primitives::had(&mut store, &[], id, &Expression::int(0)).unwrap();
        let expr = Expression::reg(crate::register::KeyId(0), id).eq(Expression::int(0));
        postselect(&mut store, &expr).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.branches()[0].get(id), SignedInt::ZERO);
    }
}
