//! Error types for diagnostics computed over a simulator's branch store.

use qreg_core::error::QregError;
use thiserror::Error;

/// Result alias used throughout this crate.
pub type DiagResult<T> = Result<T, DiagError>;

/// Failures specific to density-matrix diagnostics, plus the underlying
/// simulator errors they can surface (expression evaluation, mostly).
#[derive(Debug, Clone, Error)]
pub enum DiagError {
    #[error("simulator error while evaluating a diagnostic: {0}")]
    Simulator(#[from] QregError),

    #[error("density matrix is empty, the branch store has no branches")]
    EmptyStore,

    #[error("comparing density matrices of mismatched dimension ({0} vs {1})")]
    DimensionMismatch(usize, usize),

    #[error("reduced density matrix has near-zero trace, state is ill-formed")]
    ZeroTrace,

    #[error("Jacobi eigensolver failed to converge within {0} sweeps")]
    EigenNotConverged(usize),
}
