//! Error types for the three kinds of failure a quantum program can hit.
//!
//! Usage errors are programmer mistakes caught before any amplitude is
//! touched; reversibility errors are raised while replaying an operator
//! that turned out to destroy information; numerical errors come from the
//! floating-point machinery underneath (Gram-Schmidt, normalization).

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type QregResult<T> = Result<T, QregError>;

/// Programmer-facing usage mistakes, caught before mutating the store.
#[derive(Debug, Clone, Error)]
pub enum UsageError {
    #[error("register is read by an active control guard and cannot be mutated")]
    MutateUnderOwnControl,

    #[error("measurement is only allowed at top level, {0} scope(s) still open")]
    MeasureInsideScope(usize),

    #[error("init/uninit expression depends on its own target register")]
    SelfReferentialInit,

    #[error("q_while counter register is not zero on every controlled branch")]
    WhileCounterNotZero,

    #[error("bare assignment is only permitted inside a garbage scope")]
    AssignOutsideGarbage,

    #[error("\"keyless\" is a reserved pile name")]
    ReservedPileName,

    #[error("operator's expression depends on its own target register")]
    SelfDependency,

    #[error("bitwise, index, and length operations require an integer operand, not a float")]
    IntOperandRequired,

    #[error("q_while's predicate expression may not depend on the counter register")]
    WhileExprDependsOnCounter,

    #[error("mismatched scope delimiter: expected end of {0}")]
    MismatchedDelimiter(&'static str),

    #[error("measurement is top-level only and cannot run inside a queueing scope")]
    MeasureInsideQueue,

    #[error("QFT modulus must be an integer greater than one")]
    QftModulusInvalid,

    #[error("CNOT source and target bit indices must differ")]
    CnotSameIndex,
}

/// A unitary operator would destroy information, or a scope invariant
/// meant to guarantee reversibility was violated.
#[derive(Debug, Clone, Error)]
pub enum ReversibilityError {
    #[error("multiplying by zero is not invertible")]
    MultiplyByZero,

    #[error("division left a remainder, `*=` cannot be undone exactly")]
    InexactMultiplyUndo,

    #[error("`//=` divides unevenly, the operation is not reversible")]
    InexactFloorDivide,

    #[error("exponent is not a positive integer, `**=` is not reversible")]
    NonPositiveIntegerExponent,

    #[error("undo root is not an integer, `**=` cannot be undone exactly")]
    NonIntegerRoot,

    #[error("uninit target did not match the expected value on some branch")]
    UninitValueMismatch,

    #[error("garbage pile is not empty at scope exit ({0} register(s) remain)")]
    GarbagePileNotEmpty(usize),

    #[error("partner lookup failed while uncomputing a deallocated register")]
    NoPartnerAvailable,

    #[error("register column was not observed to be zero before deallocation")]
    DeallocateNonZero,
}

/// Failures coming from the floating-point / probabilistic machinery.
#[derive(Debug, Clone, Error)]
pub enum NumericalError {
    #[error("dictionary initializer has zero norm on some branch")]
    ZeroNormInitializer,

    #[error("Gram-Schmidt could not complete a unitary, an amplitude underflowed")]
    GramSchmidtUnderflow,

    #[error("postselection predicate is zero-probability, nothing survives")]
    ZeroProbabilityPostselect,

    #[error("branch store is empty")]
    EmptyStore,

    #[error("q_while exceeded its iteration cap without every branch terminating")]
    WhileDidNotTerminate,
}

/// Aggregate error surface exposed to host code.
#[derive(Debug, Clone, Error)]
pub enum QregError {
    #[error("usage error: {0}")]
    Usage(#[from] UsageError),

    #[error("reversibility error: {0}")]
    Reversibility(#[from] ReversibilityError),

    #[error("numerical error: {0}")]
    Numerical(#[from] NumericalError),

    #[error("operation attempted on a poisoned store (a previous call raised)")]
    Poisoned,
}

impl QregError {
    /// The canonical error used once a mutation fails mid-way and the
    /// store's invariants can no longer be trusted.
    pub fn poisoned() -> Self {
        QregError::Poisoned
    }
}
