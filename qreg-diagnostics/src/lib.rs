//! Reduced density-matrix diagnostics for a [`qreg_core::Simulator`]: how
//! entangled a register is with the rest of the branch store, and how
//! close its reduced state sits to a reference.
//!
//! This is read-only tooling -- nothing here mutates a simulator, it
//! only inspects the branch snapshot handed to it.

pub mod density;
pub mod error;

pub use density::{fidelity_to_pure, hermitian_eigenvalues, snap, trace_distance, DensityBackend, DensityMatrix, NaiveDensityBackend};
pub use error::{DiagError, DiagResult};
