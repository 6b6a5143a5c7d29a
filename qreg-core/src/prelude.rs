//! The handful of names a host program needs to write quantum code:
//! `use qreg_core::prelude::*;` and go.

pub use crate::error::{QregError, QregResult};
pub use crate::expr::Expression;
pub use crate::register::Key;
pub use crate::simulator::{RegValue, Simulator, SimulatorConfig};
