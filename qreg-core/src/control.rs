//! Control-flow bookkeeping for `inv`, `q_if`, `q_while`, and `garbage`
//! scopes.
//!
//! A scope that needs to replay its body (inverted, or many times) opens
//! a *queueing frame*: every mutating action checks [`ControlStack::queue_or_defer`]
//! first, and if a frame is open, the action is recorded there instead of
//! touching the branch store. Nothing actually happens until the frame
//! closes and the scope owner decides how to play the recording back --
//! forwards, backwards, or not at all. Nested scopes compose for free:
//! an `inv` recorded inside an outer `garbage` block is itself just
//! another queued action.

use crate::error::{QregResult, UsageError};
use crate::expr::Expression;
use crate::register::{KeyId, RegisterOp};

/// How a register is to be initialized or uninitialized, mirroring the
/// three forms a target value can take: a definite expression, a
/// uniform superposition over a list of literals, or a QRAM-style
/// weighted superposition from a value table.
#[derive(Debug, Clone)]
pub enum InitSpec {
    Expr(Expression),
    List(Vec<i128>),
    Dict(Vec<(i128, Expression)>),
}

/// Delimiter kind pushed by a scope guard, checked for balance on exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Inv,
}

impl Mode {
    fn name(&self) -> &'static str {
        match self {
            Mode::Inv => "inv",
        }
    }
}

/// A garbage pile name. `Keyless` is the anonymous pile used when
/// `garbage()` is called with no arguments, and must be empty again by
/// the time its scope exits.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PileKey {
    Keyless,
    Named(String),
}

/// One recorded mutation or nested scope, in place of immediate
/// execution while a queueing scope is open. `reverse` picks which half
/// of the action runs when it is finally played back; flipping it is
/// how a queued action becomes its own inverse.
#[derive(Debug, Clone)]
pub enum Action {
    Register { key: KeyId, op: RegisterOp, operand: Expression, reverse: bool },
    Had { key: KeyId, bit: Expression },
    Qft { key: KeyId, modulus: Expression, inverse: bool },
    Phase { theta: Expression },
    Cnot { key: KeyId, idx1: Expression, idx2: Expression },
    Init { key: KeyId, spec: InitSpec, reverse: bool },
    While { body: Vec<Action>, expr: Expression, key: KeyId, reverse: bool },
    Garbage { body: Vec<Action>, pile: PileKey, reverse: bool },
    AssertPileClean { pile: PileKey },
}

impl Action {
    /// The action that plays this one back the opposite way. Self-dual
    /// actions (`had`, `cnot`) are returned unchanged.
    pub fn inverted(self) -> Action {
        match self {
            Action::Register { key, op, operand, reverse } => {
                Action::Register { key, op, operand, reverse: !reverse }
            }
            Action::Qft { key, modulus, inverse } => Action::Qft { key, modulus, inverse: !inverse },
            Action::Phase { theta } => Action::Phase { theta: -theta },
            Action::Init { key, spec, reverse } => Action::Init { key, spec, reverse: !reverse },
            Action::While { body, expr, key, reverse } => {
                Action::While { body, expr, key, reverse: !reverse }
            }
            Action::Garbage { body, pile, reverse } => {
                Action::Garbage { body, pile, reverse: !reverse }
            }
            other @ (Action::Had { .. } | Action::Cnot { .. } | Action::AssertPileClean { .. }) => other,
        }
    }
}

/// Mode stack, queueing frames, and the active control-expression guards.
#[derive(Debug, Default)]
pub struct ControlStack {
    mode_stack: Vec<Mode>,
    queue_stack: Vec<Vec<Action>>,
    controls: Vec<Expression>,
}

impl ControlStack {
    pub fn push_mode(&mut self, mode: Mode) {
        self.mode_stack.push(mode);
    }

    pub fn pop_mode(&mut self, mode: Mode) -> QregResult<()> {
        match self.mode_stack.last() {
            Some(m) if *m == mode => {
                self.mode_stack.pop();
                Ok(())
            }
            _ => Err(UsageError::MismatchedDelimiter(mode.name()).into()),
        }
    }

    pub fn push_queue_frame(&mut self) {
        self.queue_stack.push(Vec::new());
    }

    pub fn pop_queue_frame(&mut self) -> Vec<Action> {
        self.queue_stack.pop().unwrap_or_default()
    }

    pub fn is_queueing(&self) -> bool {
        !self.queue_stack.is_empty()
    }

    /// If a queueing scope is open, records `action` there and reports
    /// it so the caller skips real execution. Otherwise hands the
    /// action straight back so the caller can run it now.
    pub fn queue_or_defer(&mut self, action: Action) -> Option<Action> {
        if let Some(top) = self.queue_stack.last_mut() {
            top.push(action);
            None
        } else {
            Some(action)
        }
    }

    pub fn push_control(&mut self, expr: Expression) {
        self.controls.push(expr);
    }

    pub fn pop_control(&mut self) {
        self.controls.pop();
    }

    pub fn controls(&self) -> &[Expression] {
        &self.controls
    }

    /// A key read by any active control guard cannot be mutated -- the
    /// branch you're conditioning on can't also be the branch you change.
    pub fn assert_mutable(&self, key: KeyId) -> QregResult<()> {
        for ctrl in &self.controls {
            if ctrl.free_keys().contains(&key) {
                return Err(UsageError::MutateUnderOwnControl.into());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sm_int::SignedInt;

    #[test]
    fn mismatched_mode_is_rejected() {
        let mut stack = ControlStack::default();
        assert!(stack.pop_mode(Mode::Inv).is_err());
    }

    #[test]
    fn balanced_mode_round_trips() {
        let mut stack = ControlStack::default();
        stack.push_mode(Mode::Inv);
        assert!(stack.pop_mode(Mode::Inv).is_ok());
    }

    #[test]
    fn queue_or_defer_records_while_open() {
        let mut stack = ControlStack::default();
        stack.push_queue_frame();
        let action = Action::AssertPileClean { pile: PileKey::Keyless };
        assert!(stack.queue_or_defer(action).is_none());
        let recorded = stack.pop_queue_frame();
        assert_eq!(recorded.len(), 1);
    }

    #[test]
    fn queue_or_defer_passes_through_when_closed() {
        let mut stack = ControlStack::default();
        let action = Action::AssertPileClean { pile: PileKey::Keyless };
        assert!(stack.queue_or_defer(action).is_some());
    }

    #[test]
    fn inverting_a_register_action_flips_reverse_not_op() {
        let action = Action::Register {
            key: KeyId(0),
            op: RegisterOp::AddAssign,
            operand: Expression::IntLit(SignedInt::from(1)),
            reverse: false,
        };
        let inv = action.inverted();
        match inv {
            Action::Register { op, reverse, .. } => {
                assert_eq!(op, RegisterOp::AddAssign);
                assert!(reverse);
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn assert_mutable_rejects_controlled_key() {
        let mut stack = ControlStack::default();
        let key = KeyId(3);
        stack.push_control(Expression::reg(key, crate::branch::RegisterId(0)));
        assert!(stack.assert_mutable(key).is_err());
    }
}
