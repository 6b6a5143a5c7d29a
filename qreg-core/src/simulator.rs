//! The top-level handle a host program drives: branch store, key table,
//! control stack, and garbage piles wired together behind one API.

use num_complex::Complex64;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::branch::{Branch, RegisterId};
use crate::control::{Action, ControlStack, InitSpec, Mode, PileKey};
use crate::error::{NumericalError, QregResult, ReversibilityError, UsageError};
use crate::expr::Expression;
use crate::garbage::GarbagePiles;
use crate::init;
use crate::measure::{self, DistRow};
use crate::primitives;
use crate::register::{Key, KeyId, KeyTable, RegisterOp};
use crate::sm_int::SignedInt;
use crate::store::{BranchStore, DEFAULT_EPSILON};

/// Tunable knobs, set once at construction the way the rest of this
/// crate's config structs work: a plain struct with a `Default` and
/// `with_*` builder methods.
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    pub epsilon: f64,
    pub print_digits: usize,
    pub max_while_iterations: u64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self { epsilon: DEFAULT_EPSILON, print_digits: 6, max_while_iterations: 1_000_000 }
    }
}

impl SimulatorConfig {
    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }
    pub fn with_print_digits(mut self, digits: usize) -> Self {
        self.print_digits = digits;
        self
    }
    pub fn with_max_while_iterations(mut self, n: u64) -> Self {
        self.max_while_iterations = n;
        self
    }
}

/// The value a register is initialized (or guessed to be, on uninit)
/// from: a definite expression, a uniform superposition over listed
/// integers, or a QRAM-style weighted table.
#[derive(Debug, Clone)]
pub enum RegValue {
    Expr(Expression),
    List(Vec<i128>),
    Dict(Vec<(i128, Expression)>),
}

impl From<i64> for RegValue {
    fn from(v: i64) -> Self {
        RegValue::Expr(Expression::int(v))
    }
}
impl From<Expression> for RegValue {
    fn from(e: Expression) -> Self {
        RegValue::Expr(e)
    }
}
impl From<Vec<i128>> for RegValue {
    fn from(v: Vec<i128>) -> Self {
        RegValue::List(v)
    }
}
impl From<Vec<(i128, Expression)>> for RegValue {
    fn from(v: Vec<(i128, Expression)>) -> Self {
        RegValue::Dict(v)
    }
}

fn into_init_spec(value: RegValue) -> InitSpec {
    match value {
        RegValue::Expr(e) => InitSpec::Expr(e),
        RegValue::List(l) => InitSpec::List(l),
        RegValue::Dict(d) => InitSpec::Dict(d),
    }
}

pub struct Simulator {
    store: BranchStore,
    keys: KeyTable,
    control: ControlStack,
    garbage: GarbagePiles,
    rng: StdRng,
    config: SimulatorConfig,
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Simulator {
    pub fn new() -> Self {
        Self::with_config(SimulatorConfig::default())
    }

    pub fn with_config(config: SimulatorConfig) -> Self {
        Self {
            store: BranchStore::new(config.epsilon),
            keys: KeyTable::default(),
            control: ControlStack::default(),
            garbage: GarbagePiles::default(),
            rng: StdRng::from_entropy(),
            config,
        }
    }

    /// Deterministic measurement sampling, for tests and reproducible demos.
    pub fn with_seed(seed: u64) -> Self {
        let mut sim = Self::new();
        sim.rng = StdRng::seed_from_u64(seed);
        sim
    }

    pub fn snapshot_branches(&self) -> &[Branch] {
        self.store.branches()
    }

    pub fn branch_count(&self) -> usize {
        self.store.len()
    }

    pub fn total_probability(&self) -> f64 {
        self.store.total_probability()
    }

    pub fn prune(&mut self) -> QregResult<()> {
        self.store.prune()
    }

    /// Resets the simulator to the vacuum state. Refuses while any
    /// control-flow scope is still open, matching the original's guard
    /// against clearing mid-block.
    pub fn clear(&mut self) -> QregResult<()> {
        if !self.control.controls().is_empty() || self.control.is_queueing() {
            return Err(UsageError::MismatchedDelimiter("clear").into());
        }
        *self = Self::with_config(self.config.clone());
        Ok(())
    }

    fn resolve(&self, key: KeyId) -> QregResult<RegisterId> {
        self.keys.resolve(key).ok_or_else(|| ReversibilityError::NoPartnerAvailable.into())
    }

    /// An expression that reads `key`'s current register -- the
    /// equivalent of casting a bare variable to an expression.
    pub fn read(&self, key: Key) -> QregResult<Expression> {
        Ok(Expression::reg(key.id(), self.resolve(key.id())?))
    }

    fn dispatch(&mut self, action: Action) -> QregResult<()> {
        match self.control.queue_or_defer(action) {
            Some(action) => self.execute(action),
            None => Ok(()),
        }
    }

    fn execute(&mut self, action: Action) -> QregResult<()> {
        match action {
            Action::Register { key, op, operand, reverse } => self.run_register_op(key, op, operand, reverse),
            Action::Had { key, bit } => {
                let reg = self.resolve(key)?;
                primitives::had(&mut self.store, &self.control.controls().to_vec(), reg, &bit)
            }
            Action::Qft { key, modulus, inverse } => {
                let reg = self.resolve(key)?;
                primitives::qft(&mut self.store, &self.control.controls().to_vec(), reg, &modulus, inverse)
            }
            Action::Phase { theta } => primitives::phase(&mut self.store, &self.control.controls().to_vec(), &theta),
            Action::Cnot { key, idx1, idx2 } => {
                let reg = self.resolve(key)?;
                primitives::cnot(&mut self.store, &self.control.controls().to_vec(), reg, &idx1, &idx2)
            }
            Action::Init { key, spec, reverse } => self.run_init(key, spec, reverse),
            Action::While { body, expr, key, reverse } => {
                if reverse {
                    self.run_while_backward(body, expr, key)
                } else {
                    self.run_while_forward(body, expr, key)
                }
            }
            Action::Garbage { body, reverse, .. } => {
                if reverse {
                    self.run_garbage_backward(body)
                } else {
                    self.run_garbage_forward(body)
                }
            }
            Action::AssertPileClean { pile } => self.garbage.assert_clean(&pile),
        }
    }

    fn run_register_op(&mut self, key: KeyId, op: RegisterOp, operand: Expression, reverse: bool) -> QregResult<()> {
        let reg = self.resolve(key)?;
        let controls = self.control.controls().to_vec();
        let controlled = self.store.controlled_indices(&controls)?;
        let mut branches = self.store.branches().to_vec();
        for &i in &controlled {
            let e = operand.eval(&branches[i])?.as_int();
            let r = branches[i].get(reg);
            let new_v = if reverse {
                crate::register::apply_backward(op, r, e)?
            } else {
                crate::register::apply_forward(op, r, e)?
            };
            branches[i].set(reg, new_v);
        }
        self.store.set_branches(branches);
        Ok(())
    }

    fn run_init(&mut self, key: KeyId, spec: InitSpec, reverse: bool) -> QregResult<()> {
        let reg = self.resolve(key)?;
        let controls = self.control.controls().to_vec();
        match (spec, reverse) {
            (InitSpec::Expr(e), false) => init::init_expr(&mut self.store, &controls, reg, &e),
            (InitSpec::Expr(e), true) => init::uninit_expr(&mut self.store, &controls, reg, &e),
            (InitSpec::List(v), false) => init::init_list(&mut self.store, &controls, reg, &v),
            (InitSpec::List(v), true) => init::uninit_list(&mut self.store, &controls, reg, &v),
            (InitSpec::Dict(t), false) => init::init_dict(&mut self.store, &controls, reg, &t),
            (InitSpec::Dict(t), true) => init::uninit_dict(&mut self.store, &controls, reg, &t),
        }
    }

    fn run_garbage_forward(&mut self, body: Vec<Action>) -> QregResult<()> {
        for action in body {
            self.dispatch(action)?;
        }
        Ok(())
    }

    fn run_garbage_backward(&mut self, body: Vec<Action>) -> QregResult<()> {
        for action in body.into_iter().rev() {
            self.dispatch(action.inverted())?;
        }
        Ok(())
    }

    fn run_while_forward(&mut self, body: Vec<Action>, expr: Expression, key: KeyId) -> QregResult<()> {
        self.control.assert_mutable(key)?;
        let reg = self.resolve(key)?;
        let controlled = self.store.controlled_indices(self.control.controls())?;
        for &i in &controlled {
            if self.store.branches()[i].get(reg) != SignedInt::ZERO {
                return Err(UsageError::WhileCounterNotZero.into());
            }
        }

        let mut count: i64 = 0;
        loop {
            let controlled = self.store.controlled_indices(self.control.controls())?;
            let mut all_done = true;
            for &i in &controlled {
                if expr.eval(&self.store.branches()[i])?.is_truthy() {
                    all_done = false;
                    break;
                }
            }
            if all_done {
                break;
            }
            if count as u64 > self.config.max_while_iterations {
                return Err(NumericalError::WhileDidNotTerminate.into());
            }

            let key_obj = Key(key);
            let incr_guard = expr.clone();
            self.q_if(incr_guard, |s| s.add_assign(key_obj, Expression::int(1)))?;

            let body_clone = body.clone();
            let run_guard = Expression::reg(key, reg).gt(Expression::int(count));
            self.q_if(run_guard, move |s| {
                for action in body_clone {
                    s.dispatch(action)?;
                }
                Ok(())
            })?;
            count += 1;
        }
        Ok(())
    }

    fn run_while_backward(&mut self, body: Vec<Action>, expr: Expression, key: KeyId) -> QregResult<()> {
        self.control.assert_mutable(key)?;
        let reg = self.resolve(key)?;
        let controlled = self.store.controlled_indices(self.control.controls())?;
        let mut count = controlled
            .iter()
            .map(|&i| self.store.branches()[i].get(reg).to_i128())
            .max()
            .unwrap_or(0);

        while count > 0 {
            count -= 1;
            let run_guard = Expression::reg(key, reg).gt(Expression::int(count as i64));
            let body_rev: Vec<Action> = body.iter().cloned().rev().map(Action::inverted).collect();
            self.q_if(run_guard, move |s| {
                for action in body_rev {
                    s.dispatch(action)?;
                }
                Ok(())
            })?;

            let key_obj = Key(key);
            let decr_guard = expr.clone();
            self.q_if(decr_guard, |s| s.sub_assign(key_obj, Expression::int(1)))?;
        }
        Ok(())
    }

    //////////////////////////////////////////////////// Scope guards

    pub fn inv<F>(&mut self, body: F) -> QregResult<()>
    where
        F: FnOnce(&mut Self) -> QregResult<()>,
    {
        self.control.push_mode(Mode::Inv);
        self.control.push_queue_frame();
        let result = body(self);
        let queue = self.control.pop_queue_frame();
        self.control.pop_mode(Mode::Inv)?;
        result?;
        for action in queue.into_iter().rev() {
            self.dispatch(action.inverted())?;
        }
        Ok(())
    }

    pub fn q_if<F>(&mut self, expr: impl Into<Expression>, body: F) -> QregResult<()>
    where
        F: FnOnce(&mut Self) -> QregResult<()>,
    {
        self.control.push_control(expr.into());
        let result = body(self);
        self.control.pop_control();
        result
    }

    pub fn q_while<F>(&mut self, expr: impl Into<Expression>, counter: Key, mut body: F) -> QregResult<()>
    where
        F: FnMut(&mut Self) -> QregResult<()>,
    {
        let expr = expr.into();
        if expr.free_keys().contains(&counter.id()) {
            return Err(UsageError::WhileExprDependsOnCounter.into());
        }
        self.control.push_queue_frame();
        let result = body(self);
        let queue = self.control.pop_queue_frame();
        result?;
        self.dispatch(Action::While { body: queue, expr, key: counter.id(), reverse: false })
    }

    pub fn garbage<F>(&mut self, name: Option<&str>, body: F) -> QregResult<()>
    where
        F: FnOnce(&mut Self) -> QregResult<()>,
    {
        let pile = match name {
            None => PileKey::Keyless,
            Some("keyless") => return Err(UsageError::ReservedPileName.into()),
            Some(n) => PileKey::Named(n.to_string()),
        };
        self.garbage.enter(pile.clone());
        self.control.push_queue_frame();
        let result = body(self);
        let queue = self.control.pop_queue_frame();
        result?;
        self.dispatch(Action::Garbage { body: queue, pile, reverse: false })?;
        self.garbage.exit()?;
        Ok(())
    }

    pub fn assert_pile_clean(&mut self, name: Option<&str>) -> QregResult<()> {
        let pile = match name {
            None => PileKey::Keyless,
            Some(n) => PileKey::Named(n.to_string()),
        };
        self.dispatch(Action::AssertPileClean { pile })
    }

    //////////////////////////////////////////////////// Allocation

    pub fn reg(&mut self, value: impl Into<RegValue>) -> QregResult<Key> {
        let reg_id = self.store.alloc();
        let key = self.keys.new_key(reg_id);
        self.garbage.record(key.id());
        self.init(key, value)?;
        Ok(key)
    }

    pub fn init(&mut self, key: Key, value: impl Into<RegValue>) -> QregResult<()> {
        self.control.assert_mutable(key.id())?;
        let spec = into_init_spec(value.into());
        if let InitSpec::Expr(e) = &spec {
            if e.free_keys().contains(&key.id()) {
                return Err(UsageError::SelfReferentialInit.into());
            }
        }
        self.dispatch(Action::Init { key: key.id(), spec, reverse: false })
    }

    pub fn uninit(&mut self, key: Key, guess: impl Into<RegValue>) -> QregResult<()> {
        self.control.assert_mutable(key.id())?;
        let spec = into_init_spec(guess.into());
        self.dispatch(Action::Init { key: key.id(), spec, reverse: true })
    }

    /// Deallocates a key outright. The column must already read zero on
    /// every controlled branch.
    pub fn dealloc(&mut self, key: Key) -> QregResult<()> {
        self.control.assert_mutable(key.id())?;
        let reg = self.resolve(key.id())?;
        let controlled = self.store.controlled_indices(self.control.controls())?;
        self.store.dealloc(reg, &controlled)?;
        self.keys.deallocate(key.id());
        // A sibling still recorded in the same pile takes over as this
        // key's uncomputation proxy, so a later `resolve` through it
        // still finds a live register.
        if let Some(partner) = self.garbage.sibling_of(key.id()) {
            self.keys.set_partner(key.id(), partner);
        }
        self.garbage.forget(key.id());
        Ok(())
    }

    /// `uninit` followed by `dealloc` -- the common case of reclaiming a
    /// scratch register once you can state what it holds.
    pub fn clean(&mut self, key: Key, guess: impl Into<RegValue>) -> QregResult<()> {
        self.uninit(key, guess)?;
        self.dealloc(key)
    }

    //////////////////////////////////////////////////// Register operators

    fn register_op(&mut self, key: Key, op: RegisterOp, rhs: impl Into<Expression>) -> QregResult<()> {
        let rhs = rhs.into();
        if rhs.free_keys().contains(&key.id()) {
            return Err(UsageError::SelfDependency.into());
        }
        self.control.assert_mutable(key.id())?;
        self.dispatch(Action::Register { key: key.id(), op, operand: rhs, reverse: false })
    }

    pub fn add_assign(&mut self, key: Key, rhs: impl Into<Expression>) -> QregResult<()> {
        self.register_op(key, RegisterOp::AddAssign, rhs)
    }
    pub fn sub_assign(&mut self, key: Key, rhs: impl Into<Expression>) -> QregResult<()> {
        self.register_op(key, RegisterOp::SubAssign, rhs)
    }
    pub fn mul_assign(&mut self, key: Key, rhs: impl Into<Expression>) -> QregResult<()> {
        self.register_op(key, RegisterOp::MulAssign, rhs)
    }
    pub fn floor_div_assign(&mut self, key: Key, rhs: impl Into<Expression>) -> QregResult<()> {
        self.register_op(key, RegisterOp::FloorDivAssign, rhs)
    }
    pub fn xor_assign(&mut self, key: Key, rhs: impl Into<Expression>) -> QregResult<()> {
        self.register_op(key, RegisterOp::XorAssign, rhs)
    }
    pub fn pow_assign(&mut self, key: Key, rhs: impl Into<Expression>) -> QregResult<()> {
        self.register_op(key, RegisterOp::PowAssign, rhs)
    }
    pub fn shl_assign(&mut self, key: Key, rhs: impl Into<Expression>) -> QregResult<()> {
        self.register_op(key, RegisterOp::ShlAssign, rhs)
    }

    //////////////////////////////////////////////////// Garbage-scope assignment

    fn check_not_self_dependent(&self, key: Key, rhs: &Expression) -> QregResult<()> {
        if rhs.free_keys().contains(&key.id()) {
            return Err(UsageError::SelfDependency.into());
        }
        Ok(())
    }

    /// Shared desugaring for the six `=`-style assignment forms: illegal
    /// outside a garbage scope, since `new_value` overwrites `key`
    /// without leaving behind the information needed to invert it.
    /// Rewritten as `r += fresh_reg(new_value - old_value)`; the fresh
    /// register is returned so the body can uncompute it (`read` its
    /// current value back as the `clean` guess) before the scope closes
    /// -- the same scratch-register idiom `garbage` already uses for
    /// anything else allocated inside it.
    fn assign_via_delta(&mut self, key: Key, new_value: Expression) -> QregResult<Key> {
        if !self.garbage.is_active() {
            return Err(UsageError::AssignOutsideGarbage.into());
        }
        self.control.assert_mutable(key.id())?;
        let old_value = self.read(key)?;
        let tmp = self.reg(new_value - old_value)?;
        let tmp_expr = self.read(tmp)?;
        self.add_assign(key, tmp_expr)?;
        Ok(tmp)
    }

    /// `key = new_value`, only legal inside a garbage scope. Returns the
    /// scratch register holding the delta; see [`Simulator::assign_via_delta`].
    pub fn assign(&mut self, key: Key, new_value: impl Into<Expression>) -> QregResult<Key> {
        let new_value = new_value.into();
        self.check_not_self_dependent(key, &new_value)?;
        self.assign_via_delta(key, new_value)
    }

    /// Sets bit `idx` of `key` to `value` (nonzero means set), only legal
    /// inside a garbage scope. `old XOR ((old[idx] XOR value) << idx)`
    /// flips bit `idx` exactly when it disagrees with `value`, leaving
    /// every other bit untouched.
    pub fn bit_set(&mut self, key: Key, idx: impl Into<Expression>, value: impl Into<Expression>) -> QregResult<Key> {
        let idx = idx.into();
        let value = value.into();
        self.check_not_self_dependent(key, &idx)?;
        self.check_not_self_dependent(key, &value)?;
        let old = self.read(key)?;
        let current_bit = old.clone().index(idx.clone());
        let flip = (current_bit ^ value).shl(idx);
        self.assign_via_delta(key, old ^ flip)
    }

    /// `key %= modulus`, only legal inside a garbage scope.
    pub fn mod_assign(&mut self, key: Key, modulus: impl Into<Expression>) -> QregResult<Key> {
        let modulus = modulus.into();
        self.check_not_self_dependent(key, &modulus)?;
        let old = self.read(key)?;
        self.assign_via_delta(key, old % modulus)
    }

    /// `key >>= amount`, only legal inside a garbage scope.
    pub fn shr_assign(&mut self, key: Key, amount: impl Into<Expression>) -> QregResult<Key> {
        let amount = amount.into();
        self.check_not_self_dependent(key, &amount)?;
        let old = self.read(key)?;
        self.assign_via_delta(key, old.shr(amount))
    }

    /// `key &= mask`, only legal inside a garbage scope.
    pub fn and_assign(&mut self, key: Key, mask: impl Into<Expression>) -> QregResult<Key> {
        let mask = mask.into();
        self.check_not_self_dependent(key, &mask)?;
        let old = self.read(key)?;
        self.assign_via_delta(key, old & mask)
    }

    /// `key |= mask`, only legal inside a garbage scope.
    pub fn or_assign(&mut self, key: Key, mask: impl Into<Expression>) -> QregResult<Key> {
        let mask = mask.into();
        self.check_not_self_dependent(key, &mask)?;
        let old = self.read(key)?;
        self.assign_via_delta(key, old | mask)
    }

    //////////////////////////////////////////////////// Gates

    pub fn had(&mut self, key: Key, bit: impl Into<Expression>) -> QregResult<()> {
        let bit = bit.into();
        if bit.free_keys().contains(&key.id()) {
            return Err(UsageError::SelfDependency.into());
        }
        self.control.assert_mutable(key.id())?;
        self.dispatch(Action::Had { key: key.id(), bit })
    }

    pub fn qft(&mut self, key: Key, modulus: impl Into<Expression>, inverse: bool) -> QregResult<()> {
        let modulus = modulus.into();
        if modulus.free_keys().contains(&key.id()) {
            return Err(UsageError::SelfDependency.into());
        }
        self.control.assert_mutable(key.id())?;
        self.dispatch(Action::Qft { key: key.id(), modulus, inverse })
    }

    pub fn phase(&mut self, theta: impl Into<Expression>) -> QregResult<()> {
        self.dispatch(Action::Phase { theta: theta.into() })
    }
    pub fn phase_pi(&mut self, theta: impl Into<Expression>) -> QregResult<()> {
        self.phase(theta.into() * Expression::float(std::f64::consts::PI))
    }
    pub fn phase_2pi(&mut self, theta: impl Into<Expression>) -> QregResult<()> {
        self.phase(theta.into() * Expression::float(2.0 * std::f64::consts::PI))
    }

    pub fn cnot(&mut self, key: Key, idx1: impl Into<Expression>, idx2: impl Into<Expression>) -> QregResult<()> {
        let (idx1, idx2) = (idx1.into(), idx2.into());
        if idx1.free_keys().contains(&key.id()) || idx2.free_keys().contains(&key.id()) {
            return Err(UsageError::SelfDependency.into());
        }
        self.control.assert_mutable(key.id())?;
        self.dispatch(Action::Cnot { key: key.id(), idx1, idx2 })
    }

    /// Composed from three `^=` register ops, the classic XOR swap --
    /// each is already self-inverse so the sequence needs no extra flip
    /// to undo, unlike the original's subtraction-based `swap` (see
    /// DESIGN.md).
    pub fn swap(&mut self, a: Key, b: Key) -> QregResult<()> {
        self.control.assert_mutable(a.id())?;
        self.control.assert_mutable(b.id())?;
        let b_expr = self.read(b)?;
        self.xor_assign(a, b_expr)?;
        let a_expr = self.read(a)?;
        self.xor_assign(b, a_expr)?;
        let b_expr = self.read(b)?;
        self.xor_assign(a, b_expr)
    }

    pub fn qram(&self, table: Vec<(i128, Expression)>, index: impl Into<Expression>) -> Expression {
        Expression::qram(table, index.into())
    }

    //////////////////////////////////////////////////// Measurement

    pub fn measure(&mut self, exprs: &[Expression]) -> QregResult<Vec<f64>> {
        if self.control.is_queueing() {
            return Err(UsageError::MeasureInsideQueue.into());
        }
        measure::measure(&mut self.store, exprs, &mut self.rng)
    }

    pub fn postselect(&mut self, expr: &Expression) -> QregResult<f64> {
        if self.control.is_queueing() {
            return Err(UsageError::MeasureInsideQueue.into());
        }
        measure::postselect(&mut self.store, expr)
    }

    pub fn dist(&self, exprs: &[Expression]) -> QregResult<Vec<DistRow>> {
        measure::dist(&self.store, exprs)
    }

    pub fn print_dist(&self, exprs: &[Expression]) -> QregResult<()> {
        let rows = measure::dist(&self.store, exprs)?;
        println!("{}", measure::format_dist(&rows, self.config.print_digits));
        Ok(())
    }

    pub fn print_amp(&self, exprs: &[Expression]) -> QregResult<()> {
        println!("{}", measure::format_amplitudes(&self.store, exprs, self.config.print_digits)?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bell_pair_is_maximally_entangled() {
        let mut sim = Simulator::new();
        let a = sim.reg(0i64).unwrap();
        let b = sim.reg(0i64).unwrap();
        sim.had(a, 0i64).unwrap();
        let a_expr = sim.read(a).unwrap();
        sim.xor_assign(b, a_expr).unwrap();
        assert_eq!(sim.branch_count(), 2);
        for branch in sim.snapshot_branches() {
            assert_eq!(branch.get(sim.resolve(a.id()).unwrap()), branch.get(sim.resolve(b.id()).unwrap()));
        }
    }

    #[test]
    fn inv_of_hadamard_cancels_a_prior_hadamard() {
        let mut sim = Simulator::new();
        let a = sim.reg(0i64).unwrap();
        sim.had(a, 0i64).unwrap();
        assert_eq!(sim.branch_count(), 2);
        sim.inv(|s| s.had(a, 0i64)).unwrap();
        assert_eq!(sim.branch_count(), 1);
        assert_eq!(sim.snapshot_branches()[0].get(sim.resolve(a.id()).unwrap()), SignedInt::ZERO);
    }

    #[test]
    fn inv_of_register_op_runs_the_inverse_operator() {
        let mut sim = Simulator::new();
        let x = sim.reg(5i64).unwrap();
        sim.inv(|s| s.add_assign(x, Expression::int(3))).unwrap();
        assert_eq!(sim.snapshot_branches()[0].get(sim.resolve(x.id()).unwrap()), SignedInt::from(2));
    }

    #[test]
    fn garbage_scope_allows_clean_scratch_register() {
        let mut sim = Simulator::new();
        let x = sim.reg(5i64).unwrap();
        sim.garbage(None, |s| {
            let tmp = s.reg(0i64)?;
            let x_expr = s.read(x)?;
            s.add_assign(tmp, x_expr)?;
            let tmp_expr = s.read(tmp)?;
            s.clean(tmp, tmp_expr)
        })
        .unwrap();
    }

    #[test]
    fn garbage_scope_rejects_leftover_scratch_register() {
        let mut sim = Simulator::new();
        let result = sim.garbage(None, |s| {
            s.reg(0i64)?;
            Ok(())
        });
        assert!(result.is_err());
    }

    #[test]
    fn q_while_counts_a_register_down_to_zero() {
        let mut sim = Simulator::new();
        let n = sim.reg(4i64).unwrap();
        let count = sim.reg(0i64).unwrap();
        let cond = sim.read(n).unwrap().ne(Expression::int(0));
        sim.q_while(cond, count, |s| s.sub_assign(n, Expression::int(1))).unwrap();
        assert_eq!(sim.snapshot_branches()[0].get(sim.resolve(n.id()).unwrap()), SignedInt::ZERO);
    }

    #[test]
    fn measure_is_rejected_inside_a_queueing_scope() {
        let mut sim = Simulator::new();
        let a = sim.reg(0i64).unwrap();
        let result = sim.inv(|s| {
            let expr = s.read(a)?;
            assert!(s.measure(&[expr]).is_err());
            Ok(())
        });
        assert!(result.is_ok());
    }

    #[test]
    fn assign_is_rejected_outside_a_garbage_scope() {
        let mut sim = Simulator::new();
        let x = sim.reg(0i64).unwrap();
        assert!(sim.assign(x, Expression::int(7)).is_err());
    }

    #[test]
    fn assign_overwrites_target_inside_a_garbage_scope() {
        let mut sim = Simulator::new();
        let x = sim.reg(5i64).unwrap();
        sim.garbage(None, |s| {
            let tmp = s.assign(x, Expression::int(9))?;
            let tmp_expr = s.read(tmp)?;
            s.clean(tmp, tmp_expr)
        })
        .unwrap();
        assert_eq!(sim.snapshot_branches()[0].get(sim.resolve(x.id()).unwrap()), SignedInt::from(9));
    }

    #[test]
    fn mod_assign_reduces_target_inside_a_garbage_scope() {
        let mut sim = Simulator::new();
        let x = sim.reg(7i64).unwrap();
        sim.garbage(None, |s| {
            let tmp = s.mod_assign(x, Expression::int(3))?;
            let tmp_expr = s.read(tmp)?;
            s.clean(tmp, tmp_expr)
        })
        .unwrap();
        assert_eq!(sim.snapshot_branches()[0].get(sim.resolve(x.id()).unwrap()), SignedInt::from(1));
    }

    #[test]
    fn bit_set_flips_only_the_targeted_bit() {
        let mut sim = Simulator::new();
        let x = sim.reg(0i64).unwrap();
        sim.garbage(None, |s| {
            let tmp = s.bit_set(x, Expression::int(1), Expression::int(1))?;
            let tmp_expr = s.read(tmp)?;
            s.clean(tmp, tmp_expr)
        })
        .unwrap();
        assert_eq!(sim.snapshot_branches()[0].get(sim.resolve(x.id()).unwrap()), SignedInt::from(2));
    }

    #[test]
    fn assign_rejects_self_dependent_expression() {
        let mut sim = Simulator::new();
        let x = sim.reg(0i64).unwrap();
        let result = sim.garbage(None, |s| {
            let x_expr = s.read(x)?;
            s.assign(x, x_expr)?;
            Ok(())
        });
        assert!(result.is_err());
    }

    #[test]
    fn dealloc_leaves_a_partner_for_a_later_sibling() {
        let mut sim = Simulator::new();
        sim.garbage(None, |s| {
            let a = s.reg(0i64)?;
            let b = s.reg(0i64)?;
            let a_id = a.id();
            s.clean(a, Expression::int(0))?;
            assert!(s.resolve(a_id).is_ok());
            s.clean(b, Expression::int(0))
        })
        .unwrap();
    }
}
