//! Pure expressions over a branch configuration.
//!
//! An `Expression` is a tagged sum over literals, register reads and
//! operator nodes rather than a boxed closure -- cheaper to build, and
//! its free-key set can be walked without ever touching a branch.

use std::collections::BTreeSet;
use std::fmt;
use std::ops;

use crate::branch::{Branch, RegisterId};
use crate::error::{NumericalError, QregError, QregResult, UsageError};
use crate::register::KeyId;
use crate::sm_int::SignedInt;

/// Result of evaluating an expression against one branch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Int(SignedInt),
    Float(f64),
}

impl Value {
    pub fn as_f64(&self) -> f64 {
        match self {
            Value::Int(i) => i.to_f64(),
            Value::Float(f) => *f,
        }
    }

    pub fn as_int(&self) -> SignedInt {
        match self {
            Value::Int(i) => *i,
            Value::Float(f) => SignedInt::from_i128(*f as i128),
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Value::Float(_))
    }

    pub fn is_truthy(&self) -> bool {
        self.as_f64() != 0.0
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{:.10}", x),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone)]
pub enum Expression {
    IntLit(SignedInt),
    FloatLit(f64),
    Reg { key: KeyId, reg: RegisterId },
    Neg(Box<Expression>),
    Abs(Box<Expression>),
    Add(Box<Expression>, Box<Expression>),
    Sub(Box<Expression>, Box<Expression>),
    Mul(Box<Expression>, Box<Expression>),
    Div(Box<Expression>, Box<Expression>),
    FloorDiv(Box<Expression>, Box<Expression>),
    Mod(Box<Expression>, Box<Expression>),
    Pow(Box<Expression>, Box<Expression>),
    BitAnd(Box<Expression>, Box<Expression>),
    BitOr(Box<Expression>, Box<Expression>),
    BitXor(Box<Expression>, Box<Expression>),
    Shl(Box<Expression>, Box<Expression>),
    Shr(Box<Expression>, Box<Expression>),
    Index(Box<Expression>, Box<Expression>),
    Length(Box<Expression>),
    Cmp(CmpOp, Box<Expression>, Box<Expression>),
    IntCast(Box<Expression>),
    FloatCast(Box<Expression>),
    Round(Box<Expression>),
    Floor(Box<Expression>),
    Ceil(Box<Expression>),
    Sqrt(Box<Expression>),
    Sin(Box<Expression>),
    Cos(Box<Expression>),
    Tan(Box<Expression>),
    Exp(Box<Expression>),
    Qram { table: Vec<(i128, Expression)>, index: Box<Expression> },
}

impl Expression {
    pub fn int(v: i64) -> Self {
        Expression::IntLit(SignedInt::from(v))
    }

    pub fn float(v: f64) -> Self {
        Expression::FloatLit(v)
    }

    pub fn reg(key: KeyId, reg: RegisterId) -> Self {
        Expression::Reg { key, reg }
    }

    /// True if this expression's *static* type is float; bitwise ops
    /// statically require both operands to be non-float.
    pub fn is_float_typed(&self) -> bool {
        use Expression::*;
        match self {
            IntLit(_) => false,
            FloatLit(_) => true,
            Reg { .. } => false,
            Neg(a) | Abs(a) => a.is_float_typed(),
            Add(a, b) | Sub(a, b) | Mul(a, b) | Mod(a, b) | Pow(a, b) => {
                a.is_float_typed() || b.is_float_typed()
            }
            Div(_, _) => true,
            FloorDiv(a, b) => a.is_float_typed() || b.is_float_typed(),
            BitAnd(_, _) | BitOr(_, _) | BitXor(_, _) | Shl(_, _) | Shr(_, _) => false,
            Index(_, _) | Length(_) => false,
            Cmp(_, _, _) => false,
            IntCast(_) => false,
            FloatCast(_) => true,
            Round(_) | Floor(_) | Ceil(_) => false,
            Sqrt(_) | Sin(_) | Cos(_) | Tan(_) | Exp(_) => true,
            Qram { table, .. } => table.iter().any(|(_, e)| e.is_float_typed()),
        }
    }

    /// Keys this expression reads, directly or transitively.
    pub fn free_keys(&self) -> BTreeSet<KeyId> {
        let mut out = BTreeSet::new();
        self.collect_free_keys(&mut out);
        out
    }

    fn collect_free_keys(&self, out: &mut BTreeSet<KeyId>) {
        use Expression::*;
        match self {
            IntLit(_) | FloatLit(_) => {}
            Reg { key, .. } => {
                out.insert(*key);
            }
            Neg(a) | Abs(a) | Length(a) | IntCast(a) | FloatCast(a) | Round(a) | Floor(a)
            | Ceil(a) | Sqrt(a) | Sin(a) | Cos(a) | Tan(a) | Exp(a) => a.collect_free_keys(out),
            Add(a, b) | Sub(a, b) | Mul(a, b) | Div(a, b) | FloorDiv(a, b) | Mod(a, b)
            | Pow(a, b) | BitAnd(a, b) | BitOr(a, b) | BitXor(a, b) | Shl(a, b) | Shr(a, b)
            | Index(a, b) | Cmp(_, a, b) => {
                a.collect_free_keys(out);
                b.collect_free_keys(out);
            }
            Qram { table, index } => {
                for (_, e) in table {
                    e.collect_free_keys(out);
                }
                index.collect_free_keys(out);
            }
        }
    }

    pub fn eval(&self, branch: &Branch) -> QregResult<Value> {
        use Expression::*;
        Ok(match self {
            IntLit(v) => Value::Int(*v),
            FloatLit(v) => Value::Float(*v),
            Reg { reg, .. } => Value::Int(branch.get(*reg)),
            Neg(a) => match a.eval(branch)? {
                Value::Int(i) => Value::Int(i.negate()),
                Value::Float(f) => Value::Float(-f),
            },
            Abs(a) => match a.eval(branch)? {
                Value::Int(i) => Value::Int(i.abs()),
                Value::Float(f) => Value::Float(f.abs()),
            },
            Add(a, b) => numeric_binop(a, b, branch, |x, y| x.add(&y), |x, y| x + y)?,
            Sub(a, b) => numeric_binop(a, b, branch, |x, y| x.sub(&y), |x, y| x - y)?,
            Mul(a, b) => numeric_binop(a, b, branch, |x, y| x.mul(&y), |x, y| x * y)?,
            Div(a, b) => Value::Float(a.eval(branch)?.as_f64() / b.eval(branch)?.as_f64()),
            FloorDiv(a, b) => numeric_binop(a, b, branch, |x, y| x.div_floor(&y), |x, y| (x / y).floor())?,
            Mod(a, b) => numeric_binop(a, b, branch, |x, y| x.rem(&y), |x, y| x.rem_euclid(y))?,
            Pow(a, b) => numeric_binop(a, b, branch, |x, y| x.pow(&y), |x, y| x.powf(y))?,
            BitAnd(a, b) => Value::Int(int_binop(a, b, branch, |x, y| x.and(&y))?),
            BitOr(a, b) => Value::Int(int_binop(a, b, branch, |x, y| x.or(&y))?),
            BitXor(a, b) => Value::Int(int_binop(a, b, branch, |x, y| x.xor(&y))?),
            Shl(a, b) => Value::Int(int_binop(a, b, branch, |x, y| x.shl(y.to_i128() as u32))?),
            Shr(a, b) => Value::Int(int_binop(a, b, branch, |x, y| x.shr(y.to_i128() as u32))?),
            Index(a, b) => {
                let v = int_only(a, branch)?;
                let idx = int_only(b, branch)?.to_i128() as i64;
                Value::Int(SignedInt::from(v.bit(idx) as i64))
            }
            Length(a) => Value::Int(SignedInt::from(int_only(a, branch)?.bit_length() as i64)),
            Cmp(op, a, b) => {
                let av = a.eval(branch)?;
                let bv = b.eval(branch)?;
                let (x, y) = (av.as_f64(), bv.as_f64());
                let truth = match op {
                    CmpOp::Eq => x == y,
                    CmpOp::Ne => x != y,
                    CmpOp::Lt => x < y,
                    CmpOp::Le => x <= y,
                    CmpOp::Gt => x > y,
                    CmpOp::Ge => x >= y,
                };
                Value::Int(SignedInt::from(truth as i64))
            }
            IntCast(a) => Value::Int(a.eval(branch)?.as_int()),
            FloatCast(a) => Value::Float(a.eval(branch)?.as_f64()),
            Round(a) => Value::Int(SignedInt::from_i128(a.eval(branch)?.as_f64().round() as i128)),
            Floor(a) => Value::Int(SignedInt::from_i128(a.eval(branch)?.as_f64().floor() as i128)),
            Ceil(a) => Value::Int(SignedInt::from_i128(a.eval(branch)?.as_f64().ceil() as i128)),
            Sqrt(a) => Value::Float(a.eval(branch)?.as_f64().sqrt()),
            Sin(a) => Value::Float(a.eval(branch)?.as_f64().sin()),
            Cos(a) => Value::Float(a.eval(branch)?.as_f64().cos()),
            Tan(a) => Value::Float(a.eval(branch)?.as_f64().tan()),
            Exp(a) => Value::Float(a.eval(branch)?.as_f64().exp()),
            Qram { table, index } => {
                let idx = int_only(index, branch)?.to_i128();
                let entry = table
                    .iter()
                    .find(|(k, _)| *k == idx)
                    .ok_or(QregError::Numerical(NumericalError::ZeroNormInitializer))?;
                entry.1.eval(branch)?
            }
        })
    }
}

fn int_only(e: &Expression, branch: &Branch) -> QregResult<SignedInt> {
    match e.eval(branch)? {
        Value::Int(i) => Ok(i),
        Value::Float(_) => Err(QregError::Usage(UsageError::IntOperandRequired)),
    }
}

fn int_binop(
    a: &Expression,
    b: &Expression,
    branch: &Branch,
    f: impl Fn(SignedInt, SignedInt) -> SignedInt,
) -> QregResult<SignedInt> {
    if a.is_float_typed() || b.is_float_typed() {
        return Err(QregError::Usage(UsageError::IntOperandRequired));
    }
    Ok(f(int_only(a, branch)?, int_only(b, branch)?))
}

fn numeric_binop(
    a: &Expression,
    b: &Expression,
    branch: &Branch,
    fi: impl Fn(SignedInt, SignedInt) -> SignedInt,
    ff: impl Fn(f64, f64) -> f64,
) -> QregResult<Value> {
    let av = a.eval(branch)?;
    let bv = b.eval(branch)?;
    if av.is_float() || bv.is_float() {
        Ok(Value::Float(ff(av.as_f64(), bv.as_f64())))
    } else {
        Ok(Value::Int(fi(av.as_int(), bv.as_int())))
    }
}

impl From<i64> for Expression {
    fn from(v: i64) -> Self {
        Expression::int(v)
    }
}
impl From<f64> for Expression {
    fn from(v: f64) -> Self {
        Expression::float(v)
    }
}

macro_rules! bin_op_impl {
    ($trait:ident, $method:ident, $variant:ident) => {
        impl ops::$trait for Expression {
            type Output = Expression;
            fn $method(self, rhs: Expression) -> Expression {
                Expression::$variant(Box::new(self), Box::new(rhs))
            }
        }
    };
}

bin_op_impl!(Add, add, Add);
bin_op_impl!(Sub, sub, Sub);
bin_op_impl!(Mul, mul, Mul);
bin_op_impl!(Div, div, Div);
bin_op_impl!(Rem, rem, Mod);
bin_op_impl!(BitAnd, bitand, BitAnd);
bin_op_impl!(BitOr, bitor, BitOr);
bin_op_impl!(BitXor, bitxor, BitXor);

impl ops::Neg for Expression {
    type Output = Expression;
    fn neg(self) -> Expression {
        Expression::Neg(Box::new(self))
    }
}

impl Expression {
    pub fn floor_div(self, rhs: Expression) -> Expression {
        Expression::FloorDiv(Box::new(self), Box::new(rhs))
    }
    pub fn pow(self, rhs: Expression) -> Expression {
        Expression::Pow(Box::new(self), Box::new(rhs))
    }
    pub fn shl(self, rhs: Expression) -> Expression {
        Expression::Shl(Box::new(self), Box::new(rhs))
    }
    pub fn shr(self, rhs: Expression) -> Expression {
        Expression::Shr(Box::new(self), Box::new(rhs))
    }
    pub fn index(self, bit: Expression) -> Expression {
        Expression::Index(Box::new(self), Box::new(bit))
    }
    pub fn length(self) -> Expression {
        Expression::Length(Box::new(self))
    }
    pub fn abs(self) -> Expression {
        Expression::Abs(Box::new(self))
    }
    pub fn cmp(self, op: CmpOp, rhs: Expression) -> Expression {
        Expression::Cmp(op, Box::new(self), Box::new(rhs))
    }
    pub fn eq(self, rhs: Expression) -> Expression {
        self.cmp(CmpOp::Eq, rhs)
    }
    pub fn ne(self, rhs: Expression) -> Expression {
        self.cmp(CmpOp::Ne, rhs)
    }
    pub fn lt(self, rhs: Expression) -> Expression {
        self.cmp(CmpOp::Lt, rhs)
    }
    pub fn le(self, rhs: Expression) -> Expression {
        self.cmp(CmpOp::Le, rhs)
    }
    pub fn gt(self, rhs: Expression) -> Expression {
        self.cmp(CmpOp::Gt, rhs)
    }
    pub fn ge(self, rhs: Expression) -> Expression {
        self.cmp(CmpOp::Ge, rhs)
    }
    pub fn int_cast(self) -> Expression {
        Expression::IntCast(Box::new(self))
    }
    pub fn float_cast(self) -> Expression {
        Expression::FloatCast(Box::new(self))
    }
    pub fn round(self) -> Expression {
        Expression::Round(Box::new(self))
    }
    pub fn sqrt(self) -> Expression {
        Expression::Sqrt(Box::new(self))
    }
    pub fn qram(table: Vec<(i128, Expression)>, index: Expression) -> Expression {
        Expression::Qram { table, index: Box::new(index) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_complex::Complex64;

    #[test]
    fn literal_addition() {
        let e = Expression::int(2) + Expression::int(3);
        let branch = Branch::empty(Complex64::new(1.0, 0.0));
        assert_eq!(e.eval(&branch).unwrap(), Value::Int(SignedInt::from(5)));
    }

    #[test]
    fn division_is_always_float() {
        let e = Expression::int(4) / Expression::int(2);
        let branch = Branch::empty(Complex64::new(1.0, 0.0));
        assert!(matches!(e.eval(&branch).unwrap(), Value::Float(_)));
    }

    #[test]
    fn float_propagates_through_arithmetic() {
        let e = Expression::int(2) + Expression::float(0.5);
        assert!(e.is_float_typed());
    }

    #[test]
    fn bitwise_rejects_float_operand() {
        let e = Expression::float(1.0) & Expression::int(1);
        let branch = Branch::empty(Complex64::new(1.0, 0.0));
        assert!(e.eval(&branch).is_err());
    }

    #[test]
    fn qram_looks_up_by_index() {
        let table = vec![(0, Expression::int(10)), (1, Expression::int(20))];
        let e = Expression::qram(table, Expression::int(1));
        let branch = Branch::empty(Complex64::new(1.0, 0.0));
        assert_eq!(e.eval(&branch).unwrap(), Value::Int(SignedInt::from(20)));
    }
}
