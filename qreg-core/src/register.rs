//! Keys (stable register handles) and the reversible in-place operators
//! that mutate the values they point at.

use crate::branch::RegisterId;
use crate::error::{QregResult, ReversibilityError};
use crate::sm_int::SignedInt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KeyId(pub u64);

/// User-facing handle. Cheap to copy; the actual register lookup goes
/// through the owning `Simulator`'s `KeyTable`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Key(pub KeyId);

impl Key {
    pub fn id(&self) -> KeyId {
        self.0
    }
}

/// Maps key ids to the register id they currently occupy, or `None` when
/// the key has been deallocated and is only kept around as a partner
/// proxy for uncomputation.
#[derive(Debug, Default)]
pub struct KeyTable {
    slots: Vec<Option<RegisterId>>,
    partner: Vec<Option<KeyId>>,
}

impl KeyTable {
    pub fn new_key(&mut self, reg: RegisterId) -> Key {
        let id = KeyId(self.slots.len() as u64);
        self.slots.push(Some(reg));
        self.partner.push(None);
        Key(id)
    }

    pub fn register_of(&self, key: KeyId) -> Option<RegisterId> {
        self.slots[key.0 as usize]
    }

    pub fn is_allocated(&self, key: KeyId) -> bool {
        self.slots[key.0 as usize].is_some()
    }

    pub fn deallocate(&mut self, key: KeyId) {
        self.slots[key.0 as usize] = None;
    }

    pub fn set_partner(&mut self, key: KeyId, partner: KeyId) {
        self.partner[key.0 as usize] = Some(partner);
    }

    pub fn partner_of(&self, key: KeyId) -> Option<KeyId> {
        self.partner[key.0 as usize]
    }

    /// Follows the partner chain until it finds a still-allocated key,
    /// which is how an unallocated key proxies for uncomputation.
    pub fn resolve(&self, key: KeyId) -> Option<RegisterId> {
        let mut current = key;
        for _ in 0..self.slots.len() + 1 {
            if let Some(r) = self.slots[current.0 as usize] {
                return Some(r);
            }
            current = self.partner[current.0 as usize]?;
        }
        None
    }
}

/// The seven reversible in-place operators a register supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOp {
    AddAssign,
    SubAssign,
    MulAssign,
    FloorDivAssign,
    XorAssign,
    PowAssign,
    ShlAssign,
}

impl RegisterOp {
    pub fn name(&self) -> &'static str {
        match self {
            RegisterOp::AddAssign => "+=",
            RegisterOp::SubAssign => "-=",
            RegisterOp::MulAssign => "*=",
            RegisterOp::FloorDivAssign => "//=",
            RegisterOp::XorAssign => "^=",
            RegisterOp::PowAssign => "**=",
            RegisterOp::ShlAssign => "<<=",
        }
    }

    /// The operator that replays this one backwards.
    pub fn inverse(&self) -> RegisterOp {
        match self {
            RegisterOp::AddAssign => RegisterOp::SubAssign,
            RegisterOp::SubAssign => RegisterOp::AddAssign,
            RegisterOp::MulAssign => RegisterOp::MulAssign, // handled specially (divide)
            RegisterOp::FloorDivAssign => RegisterOp::FloorDivAssign, // handled specially (multiply)
            RegisterOp::XorAssign => RegisterOp::XorAssign, // self-inverse
            RegisterOp::PowAssign => RegisterOp::PowAssign, // handled specially (root)
            RegisterOp::ShlAssign => RegisterOp::ShlAssign, // handled specially (shr)
        }
    }
}

/// Applies the forward half of an operator to one branch's value.
pub fn apply_forward(op: RegisterOp, r: SignedInt, e: SignedInt) -> QregResult<SignedInt> {
    Ok(match op {
        RegisterOp::AddAssign => r.add(&e),
        RegisterOp::SubAssign => r.sub(&e),
        RegisterOp::MulAssign => {
            if e == SignedInt::ZERO {
                return Err(ReversibilityError::MultiplyByZero.into());
            }
            r.mul(&e)
        }
        RegisterOp::FloorDivAssign => {
            if e == SignedInt::ZERO {
                return Err(ReversibilityError::InexactFloorDivide.into());
            }
            if r.rem(&e) != SignedInt::ZERO {
                return Err(ReversibilityError::InexactFloorDivide.into());
            }
            r.div_floor(&e)
        }
        RegisterOp::XorAssign => r.xor(&e),
        RegisterOp::PowAssign => {
            if e.is_negative() || e == SignedInt::ZERO {
                return Err(ReversibilityError::NonPositiveIntegerExponent.into());
            }
            r.pow(&e)
        }
        RegisterOp::ShlAssign => r.shl(e.to_i128() as u32),
    })
}

/// Applies the backward half of an operator -- either literally undoing
/// it (most ops) or performing the operator's own declared inverse
/// computation (`*=`, `//=`, `**=`, `<<=`), checking exactness as it goes.
pub fn apply_backward(op: RegisterOp, r: SignedInt, e: SignedInt) -> QregResult<SignedInt> {
    Ok(match op {
        RegisterOp::AddAssign => r.sub(&e),
        RegisterOp::SubAssign => r.add(&e),
        RegisterOp::MulAssign => {
            if e == SignedInt::ZERO {
                return Err(ReversibilityError::MultiplyByZero.into());
            }
            if r.rem(&e) != SignedInt::ZERO {
                return Err(ReversibilityError::InexactMultiplyUndo.into());
            }
            r.div_trunc(&e)
        }
        RegisterOp::FloorDivAssign => r.mul(&e),
        RegisterOp::XorAssign => r.xor(&e),
        RegisterOp::PowAssign => {
            let exp = e.to_i128();
            if exp <= 0 {
                return Err(ReversibilityError::NonPositiveIntegerExponent.into());
            }
            integer_root(r, exp as u32).ok_or(ReversibilityError::NonIntegerRoot)?
        }
        RegisterOp::ShlAssign => r.shr(e.to_i128() as u32),
    })
}

/// Integer `exp`-th root of `r`, if one exists exactly (negative `r` only
/// has a real root for odd `exp`).
fn integer_root(r: SignedInt, exp: u32) -> Option<SignedInt> {
    if r.is_negative() && exp % 2 == 0 {
        return None;
    }
    let target = r.magnitude();
    let mut candidate = (target as f64).powf(1.0 / exp as f64).round() as u64;
    for delta in [0i64, 1, -1, 2, -2] {
        let c = (candidate as i64 + delta).max(0) as u64;
        if c.checked_pow(exp) == Some(target) {
            candidate = c;
            let sign = if r.is_negative() { crate::sm_int::Sign::Neg } else { crate::sm_int::Sign::Pos };
            return Some(SignedInt::new(sign, candidate));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multiply_by_zero_is_rejected() {
        let r = SignedInt::from(4);
        assert!(apply_forward(RegisterOp::MulAssign, r, SignedInt::ZERO).is_err());
    }

    #[test]
    fn floor_div_rejects_uneven_division() {
        let r = SignedInt::from(7);
        assert!(apply_forward(RegisterOp::FloorDivAssign, r, SignedInt::from(2)).is_err());
        let r2 = SignedInt::from(6);
        assert!(apply_forward(RegisterOp::FloorDivAssign, r2, SignedInt::from(2)).is_ok());
    }

    #[test]
    fn pow_then_root_round_trips() {
        let r = SignedInt::from(3);
        let raised = apply_forward(RegisterOp::PowAssign, r, SignedInt::from(4)).unwrap();
        assert_eq!(raised, SignedInt::from(81));
        let rooted = apply_backward(RegisterOp::PowAssign, raised, SignedInt::from(4)).unwrap();
        assert_eq!(rooted, r);
    }

    #[test]
    fn pow_non_integer_root_rejected() {
        let raised = SignedInt::from(80);
        assert!(apply_backward(RegisterOp::PowAssign, raised, SignedInt::from(4)).is_err());
    }

    #[test]
    fn key_table_partner_resolution() {
        let mut table = KeyTable::default();
        let k1 = table.new_key(RegisterId(0));
        let k2 = table.new_key(RegisterId(1));
        table.deallocate(k1.id());
        table.set_partner(k1.id(), k2.id());
        assert_eq!(table.resolve(k1.id()), Some(RegisterId(1)));
    }
}
