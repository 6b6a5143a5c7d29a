//! Signed-magnitude integers.
//!
//! A pair `(sign, magnitude)`. Arithmetic works on the signed value;
//! bitwise operations work on the magnitude, with the sign itself
//! addressable as bit index `-1`. Canonicalization: every arithmetic
//! result (`+ - * / // % **`) is normalized to `sign = Pos` when
//! `magnitude == 0`. Bit-level writes to index `-1` bypass that
//! normalization on purpose, since the sign bit must stay independently
//! addressable -- so `-0` is reachable, just never produced by arithmetic.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sign {
    Pos,
    Neg,
}

impl Sign {
    fn flip(self) -> Self {
        match self {
            Sign::Pos => Sign::Neg,
            Sign::Neg => Sign::Pos,
        }
    }

    fn mul(self, other: Sign) -> Sign {
        if self == other { Sign::Pos } else { Sign::Neg }
    }
}

/// A signed-magnitude integer: `sign * magnitude`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SignedInt {
    sign: Sign,
    magnitude: u64,
}

impl SignedInt {
    /// Canonical constructor: magnitude 0 is always `Pos`.
    pub fn new(sign: Sign, magnitude: u64) -> Self {
        if magnitude == 0 {
            Self { sign: Sign::Pos, magnitude: 0 }
        } else {
            Self { sign, magnitude }
        }
    }

    pub const ZERO: SignedInt = SignedInt { sign: Sign::Pos, magnitude: 0 };

    pub fn from_i128(v: i128) -> Self {
        if v < 0 {
            Self::new(Sign::Neg, (-v) as u64)
        } else {
            Self::new(Sign::Pos, v as u64)
        }
    }

    pub fn sign(&self) -> Sign {
        self.sign
    }

    pub fn magnitude(&self) -> u64 {
        self.magnitude
    }

    pub fn to_i128(&self) -> i128 {
        match self.sign {
            Sign::Pos => self.magnitude as i128,
            Sign::Neg => -(self.magnitude as i128),
        }
    }

    pub fn to_f64(&self) -> f64 {
        self.to_i128() as f64
    }

    pub fn is_negative(&self) -> bool {
        matches!(self.sign, Sign::Neg) && self.magnitude != 0
    }

    pub fn negate(&self) -> Self {
        // Intentionally NOT passed through `new`: negating canonical +0
        // stays +0 via the magnitude==0 check, but this is the one path
        // that can otherwise hand back an explicit -0.
        SignedInt { sign: self.sign.flip(), magnitude: self.magnitude }
    }

    pub fn abs(&self) -> Self {
        Self::new(Sign::Pos, self.magnitude)
    }

    pub fn add(&self, other: &Self) -> Self {
        Self::from_i128(self.to_i128() + other.to_i128())
    }

    pub fn sub(&self, other: &Self) -> Self {
        Self::from_i128(self.to_i128() - other.to_i128())
    }

    pub fn mul(&self, other: &Self) -> Self {
        Self::new(self.sign.mul(other.sign), self.magnitude * other.magnitude)
    }

    /// Truncating division (`/` on integers, round toward zero).
    pub fn div_trunc(&self, other: &Self) -> Self {
        Self::new(self.sign.mul(other.sign), self.magnitude / other.magnitude)
    }

    /// Floor division (`//`), rounds toward negative infinity.
    pub fn div_floor(&self, other: &Self) -> Self {
        Self::from_i128(self.to_i128().div_euclid(other.to_i128()).into())
            .floor_adjust(self, other)
    }

    // div_euclid rounds toward -inf only for positive divisors in the
    // usual Euclidean sense; adjust to true floor division.
    fn floor_adjust(self, a: &Self, b: &Self) -> Self {
        let av = a.to_i128();
        let bv = b.to_i128();
        let q = av.div_euclid(bv);
        let r = av.rem_euclid(bv);
        let floor_q = if bv < 0 && r != 0 { q + 1 } else { q };
        Self::from_i128(floor_q)
    }

    pub fn rem(&self, other: &Self) -> Self {
        let av = self.to_i128();
        let bv = other.to_i128();
        Self::from_i128(av - bv * self.div_floor(other).to_i128())
    }

    pub fn pow(&self, exp: &Self) -> Self {
        let e = exp.to_i128().max(0) as u32;
        Self::from_i128(self.to_i128().pow(e))
    }

    pub fn xor(&self, other: &Self) -> Self {
        // XOR propagates sign multiplicatively, magnitude XORs bitwise.
        Self::new(self.sign.mul(other.sign), self.magnitude ^ other.magnitude)
    }

    pub fn and(&self, other: &Self) -> Self {
        Self::new(self.sign.mul(other.sign), self.magnitude & other.magnitude)
    }

    pub fn or(&self, other: &Self) -> Self {
        Self::new(self.sign.mul(other.sign), self.magnitude | other.magnitude)
    }

    pub fn shl(&self, amount: u32) -> Self {
        Self::new(self.sign, self.magnitude << amount)
    }

    pub fn shr(&self, amount: u32) -> Self {
        Self::new(self.sign, self.magnitude >> amount)
    }

    /// Reads bit `index`; `-1` reads the sign bit (1 = negative).
    pub fn bit(&self, index: i64) -> bool {
        if index == -1 {
            self.is_negative()
        } else if index < 0 {
            false
        } else {
            (self.magnitude >> index) & 1 == 1
        }
    }

    /// Sets bit `index`; `-1` writes the sign bit directly, which is the
    /// one place `-0` can be observed.
    pub fn with_bit(&self, index: i64, value: bool) -> Self {
        if index == -1 {
            let sign = if value { Sign::Neg } else { Sign::Pos };
            SignedInt { sign, magnitude: self.magnitude }
        } else if index < 0 {
            *self
        } else {
            let mask = 1u64 << index;
            let magnitude = if value { self.magnitude | mask } else { self.magnitude & !mask };
            Self::new(self.sign, magnitude)
        }
    }

    /// Bit length of the magnitude, at least 1.
    pub fn bit_length(&self) -> u32 {
        if self.magnitude == 0 {
            1
        } else {
            64 - self.magnitude.leading_zeros()
        }
    }
}

impl PartialEq for SignedInt {
    fn eq(&self, other: &Self) -> bool {
        self.sign == other.sign && self.magnitude == other.magnitude
    }
}
impl Eq for SignedInt {}

impl Hash for SignedInt {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let key = self.magnitude.wrapping_mul(2) + if self.sign == Sign::Pos { 1 } else { 0 };
        key.hash(state);
    }
}

impl fmt::Display for SignedInt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_i128())
    }
}

impl From<i64> for SignedInt {
    fn from(v: i64) -> Self {
        Self::from_i128(v as i128)
    }
}
