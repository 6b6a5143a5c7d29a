//! A single branch: one classical configuration plus its complex amplitude.

use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::sm_int::SignedInt;

/// Dense, monotonically allocated register identifier. Never reused until
/// the whole store is cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RegisterId(pub u64);

impl fmt::Display for RegisterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// One branch: register id -> value, plus the branch's amplitude.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Branch {
    values: BTreeMap<RegisterId, SignedInt>,
    #[serde(with = "complex_serde")]
    pub amplitude: Complex64,
}

impl Branch {
    pub fn empty(amplitude: Complex64) -> Self {
        Self { values: BTreeMap::new(), amplitude }
    }

    pub fn get(&self, id: RegisterId) -> SignedInt {
        self.values.get(&id).copied().unwrap_or(SignedInt::ZERO)
    }

    pub fn set(&mut self, id: RegisterId, value: SignedInt) {
        self.values.insert(id, value);
    }

    pub fn remove(&mut self, id: RegisterId) -> Option<SignedInt> {
        self.values.remove(&id)
    }

    pub fn contains(&self, id: RegisterId) -> bool {
        self.values.contains_key(&id)
    }

    pub fn register_ids(&self) -> impl Iterator<Item = &RegisterId> {
        self.values.keys()
    }

    /// Two branches are configuration-equal when every register id maps
    /// to an equal value (amplitude is excluded from the comparison).
    pub fn same_configuration(&self, other: &Branch) -> bool {
        self.values == other.values
    }
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "amp={:+.6}{:+.6}i [", self.amplitude.re, self.amplitude.im)?;
        for (i, (id, val)) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={}", id, val)?;
        }
        write!(f, "]")
    }
}

mod complex_serde {
    use num_complex::Complex64;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    struct ComplexShadow {
        re: f64,
        im: f64,
    }

    pub fn serialize<S: Serializer>(c: &Complex64, s: S) -> Result<S::Ok, S::Error> {
        ComplexShadow { re: c.re, im: c.im }.serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Complex64, D::Error> {
        let shadow = ComplexShadow::deserialize(d)?;
        Ok(Complex64::new(shadow.re, shadow.im))
    }
}
