use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::IdentError;
use crate::serial::{Serial63, NB_DIGITS};

/// Global object identity: an ordered pair of serials.
///
/// A `PairId` is null iff both halves are zero; a half-null pair is
/// rejected at construction. Ordering is lexicographic on `(hi, lo)`.
/// The text form concatenates both serial strings (24 characters), with
/// the literal `__` standing for the null identity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PairId {
    hi: Serial63,
    lo: Serial63,
}

impl PairId {
    /// The null identity.
    pub const NULL: PairId = PairId {
        hi: Serial63::NULL,
        lo: Serial63::NULL,
    };

    /// Build a pair id from two serials. Null iff both are null.
    pub fn new(hi: Serial63, lo: Serial63) -> Result<Self, IdentError> {
        if hi.is_null() != lo.is_null() {
            return Err(IdentError::HalfNull {
                hi: hi.value(),
                lo: lo.value(),
            });
        }
        Ok(PairId { hi, lo })
    }

    /// Build from two raw numbers, range-checking both.
    pub fn from_raw(hi: u64, lo: u64) -> Result<Self, IdentError> {
        PairId::new(Serial63::new(hi)?, Serial63::new(lo)?)
    }

    /// A fresh random identity.
    pub fn random() -> Self {
        PairId {
            hi: Serial63::random(),
            lo: Serial63::random(),
        }
    }

    /// A fresh random identity whose bucket number is exactly `bucket`.
    pub fn random_of_bucket(bucket: u32) -> Result<Self, IdentError> {
        Ok(PairId {
            hi: Serial63::random_of_bucket(bucket)?,
            lo: Serial63::random(),
        })
    }

    pub const fn hi(self) -> Serial63 {
        self.hi
    }

    pub const fn lo(self) -> Serial63 {
        self.lo
    }

    pub const fn is_null(self) -> bool {
        self.hi.is_null() && self.lo.is_null()
    }

    /// Bucket number, derived from the high serial alone.
    pub const fn bucket(self) -> u32 {
        self.hi.bucket()
    }

    /// 32-bit identity hash; 0 only for the null id.
    ///
    /// The natural formula XORs a shifted low half into the high half.
    /// When that collapses to zero, a salvage formula is applied so that 0
    /// stays reserved as the "no hash" sentinel.
    pub fn hash32(self) -> u32 {
        if self.is_null() {
            return 0;
        }
        let hs = self.hi.value();
        let ls = self.lo.value();
        let h = (hs ^ (ls >> 2)) as u32;
        if h != 0 {
            return h;
        }
        hash0_pairid(hs, ls)
    }
}

/// Salvage hash for the rare pairs whose natural hash is zero.
fn hash0_pairid(hs: u64, ls: u64) -> u32 {
    debug_assert!(hs != 0 || ls != 0);
    let h = ((hs << 3) ^ ls.wrapping_mul(5147)) as u32;
    if h != 0 {
        return h;
    }
    let h = 17u32
        .wrapping_mul((hs % 504_677) as u32)
        .wrapping_add((ls % 11_716_949) as u32)
        .wrapping_add(31);
    debug_assert!(h != 0);
    h
}

impl fmt::Display for PairId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            return write!(f, "__");
        }
        write!(f, "{}{}", self.hi, self.lo)
    }
}

impl FromStr for PairId {
    type Err = IdentError;

    fn from_str(s: &str) -> Result<Self, IdentError> {
        if s == "__" {
            return Ok(PairId::NULL);
        }
        if s.len() != 2 * (NB_DIGITS + 1) {
            return Err(IdentError::BadFormat {
                text: s.to_string(),
                reason: "wrong length",
            });
        }
        let (hi, rest) = Serial63::parse_prefix(s)?;
        let (lo, rest) = Serial63::parse_prefix(rest)?;
        debug_assert!(rest.is_empty());
        PairId::new(hi, lo)
    }
}

impl TryFrom<String> for PairId {
    type Error = IdentError;

    fn try_from(s: String) -> Result<Self, IdentError> {
        s.parse()
    }
}

impl From<PairId> for String {
    fn from(id: PairId) -> String {
        id.to_string()
    }
}
