//! Immutable reference sequences: ordered [`Tuple`]s and sorted-unique
//! [`Set`]s.
//!
//! Both carry their hash, computed once at construction with a rolling
//! formula parameterized per kind so a set and a tuple over the same
//! references never hash alike by construction.

use crate::error::{CoreError, Result};
use crate::object::ObjRef;
use crate::value::Val;

/// Parameters of the sequence rolling hash.
struct SeqHashParams {
    hinit: u32,
    k1: u32,
    k2: u32,
    k3: u32,
    k4: u32,
}

const TUPLE_HASH: SeqHashParams = SeqHashParams {
    hinit: 100,
    k1: 233,
    k2: 1217,
    k3: 2243,
    k4: 139,
};

const SET_HASH: SeqHashParams = SeqHashParams {
    hinit: 60,
    k1: 151,
    k2: 1523,
    k3: 2591,
    k4: 167,
};

fn seq_hash(p: &SeqHashParams, elems: &[ObjRef]) -> u32 {
    let mut h = p.hinit;
    for (rank, e) in elems.iter().enumerate() {
        let rh = e.hash32();
        if rank % 2 == 0 {
            h = h.wrapping_mul(p.k1).wrapping_add(p.k3.wrapping_mul(rh));
        } else {
            h = h.wrapping_mul(p.k2) ^ p.k4.wrapping_mul(rh);
        }
    }
    if h != 0 {
        return h;
    }
    // Salvage: keep 0 reserved for "no hash".
    match elems.first() {
        None => {
            ((p.k1
                .wrapping_add(7 * p.k2)
                .wrapping_add(19 * p.k3)
                .wrapping_add(317 * p.k4))
                & 0xfffff)
                + 11
        }
        Some(first) => {
            let a = (p.k1.wrapping_add(19 * p.k2)).wrapping_mul(elems.len() as u32) & 0xfffff;
            let b = (p.k3.wrapping_add(13 * p.k4)).wrapping_mul(first.hash32()) & 0xffffff;
            a.wrapping_add(13u32.wrapping_mul(b)).wrapping_add(1321)
        }
    }
}

/// Flatten heterogeneous values into the references they carry.
///
/// Plain and colored references contribute their referent, sets and tuples
/// contribute their elements in order, scalars contribute nothing.
pub fn collect_refs(values: &[Val]) -> Vec<ObjRef> {
    let mut out = Vec::with_capacity(values.len());
    for v in values {
        match v {
            Val::None | Val::Int(_) | Val::String(_) => {}
            Val::Ref(r) => out.push(r.clone()),
            Val::ColoredRef { refr, .. } => out.push(refr.clone()),
            Val::Set(s) => out.extend_from_slice(s.refs()),
            Val::Tuple(t) => out.extend_from_slice(t.refs()),
        }
    }
    out
}

macro_rules! seq_common {
    () => {
        pub fn len(&self) -> usize {
            self.elems.len()
        }

        pub fn is_empty(&self) -> bool {
            self.elems.is_empty()
        }

        pub fn hash32(&self) -> u32 {
            self.hash
        }

        pub fn refs(&self) -> &[ObjRef] {
            &self.elems
        }

        pub fn iter(&self) -> std::slice::Iter<'_, ObjRef> {
            self.elems.iter()
        }

        pub fn get(&self, index: usize) -> Option<&ObjRef> {
            self.elems.get(index)
        }

        /// Checked indexed access.
        pub fn at(&self, index: usize) -> Result<&ObjRef> {
            self.elems.get(index).ok_or(CoreError::IndexOutOfRange {
                index,
                len: self.elems.len(),
            })
        }

        /// Indexed access with negative wraparound: `-1` is the last
        /// element. Out-of-band ranks yield `None`.
        pub fn nth(&self, rank: i64) -> Option<&ObjRef> {
            let len = self.elems.len() as i64;
            let rank = if rank < 0 { rank + len } else { rank };
            if (0..len).contains(&rank) {
                self.elems.get(rank as usize)
            } else {
                None
            }
        }
    };
}

/// An immutable ordered sequence of references; duplicates preserved.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Tuple {
    elems: Box<[ObjRef]>,
    hash: u32,
}

impl Tuple {
    pub fn from_refs(elems: Vec<ObjRef>) -> Self {
        let hash = seq_hash(&TUPLE_HASH, &elems);
        Tuple {
            elems: elems.into_boxed_slice(),
            hash,
        }
    }

    /// Flattening builder over heterogeneous values.
    pub fn collect_values(values: &[Val]) -> Self {
        Tuple::from_refs(collect_refs(values))
    }

    seq_common!();
}

/// An immutable sorted set of references; duplicates collapse on
/// construction.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Set {
    elems: Box<[ObjRef]>,
    hash: u32,
}

impl Set {
    pub fn from_refs(mut elems: Vec<ObjRef>) -> Self {
        elems.sort();
        elems.dedup();
        Set::from_sorted_unchecked(elems)
    }

    /// Trusted builder for inputs already sorted and deduplicated.
    pub fn from_sorted_unchecked(elems: Vec<ObjRef>) -> Self {
        debug_assert!(elems.windows(2).all(|w| w[0] < w[1]));
        let hash = seq_hash(&SET_HASH, &elems);
        Set {
            elems: elems.into_boxed_slice(),
            hash,
        }
    }

    /// Flattening builder over heterogeneous values.
    pub fn collect_values(values: &[Val]) -> Self {
        Set::from_refs(collect_refs(values))
    }

    pub fn contains(&self, r: &ObjRef) -> bool {
        self.elems.binary_search(r).is_ok()
    }

    seq_common!();
}
