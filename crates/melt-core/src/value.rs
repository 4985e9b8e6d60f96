//! The tagged value union.
//!
//! A [`Val`] is an immutable first-class value: a scalar, an object
//! reference, or a shared composite. Cloning is cheap; composites are held
//! behind `Arc` and never mutated after construction. Every non-`None`
//! value has a non-zero 32-bit hash, cached at construction time for
//! composites.

use std::fmt;
use std::sync::Arc;

use crate::object::ObjRef;
use crate::seq::{Set, Tuple};

/// Value kinds, in ascending order.
///
/// The declaration order is the total kind ordinal used by [`Val`]'s
/// structural ordering: values of different kinds compare by kind alone.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ValKind {
    None,
    Int,
    String,
    Ref,
    ColoredRef,
    Set,
    Tuple,
}

/// An immutable tagged value.
///
/// Variant declaration order matches [`ValKind`], so the derived ordering
/// is kind-primary with payload comparison as the tiebreak: integers by
/// magnitude, strings by bytes, refs by object id, sequences element-wise.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Val {
    None,
    Int(i64),
    String(Arc<Str>),
    Ref(ObjRef),
    ColoredRef { refr: ObjRef, color: ObjRef },
    Set(Arc<Set>),
    Tuple(Arc<Tuple>),
}

impl Val {
    pub fn kind(&self) -> ValKind {
        match self {
            Val::None => ValKind::None,
            Val::Int(_) => ValKind::Int,
            Val::String(_) => ValKind::String,
            Val::Ref(_) => ValKind::Ref,
            Val::ColoredRef { .. } => ValKind::ColoredRef,
            Val::Set(_) => ValKind::Set,
            Val::Tuple(_) => ValKind::Tuple,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Val::None)
    }

    /// Build a string value, hashing it once.
    pub fn string(text: impl Into<String>) -> Val {
        Val::String(Arc::new(Str::new(text)))
    }

    /// Build a colored reference.
    pub fn colored(refr: ObjRef, color: ObjRef) -> Val {
        Val::ColoredRef { refr, color }
    }

    /// The value hash: 0 for `None`, non-zero otherwise.
    ///
    /// Composite hashes are cached at construction, so this is O(1) for
    /// every kind.
    pub fn hash32(&self) -> u32 {
        match self {
            Val::None => 0,
            Val::Int(i) => int_hash(*i),
            Val::String(s) => s.hash32(),
            Val::Ref(r) => r.hash32(),
            Val::ColoredRef { refr, color } => {
                let h = refr.hash32() ^ (color.id().lo().value() as u32);
                if h != 0 {
                    h
                } else {
                    refr.hash32()
                }
            }
            Val::Set(s) => s.hash32(),
            Val::Tuple(t) => t.hash32(),
        }
    }

    /// Visit every object reference inside this value, stopping early when
    /// the visitor returns `true`. Returns whether the visit was stopped.
    pub fn scan_refs(&self, visit: &mut dyn FnMut(&ObjRef) -> bool) -> bool {
        match self {
            Val::None | Val::Int(_) | Val::String(_) => false,
            Val::Ref(r) => visit(r),
            Val::ColoredRef { refr, color } => visit(refr) || visit(color),
            Val::Set(s) => s.refs().iter().any(|r| visit(r)),
            Val::Tuple(t) => t.refs().iter().any(|r| visit(r)),
        }
    }

    /// The reference inside a `Ref` or `ColoredRef`, if any.
    pub fn as_ref(&self) -> Option<&ObjRef> {
        match self {
            Val::Ref(r) => Some(r),
            Val::ColoredRef { refr, .. } => Some(refr),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Val::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Val::String(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl Default for Val {
    fn default() -> Self {
        Val::None
    }
}

impl From<i64> for Val {
    fn from(i: i64) -> Val {
        Val::Int(i)
    }
}

impl From<&str> for Val {
    fn from(s: &str) -> Val {
        Val::string(s)
    }
}

impl From<ObjRef> for Val {
    fn from(r: ObjRef) -> Val {
        Val::Ref(r)
    }
}

impl From<Set> for Val {
    fn from(s: Set) -> Val {
        Val::Set(Arc::new(s))
    }
}

impl From<Tuple> for Val {
    fn from(t: Tuple) -> Val {
        Val::Tuple(Arc::new(t))
    }
}

/// Integer value hash: never 0.
pub(crate) fn int_hash(i: i64) -> u32 {
    let h = (1663i64.wrapping_mul(i) ^ 17i64.wrapping_mul(i >> 28)) as u32;
    if h != 0 {
        h
    } else {
        (((i % 521_363) & 0xfffff) + 310) as u32
    }
}

/// An immutable string with a cached non-zero hash.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Str {
    text: Box<str>,
    hash: u32,
}

impl Str {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let hash = str_hash(text.as_bytes());
        Str {
            text: text.into_boxed_str(),
            hash,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn hash32(&self) -> u32 {
        self.hash
    }
}

impl fmt::Display for Str {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Rolling polynomial hash over the bytes: never 0.
fn str_hash(bytes: &[u8]) -> u32 {
    let mut h: u32 = 37;
    for &b in bytes {
        h = h.wrapping_mul(433).wrapping_add(1579u32.wrapping_mul(b as u32));
    }
    if h != 0 {
        h
    } else {
        ((bytes.len() as u32) & 0xfffff) + 301
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Object;
    use melt_ident::PairId;
    use proptest::prelude::*;

    fn fresh_ref() -> ObjRef {
        Object::new(PairId::random())
    }

    #[test]
    fn kind_ordinal_orders_values() {
        let r = fresh_ref();
        let vals = [
            Val::None,
            Val::Int(i64::MAX),
            Val::string("zzz"),
            Val::Ref(r.clone()),
            Val::colored(r.clone(), r.clone()),
            Val::from(Set::from_refs(vec![r.clone()])),
            Val::from(Tuple::from_refs(vec![r])),
        ];
        for w in vals.windows(2) {
            assert!(w[0] < w[1], "{:?} !< {:?}", w[0].kind(), w[1].kind());
        }
    }

    #[test]
    fn int_ordering_is_by_magnitude() {
        assert!(Val::Int(-5) < Val::Int(0));
        assert!(Val::Int(0) < Val::Int(7));
    }

    #[test]
    fn string_ordering_is_by_bytes() {
        assert!(Val::string("abc") < Val::string("abd"));
        assert!(Val::string("ab") < Val::string("abc"));
    }

    #[test]
    fn hashes_are_nonzero_for_non_none() {
        let r = fresh_ref();
        let vals = [
            Val::Int(0),
            Val::Int(-1),
            Val::Int(i64::MIN),
            Val::string(""),
            Val::string("hello"),
            Val::Ref(r.clone()),
            Val::colored(r.clone(), r.clone()),
            Val::from(Set::from_refs(vec![])),
            Val::from(Tuple::from_refs(vec![r])),
        ];
        for v in &vals {
            assert_ne!(v.hash32(), 0, "zero hash for {:?}", v.kind());
        }
        assert_eq!(Val::None.hash32(), 0);
    }

    #[test]
    fn equal_values_hash_alike() {
        assert_eq!(Val::string("twin").hash32(), Val::string("twin").hash32());
        assert_eq!(Val::Int(42).hash32(), Val::Int(42).hash32());
    }

    #[test]
    fn scan_refs_stops_early() {
        let a = fresh_ref();
        let b = fresh_ref();
        let t = Val::from(Tuple::from_refs(vec![a.clone(), b]));
        let mut seen = 0;
        let stopped = t.scan_refs(&mut |r| {
            seen += 1;
            r.id() == a.id()
        });
        assert!(stopped);
        assert_eq!(seen, 1);
    }

    fn scalar() -> impl Strategy<Value = Val> {
        prop_oneof![
            Just(Val::None),
            any::<i64>().prop_map(Val::Int),
            ".{0,24}".prop_map(Val::string),
        ]
    }

    proptest! {
        #[test]
        fn ordering_is_reflexive_and_antisymmetric(a in scalar(), b in scalar()) {
            prop_assert_eq!(a.cmp(&a), std::cmp::Ordering::Equal);
            prop_assert_eq!(a.cmp(&b).reverse(), b.cmp(&a));
        }

        #[test]
        fn ordering_is_transitive(mut vals in proptest::collection::vec(scalar(), 3)) {
            vals.sort();
            prop_assert!(vals[0] <= vals[1]);
            prop_assert!(vals[1] <= vals[2]);
            prop_assert!(vals[0] <= vals[2]);
        }

        #[test]
        fn scalar_hashes_are_stable_and_nonzero(a in scalar()) {
            prop_assert_eq!(a.hash32(), a.clone().hash32());
            if !a.is_none() {
                prop_assert_ne!(a.hash32(), 0);
            }
        }
    }

    #[test]
    fn scalars_scan_nothing() {
        let mut seen = 0;
        assert!(!Val::Int(9).scan_refs(&mut |_| {
            seen += 1;
            false
        }));
        assert!(!Val::string("s").scan_refs(&mut |_| {
            seen += 1;
            false
        }));
        assert_eq!(seen, 0);
    }
}
