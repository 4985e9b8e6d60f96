//! Mutable objects and the cheap handles pointing at them.
//!
//! An [`Object`] pairs an immutable [`PairId`] with an interior-mutable
//! core (space, attributes, components, payload) behind a `RwLock`.
//! [`ObjRef`] is the shared handle: it clones by bumping a refcount and
//! compares, orders and hashes by the referent's id, never by address.

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use melt_ident::PairId;

use crate::error::{CoreError, Result};
use crate::payload::Payload;
use crate::value::Val;

/// Persistence space of an object.
///
/// Transient objects (`None`) exist only in memory and are never dumped;
/// `Predefined` objects are recreated from the bootstrap artifact before a
/// load; `Global` objects live in the dumped store.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum Space {
    #[default]
    None,
    Predefined,
    Global,
}

impl Space {
    pub fn is_transient(self) -> bool {
        self == Space::None
    }
}

struct ObjCore {
    space: Space,
    mtime: DateTime<Utc>,
    attrs: BTreeMap<ObjRef, Val>,
    comps: Vec<Val>,
    payload: Option<Box<dyn Payload>>,
}

/// A mutable object with an immutable identity.
pub struct Object {
    id: PairId,
    core: RwLock<ObjCore>,
}

impl Object {
    /// Allocate a fresh unregistered object in transient space.
    ///
    /// Most callers want [`Registry::create`](crate::registry::Registry)
    /// instead, which also enters the object into the id map.
    pub fn new(id: PairId) -> ObjRef {
        ObjRef(Arc::new(Object {
            id,
            core: RwLock::new(ObjCore {
                space: Space::None,
                mtime: Utc::now(),
                attrs: BTreeMap::new(),
                comps: Vec::new(),
                payload: None,
            }),
        }))
    }

    pub fn id(&self) -> PairId {
        self.id
    }

    /// The object hash is its id hash.
    pub fn hash32(&self) -> u32 {
        self.id.hash32()
    }

    pub fn space(&self) -> Space {
        self.core.read().expect("lock poisoned").space
    }

    pub(crate) fn set_space_raw(&self, space: Space) {
        let mut core = self.core.write().expect("lock poisoned");
        core.space = space;
        core.mtime = Utc::now();
    }

    /// Last mutation time.
    pub fn mtime(&self) -> DateTime<Utc> {
        self.core.read().expect("lock poisoned").mtime
    }

    pub fn touch(&self) {
        self.core.write().expect("lock poisoned").mtime = Utc::now();
    }

    /// Restore a persisted mtime without counting as a mutation.
    pub fn set_mtime(&self, at: DateTime<Utc>) {
        self.core.write().expect("lock poisoned").mtime = at;
    }

    // ---- attributes ----

    /// Bind an attribute. Binding `Val::None` removes the entry.
    pub fn attr_put(&self, at: ObjRef, val: Val) {
        let mut core = self.core.write().expect("lock poisoned");
        if val.is_none() {
            core.attrs.remove(&at);
        } else {
            core.attrs.insert(at, val);
        }
        core.mtime = Utc::now();
    }

    pub fn attr_get(&self, at: &ObjRef) -> Option<Val> {
        self.core.read().expect("lock poisoned").attrs.get(at).cloned()
    }

    pub fn attr_remove(&self, at: &ObjRef) -> Option<Val> {
        let mut core = self.core.write().expect("lock poisoned");
        let old = core.attrs.remove(at);
        if old.is_some() {
            core.mtime = Utc::now();
        }
        old
    }

    pub fn attr_count(&self) -> usize {
        self.core.read().expect("lock poisoned").attrs.len()
    }

    /// Snapshot of all attribute bindings, in ascending attribute-id order.
    pub fn attr_entries(&self) -> Vec<(ObjRef, Val)> {
        self.core
            .read()
            .expect("lock poisoned")
            .attrs
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    // ---- components ----

    pub fn comp_append(&self, val: Val) {
        let mut core = self.core.write().expect("lock poisoned");
        core.comps.push(val);
        core.mtime = Utc::now();
    }

    /// Component at `rank`, with negative wraparound (`-1` is the last).
    pub fn comp_get(&self, rank: i64) -> Option<Val> {
        let core = self.core.read().expect("lock poisoned");
        let len = core.comps.len() as i64;
        let rank = if rank < 0 { rank + len } else { rank };
        if (0..len).contains(&rank) {
            core.comps.get(rank as usize).cloned()
        } else {
            None
        }
    }

    /// Overwrite an existing component.
    pub fn comp_put(&self, index: usize, val: Val) -> Result<()> {
        let mut core = self.core.write().expect("lock poisoned");
        let len = core.comps.len();
        let slot = core
            .comps
            .get_mut(index)
            .ok_or(CoreError::IndexOutOfRange { index, len })?;
        *slot = val;
        core.mtime = Utc::now();
        Ok(())
    }

    pub fn comp_count(&self) -> usize {
        self.core.read().expect("lock poisoned").comps.len()
    }

    /// Snapshot of all components, in order.
    pub fn comps(&self) -> Vec<Val> {
        self.core.read().expect("lock poisoned").comps.clone()
    }

    // ---- payload ----

    pub fn set_payload(&self, payload: Box<dyn Payload>) {
        let mut core = self.core.write().expect("lock poisoned");
        core.payload = Some(payload);
        core.mtime = Utc::now();
    }

    pub fn clear_payload(&self) -> Option<Box<dyn Payload>> {
        let mut core = self.core.write().expect("lock poisoned");
        let old = core.payload.take();
        if old.is_some() {
            core.mtime = Utc::now();
        }
        old
    }

    pub fn payload_kind(&self) -> Option<&'static str> {
        self.core
            .read()
            .expect("lock poisoned")
            .payload
            .as_deref()
            .map(Payload::kind)
    }

    /// Run `f` against the payload under the read lock.
    pub fn with_payload<R>(&self, f: impl FnOnce(&dyn Payload) -> R) -> Option<R> {
        let core = self.core.read().expect("lock poisoned");
        core.payload.as_deref().map(f)
    }

    /// Run `f` against the payload under the write lock.
    pub fn with_payload_mut<R>(&self, f: impl FnOnce(&mut (dyn Payload + 'static)) -> R) -> Option<R> {
        let mut core = self.core.write().expect("lock poisoned");
        let out = core.payload.as_deref_mut().map(f);
        if out.is_some() {
            core.mtime = Utc::now();
        }
        out
    }

    /// Run `f` over one coherent snapshot of the whole content, captured
    /// under a single read acquisition. The dumper serializes each row
    /// through this so a row never mixes two object states.
    pub fn with_content<R>(&self, f: impl FnOnce(ContentView<'_>) -> R) -> R {
        let core = self.core.read().expect("lock poisoned");
        f(ContentView {
            space: core.space,
            mtime: core.mtime,
            attrs: &core.attrs,
            comps: &core.comps,
            payload: core.payload.as_deref(),
        })
    }

    // ---- scanning ----

    /// Visit every reference inside the object under one read lock:
    /// attribute keys passing `attr_filter` with their values, then
    /// components, then the payload. Stops early when the visitor returns
    /// `true`; returns whether it stopped.
    pub fn scan_inside(
        &self,
        visit: &mut dyn FnMut(&ObjRef) -> bool,
        attr_filter: &dyn Fn(&ObjRef) -> bool,
    ) -> bool {
        let core = self.core.read().expect("lock poisoned");
        for (at, val) in &core.attrs {
            if !attr_filter(at) {
                continue;
            }
            if visit(at) || val.scan_refs(visit) {
                return true;
            }
        }
        for val in &core.comps {
            if val.scan_refs(visit) {
                return true;
            }
        }
        if let Some(payload) = core.payload.as_deref() {
            if payload.scan_refs(visit) {
                return true;
            }
        }
        false
    }
}

/// One consistent view of an object's content, alive for the duration of
/// a [`Object::with_content`] call.
pub struct ContentView<'a> {
    pub space: Space,
    pub mtime: DateTime<Utc>,
    pub attrs: &'a BTreeMap<ObjRef, Val>,
    pub comps: &'a [Val],
    pub payload: Option<&'a dyn Payload>,
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core = self.core.read().expect("lock poisoned");
        f.debug_struct("Object")
            .field("id", &self.id.to_string())
            .field("space", &core.space)
            .field("attrs", &core.attrs.len())
            .field("comps", &core.comps.len())
            .field("payload", &core.payload.as_deref().map(Payload::kind))
            .finish()
    }
}

/// Shared handle to an [`Object`], compared by the referent's id.
#[derive(Clone)]
pub struct ObjRef(Arc<Object>);

impl ObjRef {
    pub fn id(&self) -> PairId {
        self.0.id
    }
}

impl Deref for ObjRef {
    type Target = Object;

    fn deref(&self) -> &Object {
        &self.0
    }
}

impl PartialEq for ObjRef {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for ObjRef {}

impl PartialOrd for ObjRef {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ObjRef {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.id.cmp(&other.0.id)
    }
}

impl Hash for ObjRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl fmt::Debug for ObjRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjRef({})", self.0.id)
    }
}

impl fmt::Display for ObjRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh_ref() -> ObjRef {
        Object::new(PairId::random())
    }

    #[test]
    fn new_object_is_transient_and_empty() {
        let r = fresh_ref();
        assert_eq!(r.space(), Space::None);
        assert!(r.space().is_transient());
        assert_eq!(r.attr_count(), 0);
        assert_eq!(r.comp_count(), 0);
        assert!(r.payload_kind().is_none());
    }

    #[test]
    fn refs_compare_by_id_not_address() {
        let r = fresh_ref();
        let twin = Object::new(r.id());
        assert_eq!(r, twin);
        assert!(!Arc::ptr_eq(&r.0, &twin.0));
    }

    #[test]
    fn attr_put_get_remove() {
        let obj = fresh_ref();
        let at = fresh_ref();
        obj.attr_put(at.clone(), Val::Int(7));
        assert_eq!(obj.attr_get(&at), Some(Val::Int(7)));
        assert_eq!(obj.attr_count(), 1);

        obj.attr_put(at.clone(), Val::string("replaced"));
        assert_eq!(obj.attr_get(&at), Some(Val::string("replaced")));
        assert_eq!(obj.attr_count(), 1);

        assert_eq!(obj.attr_remove(&at), Some(Val::string("replaced")));
        assert_eq!(obj.attr_get(&at), None);
    }

    #[test]
    fn attr_put_none_removes() {
        let obj = fresh_ref();
        let at = fresh_ref();
        obj.attr_put(at.clone(), Val::Int(1));
        obj.attr_put(at.clone(), Val::None);
        assert_eq!(obj.attr_count(), 0);
    }

    #[test]
    fn attr_entries_are_sorted_by_id() {
        let obj = fresh_ref();
        for _ in 0..8 {
            obj.attr_put(fresh_ref(), Val::Int(1));
        }
        let entries = obj.attr_entries();
        assert!(entries.windows(2).all(|w| w[0].0 < w[1].0));
    }

    #[test]
    fn comps_append_and_index() {
        let obj = fresh_ref();
        obj.comp_append(Val::Int(10));
        obj.comp_append(Val::Int(20));
        assert_eq!(obj.comp_count(), 2);
        assert_eq!(obj.comp_get(0), Some(Val::Int(10)));
        assert_eq!(obj.comp_get(-1), Some(Val::Int(20)));
        assert_eq!(obj.comp_get(2), None);
        assert_eq!(obj.comp_get(-3), None);

        obj.comp_put(0, Val::Int(11)).unwrap();
        assert_eq!(obj.comp_get(0), Some(Val::Int(11)));
        assert!(obj.comp_put(5, Val::Int(0)).is_err());
    }

    #[test]
    fn scan_inside_visits_attrs_comps_in_order() {
        let obj = fresh_ref();
        let at = fresh_ref();
        let target = fresh_ref();
        obj.attr_put(at.clone(), Val::Ref(target.clone()));
        obj.comp_append(Val::Ref(target.clone()));

        let mut seen = Vec::new();
        let stopped = obj.scan_inside(
            &mut |r| {
                seen.push(r.id());
                false
            },
            &|_| true,
        );
        assert!(!stopped);
        assert_eq!(seen, vec![at.id(), target.id(), target.id()]);
    }

    #[test]
    fn scan_inside_honors_attr_filter() {
        let obj = fresh_ref();
        let hidden = fresh_ref();
        obj.attr_put(hidden.clone(), Val::Ref(fresh_ref()));

        let mut seen = 0;
        obj.scan_inside(
            &mut |_| {
                seen += 1;
                false
            },
            &|at| at.id() != hidden.id(),
        );
        assert_eq!(seen, 0);
    }

    #[test]
    fn payload_can_be_mutated_in_place() {
        use crate::symbol::SymbolPayload;

        let obj = fresh_ref();
        obj.set_payload(Box::new(SymbolPayload::new("counter").unwrap()));
        let done = obj.with_payload_mut(|p| {
            let sym = p
                .as_any_mut()
                .downcast_mut::<SymbolPayload>()
                .expect("payload stays a symbol");
            sym.set_data(Val::Int(5));
        });
        assert!(done.is_some());

        let data = obj
            .with_payload(|p| {
                p.as_any()
                    .downcast_ref::<SymbolPayload>()
                    .map(|s| s.data().clone())
            })
            .flatten();
        assert_eq!(data, Some(Val::Int(5)));
    }

    #[test]
    fn with_content_sees_one_coherent_state() {
        use std::thread;

        // The writer always binds a fresh attribute before appending the
        // matching component, so any single-lock snapshot satisfies
        // attrs == comps or attrs == comps + 1.
        let obj = fresh_ref();
        let writer = {
            let obj = obj.clone();
            thread::spawn(move || {
                for i in 0..500i64 {
                    obj.attr_put(Object::new(PairId::random()), Val::Int(i));
                    obj.comp_append(Val::Int(i));
                }
            })
        };
        for _ in 0..500 {
            obj.with_content(|view| {
                let a = view.attrs.len();
                let c = view.comps.len();
                assert!(
                    a == c || a == c + 1,
                    "snapshot mixed two states: {a} attrs, {c} comps"
                );
            });
        }
        writer.join().expect("writer should not panic");
    }

    #[test]
    fn concurrent_attr_reads_see_whole_values() {
        use std::thread;

        let obj = fresh_ref();
        let at = fresh_ref();
        obj.attr_put(at.clone(), Val::Int(0));

        let writer = {
            let obj = obj.clone();
            let at = at.clone();
            thread::spawn(move || {
                for i in 1..500i64 {
                    obj.attr_put(at.clone(), Val::Int(i));
                }
            })
        };
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let obj = obj.clone();
                let at = at.clone();
                thread::spawn(move || {
                    for _ in 0..500 {
                        let v = obj.attr_get(&at).expect("attr stays bound");
                        let i = v.as_int().expect("attr stays an int");
                        assert!((0..500).contains(&i));
                    }
                })
            })
            .collect();

        writer.join().expect("writer should not panic");
        for r in readers {
            r.join().expect("reader should not panic");
        }
    }
}
