//! Named global object slots, the second dump/load root set.

use std::collections::BTreeMap;
use std::sync::RwLock;

use crate::object::ObjRef;

/// Name -> optional object bindings.
///
/// A slot exists independently of being bound; registering a name with no
/// object reserves it so a later load can bind it. Names iterate in
/// lexicographic order.
#[derive(Default)]
pub struct Globals {
    slots: RwLock<BTreeMap<String, Option<ObjRef>>>,
}

impl Globals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a slot; keeps any existing binding.
    pub fn register(&self, name: &str) {
        self.slots
            .write()
            .expect("lock poisoned")
            .entry(name.to_string())
            .or_insert(None);
    }

    /// Bind or clear a slot, creating it when missing. Returns the
    /// previous binding.
    pub fn set(&self, name: &str, obj: Option<ObjRef>) -> Option<ObjRef> {
        self.slots
            .write()
            .expect("lock poisoned")
            .insert(name.to_string(), obj)
            .flatten()
    }

    pub fn get(&self, name: &str) -> Option<ObjRef> {
        self.slots
            .read()
            .expect("lock poisoned")
            .get(name)
            .cloned()
            .flatten()
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.slots.read().expect("lock poisoned").contains_key(name)
    }

    /// Every slot name, bound or not, in order.
    pub fn names(&self) -> Vec<String> {
        self.slots.read().expect("lock poisoned").keys().cloned().collect()
    }

    /// Every bound slot, in name order.
    pub fn bound(&self) -> Vec<(String, ObjRef)> {
        self.slots
            .read()
            .expect("lock poisoned")
            .iter()
            .filter_map(|(name, slot)| slot.clone().map(|obj| (name.clone(), obj)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.slots.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.read().expect("lock poisoned").is_empty()
    }
}

impl std::fmt::Debug for Globals {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slots = self.slots.read().expect("lock poisoned");
        let bound = slots.values().filter(|s| s.is_some()).count();
        f.debug_struct("Globals")
            .field("slot_count", &slots.len())
            .field("bound_count", &bound)
            .finish()
    }
}
