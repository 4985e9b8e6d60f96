//! The sharded object registry.
//!
//! One registry instance owns every live object of a runtime. The id map
//! is split into [`MAX_BUCKET`] shards, one per serial bucket, each behind
//! its own mutex; operations on ids in different buckets never contend.
//! Objects are never removed: a registered object lives as long as the
//! registry.

use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;

use melt_ident::serial::MAX_BUCKET;
use melt_ident::PairId;

use crate::error::Result;
use crate::json::JsonParser;
use crate::object::{ObjRef, Object, Space};
use crate::seq::Set;
use crate::value::Val;

/// Attempts at drawing an unused random id before giving up.
const MAX_CREATE_ATTEMPTS: u32 = 16;

pub struct Registry {
    shards: Vec<Mutex<HashMap<PairId, ObjRef>>>,
    predefined: Mutex<BTreeSet<ObjRef>>,
}

impl Registry {
    pub fn new() -> Self {
        Registry {
            shards: (0..MAX_BUCKET)
                .map(|_| Mutex::new(HashMap::new()))
                .collect(),
            predefined: Mutex::new(BTreeSet::new()),
        }
    }

    fn shard(&self, id: PairId) -> &Mutex<HashMap<PairId, ObjRef>> {
        &self.shards[id.bucket() as usize]
    }

    /// Enter an object into the id map. A duplicate id is a programming
    /// error and panics.
    pub fn register(&self, obj: ObjRef) {
        let id = obj.id();
        let mut shard = self.shard(id).lock().expect("lock poisoned");
        if shard.insert(id, obj).is_some() {
            tracing::error!(%id, "duplicate object registration");
            panic!("object {id} registered twice");
        }
    }

    pub fn find(&self, id: PairId) -> Option<ObjRef> {
        self.shard(id).lock().expect("lock poisoned").get(&id).cloned()
    }

    pub fn contains(&self, id: PairId) -> bool {
        self.shard(id).lock().expect("lock poisoned").contains_key(&id)
    }

    /// Create a fresh object under a random unused id.
    pub fn create(&self) -> ObjRef {
        for _ in 0..MAX_CREATE_ATTEMPTS {
            let id = PairId::random();
            let mut shard = self.shard(id).lock().expect("lock poisoned");
            if let std::collections::hash_map::Entry::Vacant(slot) = shard.entry(id) {
                let obj = Object::new(id);
                slot.insert(obj.clone());
                return obj;
            }
        }
        tracing::error!("random id space exhausted after {MAX_CREATE_ATTEMPTS} draws");
        panic!("could not draw an unused object id");
    }

    /// Create a fresh object whose id lands in the given bucket.
    pub fn create_in_bucket(&self, bucket: u32) -> Result<ObjRef> {
        for _ in 0..MAX_CREATE_ATTEMPTS {
            let id = PairId::random_of_bucket(bucket)?;
            let mut shard = self.shard(id).lock().expect("lock poisoned");
            if let std::collections::hash_map::Entry::Vacant(slot) = shard.entry(id) {
                let obj = Object::new(id);
                slot.insert(obj.clone());
                return Ok(obj);
            }
        }
        tracing::error!(bucket, "random id space exhausted after {MAX_CREATE_ATTEMPTS} draws");
        panic!("could not draw an unused object id in bucket {bucket}");
    }

    /// The object under `id`, creating and registering a bare one when
    /// missing. The loader's first pass relies on this.
    pub fn find_or_create(&self, id: PairId) -> ObjRef {
        let mut shard = self.shard(id).lock().expect("lock poisoned");
        shard.entry(id).or_insert_with(|| Object::new(id)).clone()
    }

    /// Move an object between spaces, maintaining the predefined roster.
    pub fn set_space(&self, obj: &ObjRef, space: Space) {
        let mut predef = self.predefined.lock().expect("lock poisoned");
        if space == Space::Predefined {
            predef.insert(obj.clone());
        } else {
            predef.remove(obj);
        }
        drop(predef);
        obj.set_space_raw(space);
    }

    /// The predefined roster as a set value; the first dump root.
    pub fn predefined_set(&self) -> Val {
        let predef = self.predefined.lock().expect("lock poisoned");
        Val::from(Set::from_sorted_unchecked(predef.iter().cloned().collect()))
    }

    pub fn predefined_count(&self) -> usize {
        self.predefined.lock().expect("lock poisoned").len()
    }

    /// Total number of registered objects.
    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|s| s.lock().expect("lock poisoned").len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl JsonParser for Registry {
    fn resolve(&self, id: &str) -> Result<ObjRef> {
        let pair: PairId = id.parse().map_err(crate::error::CoreError::Ident)?;
        self.find(pair)
            .ok_or_else(|| crate::error::CoreError::UnresolvedId(id.to_string()))
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("object_count", &self.len())
            .field("predefined_count", &self.predefined_count())
            .finish()
    }
}
