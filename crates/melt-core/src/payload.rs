//! Object payloads: per-object extension state behind a trait object.

use std::any::Any;
use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::{CoreError, Result};
use crate::json::{JsonEmitter, JsonParser};
use crate::object::ObjRef;

/// Extension state attached to one object.
///
/// A payload that wants to survive a dump/load cycle opts in with
/// [`dumpable`](Payload::dumpable), emits its JSON block through
/// [`emit_json`](Payload::emit_json), and registers a loader for its kind
/// string in a [`PayloadRegistry`].
pub trait Payload: Send + Sync {
    /// Stable kind string, the loader-lookup key in the persisted store.
    fn kind(&self) -> &'static str;

    /// Visit the references this payload holds; stop-on-true.
    fn scan_refs(&self, _visit: &mut dyn FnMut(&ObjRef) -> bool) -> bool {
        false
    }

    /// Whether the payload is written out when its owner is dumped.
    fn dumpable(&self) -> bool {
        false
    }

    /// The persisted JSON block, or `None` to dump the owner payload-less.
    fn emit_json(&self, _em: &dyn JsonEmitter) -> Option<serde_json::Value> {
        None
    }

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Rebuilds one payload from its persisted JSON block, for the owner
/// object, resolving ids through the parser.
pub type PayloadLoader =
    Box<dyn Fn(&ObjRef, &serde_json::Value, &dyn JsonParser) -> Result<Box<dyn Payload>> + Send + Sync>;

/// Kind string -> loader table, consulted while filling loaded objects.
#[derive(Default)]
pub struct PayloadRegistry {
    loaders: RwLock<HashMap<&'static str, PayloadLoader>>,
}

impl PayloadRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the loader for a payload kind. Registering the same kind
    /// twice is a programming error and panics.
    pub fn register(&self, kind: &'static str, loader: PayloadLoader) {
        let mut loaders = self.loaders.write().expect("lock poisoned");
        if loaders.insert(kind, loader).is_some() {
            tracing::error!(kind, "duplicate payload loader registration");
            panic!("duplicate payload loader for kind {kind:?}");
        }
    }

    pub fn knows(&self, kind: &str) -> bool {
        self.loaders.read().expect("lock poisoned").contains_key(kind)
    }

    /// Rebuild a payload of the given kind for `owner`.
    pub fn load(
        &self,
        kind: &str,
        owner: &ObjRef,
        json: &serde_json::Value,
        parser: &dyn JsonParser,
    ) -> Result<Box<dyn Payload>> {
        let loaders = self.loaders.read().expect("lock poisoned");
        let loader = loaders
            .get(kind)
            .ok_or_else(|| CoreError::UnknownPayloadKind(kind.to_string()))?;
        loader(owner, json, parser)
    }
}

impl std::fmt::Debug for PayloadRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.loaders.read().expect("lock poisoned").len();
        f.debug_struct("PayloadRegistry")
            .field("loader_count", &count)
            .finish()
    }
}
