//! The symbol payload and the name table binding symbols to owners.
//!
//! Valid symbol names:
//! - Must be non-empty, ASCII only
//! - Must start with a letter
//! - May continue with letters, digits, or single underscores
//! - Must not end with an underscore or contain `__`

use std::any::Any;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use serde_json::json;

use crate::error::{CoreError, Result};
use crate::json::{val_to_json, JsonEmitter, JsonParser};
use crate::object::ObjRef;
use crate::payload::{Payload, PayloadRegistry};
use crate::value::Val;

/// Validate a symbol name, returning `Ok(())` if valid.
pub fn validate_symbol_name(name: &str) -> Result<()> {
    let bad = |reason| {
        Err(CoreError::BadSymbolName {
            name: name.to_string(),
            reason,
        })
    };
    let mut chars = name.chars();
    match chars.next() {
        None => return bad("must not be empty"),
        Some(c) if !c.is_ascii_alphabetic() => return bad("must start with a letter"),
        Some(_) => {}
    }
    for c in chars {
        if !c.is_ascii_alphanumeric() && c != '_' {
            return bad("only letters, digits and underscores allowed");
        }
    }
    if name.ends_with('_') {
        return bad("must not end with an underscore");
    }
    if name.contains("__") {
        return bad("must not contain consecutive underscores");
    }
    Ok(())
}

/// A named symbol attached to one owner object.
pub struct SymbolPayload {
    name: String,
    proxy: Option<ObjRef>,
    data: Val,
}

impl SymbolPayload {
    pub fn new(name: &str) -> Result<Self> {
        validate_symbol_name(name)?;
        Ok(SymbolPayload {
            name: name.to_string(),
            proxy: None,
            data: Val::None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn proxy(&self) -> Option<&ObjRef> {
        self.proxy.as_ref()
    }

    pub fn set_proxy(&mut self, proxy: Option<ObjRef>) {
        self.proxy = proxy;
    }

    pub fn data(&self) -> &Val {
        &self.data
    }

    pub fn set_data(&mut self, data: Val) {
        self.data = data;
    }
}

pub const SYMBOL_PAYLOAD_KIND: &str = "symbol";

impl Payload for SymbolPayload {
    fn kind(&self) -> &'static str {
        SYMBOL_PAYLOAD_KIND
    }

    fn scan_refs(&self, visit: &mut dyn FnMut(&ObjRef) -> bool) -> bool {
        if let Some(proxy) = &self.proxy {
            if visit(proxy) {
                return true;
            }
        }
        self.data.scan_refs(visit)
    }

    fn dumpable(&self) -> bool {
        true
    }

    fn emit_json(&self, em: &dyn JsonEmitter) -> Option<serde_json::Value> {
        let proxy = match &self.proxy {
            Some(p) if em.emit_ref(p) => json!(p.id().to_string()),
            _ => serde_json::Value::Null,
        };
        Some(json!({
            "name": self.name,
            "proxy": proxy,
            "data": val_to_json(&self.data, em),
        }))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Name -> owner object bindings, kept in lexicographic order.
#[derive(Default)]
pub struct SymbolTable {
    names: RwLock<BTreeMap<String, ObjRef>>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a name to its owner. Rebinding to a different owner is a clash.
    pub fn register(&self, name: &str, owner: ObjRef) -> Result<()> {
        validate_symbol_name(name)?;
        let mut names = self.names.write().expect("lock poisoned");
        match names.get(name) {
            Some(bound) if *bound != owner => Err(CoreError::SymbolClash(name.to_string())),
            _ => {
                names.insert(name.to_string(), owner);
                Ok(())
            }
        }
    }

    pub fn find(&self, name: &str) -> Option<ObjRef> {
        self.names.read().expect("lock poisoned").get(name).cloned()
    }

    pub fn remove(&self, name: &str) -> Option<ObjRef> {
        self.names.write().expect("lock poisoned").remove(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.names.read().expect("lock poisoned").keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.names.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.read().expect("lock poisoned").is_empty()
    }
}

/// Register the symbol payload loader, rebinding loaded symbols into
/// `table` as a side effect.
pub fn register_symbol_loader(payloads: &PayloadRegistry, table: Arc<SymbolTable>) {
    payloads.register(
        SYMBOL_PAYLOAD_KIND,
        Box::new(move |owner, json, parser| {
            let name = json
                .get("name")
                .and_then(|n| n.as_str())
                .ok_or_else(|| CoreError::BadJson {
                    detail: "symbol payload without a name".to_string(),
                })?;
            let mut symbol = SymbolPayload::new(name)?;
            match json.get("proxy") {
                None | Some(serde_json::Value::Null) => {}
                Some(serde_json::Value::String(id)) => {
                    symbol.set_proxy(Some(parser.resolve(id)?));
                }
                Some(other) => {
                    return Err(CoreError::BadJson {
                        detail: format!("symbol proxy must be an id string, got {other}"),
                    })
                }
            }
            if let Some(data) = json.get("data") {
                symbol.set_data(crate::json::val_from_json(data, parser)?);
            }
            table.register(name, owner.clone())?;
            Ok(Box::new(symbol))
        }),
    );
}
