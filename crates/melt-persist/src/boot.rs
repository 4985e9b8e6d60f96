//! Bootstrap artifacts: the predefined-object and global-name tables.
//!
//! Both are generated JSON files. `melt_predef.json` pins each predefined
//! object's name, id halves, and id hash, so a rebuilt process starts from
//! the same roster and any id corruption is caught before loading;
//! `melt_globals.json` lists the known global slot names.

use std::collections::BTreeMap;
use std::path::Path;

use melt_core::symbol::SymbolPayload;
use melt_core::{Globals, ObjRef, Registry, Space, SymbolTable, Val};
use melt_ident::PairId;
use serde::{Deserialize, Serialize};

use crate::error::{PersistError, Result};

/// One line of `melt_predef.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredefRecord {
    pub name: String,
    pub hi: u64,
    pub lo: u64,
    pub hash: u32,
}

/// One line of `melt_globals.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalRecord {
    pub name: String,
    pub ordinal: u32,
}

fn read_artifact<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let text = std::fs::read_to_string(path).map_err(|e| PersistError::io(path, e))?;
    serde_json::from_str(&text).map_err(|e| PersistError::BadArtifact {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })
}

pub fn read_predef_artifact(path: &Path) -> Result<Vec<PredefRecord>> {
    read_artifact(path)
}

pub fn read_globals_artifact(path: &Path) -> Result<Vec<GlobalRecord>> {
    read_artifact(path)
}

/// Recreate the predefined roster: register each object, promote it to
/// predefined space, and bind its name as a symbol.
///
/// A record whose stored hash disagrees with the recomputed id hash means
/// the artifact (or the id code) is corrupted, which is fatal.
pub fn install_predefined(
    registry: &Registry,
    symbols: &SymbolTable,
    records: &[PredefRecord],
) -> Result<BTreeMap<String, ObjRef>> {
    let mut byname = BTreeMap::new();
    for rec in records {
        let id = PairId::from_raw(rec.hi, rec.lo).map_err(melt_core::CoreError::Ident)?;
        if id.hash32() != rec.hash {
            tracing::error!(name = %rec.name, %id, stored = rec.hash, computed = id.hash32(),
                "predefined id hash mismatch");
            panic!("corrupted predefined record for {:?}", rec.name);
        }
        let obj = registry.find_or_create(id);
        registry.set_space(&obj, Space::Predefined);
        if obj.payload_kind().is_none() {
            obj.set_payload(Box::new(SymbolPayload::new(&rec.name)?));
        }
        symbols.register(&rec.name, obj.clone())?;
        byname.insert(rec.name.clone(), obj);
    }
    tracing::debug!(count = records.len(), "installed predefined roster");
    Ok(byname)
}

/// Reserve every known global slot.
pub fn install_globals(globals: &Globals, records: &[GlobalRecord]) {
    for rec in records {
        globals.register(&rec.name);
    }
    tracing::debug!(count = records.len(), "reserved global slots");
}

/// Render the predefined roster back into artifact text.
///
/// Objects are named through their symbol payload; a predefined object
/// without one cannot be recreated by name and is left out with a warning.
pub fn render_predef_artifact(registry: &Registry) -> Result<String> {
    let Val::Set(roster) = registry.predefined_set() else {
        unreachable!("predefined roster is always a set value")
    };
    let mut records = Vec::with_capacity(roster.len());
    for obj in roster.iter() {
        let name = obj.with_payload(|p| {
            p.as_any()
                .downcast_ref::<SymbolPayload>()
                .map(|s| s.name().to_string())
        });
        match name.flatten() {
            Some(name) => {
                let id = obj.id();
                records.push(PredefRecord {
                    name,
                    hi: id.hi().value(),
                    lo: id.lo().value(),
                    hash: id.hash32(),
                });
            }
            None => {
                tracing::warn!(id = %obj.id(), "predefined object without a symbol name, skipped");
            }
        }
    }
    records.sort_by(|a, b| a.name.cmp(&b.name));
    render(&records)
}

/// Render the global slot names back into artifact text.
pub fn render_globals_artifact(globals: &Globals) -> Result<String> {
    let records: Vec<GlobalRecord> = globals
        .names()
        .into_iter()
        .enumerate()
        .map(|(ordinal, name)| GlobalRecord {
            name,
            ordinal: ordinal as u32,
        })
        .collect();
    render(&records)
}

fn render<T: Serialize>(records: &[T]) -> Result<String> {
    let mut text = serde_json::to_string_pretty(records)?;
    text.push('\n');
    Ok(text)
}
