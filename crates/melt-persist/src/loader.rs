//! The loader: rebuilding the object graph from a dumped store.
//!
//! Loading is two-pass. The first pass registers a bare object for every
//! row id, so the second pass can resolve any reference, forward or
//! backward, while parsing content JSON and rebuilding payloads. Global
//! slot bindings come last. Any malformed row or unresolvable id aborts
//! the whole load.

use std::path::Path;

use chrono::DateTime;
use melt_core::{val_from_json, Globals, JsonParser, PayloadRegistry, Registry, Space};
use melt_ident::PairId;
use rusqlite::Connection;

use crate::error::{PersistError, Result};
use crate::schema::{check_schema, STATE_FILE};

/// Counts reported by a completed load.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoadStats {
    pub objects: usize,
    pub globals: usize,
}

pub struct Loader<'a> {
    registry: &'a Registry,
    globals: &'a Globals,
    payloads: &'a PayloadRegistry,
}

impl<'a> Loader<'a> {
    pub fn new(registry: &'a Registry, globals: &'a Globals, payloads: &'a PayloadRegistry) -> Self {
        Loader {
            registry,
            globals,
            payloads,
        }
    }

    /// Load the store under `dir` into the registry and globals.
    pub fn load(&self, dir: &Path) -> Result<LoadStats> {
        let conn = Connection::open(dir.join(STATE_FILE))?;
        check_schema(&conn)?;

        let ids = self.create_objects(&conn)?;
        tracing::debug!(objects = ids.len(), "created bare objects");
        self.fill_contents(&conn)?;
        let globals = self.load_globals(&conn)?;

        tracing::info!(
            objects = ids.len(),
            globals,
            dir = %dir.display(),
            "load complete"
        );
        Ok(LoadStats {
            objects: ids.len(),
            globals,
        })
    }

    /// First pass: one registered object per row id.
    fn create_objects(&self, conn: &Connection) -> Result<Vec<PairId>> {
        let mut stmt = conn.prepare("SELECT ob_id FROM t_objects")?;
        let mut rows = stmt.query([])?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next()? {
            let text: String = row.get(0)?;
            let id: PairId = text.parse().map_err(|e| PersistError::BadRow {
                id: text.clone(),
                detail: format!("bad object id: {e}"),
            })?;
            let obj = self.registry.find_or_create(id);
            // Predefined objects already carry their space from bootstrap.
            if obj.space().is_transient() {
                self.registry.set_space(&obj, Space::Global);
            }
            ids.push(id);
        }
        Ok(ids)
    }

    /// Second pass: parse content JSON and rebuild payloads.
    fn fill_contents(&self, conn: &Connection) -> Result<()> {
        let mut stmt = conn.prepare(
            "SELECT ob_id, ob_mtim, ob_content, ob_paylkind, ob_payload FROM t_objects",
        )?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let id_text: String = row.get(0)?;
            let mtim: f64 = row.get(1)?;
            let content: String = row.get(2)?;
            let paylkind: Option<String> = row.get(3)?;
            let payload: Option<String> = row.get(4)?;

            let bad_row = |detail: String| PersistError::BadRow {
                id: id_text.clone(),
                detail,
            };

            let obj = self
                .registry
                .resolve(&id_text)
                .map_err(|e| bad_row(e.to_string()))?;

            let content: serde_json::Value =
                serde_json::from_str(&content).map_err(|e| bad_row(format!("content: {e}")))?;
            self.fill_object(&obj, &content)
                .map_err(|e| bad_row(e.to_string()))?;

            if let Some(kind) = paylkind {
                let block: serde_json::Value = match payload {
                    Some(text) => serde_json::from_str(&text)
                        .map_err(|e| bad_row(format!("payload: {e}")))?,
                    None => serde_json::Value::Null,
                };
                let built = self
                    .payloads
                    .load(&kind, &obj, &block, self.registry)
                    .map_err(|e| bad_row(e.to_string()))?;
                obj.set_payload(built);
            }

            // The REAL column holds seconds; rounding (not truncating)
            // keeps millisecond precision exact through the f64 trip.
            let mtime = DateTime::from_timestamp_millis((mtim * 1000.0).round() as i64)
                .ok_or_else(|| bad_row(format!("bad mtime {mtim}")))?;
            obj.set_mtime(mtime);
        }
        Ok(())
    }

    fn fill_object(
        &self,
        obj: &melt_core::ObjRef,
        content: &serde_json::Value,
    ) -> melt_core::Result<()> {
        let attrs = content
            .get("attrs")
            .and_then(|a| a.as_array())
            .ok_or_else(|| melt_core::CoreError::BadJson {
                detail: "content without attrs array".to_string(),
            })?;
        for entry in attrs {
            let at = entry
                .get("at")
                .and_then(|a| a.as_str())
                .ok_or_else(|| melt_core::CoreError::BadJson {
                    detail: "attr entry without at".to_string(),
                })?;
            let va = entry.get("va").ok_or_else(|| melt_core::CoreError::BadJson {
                detail: "attr entry without va".to_string(),
            })?;
            let at = self.registry.resolve(at)?;
            let va = val_from_json(va, self.registry)?;
            obj.attr_put(at, va);
        }
        let comps = content
            .get("comps")
            .and_then(|c| c.as_array())
            .ok_or_else(|| melt_core::CoreError::BadJson {
                detail: "content without comps array".to_string(),
            })?;
        for comp in comps {
            obj.comp_append(val_from_json(comp, self.registry)?);
        }
        Ok(())
    }

    /// Bind the persisted global slots.
    fn load_globals(&self, conn: &Connection) -> Result<usize> {
        let mut stmt = conn.prepare("SELECT glob_name, glob_oid FROM t_globals")?;
        let mut rows = stmt.query([])?;
        let mut count = 0;
        while let Some(row) = rows.next()? {
            let name: String = row.get(0)?;
            let oid: String = row.get(1)?;
            let obj = self.registry.resolve(&oid).map_err(|e| PersistError::BadRow {
                id: oid.clone(),
                detail: format!("global {name:?}: {e}"),
            })?;
            self.globals.set(&name, Some(obj));
            count += 1;
        }
        Ok(count)
    }
}
