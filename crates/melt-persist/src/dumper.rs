//! The dumper: a scan-then-emit pass over the reachable object graph.
//!
//! A dump proceeds in two phases. The scan seeds a work queue from the
//! predefined roster and the bound globals, then walks references
//! breadth-first through attributes, components and payloads, collecting
//! every dump-eligible object exactly once. The emit phase then writes one
//! row per collected object inside a single transaction, so a store on
//! disk is always a complete dump or the previous one.
//!
//! The dumper only ever takes read locks on objects; mutators running
//! concurrently delay individual snapshots but never deadlock against it.

use std::collections::{BTreeMap, VecDeque};
use std::path::Path;

use melt_core::{val_to_json, Globals, JsonEmitter, ObjRef, Registry};
use melt_ident::PairId;
use rusqlite::{params, Connection};
use serde_json::json;

use crate::boot::{render_globals_artifact, render_predef_artifact};
use crate::error::{PersistError, Result};
use crate::fileio::write_idempotent;
use crate::schema::{create_schema, GLOBALS_FILE, PREDEF_FILE, STATE_FILE};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DumpState {
    Idle,
    Scan,
    Emit,
}

/// Counts reported by a completed dump.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DumpStats {
    pub objects: usize,
    pub globals: usize,
}

pub struct Dumper<'a> {
    registry: &'a Registry,
    globals: &'a Globals,
    eligible: Box<dyn Fn(&ObjRef) -> bool + 'a>,
    state: DumpState,
    visited: BTreeMap<PairId, ObjRef>,
    queue: VecDeque<ObjRef>,
}

impl<'a> Dumper<'a> {
    /// A dumper with the default eligibility rule: everything outside
    /// transient space is dumped.
    pub fn new(registry: &'a Registry, globals: &'a Globals) -> Self {
        Dumper {
            registry,
            globals,
            eligible: Box::new(|r| !r.space().is_transient()),
            state: DumpState::Idle,
            visited: BTreeMap::new(),
            queue: VecDeque::new(),
        }
    }

    /// Replace the dump-eligibility rule.
    pub fn with_eligibility(mut self, eligible: impl Fn(&ObjRef) -> bool + 'a) -> Self {
        self.eligible = Box::new(eligible);
        self
    }

    /// Run a whole dump into `dir`, creating it when missing.
    pub fn dump(&mut self, dir: &Path) -> Result<DumpStats> {
        std::fs::create_dir_all(dir).map_err(|e| PersistError::io(dir, e))?;

        self.begin_scan();
        self.scan_loop();
        tracing::debug!(objects = self.visited.len(), "scan complete");

        self.state = DumpState::Emit;
        let mut conn = Connection::open(dir.join(STATE_FILE))?;
        create_schema(&conn)?;
        let stats = self.emit_loop(&mut conn)?;

        write_idempotent(&dir.join(PREDEF_FILE), &render_predef_artifact(self.registry)?)?;
        write_idempotent(&dir.join(GLOBALS_FILE), &render_globals_artifact(self.globals)?)?;

        self.state = DumpState::Idle;
        tracing::info!(
            objects = stats.objects,
            globals = stats.globals,
            dir = %dir.display(),
            "dump complete"
        );
        Ok(stats)
    }

    /// Seed the queue from the two root sets.
    fn begin_scan(&mut self) {
        self.state = DumpState::Scan;
        self.visited.clear();
        self.queue.clear();

        let mut seeds = Vec::new();
        self.registry.predefined_set().scan_refs(&mut |r| {
            seeds.push(r.clone());
            false
        });
        for (_, obj) in self.globals.bound() {
            seeds.push(obj);
        }
        for r in seeds {
            self.touch(r);
        }
    }

    fn touch(&mut self, r: ObjRef) {
        debug_assert_eq!(self.state, DumpState::Scan);
        if (self.eligible)(&r) && !self.visited.contains_key(&r.id()) {
            self.visited.insert(r.id(), r.clone());
            self.queue.push_back(r);
        }
    }

    /// Breadth-first walk until no new eligible object turns up.
    fn scan_loop(&mut self) {
        while let Some(obj) = self.queue.pop_front() {
            let mut found: BTreeMap<PairId, ObjRef> = BTreeMap::new();
            {
                let eligible = &self.eligible;
                let visited = &self.visited;
                obj.scan_inside(
                    &mut |r| {
                        if eligible(r) && !visited.contains_key(&r.id()) {
                            found.entry(r.id()).or_insert_with(|| r.clone());
                        }
                        false
                    },
                    &|at| eligible(at),
                );
            }
            for (_, r) in found {
                self.touch(r);
            }
        }
    }

    /// Rewrite both tables in one transaction.
    fn emit_loop(&self, conn: &mut Connection) -> Result<DumpStats> {
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM t_objects", [])?;
        tx.execute("DELETE FROM t_globals", [])?;

        let mut globals_written = 0;
        {
            let mut obj_stmt = tx.prepare(
                "INSERT INTO t_objects (ob_id, ob_mtim, ob_content, ob_paylkind, ob_payload)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for (id, obj) in &self.visited {
                // One read acquisition per row, so the row never mixes
                // two object states.
                let (content, kind, payload, mtime) = obj.with_content(|view| {
                    let mut attrs = Vec::new();
                    for (at, va) in view.attrs {
                        if !self.emit_ref(at) {
                            continue;
                        }
                        attrs.push(json!({
                            "at": at.id().to_string(),
                            "va": val_to_json(va, self),
                        }));
                    }
                    let comps: Vec<serde_json::Value> =
                        view.comps.iter().map(|v| val_to_json(v, self)).collect();
                    let content = json!({ "attrs": attrs, "comps": comps }).to_string();
                    let (kind, payload) = match view.payload {
                        Some(p) if p.dumpable() => match p.emit_json(self) {
                            Some(block) => (Some(p.kind()), Some(block.to_string())),
                            None => (None, None),
                        },
                        _ => (None, None),
                    };
                    (content, kind, payload, view.mtime)
                });
                let mtim = mtime.timestamp_millis() as f64 / 1000.0;
                obj_stmt.execute(params![id.to_string(), mtim, content, kind, payload])?;
            }

            let mut glob_stmt =
                tx.prepare("INSERT INTO t_globals (glob_name, glob_oid) VALUES (?1, ?2)")?;
            for (name, obj) in self.globals.bound() {
                if self.emit_ref(&obj) {
                    glob_stmt.execute(params![name, obj.id().to_string()])?;
                    globals_written += 1;
                }
            }
        }

        tx.commit()?;
        Ok(DumpStats {
            objects: self.visited.len(),
            globals: globals_written,
        })
    }

}

impl JsonEmitter for Dumper<'_> {
    /// A reference is worth writing iff its object made it into the dump.
    fn emit_ref(&self, r: &ObjRef) -> bool {
        self.visited.contains_key(&r.id())
    }
}

impl std::fmt::Debug for Dumper<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dumper")
            .field("state", &self.state)
            .field("visited", &self.visited.len())
            .field("queued", &self.queue.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use melt_core::{Space, Val};

    fn global_obj(reg: &Registry) -> ObjRef {
        let obj = reg.create();
        reg.set_space(&obj, Space::Global);
        obj
    }

    fn dump_rows(dir: &Path) -> Vec<(String, String)> {
        let conn = Connection::open(dir.join(STATE_FILE)).unwrap();
        let mut stmt = conn
            .prepare("SELECT ob_id, ob_content FROM t_objects ORDER BY ob_id")
            .unwrap();
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .unwrap();
        rows.map(|r| r.unwrap()).collect()
    }

    #[test]
    fn dump_reaches_through_references() {
        let reg = Registry::new();
        let globals = Globals::new();
        let root = global_obj(&reg);
        let leaf = global_obj(&reg);
        root.comp_append(Val::Ref(leaf.clone()));
        globals.set("root", Some(root.clone()));

        let dir = tempfile::tempdir().unwrap();
        let stats = Dumper::new(&reg, &globals).dump(dir.path()).unwrap();
        assert_eq!(stats, DumpStats { objects: 2, globals: 1 });

        let ids: Vec<String> = dump_rows(dir.path()).into_iter().map(|(id, _)| id).collect();
        assert!(ids.contains(&root.id().to_string()));
        assert!(ids.contains(&leaf.id().to_string()));
    }

    #[test]
    fn transient_objects_stay_out() {
        let reg = Registry::new();
        let globals = Globals::new();
        let root = global_obj(&reg);
        let transient = reg.create();
        root.comp_append(Val::Ref(transient.clone()));
        globals.set("root", Some(root));

        let dir = tempfile::tempdir().unwrap();
        let stats = Dumper::new(&reg, &globals).dump(dir.path()).unwrap();
        assert_eq!(stats.objects, 1);

        // The dangling reference degrades to null in the content row.
        let rows = dump_rows(dir.path());
        let content: serde_json::Value = serde_json::from_str(&rows[0].1).unwrap();
        assert_eq!(content["comps"][0], serde_json::Value::Null);
    }

    #[test]
    fn attr_and_comp_row_shape() {
        let reg = Registry::new();
        let globals = Globals::new();
        let a = global_obj(&reg);
        let b = global_obj(&reg);
        a.attr_put(b.clone(), Val::Ref(b.clone()));
        a.comp_append(Val::Int(42));
        globals.set("a", Some(a.clone()));

        let dir = tempfile::tempdir().unwrap();
        Dumper::new(&reg, &globals).dump(dir.path()).unwrap();

        let rows = dump_rows(dir.path());
        let (_, content) = rows
            .iter()
            .find(|(id, _)| *id == a.id().to_string())
            .expect("root row present");
        let content: serde_json::Value = serde_json::from_str(content).unwrap();
        assert_eq!(
            content,
            json!({
                "attrs": [ { "at": b.id().to_string(), "va": { "ref": b.id().to_string() } } ],
                "comps": [ 42 ],
            })
        );
    }

    #[test]
    fn repeated_dumps_are_identical_and_leave_no_backups() {
        let reg = Registry::new();
        let globals = Globals::new();
        let root = global_obj(&reg);
        root.attr_put(global_obj(&reg), Val::string("stable"));
        globals.set("root", Some(root));

        let dir = tempfile::tempdir().unwrap();
        Dumper::new(&reg, &globals).dump(dir.path()).unwrap();
        let first = dump_rows(dir.path());
        Dumper::new(&reg, &globals).dump(dir.path()).unwrap();
        let second = dump_rows(dir.path());
        assert_eq!(first, second);

        // Unchanged artifacts are skipped, so no `~` backups appear.
        assert!(!dir.path().join(format!("{PREDEF_FILE}~")).exists());
        assert!(!dir.path().join(format!("{GLOBALS_FILE}~")).exists());
    }

    #[test]
    fn custom_eligibility_narrows_the_dump() {
        let reg = Registry::new();
        let globals = Globals::new();
        let keep = global_obj(&reg);
        let drop_me = global_obj(&reg);
        keep.comp_append(Val::Ref(drop_me.clone()));
        globals.set("keep", Some(keep.clone()));

        let dir = tempfile::tempdir().unwrap();
        let stats = Dumper::new(&reg, &globals)
            .with_eligibility(move |r| r.id() == keep.id())
            .dump(dir.path())
            .unwrap();
        assert_eq!(stats.objects, 1);
    }
}
