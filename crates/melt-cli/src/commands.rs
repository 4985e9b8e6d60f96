//! What each flag of the driver actually does.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use melt_core::{
    register_symbol_loader, Globals, PayloadRegistry, Registry, Set, Space, SymbolPayload,
    SymbolTable, Tuple, Val,
};
use melt_ident::{PairId, Serial63};
use melt_persist::boot::{
    install_globals, install_predefined, read_globals_artifact, read_predef_artifact,
};
use melt_persist::{Dumper, Loader, GLOBALS_FILE, PREDEF_FILE};

/// Everything one running process manipulates.
pub struct World {
    pub registry: Registry,
    pub globals: Globals,
    pub payloads: PayloadRegistry,
    pub symbols: Arc<SymbolTable>,
}

impl World {
    pub fn new() -> Self {
        let symbols = Arc::new(SymbolTable::new());
        let payloads = PayloadRegistry::new();
        register_symbol_loader(&payloads, Arc::clone(&symbols));
        World {
            registry: Registry::new(),
            globals: Globals::new(),
            payloads,
            symbols,
        }
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

/// Print freshly drawn serials with their bucket, plus full object ids.
pub fn print_serials(count: usize) {
    for _ in 0..count {
        let serial = Serial63::random();
        let id = PairId::random();
        println!(
            "serial {} (raw {}, bucket {})   id {}",
            serial,
            serial.value(),
            serial.bucket(),
            id
        );
    }
}

/// Replay the bootstrap artifacts (when present) and load the store.
pub fn load(world: &World, dir: &Path) -> anyhow::Result<()> {
    let predef_path = dir.join(PREDEF_FILE);
    if predef_path.exists() {
        let records = read_predef_artifact(&predef_path)?;
        install_predefined(&world.registry, &world.symbols, &records)?;
    }
    let globals_path = dir.join(GLOBALS_FILE);
    if globals_path.exists() {
        let records = read_globals_artifact(&globals_path)?;
        install_globals(&world.globals, &records);
    }
    let stats = Loader::new(&world.registry, &world.globals, &world.payloads)
        .load(dir)
        .with_context(|| format!("loading store from {}", dir.display()))?;
    println!(
        "loaded {} objects, {} globals from {}",
        stats.objects,
        stats.globals,
        dir.display()
    );
    Ok(())
}

pub fn dump(world: &World, dir: &Path) -> anyhow::Result<()> {
    let stats = Dumper::new(&world.registry, &world.globals)
        .dump(dir)
        .with_context(|| format!("dumping store into {}", dir.display()))?;
    println!(
        "dumped {} objects, {} globals into {}",
        stats.objects,
        stats.globals,
        dir.display()
    );
    Ok(())
}

/// Build a small object graph touching every value kind, so a demo dump
/// exercises the whole pipeline.
pub fn demo(world: &World) -> anyhow::Result<()> {
    let system = world.registry.create();
    world.registry.set_space(&system, Space::Predefined);
    system.set_payload(Box::new(SymbolPayload::new("the_system")?));
    world.symbols.register("the_system", system.clone())?;

    let comment = world.registry.create();
    world.registry.set_space(&comment, Space::Predefined);
    comment.set_payload(Box::new(SymbolPayload::new("comment")?));
    world.symbols.register("comment", comment.clone())?;

    let mut members = Vec::new();
    for rank in 0..5i64 {
        let obj = world.registry.create();
        world.registry.set_space(&obj, Space::Global);
        obj.attr_put(comment.clone(), Val::string(format!("member #{rank}")));
        obj.comp_append(Val::Int(rank));
        members.push(obj);
    }
    for pair in members.windows(2) {
        pair[0].attr_put(system.clone(), Val::Ref(pair[1].clone()));
    }

    system.attr_put(
        comment.clone(),
        Val::string("demonstration graph entry point"),
    );
    system.comp_append(Val::from(Set::from_refs(members.clone())));
    system.comp_append(Val::from(Tuple::from_refs(members.clone())));
    system.comp_append(Val::colored(members[0].clone(), comment.clone()));

    world.globals.register("the_demo");
    world.globals.set("the_demo", Some(system.clone()));
    tracing::info!(objects = world.registry.len(), "demo graph built");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_then_dump_then_load() {
        let world = World::new();
        demo(&world).unwrap();
        assert!(world.globals.get("the_demo").is_some());
        assert_eq!(world.registry.predefined_count(), 2);

        let dir = tempfile::tempdir().unwrap();
        dump(&world, dir.path()).unwrap();

        let fresh = World::new();
        load(&fresh, dir.path()).unwrap();
        assert_eq!(fresh.registry.len(), world.registry.len());

        let system = fresh.symbols.find("the_system").expect("symbol rebinds");
        assert_eq!(system.space(), Space::Predefined);
        assert_eq!(fresh.globals.get("the_demo").unwrap(), system);

        let comment = fresh.symbols.find("comment").unwrap();
        assert!(system
            .attr_get(&comment)
            .and_then(|v| v.as_str().map(str::to_string))
            .is_some());
    }
}
