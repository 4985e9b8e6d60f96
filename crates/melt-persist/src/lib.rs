//! MELT persistence: dumping the live object graph to a SQLite store and
//! loading it back.
//!
//! A dump directory holds three files: `melt_state.sqlite` (the object and
//! global rows), `melt_predef.json` (the predefined roster), and
//! `melt_globals.json` (the known global names). The [`Dumper`] writes all
//! three; the [`Loader`] reads the store after the [`boot`] module has
//! replayed the artifacts.

pub mod boot;
pub mod dumper;
pub mod error;
pub mod fileio;
pub mod loader;
pub mod schema;

pub use dumper::{DumpStats, Dumper};
pub use error::{PersistError, Result};
pub use loader::{LoadStats, Loader};
pub use schema::{GLOBALS_FILE, PREDEF_FILE, STATE_FILE};
