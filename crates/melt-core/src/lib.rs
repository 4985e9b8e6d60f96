//! The MELT object substrate.
//!
//! Everything a running MELT process manipulates lives here:
//!
//! - [`Val`] — the immutable tagged value union ([`value`] module), with
//!   [`Set`] and [`Tuple`] reference sequences ([`seq`])
//! - [`Object`] / [`ObjRef`] — identity-bearing mutable objects ([`object`])
//! - [`Registry`] — the sharded id -> object map, one per runtime
//!   ([`registry`]), plus named [`Globals`] slots ([`globals`])
//! - [`Payload`] — per-object extension state, with the symbol payload and
//!   table as the concrete implementation ([`payload`], [`symbol`])
//! - the JSON value codec with its injectable emitter/parser seams
//!   ([`json`])
//!
//! Persistence (SQLite dump/load) lives in `melt-persist`; this crate only
//! defines the seams it plugs into.

pub mod error;
pub mod globals;
pub mod json;
pub mod object;
pub mod payload;
pub mod registry;
pub mod seq;
pub mod symbol;
pub mod value;

pub use error::{CoreError, Result};
pub use globals::Globals;
pub use json::{val_from_json, val_to_json, EmitAll, JsonEmitter, JsonParser};
pub use object::{ContentView, ObjRef, Object, Space};
pub use payload::{Payload, PayloadLoader, PayloadRegistry};
pub use registry::Registry;
pub use seq::{Set, Tuple};
pub use symbol::{register_symbol_loader, SymbolPayload, SymbolTable};
pub use value::{Str, Val, ValKind};
