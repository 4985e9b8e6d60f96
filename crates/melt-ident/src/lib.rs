//! Identity primitives for MELT.
//!
//! This crate provides the two identifier types every other MELT crate
//! builds on:
//!
//! - [`Serial63`] — a 63-bit serial number with a fixed-width base-62 text
//!   form and a bucket partition used both for sharded registry storage and
//!   for id-generation locality
//! - [`PairId`] — an ordered pair of serials forming a global object
//!   identity, with a 32-bit hash that is never zero for a non-null id
//!
//! Serials and pair ids are plain immutable values. Zero is the reserved
//! null sentinel for both; everything else must fall inside the legal
//! serial band.

pub mod error;
pub mod pairid;
pub mod serial;

pub use error::IdentError;
pub use pairid::PairId;
pub use serial::Serial63;

/// Result alias for identifier operations.
pub type Result<T> = std::result::Result<T, IdentError>;
