//! gecko-core
//!
//! Reads, edits and writes Gecko code lists. A list moves losslessly between
//! three forms: a GCT binary blob, one of two hex text dialects, and an
//! editable tree of typed commands ([`format::Command`]).
//!
//! Nothing here executes codes; the tree is data.

pub mod config;
pub mod error;
pub mod format;

pub use error::{GeckoError, Result};
