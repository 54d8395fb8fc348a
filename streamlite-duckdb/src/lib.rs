#![doc = include_str!("../../README.md")]
//! Crate-specific API surface for `streamlite-duckdb`.
//!
//! [`version`] and [`init`] are the implementation entry points. They are
//! reached from the loader through `streamlite-bridge`, which owns the
//! exported symbol names. [`register_functions`] is also usable directly on
//! any open connection.

mod duckdb_compat;
mod entry;
mod ffi;
mod logging;

pub use entry::{init, try_init, version, InitError};
pub use ffi::register_functions;
