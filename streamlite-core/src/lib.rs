#![doc = include_str!("../../README.md")]
//! Crate-specific API surface for `streamlite-core`: host-independent logic.
//!
//! Nothing in this crate touches an FFI handle. `streamlite-duckdb` turns these
//! functions into SQL callbacks, and `streamlite-bridge` exports the loader
//! entry points.

pub mod column;
pub mod config;
pub mod consume;
pub mod error;
pub mod function_catalog;
pub mod metadata;

pub use error::{Result, StreamLiteError};
