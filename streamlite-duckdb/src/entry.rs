//! Implementation-side entry points.
//!
//! These are plain Rust functions with mangled paths. The host never looks
//! them up by name; `streamlite-bridge` re-exports them under the symbol names
//! the loader expects.

use std::ffi::{c_char, c_void};
use std::ptr;

use thiserror::Error;
use tracing::{error, info};

use crate::duckdb_compat::{
    duckdb_connect, duckdb_connection, duckdb_database, duckdb_disconnect, duckdb_library_version,
    DuckDBSuccess,
};
use crate::ffi::register_functions;
use crate::logging::init_logging_from_env;

pub(crate) const VERSION_TEXT: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Error)]
pub enum InitError {
    #[error("database handle is null")]
    NullHandle,

    #[error("could not open a connection on the database")]
    Connect,

    #[error("no callback for catalog function `{function}`")]
    MissingCallback { function: &'static str },

    #[error("registering `{function}` failed")]
    Registration { function: &'static str },

    #[error("panic during init")]
    Panicked,
}

/// Engine version the extension was built against, as a NUL-terminated string.
///
/// Legacy loaders compare it with the host's own version before calling
/// `init`. The string is static inside the engine: every call returns the same
/// pointer and callers must not free it.
pub fn version() -> *const c_char {
    unsafe { duckdb_library_version() }
}

/// Register the extension on `db`, reporting failures to the caller.
///
/// # Safety
/// `db` must be null or a valid, open database handle for the duration of the call.
pub unsafe fn try_init(db: duckdb_database) -> Result<(), InitError> {
    if db.is_null() {
        return Err(InitError::NullHandle);
    }
    info!(version = VERSION_TEXT, "init");

    let mut con: duckdb_connection = ptr::null_mut();
    if duckdb_connect(db, &mut con) != DuckDBSuccess {
        return Err(InitError::Connect);
    }
    let registered = register_functions(con);
    duckdb_disconnect(&mut con);

    info!(functions = registered?, "registered functions");
    Ok(())
}

/// Host-facing init: failures are logged and never unwind into the host.
///
/// Legacy loaders pass their `DatabaseInstance`. Its leading self-reference
/// has the layout of the C API's database wrapper, so it is used as a
/// `duckdb_database` directly.
///
/// # Safety
/// `db` must be null or a database owned by the host for the duration of the call.
pub unsafe fn init(db: *mut c_void) {
    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        init_logging_from_env();
        try_init(db.cast())
    }));
    let err = match outcome {
        Ok(Ok(())) => return,
        Ok(Err(e)) => e,
        Err(_) => InitError::Panicked,
    };
    error!(error = %err, "init failed");
}
