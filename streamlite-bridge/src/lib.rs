#![doc = include_str!("../../README.md")]
//! Loader-facing bridge for the `streamlite` extension.
//!
//! The host process loads this library and resolves exactly two symbols:
//!
//! | symbol               | C signature                          |
//! |----------------------|--------------------------------------|
//! | `streamlite_version` | `const char *streamlite_version(void)` |
//! | `streamlite_init`    | `void streamlite_init(void *db)`     |
//!
//! These are the names DuckDB's loader resolves for a C++ ABI extension file
//! called `streamlite.duckdb_extension`. The behaviour lives in
//! `streamlite-duckdb`, whose entry points keep ordinary Rust paths.
//! Everything here is a pure relay: no checks, no allocation, no logging, no
//! state. Whatever the implementation returns or does reaches the host as is.
//!
//! # Thread safety
//!
//! The relay itself is stateless, so concurrent calls are safe exactly when
//! the implementation's functions are. [`ExtensionEntryPoints`] implementors
//! must uphold that; the host may call either entry point any number of
//! times, from any thread, in any order.

use std::ffi::{c_char, c_void};

/// Opaque database handle supplied by the host.
///
/// The host owns it and guarantees validity only for the duration of the call
/// it was passed to. The bridge never dereferences, retains or frees it; the
/// type only exists to carry that contract across the boundary.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatabaseHandle(*mut c_void);

impl DatabaseHandle {
    pub const fn from_raw(ptr: *mut c_void) -> Self {
        Self(ptr)
    }

    pub const fn as_ptr(self) -> *mut c_void {
        self.0
    }
}

/// The implementation side of the two loader entry points.
pub trait ExtensionEntryPoints {
    /// NUL-terminated version string owned by the implementation.
    fn version() -> *const c_char;

    /// Initialise the extension against a host database handle.
    ///
    /// # Safety
    /// `db` is whatever the host passed; implementors define what it must
    /// point to.
    unsafe fn init(db: DatabaseHandle);
}

/// Emit the two loader-visible symbols and forward them to `$entry`.
///
/// ```ignore
/// streamlite::export_extension!(myext_version, myext_init, MyEntry);
/// ```
#[macro_export]
macro_rules! export_extension {
    ($version:ident, $init:ident, $entry:ty) => {
        #[no_mangle]
        pub extern "C" fn $version() -> *const ::std::ffi::c_char {
            <$entry as $crate::ExtensionEntryPoints>::version()
        }

        /// # Safety
        /// `db` must satisfy the implementation's handle contract.
        #[no_mangle]
        pub unsafe extern "C" fn $init(db: *mut ::std::ffi::c_void) {
            <$entry as $crate::ExtensionEntryPoints>::init($crate::DatabaseHandle::from_raw(db))
        }
    };
}

/// Production entry points backed by `streamlite-duckdb`.
pub struct Streamlite;

impl ExtensionEntryPoints for Streamlite {
    fn version() -> *const c_char {
        streamlite_duckdb::version()
    }

    unsafe fn init(db: DatabaseHandle) {
        streamlite_duckdb::init(db.as_ptr())
    }
}

export_extension!(streamlite_version, streamlite_init, Streamlite);

#[cfg(test)]
mod tests {
    use super::*;
    use std::ptr;

    #[test]
    fn handle_round_trips_the_raw_address() {
        let raw = 0x1000 as *mut c_void;
        assert_eq!(DatabaseHandle::from_raw(raw).as_ptr(), raw);
        assert!(DatabaseHandle::from_raw(ptr::null_mut()).as_ptr().is_null());
    }

    #[test]
    fn handle_has_pointer_layout() {
        assert_eq!(
            std::mem::size_of::<DatabaseHandle>(),
            std::mem::size_of::<*mut c_void>()
        );
        assert_eq!(
            std::mem::align_of::<DatabaseHandle>(),
            std::mem::align_of::<*mut c_void>()
        );
    }

    #[test]
    fn exported_version_is_the_implementation_pointer() {
        assert_eq!(streamlite_version(), streamlite_duckdb::version());
    }
}
