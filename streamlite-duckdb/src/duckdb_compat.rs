//! Single import path for the DuckDB C API.

pub use libduckdb_sys::*;

/// Strings up to this length are stored inline in a `duckdb_string_t`.
const STRING_INLINE_LENGTH: usize = 12;

/// Borrow the bytes of a VARCHAR value read out of a vector.
///
/// # Safety
/// `s` must point into a live vector; the returned slice is only valid while
/// that vector is.
pub(crate) unsafe fn string_bytes<'a>(s: *const duckdb_string_t) -> &'a [u8] {
    let len = (*s).value.inlined.length as usize;
    let data = if len <= STRING_INLINE_LENGTH {
        (*s).value.inlined.inlined.as_ptr()
    } else {
        (*s).value.pointer.ptr.cast_const()
    };
    std::slice::from_raw_parts(data.cast(), len)
}
