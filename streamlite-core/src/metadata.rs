//! DuckDB extension metadata footer.
//!
//! An extension file ends with a WebAssembly-style custom section header
//! followed by 512 bytes that DuckDB reads before opening the library: a
//! 256-byte metadata block and a 256-byte signature. The metadata block holds
//! eight 32-byte NUL-padded fields stored last to first. A loader that allows
//! unsigned extensions accepts an all-zero signature.

use crate::error::{Result, StreamLiteError};

/// Bytes the loader reads from the end of the file.
pub const TRAILER_LEN: usize = METADATA_LEN + SIGNATURE_LEN;
pub const METADATA_LEN: usize = FIELD_COUNT * FIELD_LEN;
pub const SIGNATURE_LEN: usize = 256;
pub const FIELD_LEN: usize = 32;
const FIELD_COUNT: usize = 8;

/// Custom section id, section length, name length, name, payload length.
const SECTION_HEADER: &[u8] = b"\x00\x93\x04\x10duckdb_signature\x80\x04";
const MAGIC: &str = "4";

/// How the engine calls into the extension. streamlite uses the C++ entry
/// point `<name>_init(DatabaseInstance &)`.
pub const ABI_CPP: &str = "CPP";

/// Values written into the footer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionMetadata {
    /// Platform string as reported by `PRAGMA platform`, e.g. `linux_amd64`.
    pub platform: String,
    /// Engine version the extension was built against, e.g. `v1.1.1`.
    pub duckdb_version: String,
    pub extension_version: String,
}

impl ExtensionMetadata {
    /// Render the footer to append to a built library.
    ///
    /// # Example
    ///
    /// ```
    /// use streamlite_core::metadata::{ExtensionMetadata, TRAILER_LEN};
    ///
    /// let meta = ExtensionMetadata {
    ///     platform: "linux_amd64".into(),
    ///     duckdb_version: "v1.1.1".into(),
    ///     extension_version: "0.1.0".into(),
    /// };
    /// let footer = meta.footer().unwrap();
    /// assert!(footer.len() > TRAILER_LEN);
    /// ```
    pub fn footer(&self) -> Result<Vec<u8>> {
        let fields: [&str; FIELD_COUNT] = [
            MAGIC,
            &self.platform,
            &self.duckdb_version,
            &self.extension_version,
            ABI_CPP,
            "",
            "",
            "",
        ];
        let mut out = Vec::with_capacity(SECTION_HEADER.len() + TRAILER_LEN);
        out.extend_from_slice(SECTION_HEADER);
        for field in fields.iter().rev() {
            out.extend_from_slice(&padded(field)?);
        }
        out.resize(SECTION_HEADER.len() + TRAILER_LEN, 0);
        Ok(out)
    }

    /// Read the fields back out of a file tail, as the loader does.
    pub fn from_footer(file: &[u8]) -> Result<Self> {
        let start = file
            .len()
            .checked_sub(TRAILER_LEN)
            .ok_or_else(|| StreamLiteError::InvalidInput("file too short for a footer".into()))?;
        let block = &file[start..start + METADATA_LEN];
        let field = |n: usize| {
            let offset = (FIELD_COUNT - n) * FIELD_LEN;
            let raw = &block[offset..offset + FIELD_LEN];
            let end = raw.iter().position(|&b| b == 0).unwrap_or(FIELD_LEN);
            String::from_utf8_lossy(&raw[..end]).into_owned()
        };
        if field(1) != MAGIC {
            return Err(StreamLiteError::InvalidInput(format!(
                "unknown metadata version `{}`",
                field(1)
            )));
        }
        Ok(Self {
            platform: field(2),
            duckdb_version: field(3),
            extension_version: field(4),
        })
    }
}

fn padded(value: &str) -> Result<[u8; FIELD_LEN]> {
    let bytes = value.as_bytes();
    if bytes.len() > FIELD_LEN {
        return Err(StreamLiteError::InvalidInput(format!(
            "metadata field `{value}` is longer than {FIELD_LEN} bytes"
        )));
    }
    let mut out = [0; FIELD_LEN];
    out[..bytes.len()].copy_from_slice(bytes);
    Ok(out)
}
