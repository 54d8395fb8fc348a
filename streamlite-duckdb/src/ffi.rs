//! DuckDB scalar function registration via the C API.
//!
//! Registers every streamlite SQL function on a raw `duckdb_connection`.
//! Callbacks are vectorised: each call receives a whole input chunk and fills
//! one output vector. The loader-facing entry points live in
//! `streamlite-bridge`; this module only knows how to talk to an open
//! connection.

use crate::duckdb_compat::*;
use std::ffi::{CStr, CString};

use streamlite_core::column::{
    coerce, extract_path, natural, parse_timestamp_ms, split_name_type, ColumnType, ColumnValue,
};
use streamlite_core::consume::plan_from_string;
use streamlite_core::function_catalog::{ScalarFunctionSpec, SCALAR_FUNCTIONS};
use streamlite_core::{Result, StreamLiteError};
use tracing::{debug, info};

use crate::entry::{InitError, VERSION_TEXT};

type XFunc = unsafe extern "C" fn(duckdb_function_info, duckdb_data_chunk, duckdb_vector);

// ── Argument-extraction helpers ──────────────────────────────────────────────

enum SqlTextArg<'a> {
    Null,
    Value(&'a str),
    InvalidUtf8,
}

/// Read view over one VARCHAR input column.
struct VarcharColumn {
    data: *const duckdb_string_t,
    validity: *mut u64,
}

impl VarcharColumn {
    unsafe fn new(input: duckdb_data_chunk, col: idx_t) -> Self {
        let vector = duckdb_data_chunk_get_vector(input, col);
        Self {
            data: duckdb_vector_get_data(vector).cast_const().cast(),
            validity: duckdb_vector_get_validity(vector),
        }
    }

    unsafe fn get<'a>(&self, row: idx_t) -> SqlTextArg<'a> {
        // A null validity mask means every row is valid.
        if !self.validity.is_null() && !duckdb_validity_row_is_valid(self.validity, row) {
            return SqlTextArg::Null;
        }
        match std::str::from_utf8(string_bytes(self.data.add(row as usize))) {
            Ok(s) => SqlTextArg::Value(s),
            Err(_) => SqlTextArg::InvalidUtf8,
        }
    }
}

/// `Ok(None)` for SQL NULL. `Err` once the error has been reported.
unsafe fn require_text_arg<'a>(
    info: duckdb_function_info,
    col: &VarcharColumn,
    row: idx_t,
    fn_name: &str,
    arg_name: &str,
) -> std::result::Result<Option<&'a str>, ()> {
    match col.get(row) {
        SqlTextArg::Value(v) => Ok(Some(v)),
        SqlTextArg::Null => Ok(None),
        SqlTextArg::InvalidUtf8 => {
            set_error(
                info,
                &format!("{fn_name}: {arg_name} must be valid UTF-8 text"),
            );
            Err(())
        }
    }
}

// ── Result-setting helpers ───────────────────────────────────────────────────

const PANIC_IN_CALLBACK_MSG: &str = "panic in DuckDB callback";

/// Write view over the output vector of a function returning `ty`.
struct ResultVector {
    vector: duckdb_vector,
    ty: ColumnType,
}

impl ResultVector {
    fn new(vector: duckdb_vector, ty: ColumnType) -> Self {
        Self { vector, ty }
    }

    unsafe fn set_null(&self, row: idx_t) {
        duckdb_vector_ensure_validity_writable(self.vector);
        duckdb_validity_set_row_invalid(duckdb_vector_get_validity(self.vector), row);
    }

    unsafe fn set_text(&self, row: idx_t, s: &str) {
        duckdb_vector_assign_string_element_len(self.vector, row, s.as_ptr().cast(), s.len() as idx_t);
    }

    unsafe fn write<T>(&self, row: idx_t, v: T) {
        duckdb_vector_get_data(self.vector)
            .cast::<T>()
            .add(row as usize)
            .write(v);
    }

    /// Store `v`, which must fit the vector's physical type.
    unsafe fn set_value(&self, row: idx_t, v: ColumnValue) -> Result<()> {
        match (self.ty, v) {
            (_, ColumnValue::Null) => self.set_null(row),
            (ColumnType::Integer, ColumnValue::Integer(i)) => {
                let narrow = i32::try_from(i).map_err(|_| StreamLiteError::OutOfRange {
                    value: i.to_string(),
                    ty: ColumnType::Integer.sql_name(),
                })?;
                self.write(row, narrow);
            }
            (ColumnType::Long | ColumnType::TimestampMs, ColumnValue::Integer(i)) => {
                self.write(row, i)
            }
            (ColumnType::Float, ColumnValue::Double(f)) => self.write(row, f as f32),
            (ColumnType::Double, ColumnValue::Double(f)) => self.write(row, f),
            (ColumnType::Text, ColumnValue::Text(s)) => self.set_text(row, &s),
            (ty, other) => {
                return Err(StreamLiteError::InvalidInput(format!(
                    "cannot store {other:?} in a {} result",
                    ty.sql_name()
                )))
            }
        }
        Ok(())
    }
}

unsafe fn set_error(info: duckdb_function_info, msg: &str) {
    let msg = CString::new(msg.replace('\0', " ")).unwrap_or_default();
    duckdb_scalar_function_set_error(info, msg.as_ptr());
}

unsafe fn xfunc_guard<F>(info: duckdb_function_info, label: &str, f: F)
where
    F: FnOnce(),
{
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f));
    if result.is_err() {
        set_error(info, &format!("{label}: {PANIC_IN_CALLBACK_MSG}"));
    }
}

/// Clap renders usage after the first line; SQL errors keep only the headline.
fn error_headline(e: &StreamLiteError) -> String {
    let msg = e.to_string();
    match msg.lines().next() {
        Some(first) => first.trim_end().to_string(),
        None => msg,
    }
}

// ── Callback macros ──────────────────────────────────────────────────────────
//
// Each macro generates an `unsafe extern "C" fn` with the DuckDB scalar
// function signature. NULL inputs produce NULL rows. The first failing row
// aborts the chunk with an error prefixed by the SQL function name.

/// 1 text → Result<ColumnValue>, stored as `$ret`.
macro_rules! xfunc_text {
    ($name:ident, $label:expr, $arg_name:expr, $ret:expr, $func:expr) => {
        unsafe extern "C" fn $name(
            info: duckdb_function_info,
            input: duckdb_data_chunk,
            output: duckdb_vector,
        ) {
            xfunc_guard(info, $label, || {
                let arg = VarcharColumn::new(input, 0);
                let out = ResultVector::new(output, $ret);
                for row in 0..duckdb_data_chunk_get_size(input) {
                    let s = match require_text_arg(info, &arg, row, $label, $arg_name) {
                        Ok(Some(s)) => s,
                        Ok(None) => {
                            out.set_null(row);
                            continue;
                        }
                        Err(()) => return,
                    };
                    if let Err(e) = ($func)(s).and_then(|v| out.set_value(row, v)) {
                        set_error(info, &format!(concat!($label, ": {}"), error_headline(&e)));
                        return;
                    }
                }
            });
        }
    };
}

/// (json, path) → value under an optional declared type.
macro_rules! xfunc_extract {
    ($name:ident, $label:expr, $ty:expr) => {
        unsafe extern "C" fn $name(
            info: duckdb_function_info,
            input: duckdb_data_chunk,
            output: duckdb_vector,
        ) {
            xfunc_guard(info, $label, || {
                stream_extract_impl(info, input, output, $label, $ty);
            });
        }
    };
}

// ── Metadata ─────────────────────────────────────────────────────────────────

unsafe extern "C" fn streamlite_version_xfunc(
    info: duckdb_function_info,
    input: duckdb_data_chunk,
    output: duckdb_vector,
) {
    xfunc_guard(info, "streamlite_version", || {
        let out = ResultVector::new(output, ColumnType::Text);
        for row in 0..duckdb_data_chunk_get_size(input) {
            out.set_text(row, VERSION_TEXT);
        }
    });
}

// ── Payload extraction ───────────────────────────────────────────────────────

fn extract_value(json: &str, path: &str, ty: Option<ColumnType>) -> Result<ColumnValue> {
    let doc: serde_json::Value = serde_json::from_str(json)?;
    let Some(found) = extract_path(&doc, path)? else {
        return Ok(ColumnValue::Null);
    };
    match ty {
        Some(ty) => coerce(&found, ty),
        None => Ok(natural(&found)),
    }
}

unsafe fn stream_extract_impl(
    info: duckdb_function_info,
    input: duckdb_data_chunk,
    output: duckdb_vector,
    label: &str,
    ty: Option<ColumnType>,
) {
    let json_col = VarcharColumn::new(input, 0);
    let path_col = VarcharColumn::new(input, 1);
    let out = ResultVector::new(output, ty.unwrap_or(ColumnType::Text));
    for row in 0..duckdb_data_chunk_get_size(input) {
        let (json, path) = match (
            require_text_arg(info, &json_col, row, label, "json"),
            require_text_arg(info, &path_col, row, label, "path"),
        ) {
            (Err(()), _) | (_, Err(())) => return,
            (Ok(Some(json)), Ok(Some(path))) => (json, path),
            _ => {
                out.set_null(row);
                continue;
            }
        };
        if let Err(e) = extract_value(json, path, ty).and_then(|v| out.set_value(row, v)) {
            set_error(info, &format!("{label}: {}", error_headline(&e)));
            return;
        }
    }
}

xfunc_extract!(stream_extract_xfunc, "stream_extract", None);
xfunc_extract!(
    stream_extract_integer_xfunc,
    "stream_extract_integer",
    Some(ColumnType::Integer)
);
xfunc_extract!(
    stream_extract_bigint_xfunc,
    "stream_extract_bigint",
    Some(ColumnType::Long)
);
xfunc_extract!(
    stream_extract_float_xfunc,
    "stream_extract_float",
    Some(ColumnType::Float)
);
xfunc_extract!(
    stream_extract_double_xfunc,
    "stream_extract_double",
    Some(ColumnType::Double)
);
xfunc_extract!(
    stream_extract_varchar_xfunc,
    "stream_extract_varchar",
    Some(ColumnType::Text)
);
xfunc_extract!(
    stream_extract_timestamp_ms_xfunc,
    "stream_extract_timestamp_ms",
    Some(ColumnType::TimestampMs)
);

xfunc_text!(
    stream_timestamp_ms_xfunc,
    "stream_timestamp_ms",
    "timestamp",
    ColumnType::Long,
    |s: &str| parse_timestamp_ms(s).map(ColumnValue::Integer)
);

// ── Column specs ─────────────────────────────────────────────────────────────

xfunc_text!(
    stream_column_name_xfunc,
    "stream_column_name",
    "spec",
    ColumnType::Text,
    |s: &str| Ok::<_, StreamLiteError>(ColumnValue::Text(split_name_type(s).0.to_string()))
);

xfunc_text!(
    stream_column_type_xfunc,
    "stream_column_type",
    "spec",
    ColumnType::Text,
    |s: &str| Ok::<_, StreamLiteError>(ColumnValue::Text(split_name_type(s).1.sql_name().to_string()))
);

// ── Consume planning ─────────────────────────────────────────────────────────

xfunc_text!(
    stream_consume_plan_xfunc,
    "stream_consume_plan",
    "options",
    ColumnType::Text,
    |s: &str| plan_from_string(s)
        .and_then(|plan| plan.to_json())
        .map(ColumnValue::Text)
);

// ── Registration ─────────────────────────────────────────────────────────────

fn logical_type_id(ty: ColumnType) -> DUCKDB_TYPE {
    match ty {
        ColumnType::Integer => DUCKDB_TYPE_DUCKDB_TYPE_INTEGER,
        ColumnType::Long => DUCKDB_TYPE_DUCKDB_TYPE_BIGINT,
        ColumnType::Float => DUCKDB_TYPE_DUCKDB_TYPE_FLOAT,
        ColumnType::Double => DUCKDB_TYPE_DUCKDB_TYPE_DOUBLE,
        ColumnType::Text => DUCKDB_TYPE_DUCKDB_TYPE_VARCHAR,
        ColumnType::TimestampMs => DUCKDB_TYPE_DUCKDB_TYPE_TIMESTAMP_MS,
    }
}

unsafe fn add_logical_type(
    f: duckdb_scalar_function,
    ty: ColumnType,
    add: unsafe extern "C" fn(duckdb_scalar_function, duckdb_logical_type),
) {
    let mut logical = duckdb_create_logical_type(logical_type_id(ty));
    add(f, logical);
    duckdb_destroy_logical_type(&mut logical);
}

unsafe fn reg(con: duckdb_connection, spec: &ScalarFunctionSpec, xfunc: XFunc) -> duckdb_state {
    let Ok(c_name) = CString::new(spec.name) else {
        return DuckDBError;
    };
    let mut f = duckdb_create_scalar_function();
    duckdb_scalar_function_set_name(f, c_name.as_ptr());
    for param in spec.params {
        add_logical_type(f, *param, duckdb_scalar_function_add_parameter);
    }
    add_logical_type(f, spec.returns, duckdb_scalar_function_set_return_type);
    duckdb_scalar_function_set_function(f, Some(xfunc));
    let state = duckdb_register_scalar_function(con, f);
    duckdb_destroy_scalar_function(&mut f);
    state
}

/// Whether this database's catalog already holds the streamlite functions.
unsafe fn already_registered(con: duckdb_connection) -> bool {
    const SQL: &CStr =
        c"SELECT count(*) FROM duckdb_functions() WHERE function_name = 'streamlite_version'";
    let mut result: duckdb_result = std::mem::zeroed();
    let found = duckdb_query(con, SQL.as_ptr(), &mut result) == DuckDBSuccess
        && duckdb_value_int64(&mut result, 0, 0) > 0;
    duckdb_destroy_result(&mut result);
    found
}

fn callbacks() -> [(&'static str, XFunc); 12] {
    [
        ("streamlite_version", streamlite_version_xfunc),
        ("stream_extract", stream_extract_xfunc),
        ("stream_extract_integer", stream_extract_integer_xfunc),
        ("stream_extract_bigint", stream_extract_bigint_xfunc),
        ("stream_extract_float", stream_extract_float_xfunc),
        ("stream_extract_double", stream_extract_double_xfunc),
        ("stream_extract_varchar", stream_extract_varchar_xfunc),
        ("stream_extract_timestamp_ms", stream_extract_timestamp_ms_xfunc),
        ("stream_timestamp_ms", stream_timestamp_ms_xfunc),
        ("stream_column_name", stream_column_name_xfunc),
        ("stream_column_type", stream_column_type_xfunc),
        ("stream_consume_plan", stream_consume_plan_xfunc),
    ]
}

/// Register all streamlite SQL functions on an open connection.
///
/// Functions land in the database's catalog, so every connection to the same
/// database sees them. A database that already has them is left untouched and
/// `Ok(0)` is returned; otherwise the number of registered functions.
///
/// # Safety
/// `con` must be a valid, open connection for the lifetime of the call.
pub unsafe fn register_functions(con: duckdb_connection) -> std::result::Result<usize, InitError> {
    if already_registered(con) {
        info!("functions already registered on this database");
        return Ok(0);
    }

    let callbacks = callbacks();
    for spec in SCALAR_FUNCTIONS {
        let Some((_, xfunc)) = callbacks.iter().find(|(name, _)| *name == spec.name) else {
            return Err(InitError::MissingCallback {
                function: spec.name,
            });
        };
        if reg(con, spec, *xfunc) != DuckDBSuccess {
            return Err(InitError::Registration {
                function: spec.name,
            });
        }
        debug!(
            name = spec.name,
            params = spec.params.len(),
            returns = spec.returns.sql_name(),
            "registered function"
        );
    }

    Ok(SCALAR_FUNCTIONS.len())
}
