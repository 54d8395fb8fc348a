//! Canonical scalar function catalog shared by registration, tests and tooling.

use crate::column::ColumnType;

/// Scalar function declaration: name, parameter types and return type.
///
/// DuckDB's C API registers one signature per name, so typed variants of a
/// function get their own name instead of an overload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScalarFunctionSpec {
    pub name: &'static str,
    pub params: &'static [ColumnType],
    pub returns: ColumnType,
}

use ColumnType::{Double, Float, Integer, Long, Text, TimestampMs};

const JSON_AND_PATH: &[ColumnType] = &[Text, Text];

pub const SCALAR_FUNCTIONS: &[ScalarFunctionSpec] = &[
    // Extension metadata
    ScalarFunctionSpec {
        name: "streamlite_version",
        params: &[],
        returns: Text,
    },
    // Record payload extraction
    ScalarFunctionSpec {
        name: "stream_extract",
        params: JSON_AND_PATH,
        returns: Text,
    },
    ScalarFunctionSpec {
        name: "stream_extract_integer",
        params: JSON_AND_PATH,
        returns: Integer,
    },
    ScalarFunctionSpec {
        name: "stream_extract_bigint",
        params: JSON_AND_PATH,
        returns: Long,
    },
    ScalarFunctionSpec {
        name: "stream_extract_float",
        params: JSON_AND_PATH,
        returns: Float,
    },
    ScalarFunctionSpec {
        name: "stream_extract_double",
        params: JSON_AND_PATH,
        returns: Double,
    },
    ScalarFunctionSpec {
        name: "stream_extract_varchar",
        params: JSON_AND_PATH,
        returns: Text,
    },
    ScalarFunctionSpec {
        name: "stream_extract_timestamp_ms",
        params: JSON_AND_PATH,
        returns: TimestampMs,
    },
    ScalarFunctionSpec {
        name: "stream_timestamp_ms",
        params: &[Text],
        returns: Long,
    },
    // Column specs
    ScalarFunctionSpec {
        name: "stream_column_name",
        params: &[Text],
        returns: Text,
    },
    ScalarFunctionSpec {
        name: "stream_column_type",
        params: &[Text],
        returns: Text,
    },
    // Consume planning
    ScalarFunctionSpec {
        name: "stream_consume_plan",
        params: &[Text],
        returns: Text,
    },
];

/// Look up a catalog entry by SQL name.
pub fn find(name: &str) -> Option<&'static ScalarFunctionSpec> {
    SCALAR_FUNCTIONS.iter().find(|spec| spec.name == name)
}
