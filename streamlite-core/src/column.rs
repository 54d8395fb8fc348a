//! Record-to-column mapping.
//!
//! A stream record carries an offset, a timestamp and an opaque value. Columns
//! either expose one of those directly or pick a field out of a JSON value,
//! coerced to the column's declared type.
//!
//! Column specs follow the consumer CLI syntax `name[:type]=path`, where
//! `type` is a one-letter code:
//!
//! | code | type          |
//! |------|---------------|
//! | `i`  | INTEGER (i32) |
//! | `l`  | BIGINT (i64)  |
//! | `f`  | FLOAT         |
//! | `d`  | DOUBLE        |
//! | `s`  | VARCHAR       |
//! | `t`  | TIMESTAMP_MS  |

use std::borrow::Cow;

use chrono::DateTime;
use serde::{Serialize, Serializer};
use serde_json::{Number, Value};
use serde_json_path::JsonPath;

use crate::error::{Result, StreamLiteError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Long,
    Float,
    Double,
    Text,
    TimestampMs,
}

impl ColumnType {
    /// Map a one-letter type code. Unknown codes fall back to `Text`.
    pub fn from_code(code: &str) -> Self {
        match code {
            "i" => Self::Integer,
            "l" => Self::Long,
            "f" => Self::Float,
            "d" => Self::Double,
            "s" => Self::Text,
            "t" => Self::TimestampMs,
            _ => Self::Text,
        }
    }

    pub fn sql_name(self) -> &'static str {
        match self {
            Self::Integer => "INTEGER",
            Self::Long => "BIGINT",
            Self::Float => "FLOAT",
            Self::Double => "DOUBLE",
            Self::Text => "VARCHAR",
            Self::TimestampMs => "TIMESTAMP_MS",
        }
    }
}

impl Serialize for ColumnType {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.sql_name())
    }
}

/// Where a column takes its value from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "path", rename_all = "snake_case")]
pub enum ColumnSource {
    Offset,
    Timestamp,
    Value,
    JsonPath(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ColumnType,
    pub source: ColumnSource,
}

impl ColumnSpec {
    /// Parse a `name[:type]=path` column spec.
    ///
    /// # Example
    ///
    /// ```
    /// use streamlite_core::column::{ColumnSource, ColumnSpec, ColumnType};
    ///
    /// let spec = ColumnSpec::parse("ph:i=contact.ph").unwrap();
    /// assert_eq!(spec.name, "ph");
    /// assert_eq!(spec.ty, ColumnType::Integer);
    /// assert_eq!(spec.source, ColumnSource::JsonPath("contact.ph".into()));
    /// ```
    pub fn parse(spec: &str) -> Result<Self> {
        let Some((name_ty, path)) = spec.split_once('=') else {
            return Err(invalid_spec(spec, "expected `name[:type]=path`"));
        };
        let (name, ty) = split_name_type(name_ty);
        if name.is_empty() {
            return Err(invalid_spec(spec, "column name is empty"));
        }
        Ok(Self {
            name: name.to_string(),
            ty,
            source: ColumnSource::JsonPath(path.to_string()),
        })
    }

    /// Columns used when a consumer declares none: `offset`, `timestamp`, `value`.
    pub fn defaults() -> Vec<Self> {
        vec![
            Self {
                name: "offset".to_string(),
                ty: ColumnType::Integer,
                source: ColumnSource::Offset,
            },
            Self {
                name: "timestamp".to_string(),
                ty: ColumnType::TimestampMs,
                source: ColumnSource::Timestamp,
            },
            Self {
                name: "value".to_string(),
                ty: ColumnType::Text,
                source: ColumnSource::Value,
            },
        ]
    }
}

fn invalid_spec(spec: &str, reason: &'static str) -> StreamLiteError {
    StreamLiteError::InvalidColumnSpec {
        spec: spec.to_string(),
        reason,
    }
}

/// Split `name[:type]` (an optional `=path` suffix is ignored).
pub fn split_name_type(spec: &str) -> (&str, ColumnType) {
    let name_ty = spec.split_once('=').map_or(spec, |(head, _)| head);
    let mut parts = name_ty.split(':');
    let name = parts.next().unwrap_or_default();
    let ty = parts.next().map_or(ColumnType::Text, ColumnType::from_code);
    (name, ty)
}

/// SQL-facing result of mapping one record field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ColumnValue {
    Null,
    Integer(i64),
    Double(f64),
    Text(String),
}

// ── Path extraction ──────────────────────────────────────────────────────────

/// Resolve a column path against a JSON document.
///
/// Paths are RFC 9535 JSONPath queries. The leading `$` may be omitted, so the
/// consumer shorthand `contact.ph` means `$.contact.ph` and `[0]` means `$[0]`.
/// An empty path selects the whole document.
///
/// A query selecting nothing gives `Ok(None)`. A query selecting several nodes
/// (wildcards, slices, descendants) gives them as a JSON array.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use streamlite_core::column::extract_path;
///
/// let doc = json!({"items": [{"id": 7}, {"id": 8}]});
/// assert_eq!(extract_path(&doc, "items[0].id").unwrap(), Some(json!(7)));
/// assert_eq!(extract_path(&doc, "$.items[*].id").unwrap(), Some(json!([7, 8])));
/// assert_eq!(extract_path(&doc, ".missing").unwrap(), None);
/// ```
pub fn extract_path(value: &Value, path: &str) -> Result<Option<Value>> {
    let query = json_path_query(path);
    let compiled = JsonPath::parse(&query).map_err(|e| StreamLiteError::InvalidPath {
        path: path.to_string(),
        reason: e.to_string(),
    })?;
    let nodes = compiled.query(value).all();
    Ok(match nodes.as_slice() {
        [] => None,
        [single] => Some((*single).clone()),
        many => Some(Value::Array(many.iter().map(|v| (*v).clone()).collect())),
    })
}

fn json_path_query(path: &str) -> Cow<'_, str> {
    if path.is_empty() {
        Cow::Borrowed("$")
    } else if path.starts_with('$') {
        Cow::Borrowed(path)
    } else if path.starts_with('.') || path.starts_with('[') {
        Cow::Owned(format!("${path}"))
    } else {
        Cow::Owned(format!("$.{path}"))
    }
}

// ── Value mapping ────────────────────────────────────────────────────────────

/// Map a JSON value without a declared column type.
///
/// Strings come through as-is, JSON `null` is SQL NULL and everything else is
/// rendered as compact JSON text.
pub fn natural(value: &Value) -> ColumnValue {
    match value {
        Value::Null => ColumnValue::Null,
        Value::String(s) => ColumnValue::Text(s.clone()),
        other => ColumnValue::Text(other.to_string()),
    }
}

/// Map a JSON value to a column of type `ty`.
///
/// The result always fits `ty`: integer types give `Integer`, floating types
/// give `Double`, text gives `Text`, or the value is `Null`.
///
/// JSON `null` becomes the zero value of numeric columns and the text `"null"`
/// for text columns, matching what the consumer writes for absent payload
/// fields. Strings holding a JSON number are parsed for numeric columns.
/// Unparseable strings, unparseable timestamps and arrays or objects under a
/// non-text type become SQL NULL.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use streamlite_core::column::{coerce, ColumnType, ColumnValue};
///
/// let ts = coerce(&json!("2023-01-28T23:54:23.405Z"), ColumnType::TimestampMs).unwrap();
/// assert_eq!(ts, ColumnValue::Integer(1_674_950_063_405));
/// assert_eq!(coerce(&json!(null), ColumnType::Text).unwrap(), ColumnValue::Text("null".into()));
/// assert_eq!(coerce(&json!("17"), ColumnType::Long).unwrap(), ColumnValue::Integer(17));
/// ```
pub fn coerce(value: &Value, ty: ColumnType) -> Result<ColumnValue> {
    let mapped = match value {
        Value::String(s) => match ty {
            ColumnType::Text => ColumnValue::Text(s.clone()),
            ColumnType::TimestampMs => parse_timestamp_ms(s)
                .map(ColumnValue::Integer)
                .unwrap_or(ColumnValue::Null),
            _ => match s.trim().parse::<Number>() {
                Ok(n) => coerce_number(&n, ty)?,
                Err(_) => ColumnValue::Null,
            },
        },
        Value::Number(n) => coerce_number(n, ty)?,
        Value::Bool(b) => match ty {
            ColumnType::Text => ColumnValue::Text(b.to_string()),
            ColumnType::Float | ColumnType::Double => ColumnValue::Double(f64::from(u8::from(*b))),
            _ => ColumnValue::Integer(i64::from(*b)),
        },
        Value::Null => match ty {
            ColumnType::Integer | ColumnType::Long => ColumnValue::Integer(0),
            ColumnType::Float | ColumnType::Double => ColumnValue::Double(0.0),
            ColumnType::Text => ColumnValue::Text("null".to_string()),
            ColumnType::TimestampMs => ColumnValue::Null,
        },
        Value::Array(_) | Value::Object(_) => match ty {
            ColumnType::Text => ColumnValue::Text(value.to_string()),
            _ => ColumnValue::Null,
        },
    };
    Ok(mapped)
}

fn coerce_number(n: &Number, ty: ColumnType) -> Result<ColumnValue> {
    match ty {
        ColumnType::Integer => {
            let wide = integral(n, ty)?;
            let narrow = i32::try_from(wide).map_err(|_| out_of_range(n, ty))?;
            Ok(ColumnValue::Integer(i64::from(narrow)))
        }
        ColumnType::Long | ColumnType::TimestampMs => Ok(ColumnValue::Integer(integral(n, ty)?)),
        ColumnType::Float => {
            let f = n.as_f64().ok_or_else(|| out_of_range(n, ty))?;
            Ok(ColumnValue::Double(f64::from(f as f32)))
        }
        ColumnType::Double => {
            let f = n.as_f64().ok_or_else(|| out_of_range(n, ty))?;
            Ok(ColumnValue::Double(f))
        }
        ColumnType::Text => Ok(ColumnValue::Text(n.to_string())),
    }
}

fn integral(n: &Number, ty: ColumnType) -> Result<i64> {
    if let Some(i) = n.as_i64() {
        return Ok(i);
    }
    if n.is_u64() {
        return Err(out_of_range(n, ty));
    }
    Err(StreamLiteError::InvalidInput(format!(
        "{n} is not an integer ({})",
        ty.sql_name()
    )))
}

fn out_of_range(n: &Number, ty: ColumnType) -> StreamLiteError {
    StreamLiteError::OutOfRange {
        value: n.to_string(),
        ty: ty.sql_name(),
    }
}

/// Parse RFC 3339 text into milliseconds since the Unix epoch.
///
/// # Example
///
/// ```
/// use streamlite_core::column::parse_timestamp_ms;
///
/// assert_eq!(parse_timestamp_ms("1970-01-01T00:00:01Z").unwrap(), 1000);
/// assert!(parse_timestamp_ms("yesterday").is_err());
/// ```
pub fn parse_timestamp_ms(text: &str) -> Result<i64> {
    Ok(DateTime::parse_from_rfc3339(text)?.timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn type_codes_fall_back_to_text() {
        assert_eq!(ColumnType::from_code("l"), ColumnType::Long);
        assert_eq!(ColumnType::from_code("t"), ColumnType::TimestampMs);
        assert_eq!(ColumnType::from_code("x"), ColumnType::Text);
        assert_eq!(ColumnType::from_code(""), ColumnType::Text);
    }

    #[test]
    fn spec_without_type_is_text() {
        let spec = ColumnSpec::parse("addr=contact.addr").unwrap();
        assert_eq!(spec.ty, ColumnType::Text);
        assert_eq!(spec.name, "addr");
    }

    #[test]
    fn spec_path_may_contain_equals() {
        let spec = ColumnSpec::parse("q:s=a=b").unwrap();
        assert_eq!(spec.source, ColumnSource::JsonPath("a=b".into()));
    }

    #[test]
    fn spec_requires_path_and_name() {
        assert!(matches!(
            ColumnSpec::parse("ph:i"),
            Err(StreamLiteError::InvalidColumnSpec { .. })
        ));
        assert!(matches!(
            ColumnSpec::parse(":i=a"),
            Err(StreamLiteError::InvalidColumnSpec { .. })
        ));
    }

    #[test]
    fn split_name_type_ignores_path_suffix() {
        assert_eq!(split_name_type("ph:d=a.b"), ("ph", ColumnType::Double));
        assert_eq!(split_name_type("plain"), ("plain", ColumnType::Text));
    }

    #[test]
    fn defaults_are_offset_timestamp_value() {
        let names: Vec<_> = ColumnSpec::defaults().into_iter().map(|c| c.name).collect();
        assert_eq!(names, ["offset", "timestamp", "value"]);
    }

    #[test]
    fn extract_nested_and_indexed() {
        let doc = json!({"a": {"b": [[1, 2], [3, 4]]}});
        assert_eq!(extract_path(&doc, "a.b[1][0]").unwrap(), Some(json!(3)));
        assert_eq!(extract_path(&doc, "$.a.b[-1][1]").unwrap(), Some(json!(4)));
        assert_eq!(extract_path(&doc, "").unwrap(), Some(doc.clone()));
        assert_eq!(extract_path(&doc, "a.b[9]").unwrap(), None);
        assert_eq!(extract_path(&doc, "a.c").unwrap(), None);
    }

    #[test]
    fn extract_leading_dot_and_bracket_shorthand() {
        let doc = json!([{"k": "v"}]);
        assert_eq!(extract_path(&doc, "[0].k").unwrap(), Some(json!("v")));
        let doc = json!({"k": "v"});
        assert_eq!(extract_path(&doc, ".k").unwrap(), Some(json!("v")));
        assert_eq!(extract_path(&doc, "$['k']").unwrap(), Some(json!("v")));
    }

    #[test]
    fn extract_multiple_nodes_as_array() {
        let doc = json!({"tags": [{"n": "a"}, {"n": "b"}], "x": {"n": "c"}});
        assert_eq!(
            extract_path(&doc, "tags[*].n").unwrap(),
            Some(json!(["a", "b"]))
        );
        let all = extract_path(&doc, "$..n").unwrap().unwrap();
        assert_eq!(all.as_array().map(Vec::len), Some(3));
    }

    #[test]
    fn extract_rejects_malformed_paths() {
        let doc = json!({"a": [1]});
        for path in ["a[x]", "a[0", "a.", "a[0]b"] {
            assert!(
                matches!(
                    extract_path(&doc, path),
                    Err(StreamLiteError::InvalidPath { .. })
                ),
                "{path}"
            );
        }
    }

    #[test]
    fn natural_mapping() {
        assert_eq!(natural(&json!(true)), ColumnValue::Text("true".into()));
        assert_eq!(natural(&json!(2.5)), ColumnValue::Text("2.5".into()));
        assert_eq!(natural(&json!("raw")), ColumnValue::Text("raw".into()));
        assert_eq!(natural(&json!(null)), ColumnValue::Null);
        assert_eq!(natural(&json!([1, 2])), ColumnValue::Text("[1,2]".into()));
    }

    #[test]
    fn integer_column_rejects_overflow_and_fractions() {
        assert_eq!(
            coerce(&json!(42), ColumnType::Integer).unwrap(),
            ColumnValue::Integer(42)
        );
        assert!(matches!(
            coerce(&json!(4_000_000_000_i64), ColumnType::Integer),
            Err(StreamLiteError::OutOfRange { .. })
        ));
        assert!(coerce(&json!(1.5), ColumnType::Integer).is_err());
        assert!(matches!(
            coerce(&json!(u64::MAX), ColumnType::Long),
            Err(StreamLiteError::OutOfRange { .. })
        ));
    }

    #[test]
    fn float_column_rounds_to_single_precision() {
        let ColumnValue::Double(v) = coerce(&json!(0.1), ColumnType::Float).unwrap() else {
            panic!("expected double");
        };
        assert_eq!(v, f64::from(0.1_f32));
    }

    #[test]
    fn null_maps_to_zero_values() {
        assert_eq!(
            coerce(&json!(null), ColumnType::Long).unwrap(),
            ColumnValue::Integer(0)
        );
        assert_eq!(
            coerce(&json!(null), ColumnType::Double).unwrap(),
            ColumnValue::Double(0.0)
        );
        assert_eq!(
            coerce(&json!(null), ColumnType::TimestampMs).unwrap(),
            ColumnValue::Null
        );
    }

    #[test]
    fn bad_timestamp_text_is_null() {
        assert_eq!(
            coerce(&json!("not a time"), ColumnType::TimestampMs).unwrap(),
            ColumnValue::Null
        );
    }

    #[test]
    fn bools_and_objects() {
        assert_eq!(
            coerce(&json!(false), ColumnType::Text).unwrap(),
            ColumnValue::Text("false".into())
        );
        assert_eq!(
            coerce(&json!(true), ColumnType::Integer).unwrap(),
            ColumnValue::Integer(1)
        );
        assert_eq!(
            coerce(&json!(true), ColumnType::Double).unwrap(),
            ColumnValue::Double(1.0)
        );
        assert_eq!(
            coerce(&json!({"k": 1}), ColumnType::Integer).unwrap(),
            ColumnValue::Null
        );
        assert_eq!(
            coerce(&json!({"k": 1}), ColumnType::Text).unwrap(),
            ColumnValue::Text(r#"{"k":1}"#.into())
        );
    }

    #[test]
    fn numeric_strings_parse_for_numeric_columns() {
        assert_eq!(
            coerce(&json!(" 42 "), ColumnType::Integer).unwrap(),
            ColumnValue::Integer(42)
        );
        assert_eq!(
            coerce(&json!("2.5"), ColumnType::Double).unwrap(),
            ColumnValue::Double(2.5)
        );
        assert_eq!(
            coerce(&json!("n/a"), ColumnType::Long).unwrap(),
            ColumnValue::Null
        );
    }
}
