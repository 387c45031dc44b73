//! Mapping between [`Value`] and plain JSON
//!
//! Export is lossy by intent: the JSON is meant to be read by people and by
//! other tools, so there are no type tags. Import sees JSON shapes plus the
//! live column type: `\x` hex text is decoded for binary columns, and the
//! driver coerces any other text into the column type.
//!
//! | Value                         | JSON                          |
//! |-------------------------------|-------------------------------|
//! | `Null`                        | `null`                        |
//! | `Bool`                        | boolean                       |
//! | `Int16` / `Int32` / `Int64`   | number                        |
//! | `Float32` / `Float64`         | number, `null` when not finite|
//! | `Decimal`, `String`, `Uuid`   | string                        |
//! | `Date`, `Time`, date-times    | ISO 8601 string               |
//! | `Bytes`                       | `"\x"` followed by hex digits |
//! | `Json`                        | embedded as-is                |
//! | `Array`                       | array                         |

use serde_json::{Map, Number, Value as JsonValue};
use tabula_core::{Row, Value};

/// Prefix marking hex-encoded binary data
pub const BYTES_PREFIX: &str = "\\x";

/// Convert a database value to its JSON form
pub fn value_to_json(value: &Value) -> JsonValue {
    match value {
        Value::Null => JsonValue::Null,
        Value::Bool(b) => JsonValue::Bool(*b),
        Value::Int16(v) => JsonValue::from(*v),
        Value::Int32(v) => JsonValue::from(*v),
        Value::Int64(v) => JsonValue::from(*v),
        Value::Float32(v) => float_to_json(f64::from(*v)),
        Value::Float64(v) => float_to_json(*v),
        Value::Decimal(v) => JsonValue::String(v.clone()),
        Value::String(v) => JsonValue::String(v.clone()),
        Value::Bytes(bytes) => JsonValue::String(format!("{}{}", BYTES_PREFIX, hex::encode(bytes))),
        Value::Uuid(v) => JsonValue::String(v.to_string()),
        Value::Date(v) => JsonValue::String(v.format("%Y-%m-%d").to_string()),
        Value::Time(v) => JsonValue::String(v.format("%H:%M:%S%.f").to_string()),
        Value::DateTime(v) => JsonValue::String(v.format("%Y-%m-%dT%H:%M:%S%.f").to_string()),
        Value::DateTimeUtc(v) => JsonValue::String(v.to_rfc3339()),
        Value::Json(v) => v.clone(),
        Value::Array(items) => JsonValue::Array(items.iter().map(value_to_json).collect()),
    }
}

// JSON has no NaN or infinity
fn float_to_json(v: f64) -> JsonValue {
    Number::from_f64(v)
        .map(JsonValue::Number)
        .unwrap_or(JsonValue::Null)
}

/// Convert one imported JSON field to a bindable value
pub fn json_to_value(json: &JsonValue) -> Value {
    match json {
        JsonValue::Null => Value::Null,
        JsonValue::Bool(b) => Value::Bool(*b),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => Value::Int64(i),
            None => n.as_f64().map(Value::Float64).unwrap_or(Value::Null),
        },
        JsonValue::String(s) => Value::String(s.clone()),
        JsonValue::Array(_) | JsonValue::Object(_) => Value::Json(json.clone()),
    }
}

/// Whether a catalog type name stores raw bytes (`bytea`, `BLOB`, `varbinary`, ...)
pub fn is_binary_type(data_type: &str) -> bool {
    let ty = data_type.to_ascii_lowercase();
    ty == "bytea" || ty.contains("blob") || ty.contains("binary")
}

/// Convert one imported JSON field for a column of `data_type`.
///
/// Binary columns take `\x` hex strings back as bytes. Text that is not
/// valid hex stays text so the database decides what to do with it.
pub fn json_to_column_value(json: &JsonValue, data_type: &str) -> Value {
    if let JsonValue::String(s) = json
        && is_binary_type(data_type)
        && let Some(digits) = s.strip_prefix(BYTES_PREFIX)
        && let Ok(bytes) = hex::decode(digits)
    {
        return Value::Bytes(bytes);
    }
    json_to_value(json)
}

/// A row as a JSON object whose keys follow the column order
pub fn row_to_json(row: &Row) -> JsonValue {
    let object: Map<String, JsonValue> = row
        .columns()
        .iter()
        .zip(&row.values)
        .map(|(column, value)| (column.clone(), value_to_json(value)))
        .collect();
    JsonValue::Object(object)
}
