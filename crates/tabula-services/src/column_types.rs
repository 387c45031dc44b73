//! Column type classification
//!
//! Maps catalog type names (`integer`, `character varying`, `INT8`,
//! `timestamp with time zone`, ...) to coarse categories used for
//! placeholder defaults and for parsing user-entered text.

use chrono::{Local, Utc};
use tabula_core::Value;

/// Coarse category of a database column type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    Numeric,
    Boolean,
    Date,
    Timestamp,
    TimestampTz,
    Text,
}

/// Literal that callers use to mean SQL NULL in text input
pub const NULL_LITERAL: &str = "NULL";

/// Placeholder written into text columns by [`default_value_for`]
pub const DEFAULT_TEXT: &str = "new value";

pub fn categorize(data_type: &str) -> TypeCategory {
    let normalized = data_type.trim().to_lowercase();
    // drop length/precision modifiers: varchar(20), numeric(10,2)
    let base = normalized
        .split('(')
        .next()
        .unwrap_or_default()
        .trim();

    match base {
        "int" | "int2" | "int4" | "int8" | "integer" | "smallint" | "bigint" | "mediumint"
        | "tinyint" | "serial" | "smallserial" | "bigserial" => TypeCategory::Integer,
        "numeric" | "decimal" | "real" | "double precision" | "double" | "float" | "float4"
        | "float8" | "money" => TypeCategory::Numeric,
        "bool" | "boolean" => TypeCategory::Boolean,
        "date" => TypeCategory::Date,
        "timestamp" | "timestamp without time zone" | "datetime" => TypeCategory::Timestamp,
        "timestamptz" | "timestamp with time zone" => TypeCategory::TimestampTz,
        _ => TypeCategory::Text,
    }
}

/// Value written into a required column that has no database default
pub fn default_value_for(data_type: &str) -> Value {
    match categorize(data_type) {
        TypeCategory::Integer => Value::Int64(0),
        TypeCategory::Numeric => Value::Float64(0.0),
        TypeCategory::Boolean => Value::Bool(false),
        TypeCategory::Date => Value::Date(Local::now().date_naive()),
        TypeCategory::Timestamp => Value::DateTime(Local::now().naive_local()),
        TypeCategory::TimestampTz => Value::DateTimeUtc(Utc::now()),
        TypeCategory::Text => Value::String(DEFAULT_TEXT.to_string()),
    }
}

/// Parse user-entered text for a column of `data_type`.
///
/// `NULL` means SQL NULL. Text that does not fit the column's category is
/// passed through as a string and left for the driver to coerce or reject.
pub fn parse_input(raw: &str, data_type: Option<&str>) -> Value {
    if raw == NULL_LITERAL {
        return Value::Null;
    }

    let Some(data_type) = data_type else {
        return Value::String(raw.to_string());
    };

    let fallback = || Value::String(raw.to_string());
    match categorize(data_type) {
        TypeCategory::Integer => raw.trim().parse().map(Value::Int64).unwrap_or_else(|_| fallback()),
        TypeCategory::Numeric => raw
            .trim()
            .parse()
            .map(Value::Float64)
            .unwrap_or_else(|_| fallback()),
        TypeCategory::Boolean => match raw.trim().to_lowercase().as_str() {
            "true" | "t" | "1" | "yes" => Value::Bool(true),
            "false" | "f" | "0" | "no" => Value::Bool(false),
            _ => fallback(),
        },
        TypeCategory::Date
        | TypeCategory::Timestamp
        | TypeCategory::TimestampTz
        | TypeCategory::Text => fallback(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("integer", TypeCategory::Integer)]
    #[case("INT8", TypeCategory::Integer)]
    #[case("numeric(10,2)", TypeCategory::Numeric)]
    #[case("double precision", TypeCategory::Numeric)]
    #[case("boolean", TypeCategory::Boolean)]
    #[case("date", TypeCategory::Date)]
    #[case("timestamp without time zone", TypeCategory::Timestamp)]
    #[case("timestamp with time zone", TypeCategory::TimestampTz)]
    #[case("character varying", TypeCategory::Text)]
    #[case("", TypeCategory::Text)]
    fn categorizes_catalog_type_names(#[case] data_type: &str, #[case] expected: TypeCategory) {
        assert_eq!(categorize(data_type), expected);
    }

    #[test]
    fn defaults_match_column_categories() {
        assert_eq!(default_value_for("bigint"), Value::Int64(0));
        assert_eq!(default_value_for("decimal"), Value::Float64(0.0));
        assert_eq!(default_value_for("boolean"), Value::Bool(false));
        assert_eq!(default_value_for("text"), Value::String("new value".into()));
        assert!(matches!(default_value_for("date"), Value::Date(_)));
        assert!(matches!(default_value_for("timestamptz"), Value::DateTimeUtc(_)));
    }

    #[rstest]
    #[case("NULL", Some("integer"), Value::Null)]
    #[case("null", Some("text"), Value::String("null".into()))]
    #[case("42", Some("integer"), Value::Int64(42))]
    #[case("4.5", Some("real"), Value::Float64(4.5))]
    #[case("yes", Some("boolean"), Value::Bool(true))]
    #[case("00123", Some("varchar(5)"), Value::String("00123".into()))]
    #[case("abc", Some("integer"), Value::String("abc".into()))]
    #[case("12", None, Value::String("12".into()))]
    fn parses_input_by_column_type(
        #[case] raw: &str,
        #[case] data_type: Option<&str>,
        #[case] expected: Value,
    ) {
        assert_eq!(parse_input(raw, data_type), expected);
    }
}
