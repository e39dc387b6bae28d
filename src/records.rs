//! Avro record schemas and value accessors
use crate::error::ValidationError;
use apache_avro::types::Value;
use time::OffsetDateTime;

/// Schema of one trace in a survey line file
pub const TRACE_SCHEMA: &str = r#"{"type": "record","namespace": "sdpick","name": "trace","fields": [{"name": "line", "type": "string"},{"name": "index", "type": "long"},{"name": "timestamp", "type": "long"},{"name": "frequency", "type": "long"},{"name": "x", "type": "double"},{"name": "y", "type": "double"},{"name": "draft", "type": "double"},{"name": "heave", "type": "double"},{"name": "resolution", "type": "double"},{"name": "data", "type": {"type": "array", "items": "float"}, "default": []}]}"#;

/// Schema of one pick line in a project
pub const PICK_LINE_SCHEMA: &str = r#"{"type": "record","namespace": "sdpick","name": "pick_line","fields": [{"name": "line", "type": "string"},{"name": "pick_type", "type": "string"},{"name": "locked", "type": "boolean"},{"name": "samples", "type": {"type": "array", "items": {"type": "record", "name": "pick_sample", "fields": [{"name": "depth", "type": "double"},{"name": "source", "type": "string"},{"name": "confidence", "type": "double"}]}}, "default": []}]}"#;

/// Schema of one tide record in a project
pub const TIDE_SCHEMA: &str = r#"{"type": "record","namespace": "sdpick","name": "tide","fields": [{"name": "timestamp", "type": "long"},{"name": "elevation", "type": "double"}]}"#;

type Fields = [(String, Value)];

/// Unwrap a top-level record
pub(crate) fn record(value: Value) -> Result<Vec<(String, Value)>, ValidationError> {
    match value {
        Value::Record(fields) => Ok(fields),
        other => Err(ValidationError::MalformedRecord(format!(
            "expected a record, found {:?}",
            other
        ))),
    }
}

fn get<'a>(fields: &'a Fields, name: &str) -> Result<&'a Value, ValidationError> {
    fields
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v)
        .ok_or_else(|| ValidationError::MalformedRecord(format!("missing field {}", name)))
}

fn mismatch(name: &str, value: &Value) -> ValidationError {
    ValidationError::MalformedRecord(format!("field {} has unexpected value {:?}", name, value))
}

pub(crate) fn long(fields: &Fields, name: &str) -> Result<i64, ValidationError> {
    match get(fields, name)? {
        Value::Long(v) => Ok(*v),
        Value::Int(v) => Ok(i64::from(*v)),
        other => Err(mismatch(name, other)),
    }
}

pub(crate) fn double(fields: &Fields, name: &str) -> Result<f64, ValidationError> {
    match get(fields, name)? {
        Value::Double(v) => Ok(*v),
        Value::Float(v) => Ok(f64::from(*v)),
        other => Err(mismatch(name, other)),
    }
}

pub(crate) fn string<'a>(fields: &'a Fields, name: &str) -> Result<&'a str, ValidationError> {
    match get(fields, name)? {
        Value::String(s) => Ok(s),
        other => Err(mismatch(name, other)),
    }
}

pub(crate) fn boolean(fields: &Fields, name: &str) -> Result<bool, ValidationError> {
    match get(fields, name)? {
        Value::Boolean(b) => Ok(*b),
        other => Err(mismatch(name, other)),
    }
}

pub(crate) fn array<'a>(fields: &'a Fields, name: &str) -> Result<&'a [Value], ValidationError> {
    match get(fields, name)? {
        Value::Array(v) => Ok(v),
        other => Err(mismatch(name, other)),
    }
}

pub(crate) fn nested<'a>(value: &'a Value) -> Result<&'a Fields, ValidationError> {
    match value {
        Value::Record(fields) => Ok(fields),
        other => Err(ValidationError::MalformedRecord(format!(
            "expected a nested record, found {:?}",
            other
        ))),
    }
}

pub(crate) fn float(value: &Value) -> Result<f32, ValidationError> {
    match value {
        Value::Float(v) => Ok(*v),
        other => Err(mismatch("data", other)),
    }
}

/// Optional values are stored as NaN when absent
pub(crate) fn from_optional(v: Option<f64>) -> Value {
    Value::Double(v.unwrap_or(f64::NAN))
}

pub(crate) fn to_optional(v: f64) -> Option<f64> {
    if v.is_nan() {
        None
    } else {
        Some(v)
    }
}

/// Milliseconds since the Unix epoch
pub(crate) fn timestamp_millis(t: OffsetDateTime) -> i64 {
    (t.unix_timestamp_nanos() / 1_000_000) as i64
}

pub(crate) fn from_millis(ms: i64) -> Result<OffsetDateTime, ValidationError> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(ms) * 1_000_000)
        .map_err(|e| ValidationError::MalformedRecord(format!("timestamp {}: {}", ms, e)))
}

#[cfg(test)]
mod test {
    use super::*;
    use apache_avro::Schema;

    #[test]
    fn schemas_parse() {
        for raw in [TRACE_SCHEMA, PICK_LINE_SCHEMA, TIDE_SCHEMA] {
            assert!(Schema::parse_str(raw).is_ok());
        }
    }

    #[test]
    fn millis() {
        let t = time::macros::datetime!(2014-05-20 13:45:01.250 UTC);
        assert_eq!(from_millis(timestamp_millis(t)).unwrap(), t);
    }

    #[test]
    fn missing_values_are_nan() {
        assert_eq!(to_optional(f64::NAN), None);
        assert_eq!(to_optional(2.5), Some(2.5));
        assert!(matches!(from_optional(None), Value::Double(v) if v.is_nan()));
    }
}
