//! Conversion between Firestore's typed JSON values and [`FieldValue`].

use binlevel_core::ports::{FieldValue, Fields, StoreError};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value, json};
use tracing::debug;

/// Encode a single field value in Firestore's REST representation.
pub(crate) fn encode_value(value: &FieldValue) -> Value {
    match value {
        FieldValue::String(text) => json!({ "stringValue": text }),
        FieldValue::Number(number) => json!({ "doubleValue": number }),
        // int64 travels as a decimal string
        FieldValue::Integer(number) => json!({ "integerValue": number.to_string() }),
        FieldValue::Boolean(flag) => json!({ "booleanValue": flag }),
        FieldValue::Timestamp(timestamp) => json!({
            "timestampValue": timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
        }),
        FieldValue::Null => json!({ "nullValue": null }),
    }
}

/// Encode all fields of a document.
pub(crate) fn encode_fields(fields: &Fields) -> Value {
    let encoded: Map<String, Value> = fields
        .iter()
        .map(|(name, value)| (name.clone(), encode_value(value)))
        .collect();
    Value::Object(encoded)
}

/// Decode a single Firestore value.
///
/// Returns `Ok(None)` for kinds the service never reads (maps, arrays,
/// references, geo points, bytes) so unrelated fields on a document do not
/// break decoding.
pub(crate) fn decode_value(value: &Value) -> Result<Option<FieldValue>, StoreError> {
    let Some((kind, inner)) = value.as_object().and_then(|object| object.iter().next()) else {
        return Err(StoreError::Decode(format!("malformed Firestore value: {value}")));
    };

    let decoded = match kind.as_str() {
        "stringValue" => FieldValue::String(as_text(kind, inner)?.to_owned()),
        "doubleValue" => FieldValue::Number(decode_double(inner)?),
        "integerValue" => FieldValue::Integer(decode_integer(inner)?),
        "booleanValue" => FieldValue::Boolean(
            inner
                .as_bool()
                .ok_or_else(|| unexpected(kind, inner))?,
        ),
        "timestampValue" => FieldValue::Timestamp(decode_timestamp(as_text(kind, inner)?)?),
        "nullValue" => FieldValue::Null,
        other => {
            debug!(kind = other, "Skipping unsupported Firestore value");
            return Ok(None);
        }
    };
    Ok(Some(decoded))
}

/// Decode the `fields` object of a Firestore document.
pub(crate) fn decode_fields(fields: Option<&Value>) -> Result<Fields, StoreError> {
    let Some(fields) = fields else {
        return Ok(Fields::new());
    };
    let object = fields
        .as_object()
        .ok_or_else(|| StoreError::Decode("document fields are not an object".to_owned()))?;

    let mut decoded = Fields::new();
    for (name, value) in object {
        if let Some(value) = decode_value(value)? {
            decoded.insert(name.clone(), value);
        }
    }
    Ok(decoded)
}

/// Parse an RFC 3339 timestamp as returned by Firestore.
pub(crate) fn decode_timestamp(text: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(text)
        .map(|timestamp| timestamp.with_timezone(&Utc))
        .map_err(|err| StoreError::Decode(format!("invalid timestamp {text}: {err}")))
}

fn decode_double(inner: &Value) -> Result<f64, StoreError> {
    match inner {
        Value::Number(number) => number.as_f64().ok_or_else(|| unexpected("doubleValue", inner)),
        // NaN and the infinities are sent as strings
        Value::String(text) => text
            .parse::<f64>()
            .map_err(|_err| unexpected("doubleValue", inner)),
        _ => Err(unexpected("doubleValue", inner)),
    }
}

fn decode_integer(inner: &Value) -> Result<i64, StoreError> {
    match inner {
        Value::String(text) => text
            .parse::<i64>()
            .map_err(|_err| unexpected("integerValue", inner)),
        Value::Number(number) => number.as_i64().ok_or_else(|| unexpected("integerValue", inner)),
        _ => Err(unexpected("integerValue", inner)),
    }
}

fn as_text<'value>(kind: &str, inner: &'value Value) -> Result<&'value str, StoreError> {
    inner.as_str().ok_or_else(|| unexpected(kind, inner))
}

fn unexpected(kind: &str, inner: &Value) -> StoreError {
    StoreError::Decode(format!("unexpected {kind} payload: {inner}"))
}
