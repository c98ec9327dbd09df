//! Firestore typed-value codec.
//!
//! Firestore's REST API wraps every field in a one-key object naming its
//! type (`{"stringValue": "..."}`, `{"integerValue": "42"}`, ...). Owners are
//! plain JSON, so these helpers convert between the two shapes.

use serde_json::{json, Map, Number, Value};

use super::{RemoteError, RemoteResult};

/// Encode one JSON value as a Firestore `Value`.
pub fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(flag) => json!({ "booleanValue": flag }),
        Value::Number(number) => encode_number(number),
        Value::String(text) => json!({ "stringValue": text }),
        Value::Array(items) => {
            let values: Vec<Value> = items.iter().map(encode_value).collect();
            if values.is_empty() {
                json!({ "arrayValue": {} })
            } else {
                json!({ "arrayValue": { "values": values } })
            }
        }
        Value::Object(fields) => json!({ "mapValue": { "fields": encode_fields(fields) } }),
    }
}

fn encode_number(number: &Number) -> Value {
    // Firestore integers are signed 64-bit and travel as strings.
    if let Some(integer) = number.as_i64() {
        json!({ "integerValue": integer.to_string() })
    } else {
        json!({ "doubleValue": number.as_f64().unwrap_or_default() })
    }
}

/// Encode a field map as Firestore `fields`.
pub fn encode_fields(fields: &Map<String, Value>) -> Map<String, Value> {
    fields
        .iter()
        .map(|(key, value)| (key.clone(), encode_value(value)))
        .collect()
}

/// Decode Firestore `fields` into plain JSON.
pub fn decode_fields(fields: &Map<String, Value>) -> RemoteResult<Map<String, Value>> {
    fields
        .iter()
        .map(|(key, value)| Ok((key.clone(), decode_value(value)?)))
        .collect()
}

/// Decode one Firestore `Value` into plain JSON.
pub fn decode_value(value: &Value) -> RemoteResult<Value> {
    let Some((kind, inner)) = value.as_object().and_then(|object| object.iter().next()) else {
        return Err(RemoteError::Payload(format!(
            "expected a typed Firestore value, got {value}"
        )));
    };

    match kind.as_str() {
        "nullValue" => Ok(Value::Null),
        "booleanValue" => inner
            .as_bool()
            .map(Value::Bool)
            .ok_or_else(|| invalid(kind, inner)),
        "integerValue" => decode_integer(inner).ok_or_else(|| invalid(kind, inner)),
        "doubleValue" => decode_double(inner).ok_or_else(|| invalid(kind, inner)),
        "stringValue" | "timestampValue" | "referenceValue" | "bytesValue" => inner
            .as_str()
            .map(|text| Value::String(text.to_string()))
            .ok_or_else(|| invalid(kind, inner)),
        "geoPointValue" => Ok(inner.clone()),
        "arrayValue" => {
            let values = inner
                .get("values")
                .and_then(Value::as_array)
                .map(|items| items.iter().map(decode_value).collect::<RemoteResult<Vec<_>>>())
                .transpose()?
                .unwrap_or_default();
            Ok(Value::Array(values))
        }
        "mapValue" => {
            let fields = inner
                .get("fields")
                .and_then(Value::as_object)
                .map(decode_fields)
                .transpose()?
                .unwrap_or_default();
            Ok(Value::Object(fields))
        }
        other => Err(RemoteError::Payload(format!(
            "unsupported Firestore value type '{other}'"
        ))),
    }
}

fn decode_integer(inner: &Value) -> Option<Value> {
    match inner {
        Value::String(text) => text.parse::<i64>().ok().map(Value::from),
        Value::Number(number) => number.as_i64().map(Value::from),
        _ => None,
    }
}

fn decode_double(inner: &Value) -> Option<Value> {
    let double = match inner {
        Value::Number(number) => number.as_f64()?,
        // NaN and infinities arrive as strings and have no JSON form
        Value::String(_) => return Some(Value::Null),
        _ => return None,
    };
    Number::from_f64(double).map(Value::Number)
}

fn invalid(kind: &str, inner: &Value) -> RemoteError {
    RemoteError::Payload(format!("malformed {kind}: {inner}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn encodes_scalars_with_firestore_type_tags() {
        assert_eq!(encode_value(&json!("Aria")), json!({"stringValue": "Aria"}));
        assert_eq!(encode_value(&json!(42)), json!({"integerValue": "42"}));
        assert_eq!(encode_value(&json!(1.5)), json!({"doubleValue": 1.5}));
        assert_eq!(encode_value(&json!(true)), json!({"booleanValue": true}));
        assert_eq!(encode_value(&Value::Null), json!({"nullValue": null}));
    }

    #[test]
    fn encodes_nested_maps_and_arrays() {
        let encoded = encode_value(&json!({"tags": ["a"], "empty": []}));
        assert_eq!(
            encoded,
            json!({
                "mapValue": {"fields": {
                    "tags": {"arrayValue": {"values": [{"stringValue": "a"}]}},
                    "empty": {"arrayValue": {}}
                }}
            })
        );
    }

    #[test]
    fn decodes_firestore_document_fields() {
        let fields = json!({
            "owner_name": {"stringValue": "Bram"},
            "stories": {"integerValue": "7"},
            "rating": {"doubleValue": 4.5},
            "active": {"booleanValue": false},
            "seen": {"timestampValue": "2024-03-01T10:00:00Z"},
            "links": {"arrayValue": {}},
            "profile": {"mapValue": {}}
        });
        let decoded = decode_fields(fields.as_object().unwrap()).unwrap();

        assert_eq!(
            Value::Object(decoded),
            json!({
                "owner_name": "Bram",
                "stories": 7,
                "rating": 4.5,
                "active": false,
                "seen": "2024-03-01T10:00:00Z",
                "links": [],
                "profile": {}
            })
        );
    }

    #[test]
    fn rejects_untyped_and_malformed_values() {
        assert!(decode_value(&json!("bare")).is_err());
        assert!(decode_value(&json!({"integerValue": "seven"})).is_err());
        assert!(decode_value(&json!({"mysteryValue": 1})).is_err());
    }
}
