//! Forward conversion: BSON document → JSON payload.
//!
//! Change events carry plain JSON so that sinks never need to understand
//! BSON. The mapping keeps every value representable:
//!
//! - ObjectId → 24-digit hex string
//! - DateTime → RFC 3339 string with millisecond precision
//! - Timestamp → RFC 3339 string of its seconds component
//! - Decimal128 → decimal string (no precision loss)
//! - Binary → base64 string; UUID subtypes → hyphenated UUID string
//! - Regex → `(?flags)pattern` string
//! - MinKey / MaxKey → `{"$minKey": 1}` / `{"$maxKey": 1}`

use base64::{engine::general_purpose, Engine as _};
use bson::spec::BinarySubtype;
use bson::{Bson, Document};
use chrono::{SecondsFormat, TimeZone, Utc};
use serde_json::{json, Map, Number, Value};

/// Convert one BSON value to JSON.
pub fn bson_to_json(value: &Bson) -> Value {
    match value {
        Bson::Null | Bson::Undefined => Value::Null,
        Bson::Boolean(b) => Value::Bool(*b),
        Bson::Int32(i) => Value::from(*i),
        Bson::Int64(i) => Value::from(*i),
        // Non-finite doubles have no JSON form.
        Bson::Double(f) => Number::from_f64(*f).map_or(Value::Null, Value::Number),
        Bson::Decimal128(d) => Value::String(d.to_string()),
        Bson::String(s) | Bson::Symbol(s) => Value::String(s.clone()),
        Bson::ObjectId(oid) => Value::String(oid.to_hex()),
        Bson::DateTime(dt) => {
            Value::String(dt.to_chrono().to_rfc3339_opts(SecondsFormat::Millis, true))
        }
        Bson::Timestamp(ts) => match Utc.timestamp_opt(ts.time as i64, 0).single() {
            Some(dt) => Value::String(dt.to_rfc3339_opts(SecondsFormat::Secs, true)),
            None => Value::Null,
        },
        Bson::Binary(bin) => {
            if matches!(bin.subtype, BinarySubtype::Uuid | BinarySubtype::UuidOld) {
                if let Ok(uuid) = uuid::Uuid::from_slice(&bin.bytes) {
                    return Value::String(uuid.hyphenated().to_string());
                }
            }
            Value::String(general_purpose::STANDARD.encode(&bin.bytes))
        }
        Bson::RegularExpression(regex) => {
            if regex.options.is_empty() {
                Value::String(regex.pattern.clone())
            } else {
                Value::String(format!("(?{}){}", regex.options, regex.pattern))
            }
        }
        Bson::JavaScriptCode(code) => Value::String(code.clone()),
        Bson::JavaScriptCodeWithScope(code) => json!({
            "code": code.code,
            "scope": document_to_payload(&code.scope),
        }),
        Bson::DbPointer(_) => {
            // DbPointer fields are private; the extended JSON form is the
            // only public view of its contents.
            value.clone().into_relaxed_extjson()
        }
        Bson::Array(items) => Value::Array(items.iter().map(bson_to_json).collect()),
        Bson::Document(doc) => Value::Object(document_to_payload(doc)),
        Bson::MinKey => json!({"$minKey": 1}),
        Bson::MaxKey => json!({"$maxKey": 1}),
    }
}

/// Convert a document to the payload map of a change event.
pub fn document_to_payload(doc: &Document) -> Map<String, Value> {
    doc.iter()
        .map(|(key, value)| (key.clone(), bson_to_json(value)))
        .collect()
}
