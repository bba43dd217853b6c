//! Loss-less codec for cursor values.
//!
//! Document identifiers, replication-key values and oplog positions are
//! persisted in checkpoints as a string plus a [`CursorType`] tag. The codec
//! guarantees `decode(&encode(v)) == v` for every supported value, and
//! [`CursorValue::bson_cmp`] / [`compare_encoded`] order values the way the
//! server orders them in range predicates.
//!
//! | BSON type            | `CursorType` | string form                       |
//! |----------------------|--------------|-----------------------------------|
//! | Int32 / Int64        | int32/int64  | decimal digits                    |
//! | Double               | double       | shortest round-trip form          |
//! | Decimal128           | decimal      | canonical Decimal128 string       |
//! | String               | string       | the string itself                 |
//! | ObjectId             | object_id    | 24 hex digits                     |
//! | Binary               | binary       | `{subtype:02x}:{base64}`          |
//! | Binary (subtype 4)   | uuid         | hyphenated UUID                   |
//! | DateTime             | date_time    | RFC 3339, milliseconds, `Z`       |
//! | Timestamp            | timestamp    | `{time}.{increment}`              |

use base64::{engine::general_purpose, Engine as _};
use bson::oid::ObjectId;
use bson::spec::BinarySubtype;
use bson::{Binary, Bson, Decimal128, Timestamp};
use chrono::{DateTime, SecondsFormat, Utc};
use std::cmp::Ordering;
use std::str::FromStr;
use sync_core::{CursorType, TaggedValue};

use crate::error::CodecError;
use crate::number::{compare_f64_i64, ExactNumber};

/// A BSON value usable as a cursor.
#[derive(Debug, Clone, PartialEq)]
pub enum CursorValue {
    Int32(i32),
    Int64(i64),
    Double(f64),
    Decimal(Decimal128),
    String(String),
    ObjectId(ObjectId),
    Binary { subtype: u8, bytes: Vec<u8> },
    Uuid(uuid::Uuid),
    DateTime(bson::DateTime),
    Timestamp(Timestamp),
}

impl CursorValue {
    pub fn cursor_type(&self) -> CursorType {
        match self {
            CursorValue::Int32(_) => CursorType::Int32,
            CursorValue::Int64(_) => CursorType::Int64,
            CursorValue::Double(_) => CursorType::Double,
            CursorValue::Decimal(_) => CursorType::Decimal,
            CursorValue::String(_) => CursorType::String,
            CursorValue::ObjectId(_) => CursorType::ObjectId,
            CursorValue::Binary { .. } => CursorType::Binary,
            CursorValue::Uuid(_) => CursorType::Uuid,
            CursorValue::DateTime(_) => CursorType::DateTime,
            CursorValue::Timestamp(_) => CursorType::Timestamp,
        }
    }

    /// Convert a BSON value read from the source.
    pub fn from_bson(value: &Bson) -> Result<Self, CodecError> {
        match value {
            Bson::Int32(i) => Ok(CursorValue::Int32(*i)),
            Bson::Int64(i) => Ok(CursorValue::Int64(*i)),
            Bson::Double(f) => Ok(CursorValue::Double(*f)),
            Bson::Decimal128(d) => Ok(CursorValue::Decimal(*d)),
            Bson::String(s) => Ok(CursorValue::String(s.clone())),
            Bson::ObjectId(oid) => Ok(CursorValue::ObjectId(*oid)),
            Bson::Binary(bin) if bin.subtype == BinarySubtype::Uuid => {
                uuid::Uuid::from_slice(&bin.bytes)
                    .map(CursorValue::Uuid)
                    .map_err(|e| CodecError::invalid(CursorType::Uuid, &hex(&bin.bytes), e))
            }
            Bson::Binary(bin) => Ok(CursorValue::Binary {
                subtype: u8::from(bin.subtype),
                bytes: bin.bytes.clone(),
            }),
            Bson::DateTime(dt) => Ok(CursorValue::DateTime(*dt)),
            Bson::Timestamp(ts) => Ok(CursorValue::Timestamp(*ts)),
            other => Err(CodecError::UnsupportedType(bson_type_name(other))),
        }
    }

    /// Convert back to the BSON value used in query predicates.
    pub fn to_bson(&self) -> Result<Bson, CodecError> {
        Ok(match self {
            CursorValue::Int32(i) => Bson::Int32(*i),
            CursorValue::Int64(i) => Bson::Int64(*i),
            CursorValue::Double(f) => Bson::Double(*f),
            CursorValue::Decimal(d) => Bson::Decimal128(*d),
            CursorValue::String(s) => Bson::String(s.clone()),
            CursorValue::ObjectId(oid) => Bson::ObjectId(*oid),
            CursorValue::Binary { subtype, bytes } => Bson::Binary(Binary {
                subtype: BinarySubtype::from(*subtype),
                bytes: bytes.clone(),
            }),
            CursorValue::Uuid(u) => Bson::Binary(Binary {
                subtype: BinarySubtype::Uuid,
                bytes: u.as_bytes().to_vec(),
            }),
            CursorValue::DateTime(dt) => Bson::DateTime(*dt),
            CursorValue::Timestamp(ts) => Bson::Timestamp(*ts),
        })
    }

    /// Order two values the way MongoDB orders them.
    ///
    /// Values of different BSON type classes order by class (numbers, strings,
    /// binary, ObjectId, dates, timestamps). Numbers compare numerically across
    /// widths. Binary values order by length, then subtype, then bytes.
    pub fn bson_cmp(&self, other: &Self) -> Ordering {
        let class = self.type_class().cmp(&other.type_class());
        if class != Ordering::Equal {
            return class;
        }

        match (self, other) {
            (CursorValue::String(a), CursorValue::String(b)) => a.cmp(b),
            (CursorValue::ObjectId(a), CursorValue::ObjectId(b)) => a.bytes().cmp(&b.bytes()),
            (CursorValue::DateTime(a), CursorValue::DateTime(b)) => {
                a.timestamp_millis().cmp(&b.timestamp_millis())
            }
            (CursorValue::Timestamp(a), CursorValue::Timestamp(b)) => {
                (a.time, a.increment).cmp(&(b.time, b.increment))
            }
            _ if self.type_class() == TypeClass::Number => compare_numbers(self, other),
            _ => {
                let (a_sub, a_bytes) = self.binary_parts();
                let (b_sub, b_bytes) = other.binary_parts();
                (a_bytes.len(), a_sub, a_bytes).cmp(&(b_bytes.len(), b_sub, b_bytes))
            }
        }
    }

    fn type_class(&self) -> TypeClass {
        match self {
            CursorValue::Int32(_)
            | CursorValue::Int64(_)
            | CursorValue::Double(_)
            | CursorValue::Decimal(_) => TypeClass::Number,
            CursorValue::String(_) => TypeClass::String,
            CursorValue::Binary { .. } | CursorValue::Uuid(_) => TypeClass::Binary,
            CursorValue::ObjectId(_) => TypeClass::ObjectId,
            CursorValue::DateTime(_) => TypeClass::Date,
            CursorValue::Timestamp(_) => TypeClass::Timestamp,
        }
    }

    fn binary_parts(&self) -> (u8, &[u8]) {
        match self {
            CursorValue::Binary { subtype, bytes } => (*subtype, bytes.as_slice()),
            CursorValue::Uuid(u) => (u8::from(BinarySubtype::Uuid), u.as_bytes().as_slice()),
            _ => (0, &[]),
        }
    }
}

/// BSON comparison classes, in server sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum TypeClass {
    Number,
    String,
    Binary,
    ObjectId,
    Date,
    Timestamp,
}

fn compare_numbers(a: &CursorValue, b: &CursorValue) -> Ordering {
    use CursorValue::*;
    match (a, b) {
        (Int32(_) | Int64(_), Int32(_) | Int64(_)) => as_i64(a).cmp(&as_i64(b)),
        // NaN sorts below every other number.
        (Double(x), Double(y)) => x
            .partial_cmp(y)
            .unwrap_or_else(|| y.is_nan().cmp(&x.is_nan())),
        (Double(x), Int32(_) | Int64(_)) => compare_f64_i64(*x, as_i64(b)),
        (Int32(_) | Int64(_), Double(y)) => compare_f64_i64(*y, as_i64(a)).reverse(),
        _ => exact(a).cmp(&exact(b)),
    }
}

fn as_i64(v: &CursorValue) -> i64 {
    match v {
        CursorValue::Int32(i) => *i as i64,
        CursorValue::Int64(i) => *i,
        _ => 0,
    }
}

fn exact(v: &CursorValue) -> ExactNumber {
    match v {
        CursorValue::Double(f) => ExactNumber::from_f64(*f),
        CursorValue::Decimal(d) => ExactNumber::from_decimal128(d),
        other => ExactNumber::from_i64(as_i64(other)),
    }
}

/// Encode a cursor value into its persisted form.
pub fn encode(value: &CursorValue) -> TaggedValue {
    let s = match value {
        CursorValue::Int32(i) => i.to_string(),
        CursorValue::Int64(i) => i.to_string(),
        CursorValue::Double(f) => f.to_string(),
        CursorValue::Decimal(d) => d.to_string(),
        CursorValue::String(s) => s.clone(),
        CursorValue::ObjectId(oid) => oid.to_hex(),
        CursorValue::Binary { subtype, bytes } => {
            format!("{subtype:02x}:{}", general_purpose::STANDARD.encode(bytes))
        }
        CursorValue::Uuid(u) => u.hyphenated().to_string(),
        CursorValue::DateTime(dt) => dt.to_chrono().to_rfc3339_opts(SecondsFormat::Millis, true),
        CursorValue::Timestamp(ts) => format!("{}.{}", ts.time, ts.increment),
    };
    TaggedValue::new(s, value.cursor_type())
}

/// Decode a persisted cursor value.
pub fn decode(tagged: &TaggedValue) -> Result<CursorValue, CodecError> {
    let s = tagged.value.as_str();
    let ty = tagged.cursor_type;
    match ty {
        CursorType::Int32 => s
            .parse()
            .map(CursorValue::Int32)
            .map_err(|e| CodecError::invalid(ty, s, e)),
        CursorType::Int64 => s
            .parse()
            .map(CursorValue::Int64)
            .map_err(|e| CodecError::invalid(ty, s, e)),
        CursorType::Double => s
            .parse()
            .map(CursorValue::Double)
            .map_err(|e| CodecError::invalid(ty, s, e)),
        CursorType::Decimal => Decimal128::from_str(s)
            .map(CursorValue::Decimal)
            .map_err(|e| CodecError::invalid(ty, s, e)),
        CursorType::String => Ok(CursorValue::String(s.to_string())),
        CursorType::ObjectId => ObjectId::parse_str(s)
            .map(CursorValue::ObjectId)
            .map_err(|e| CodecError::invalid(ty, s, e)),
        CursorType::Binary => {
            let (subtype, data) = s
                .split_once(':')
                .ok_or_else(|| CodecError::invalid(ty, s, "expected 'subtype:base64'"))?;
            let subtype = u8::from_str_radix(subtype, 16).map_err(|e| CodecError::invalid(ty, s, e))?;
            let bytes = general_purpose::STANDARD
                .decode(data)
                .map_err(|e| CodecError::invalid(ty, s, e))?;
            Ok(CursorValue::Binary { subtype, bytes })
        }
        CursorType::Uuid => uuid::Uuid::parse_str(s)
            .map(CursorValue::Uuid)
            .map_err(|e| CodecError::invalid(ty, s, e)),
        CursorType::DateTime => DateTime::parse_from_rfc3339(s)
            .map(|dt| CursorValue::DateTime(bson::DateTime::from_chrono(dt.with_timezone(&Utc))))
            .map_err(|e| CodecError::invalid(ty, s, e)),
        CursorType::Timestamp => {
            let (time, increment) = s
                .split_once('.')
                .ok_or_else(|| CodecError::invalid(ty, s, "expected 'time.increment'"))?;
            let time = time.parse().map_err(|e| CodecError::invalid(ty, s, e))?;
            let increment = increment.parse().map_err(|e| CodecError::invalid(ty, s, e))?;
            Ok(CursorValue::Timestamp(Timestamp { time, increment }))
        }
    }
}

/// Encode a BSON value directly.
pub fn encode_bson(value: &Bson) -> Result<TaggedValue, CodecError> {
    CursorValue::from_bson(value).map(|v| encode(&v))
}

/// Decode straight to the BSON value used in queries.
pub fn decode_bson(tagged: &TaggedValue) -> Result<Bson, CodecError> {
    decode(tagged)?.to_bson()
}

/// Identity of a document `_id` as a unique index sees it.
///
/// Numbers that compare equal share a key whatever their BSON width, so
/// `Int32(1)`, `Int64(1)` and `Double(1.0)` name the same document. Other
/// values keep their type: `String("1")` is a different document.
pub fn identity_key(value: &Bson) -> String {
    match value {
        Bson::Int32(i) => format!("#{}", ExactNumber::from_i64(i64::from(*i)).canonical()),
        Bson::Int64(i) => format!("#{}", ExactNumber::from_i64(*i).canonical()),
        Bson::Double(f) => format!("#{}", ExactNumber::from_f64(*f).canonical()),
        Bson::Decimal128(d) => format!("#{}", ExactNumber::from_decimal128(d).canonical()),
        Bson::Document(doc) => {
            let fields: Vec<String> = doc
                .iter()
                .map(|(k, v)| format!("{}:{}", serde_json::Value::from(k.as_str()), identity_key(v)))
                .collect();
            format!("{{{}}}", fields.join(","))
        }
        Bson::Array(items) => {
            let items: Vec<String> = items.iter().map(identity_key).collect();
            format!("[{}]", items.join(","))
        }
        other => other.clone().into_canonical_extjson().to_string(),
    }
}

/// Compare two persisted values consistently with the server's ordering.
pub fn compare_encoded(a: &TaggedValue, b: &TaggedValue) -> Result<Ordering, CodecError> {
    Ok(decode(a)?.bson_cmp(&decode(b)?))
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

pub(crate) fn bson_type_name(value: &Bson) -> &'static str {
    match value {
        Bson::Double(_) => "double",
        Bson::String(_) => "string",
        Bson::Array(_) => "array",
        Bson::Document(_) => "document",
        Bson::Boolean(_) => "boolean",
        Bson::Null => "null",
        Bson::RegularExpression(_) => "regex",
        Bson::JavaScriptCode(_) => "javascript",
        Bson::JavaScriptCodeWithScope(_) => "javascript with scope",
        Bson::Int32(_) => "int32",
        Bson::Int64(_) => "int64",
        Bson::Timestamp(_) => "timestamp",
        Bson::Binary(_) => "binary",
        Bson::ObjectId(_) => "objectId",
        Bson::DateTime(_) => "date",
        Bson::Symbol(_) => "symbol",
        Bson::Decimal128(_) => "decimal128",
        Bson::Undefined => "undefined",
        Bson::MaxKey => "maxKey",
        Bson::MinKey => "minKey",
        Bson::DbPointer(_) => "dbPointer",
    }
}
