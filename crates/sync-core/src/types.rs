//! Cursor type tags shared by every persisted cursor value.
//!
//! A cursor field (the `_id`, a replication key, an oplog position) may hold
//! values of different native types across collections. Checkpoints therefore
//! never store a bare string: each value travels with a [`CursorType`] tag so
//! the codec in `mongodb-types` can rebuild the exact comparison value.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Native type of a persisted cursor value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CursorType {
    /// 32-bit signed integer
    Int32,
    /// 64-bit signed integer
    Int64,
    /// IEEE 754 double
    Double,
    /// Arbitrary-precision decimal (BSON Decimal128)
    Decimal,
    /// UTF-8 string
    String,
    /// 12-byte MongoDB ObjectId
    ObjectId,
    /// Opaque binary blob with its BSON subtype
    Binary,
    /// UUID (BSON binary subtype 4)
    Uuid,
    /// UTC date-time with millisecond precision
    DateTime,
    /// BSON timestamp `(seconds, increment)`; used for oplog positions
    Timestamp,
}

impl CursorType {
    /// Tag as written into checkpoint files.
    pub fn as_str(&self) -> &'static str {
        match self {
            CursorType::Int32 => "int32",
            CursorType::Int64 => "int64",
            CursorType::Double => "double",
            CursorType::Decimal => "decimal",
            CursorType::String => "string",
            CursorType::ObjectId => "object_id",
            CursorType::Binary => "binary",
            CursorType::Uuid => "uuid",
            CursorType::DateTime => "date_time",
            CursorType::Timestamp => "timestamp",
        }
    }
}

impl fmt::Display for CursorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A cursor value in its persisted form.
///
/// Serializes as `{"value": "...", "type": "int64"}` so operators can read and
/// hand-edit checkpoint files.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaggedValue {
    /// Loss-less string form produced by the codec
    pub value: String,
    /// Type tag needed to decode `value`
    #[serde(rename = "type")]
    pub cursor_type: CursorType,
}

impl TaggedValue {
    pub fn new(value: impl Into<String>, cursor_type: CursorType) -> Self {
        Self {
            value: value.into(),
            cursor_type,
        }
    }
}

impl fmt::Display for TaggedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.cursor_type, self.value)
    }
}
