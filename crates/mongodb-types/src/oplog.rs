//! Oplog positions.

use bson::Timestamp;
use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use std::fmt;
use sync_core::{CursorType, TaggedValue};

use crate::codec::{decode, encode, CursorValue};
use crate::error::CodecError;

/// Position of an entry in `local.oplog.rs`.
///
/// Totally ordered by `(time, increment)`, which is the order in which the
/// server appends entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OplogPosition {
    pub time: u32,
    pub increment: u32,
}

impl OplogPosition {
    pub fn new(time: u32, increment: u32) -> Self {
        Self { time, increment }
    }

    pub fn to_timestamp(self) -> Timestamp {
        Timestamp {
            time: self.time,
            increment: self.increment,
        }
    }

    /// Wall-clock time of the entry, second precision.
    pub fn to_datetime(self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.time as i64, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }

    /// RFC 3339 form used for `_sdc_deleted_at`.
    pub fn to_rfc3339(self) -> String {
        self.to_datetime().to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    pub fn to_tagged(self) -> TaggedValue {
        encode(&CursorValue::Timestamp(self.to_timestamp()))
    }

    /// Decode a persisted position. Only `timestamp` tags are accepted.
    pub fn from_tagged(tagged: &TaggedValue) -> Result<Self, CodecError> {
        match decode(tagged)? {
            CursorValue::Timestamp(ts) => Ok(ts.into()),
            other => Err(CodecError::TypeMismatch {
                expected: CursorType::Timestamp,
                found: other.cursor_type(),
            }),
        }
    }
}

impl From<Timestamp> for OplogPosition {
    fn from(ts: Timestamp) -> Self {
        Self::new(ts.time, ts.increment)
    }
}

impl From<OplogPosition> for Timestamp {
    fn from(pos: OplogPosition) -> Self {
        pos.to_timestamp()
    }
}

impl fmt::Display for OplogPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.time, self.increment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering_by_time_then_increment() {
        let a = OplogPosition::new(100, 5);
        let b = OplogPosition::new(100, 6);
        let c = OplogPosition::new(101, 0);
        assert!(a < b && b < c);
    }

    #[test]
    fn test_tagged_roundtrip() {
        let pos = OplogPosition::new(1_700_000_000, 12);
        let tagged = pos.to_tagged();
        assert_eq!(tagged.cursor_type, CursorType::Timestamp);
        assert_eq!(tagged.value, "1700000000.12");
        assert_eq!(OplogPosition::from_tagged(&tagged).unwrap(), pos);
    }

    #[test]
    fn test_from_tagged_rejects_other_types() {
        let err = OplogPosition::from_tagged(&TaggedValue::new("5", CursorType::Int64)).unwrap_err();
        assert!(matches!(
            err,
            CodecError::TypeMismatch {
                expected: CursorType::Timestamp,
                found: CursorType::Int64
            }
        ));
    }

    #[test]
    fn test_deleted_at_format() {
        assert_eq!(
            OplogPosition::new(1_700_000_000, 1).to_rfc3339(),
            "2023-11-14T22:13:20Z"
        );
    }
}
