//! The source database seam.
//!
//! Strategies only talk to MongoDB through [`SourceDatabase`], so they can be
//! driven by the real driver ([`crate::MongoSource`]) or by an in-memory
//! fake in tests.

use async_trait::async_trait;
use bson::{Bson, Document};
use mongodb_types::OplogPosition;
use sync_core::CollectionDescriptor;

use crate::error::SourceError;

pub type SourceResult<T> = Result<T, SourceError>;

/// Operation recorded by one oplog entry.
#[derive(Debug, Clone, PartialEq)]
pub enum LogOp {
    /// `i`: the full inserted document
    Insert { document: Document },
    /// `u`: only the identifier; the new body is looked up later
    Update { id: Bson },
    /// `d`
    Delete { id: Bson },
    /// `n`, `c` and anything else; advances the position only
    Other { op: String },
}

/// One oplog entry for a collection.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub position: OplogPosition,
    pub namespace: String,
    pub op: LogOp,
}

/// Lower bound of a replication-key scan.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyBound {
    /// Scan everything.
    Start,
    /// `key >= value`; used when resuming from a persisted bookmark.
    From(Bson),
    /// Strictly after `(key, _id)` in `(key, _id)` order; used between
    /// pages of one run so ties on the key are not re-read.
    After { key: Bson, id: Bson },
}

/// Read primitives the replication strategies need.
///
/// Every method is a single bounded request, so a failed call can be retried
/// as a unit without any cursor state on the client side.
#[async_trait]
pub trait SourceDatabase: Send + Sync {
    /// Largest `_id` of the collection, or `None` if it is empty.
    async fn max_id(&self, collection: &CollectionDescriptor) -> SourceResult<Option<Bson>>;

    /// Documents with `lower_exclusive < _id <= upper_inclusive`, ascending by
    /// `_id`, at most `limit` of them.
    async fn scan_ids(
        &self,
        collection: &CollectionDescriptor,
        lower_exclusive: Option<&Bson>,
        upper_inclusive: &Bson,
        projection: Option<&[String]>,
        limit: usize,
    ) -> SourceResult<Vec<Document>>;

    /// Documents past `bound`, ascending by `(field, _id)`, at most `limit`.
    async fn scan_by_key(
        &self,
        collection: &CollectionDescriptor,
        field: &str,
        bound: &KeyBound,
        projection: Option<&[String]>,
        limit: usize,
    ) -> SourceResult<Vec<Document>>;

    /// Current documents for the given identifiers. Missing ones are omitted;
    /// order is unspecified.
    async fn find_by_ids(
        &self,
        collection: &CollectionDescriptor,
        ids: &[Bson],
        projection: Option<&[String]>,
    ) -> SourceResult<Vec<Document>>;

    /// Oplog entries of `namespace` with `position >= from`, in log order, at
    /// most `limit` of them.
    async fn read_oplog(
        &self,
        namespace: &str,
        from: OplogPosition,
        limit: usize,
    ) -> SourceResult<Vec<LogEntry>>;

    /// Position of the oldest entry still retained, `None` if the log is empty.
    async fn oldest_oplog_position(&self) -> SourceResult<Option<OplogPosition>>;

    /// Position of the newest entry, `None` if the log is empty.
    async fn newest_oplog_position(&self) -> SourceResult<Option<OplogPosition>>;
}
