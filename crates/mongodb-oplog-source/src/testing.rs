//! In-memory source used by the strategy tests.

use async_trait::async_trait;
use bson::{Bson, Document};
use mongodb_types::{project_document, CursorValue, OplogPosition};
use std::cmp::Ordering;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use sync_core::{CollectionDescriptor, ID_FIELD};

use crate::error::SourceError;
use crate::source::{KeyBound, LogEntry, LogOp, SourceDatabase, SourceResult};

const START_TIME: u32 = 1_700_000_000;

/// Collections and an oplog held in memory.
///
/// Every write helper both changes the collection and appends the matching
/// oplog entry, the way a replica set primary would. `seed` and `put` change
/// data only.
pub struct FakeSource {
    inner: Mutex<FakeInner>,
}

#[derive(Default)]
struct FakeInner {
    collections: HashMap<String, Vec<Document>>,
    oplog: Vec<LogEntry>,
    clock: u32,
    failures: HashMap<&'static str, VecDeque<SourceError>>,
    calls: HashMap<&'static str, u32>,
    /// Every snapshot page rolls the oplog over
    roll_oplog_on_scan: bool,
}

impl FakeInner {
    fn next_position(&mut self) -> OplogPosition {
        self.clock += 1;
        OplogPosition::new(START_TIME, self.clock)
    }

    fn append(&mut self, namespace: &str, op: LogOp) -> OplogPosition {
        let position = self.next_position();
        self.oplog.push(LogEntry {
            position,
            namespace: namespace.to_string(),
            op,
        });
        position
    }

    fn docs(&mut self, namespace: &str) -> &mut Vec<Document> {
        self.collections.entry(namespace.to_string()).or_default()
    }

    fn roll_oplog(&mut self) -> OplogPosition {
        self.oplog.clear();
        self.append("", LogOp::Other { op: "n".into() })
    }

    fn take_failure(&mut self, operation: &'static str) -> Option<SourceError> {
        *self.calls.entry(operation).or_default() += 1;
        self.failures.get_mut(operation).and_then(VecDeque::pop_front)
    }
}

fn same_id(doc: &Document, id: &Bson) -> bool {
    doc.get(ID_FIELD) == Some(id)
}

/// BSON order of two optional values; absent and null sort first.
fn cmp_values(a: Option<&Bson>, b: Option<&Bson>) -> Ordering {
    let value = |v: Option<&Bson>| v.and_then(|v| CursorValue::from_bson(v).ok());
    match (value(a), value(b)) {
        (Some(a), Some(b)) => a.bson_cmp(&b),
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
    }
}

fn project(doc: &Document, projection: Option<&[String]>) -> Document {
    match projection {
        None => doc.clone(),
        Some(fields) => project_document(doc, fields),
    }
}

impl FakeSource {
    /// Empty source whose oplog holds one no-op entry.
    pub fn new() -> Self {
        let mut inner = FakeInner::default();
        inner.roll_oplog();
        Self {
            inner: Mutex::new(inner),
        }
    }

    fn with<T>(&self, f: impl FnOnce(&mut FakeInner) -> T) -> T {
        let mut inner = self.inner.lock().unwrap();
        f(&mut inner)
    }

    /// Add documents without oplog entries.
    pub fn seed(&self, namespace: &str, docs: impl IntoIterator<Item = Document>) {
        self.with(|inner| inner.docs(namespace).extend(docs));
    }

    /// Replace or add one document without an oplog entry.
    pub fn put(&self, namespace: &str, doc: Document) {
        self.with(|inner| {
            let docs = inner.docs(namespace);
            let id = doc.get(ID_FIELD).cloned().unwrap_or(Bson::Null);
            docs.retain(|d| !same_id(d, &id));
            docs.push(doc);
        });
    }

    pub fn insert(&self, namespace: &str, doc: Document) -> OplogPosition {
        self.with(|inner| {
            inner.docs(namespace).push(doc.clone());
            inner.append(namespace, LogOp::Insert { document: doc })
        })
    }

    /// Apply `$set`-style changes and log an update carrying only the id.
    pub fn update(&self, namespace: &str, id: impl Into<Bson>, changes: Document) -> OplogPosition {
        let id = id.into();
        self.with(|inner| {
            if let Some(doc) = inner.docs(namespace).iter_mut().find(|d| same_id(d, &id)) {
                for (field, value) in changes {
                    doc.insert(field, value);
                }
            }
            inner.append(namespace, LogOp::Update { id })
        })
    }

    pub fn delete(&self, namespace: &str, id: impl Into<Bson>) -> OplogPosition {
        let id = id.into();
        self.with(|inner| {
            inner.docs(namespace).retain(|d| !same_id(d, &id));
            inner.append(namespace, LogOp::Delete { id })
        })
    }

    /// Append an entry verbatim, without touching data.
    pub fn push_entry(&self, entry: LogEntry) {
        self.with(|inner| inner.oplog.push(entry));
    }

    /// Drop every retained entry and log a fresh no-op, as if the capped
    /// oplog rolled over.
    pub fn expire_oplog(&self) -> OplogPosition {
        self.with(FakeInner::roll_oplog)
    }

    /// Remove every entry, leaving an empty oplog.
    pub fn truncate_oplog(&self) {
        self.with(|inner| inner.oplog.clear());
    }

    /// Roll the oplog over on every snapshot page, so no snapshot can
    /// finish inside the retention window.
    pub fn roll_oplog_during_snapshots(&self) {
        self.with(|inner| inner.roll_oplog_on_scan = true);
    }

    /// Make the next calls of `operation` fail with the given errors, in order.
    pub fn fail_next(&self, operation: &'static str, errors: impl IntoIterator<Item = SourceError>) {
        self.with(|inner| {
            inner
                .failures
                .entry(operation)
                .or_default()
                .extend(errors)
        });
    }

    pub fn calls(&self, operation: &str) -> u32 {
        self.with(|inner| inner.calls.get(operation).copied().unwrap_or_default())
    }
}

#[async_trait]
impl SourceDatabase for FakeSource {
    async fn max_id(&self, collection: &CollectionDescriptor) -> SourceResult<Option<Bson>> {
        self.with(|inner| {
            if let Some(e) = inner.take_failure("max_id") {
                return Err(e);
            }
            Ok(inner
                .docs(&collection.namespace())
                .iter()
                .filter_map(|d| d.get(ID_FIELD))
                .max_by(|a, b| cmp_values(Some(*a), Some(*b)))
                .cloned())
        })
    }

    async fn scan_ids(
        &self,
        collection: &CollectionDescriptor,
        lower_exclusive: Option<&Bson>,
        upper_inclusive: &Bson,
        projection: Option<&[String]>,
        limit: usize,
    ) -> SourceResult<Vec<Document>> {
        self.with(|inner| {
            if let Some(e) = inner.take_failure("scan_ids") {
                return Err(e);
            }
            if inner.roll_oplog_on_scan {
                inner.roll_oplog();
            }
            let mut docs: Vec<Document> = inner
                .docs(&collection.namespace())
                .iter()
                .filter(|d| {
                    let id = d.get(ID_FIELD);
                    cmp_values(id, Some(upper_inclusive)) != Ordering::Greater
                        && lower_exclusive
                            .map_or(true, |lower| cmp_values(id, Some(lower)) == Ordering::Greater)
                })
                .cloned()
                .collect();
            docs.sort_by(|a, b| cmp_values(a.get(ID_FIELD), b.get(ID_FIELD)));
            Ok(docs
                .iter()
                .take(limit)
                .map(|d| project(d, projection))
                .collect())
        })
    }

    async fn scan_by_key(
        &self,
        collection: &CollectionDescriptor,
        field: &str,
        bound: &KeyBound,
        projection: Option<&[String]>,
        limit: usize,
    ) -> SourceResult<Vec<Document>> {
        self.with(|inner| {
            if let Some(e) = inner.take_failure("scan_by_key") {
                return Err(e);
            }
            let key_of = |d: &Document| d.get(field).filter(|v| !matches!(v, Bson::Null)).cloned();
            let mut docs: Vec<Document> = inner
                .docs(&collection.namespace())
                .iter()
                .filter(|&d| match bound {
                    KeyBound::Start => true,
                    KeyBound::From(value) => key_of(d)
                        .is_some_and(|k| cmp_values(Some(&k), Some(value)) != Ordering::Less),
                    KeyBound::After { key, id } => {
                        let key = Some(key).filter(|k| !matches!(k, Bson::Null));
                        match cmp_values(key_of(d).as_ref(), key) {
                            Ordering::Greater => true,
                            Ordering::Equal => {
                                cmp_values(d.get(ID_FIELD), Some(id)) == Ordering::Greater
                            }
                            Ordering::Less => false,
                        }
                    }
                })
                .cloned()
                .collect();
            docs.sort_by(|a, b| {
                cmp_values(key_of(a).as_ref(), key_of(b).as_ref())
                    .then_with(|| cmp_values(a.get(ID_FIELD), b.get(ID_FIELD)))
            });
            Ok(docs
                .iter()
                .take(limit)
                .map(|d| project(d, projection))
                .collect())
        })
    }

    async fn find_by_ids(
        &self,
        collection: &CollectionDescriptor,
        ids: &[Bson],
        projection: Option<&[String]>,
    ) -> SourceResult<Vec<Document>> {
        self.with(|inner| {
            if let Some(e) = inner.take_failure("find_by_ids") {
                return Err(e);
            }
            // Reverse order, to show callers must not rely on it
            Ok(inner
                .docs(&collection.namespace())
                .iter()
                .rev()
                .filter(|d| ids.iter().any(|id| same_id(d, id)))
                .map(|d| project(d, projection))
                .collect())
        })
    }

    async fn read_oplog(
        &self,
        namespace: &str,
        from: OplogPosition,
        limit: usize,
    ) -> SourceResult<Vec<LogEntry>> {
        self.with(|inner| {
            if let Some(e) = inner.take_failure("read_oplog") {
                return Err(e);
            }
            Ok(inner
                .oplog
                .iter()
                .filter(|e| e.namespace == namespace && e.position >= from)
                .take(limit)
                .cloned()
                .collect())
        })
    }

    async fn oldest_oplog_position(&self) -> SourceResult<Option<OplogPosition>> {
        self.with(|inner| {
            if let Some(e) = inner.take_failure("oldest_oplog_position") {
                return Err(e);
            }
            Ok(inner.oplog.iter().map(|e| e.position).min())
        })
    }

    async fn newest_oplog_position(&self) -> SourceResult<Option<OplogPosition>> {
        self.with(|inner| {
            if let Some(e) = inner.take_failure("newest_oplog_position") {
                return Err(e);
            }
            Ok(inner.oplog.iter().map(|e| e.position).max())
        })
    }
}
