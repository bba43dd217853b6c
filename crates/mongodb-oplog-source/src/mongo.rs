//! `SourceDatabase` backed by the MongoDB driver.

use async_trait::async_trait;
use bson::{doc, Bson, Document};
use mongodb::{options::ClientOptions, Client as MongoClient, Collection, Cursor};
use mongodb_types::OplogPosition;
use std::time::Duration;
use sync_core::{CollectionDescriptor, ID_FIELD};

use crate::error::SourceError;
use crate::source::{KeyBound, LogEntry, LogOp, SourceDatabase, SourceResult};

const OPLOG_DATABASE: &str = "local";
const OPLOG_COLLECTION: &str = "oplog.rs";

/// Source database connection options
#[derive(Clone, Debug)]
pub struct SourceOpts {
    pub source_uri: String,
    pub connect_timeout: Duration,
}

impl SourceOpts {
    pub fn new(source_uri: impl Into<String>) -> Self {
        Self {
            source_uri: source_uri.into(),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// MongoDB replica-set member read through the official driver.
///
/// Collections are read with bounded `find` requests; the oplog is read from
/// `local.oplog.rs` in natural (append) order.
pub struct MongoSource {
    client: MongoClient,
}

impl MongoSource {
    pub async fn connect(opts: &SourceOpts) -> anyhow::Result<Self> {
        tracing::debug!("Parsing MongoDB connection options");
        let mut mongo_options = match ClientOptions::parse(&opts.source_uri).await {
            Ok(options) => options,
            Err(e) => {
                tracing::error!("Failed to parse MongoDB connection options: {}", e);
                return Err(e.into());
            }
        };
        // Bound connection setup so an unreachable server surfaces as a
        // transient error instead of a hang
        mongo_options.connect_timeout = Some(opts.connect_timeout);
        mongo_options.server_selection_timeout = Some(opts.connect_timeout);

        let client = MongoClient::with_options(mongo_options)?;
        tracing::info!("MongoDB client created");
        Ok(Self { client })
    }

    pub fn from_client(client: MongoClient) -> Self {
        Self { client }
    }

    fn collection(&self, descriptor: &CollectionDescriptor) -> Collection<Document> {
        self.client
            .database(&descriptor.database)
            .collection::<Document>(&descriptor.collection)
    }

    fn oplog(&self) -> Collection<Document> {
        self.client
            .database(OPLOG_DATABASE)
            .collection::<Document>(OPLOG_COLLECTION)
    }

    async fn oplog_edge(&self, direction: i32) -> SourceResult<Option<OplogPosition>> {
        let entry = self
            .oplog()
            .find_one(doc! {})
            .sort(doc! {"$natural": direction})
            .projection(doc! {"ts": 1})
            .await?;
        match entry {
            Some(entry) => {
                let ts = entry
                    .get_timestamp("ts")
                    .map_err(|e| SourceError::Fatal(anyhow::anyhow!("Oplog entry without ts: {e}")))?;
                Ok(Some(ts.into()))
            }
            None => Ok(None),
        }
    }
}

fn projection_doc(projection: Option<&[String]>) -> Option<Document> {
    projection.map(|fields| {
        fields
            .iter()
            .map(|field| (field.clone(), Bson::Int32(1)))
            .collect()
    })
}

async fn collect(mut cursor: Cursor<Document>) -> SourceResult<Vec<Document>> {
    let mut docs = Vec::new();
    while cursor.advance().await? {
        let doc: Document = cursor
            .current()
            .try_into()
            .map_err(|e| SourceError::Fatal(anyhow::anyhow!("Failed to decode document: {e}")))?;
        docs.push(doc);
    }
    Ok(docs)
}

fn parse_oplog_entry(entry: &Document) -> SourceResult<LogEntry> {
    let malformed = |what: &str| {
        SourceError::Fatal(anyhow::anyhow!("Malformed oplog entry ({what}): {entry}"))
    };

    let position: OplogPosition = entry.get_timestamp("ts").map_err(|_| malformed("ts"))?.into();
    let namespace = entry.get_str("ns").unwrap_or_default().to_string();
    let op = entry.get_str("op").map_err(|_| malformed("op"))?;

    let op = match op {
        "i" => LogOp::Insert {
            document: entry.get_document("o").map_err(|_| malformed("o"))?.clone(),
        },
        "u" => {
            let id = entry
                .get_document("o2")
                .ok()
                .and_then(|o2| o2.get(ID_FIELD))
                .ok_or_else(|| malformed("o2._id"))?;
            LogOp::Update { id: id.clone() }
        }
        "d" => {
            let id = entry
                .get_document("o")
                .ok()
                .and_then(|o| o.get(ID_FIELD))
                .ok_or_else(|| malformed("o._id"))?;
            LogOp::Delete { id: id.clone() }
        }
        other => LogOp::Other {
            op: other.to_string(),
        },
    };

    Ok(LogEntry {
        position,
        namespace,
        op,
    })
}

#[async_trait]
impl SourceDatabase for MongoSource {
    async fn max_id(&self, collection: &CollectionDescriptor) -> SourceResult<Option<Bson>> {
        let doc = self
            .collection(collection)
            .find_one(doc! {})
            .sort(doc! {ID_FIELD: -1})
            .projection(doc! {ID_FIELD: 1})
            .await?;
        Ok(doc.and_then(|d| d.get(ID_FIELD).cloned()))
    }

    async fn scan_ids(
        &self,
        collection: &CollectionDescriptor,
        lower_exclusive: Option<&Bson>,
        upper_inclusive: &Bson,
        projection: Option<&[String]>,
        limit: usize,
    ) -> SourceResult<Vec<Document>> {
        let mut range = doc! {"$lte": upper_inclusive.clone()};
        if let Some(lower) = lower_exclusive {
            range.insert("$gt", lower.clone());
        }

        let coll = self.collection(collection);
        let mut find = coll
            .find(doc! {ID_FIELD: range})
            .sort(doc! {ID_FIELD: 1})
            .limit(limit as i64);
        if let Some(projection) = projection_doc(projection) {
            find = find.projection(projection);
        }
        collect(find.await?).await
    }

    async fn scan_by_key(
        &self,
        collection: &CollectionDescriptor,
        field: &str,
        bound: &KeyBound,
        projection: Option<&[String]>,
        limit: usize,
    ) -> SourceResult<Vec<Document>> {
        let filter = match bound {
            KeyBound::Start => doc! {},
            KeyBound::From(value) => doc! {field: {"$gte": value.clone()}},
            KeyBound::After { key: Bson::Null, id } => doc! {
                "$or": [
                    {field: {"$exists": true, "$ne": Bson::Null}},
                    {field: Bson::Null, ID_FIELD: {"$gt": id.clone()}},
                ]
            },
            KeyBound::After { key, id } => doc! {
                "$or": [
                    {field: {"$gt": key.clone()}},
                    {field: key.clone(), ID_FIELD: {"$gt": id.clone()}},
                ]
            },
        };

        let coll = self.collection(collection);
        let mut find = coll
            .find(filter)
            .sort(doc! {field: 1, ID_FIELD: 1})
            .limit(limit as i64);
        if let Some(projection) = projection_doc(projection) {
            find = find.projection(projection);
        }
        collect(find.await?).await
    }

    async fn find_by_ids(
        &self,
        collection: &CollectionDescriptor,
        ids: &[Bson],
        projection: Option<&[String]>,
    ) -> SourceResult<Vec<Document>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let coll = self.collection(collection);
        let mut find = coll.find(doc! {ID_FIELD: {"$in": ids.to_vec()}});
        if let Some(projection) = projection_doc(projection) {
            find = find.projection(projection);
        }
        collect(find.await?).await
    }

    async fn read_oplog(
        &self,
        namespace: &str,
        from: OplogPosition,
        limit: usize,
    ) -> SourceResult<Vec<LogEntry>> {
        let filter = doc! {
            "ts": {"$gte": Bson::Timestamp(from.to_timestamp())},
            "ns": namespace,
        };
        let cursor = self
            .oplog()
            .find(filter)
            .sort(doc! {"$natural": 1})
            .limit(limit as i64)
            .await?;
        collect(cursor)
            .await?
            .iter()
            .map(parse_oplog_entry)
            .collect()
    }

    async fn oldest_oplog_position(&self) -> SourceResult<Option<OplogPosition>> {
        self.oplog_edge(1).await
    }

    async fn newest_oplog_position(&self) -> SourceResult<Option<OplogPosition>> {
        self.oplog_edge(-1).await
    }
}
