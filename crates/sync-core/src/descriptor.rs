//! Collection descriptors supplied by the catalog.

use serde::{Deserialize, Serialize};

/// Name of the identifier field every MongoDB document carries.
pub const ID_FIELD: &str = "_id";

/// How a collection is replicated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReplicationMethod {
    /// Repeated point-in-time snapshots by ascending `_id`.
    FullTable,
    /// One snapshot, then tail the oplog.
    #[default]
    LogBased,
    /// Ascending scan over a replication key from the last bookmarked value.
    Incremental,
}

impl ReplicationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReplicationMethod::FullTable => "full_table",
            ReplicationMethod::LogBased => "log_based",
            ReplicationMethod::Incremental => "incremental",
        }
    }
}

impl std::fmt::Display for ReplicationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One source collection and how it should be replicated.
///
/// Immutable for the duration of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionDescriptor {
    /// Logical stream identifier; also the checkpoint key
    pub stream_id: String,

    /// Source database name
    pub database: String,

    /// Source collection name
    pub collection: String,

    /// Replication method forced for this stream
    #[serde(default)]
    pub replication_method: ReplicationMethod,

    /// Field scanned by the incremental method
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replication_key: Option<String>,

    /// Fields to read and emit. `None` reads whole documents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projection: Option<Vec<String>>,

    /// Unselected streams are skipped
    #[serde(default = "default_selected")]
    pub selected: bool,

    /// Declared JSON schema to seed the accumulator with
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<serde_json::Value>,
}

fn default_selected() -> bool {
    true
}

impl CollectionDescriptor {
    pub fn new(
        stream_id: impl Into<String>,
        database: impl Into<String>,
        collection: impl Into<String>,
        replication_method: ReplicationMethod,
    ) -> Self {
        Self {
            stream_id: stream_id.into(),
            database: database.into(),
            collection: collection.into(),
            replication_method,
            replication_key: None,
            projection: None,
            selected: true,
            schema: None,
        }
    }

    /// Oplog namespace, `database.collection`.
    pub fn namespace(&self) -> String {
        format!("{}.{}", self.database, self.collection)
    }

    /// Projected field list with `_id` always present, or `None` for whole documents.
    pub fn effective_projection(&self) -> Option<Vec<String>> {
        self.projection.as_ref().map(|fields| {
            let mut out = Vec::with_capacity(fields.len() + 1);
            out.push(ID_FIELD.to_string());
            for field in fields {
                if field != ID_FIELD && !out.contains(field) {
                    out.push(field.clone());
                }
            }
            out
        })
    }

    /// Key properties announced with schema messages.
    pub fn key_properties(&self) -> Vec<String> {
        vec![ID_FIELD.to_string()]
    }
}
