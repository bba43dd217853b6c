//! Core types for the oplog-sync framework.
//!
//! This crate provides the source-agnostic types used across the sync
//! framework:
//!
//! - [`CursorType`] / [`TaggedValue`] - persisted cursor values with their type tag
//! - [`CollectionDescriptor`] - what to replicate and how
//! - [`ChangeEvent`] / [`SinkMessage`] - what the sink receives
//! - [`SchemaAccumulator`] - incremental schema inference
//! - [`SyncMetrics`] - per-stream counters
//!
//! # Architecture
//!
//! ```text
//! sync-core (this crate)
//!    │
//!    ├─── mongodb-types   (BSON codec, payload conversion, shape inference)
//!    ├─── checkpoint      (per-stream checkpoint store)
//!    ├─── event-sink      (sink trait and implementations)
//!    └─── oplog-sync-mongodb-source (strategies and controller)
//! ```

pub mod descriptor;
pub mod events;
pub mod metrics;
pub mod schema;
pub mod types;

pub use descriptor::{CollectionDescriptor, ReplicationMethod, ID_FIELD};
pub use events::{ChangeEvent, ChangeKind, SinkMessage, DELETED_AT_FIELD};
pub use metrics::SyncMetrics;
pub use schema::{FieldKind, FieldSchema, SchemaAccumulator, Shape};
pub use types::{CursorType, TaggedValue};
