//! MongoDB/BSON type conversions for sync-core types.
//!
//! # Modules
//!
//! - [`codec`] - loss-less cursor codec (BSON value ↔ tagged string) and
//!   server-consistent ordering
//! - [`forward`] - BSON document → JSON payload for change events
//! - [`schema`] - BSON document → shape for schema inference
//! - [`oplog`] - oplog positions
//! - [`projection`] - inclusion projections applied to oplog documents
//!
//! # Example
//!
//! ```ignore
//! use mongodb_types::codec::{decode, encode, CursorValue};
//!
//! let tagged = encode(&CursorValue::Int64(42));
//! assert_eq!(tagged.value, "42");
//! assert_eq!(decode(&tagged)?, CursorValue::Int64(42));
//! ```

pub mod codec;
pub mod error;
pub mod forward;
mod number;
pub mod oplog;
pub mod projection;
pub mod schema;

pub use codec::{
    compare_encoded, decode, decode_bson, encode, encode_bson, identity_key, CursorValue,
};
pub use error::CodecError;
pub use forward::{bson_to_json, document_to_payload};
pub use oplog::OplogPosition;
pub use projection::project_document;
pub use schema::{bson_shape, document_shape};
