//! Shape extraction for schema inference.
//!
//! Produces the [`Shape`] that `sync_core::SchemaAccumulator` consumes. The
//! kinds chosen here must agree with the JSON produced by
//! [`crate::forward::bson_to_json`].

use bson::spec::BinarySubtype;
use bson::{Bson, Document};
use sync_core::{FieldKind, Shape};

/// Shape of every top-level field of a document.
pub fn document_shape(doc: &Document) -> Vec<(String, Shape)> {
    doc.iter()
        .map(|(key, value)| (key.clone(), bson_shape(value)))
        .collect()
}

pub fn bson_shape(value: &Bson) -> Shape {
    let kind = match value {
        Bson::Document(doc) => return Shape::Object(document_shape(doc)),
        Bson::Array(items) => return Shape::Array(items.iter().map(bson_shape).collect()),
        Bson::JavaScriptCodeWithScope(_) | Bson::DbPointer(_) | Bson::MinKey | Bson::MaxKey => {
            FieldKind::Object
        }
        Bson::Null | Bson::Undefined => FieldKind::Null,
        Bson::Boolean(_) => FieldKind::Boolean,
        Bson::Int32(_) | Bson::Int64(_) => FieldKind::Integer,
        Bson::Double(f) if f.is_finite() => FieldKind::Number,
        Bson::Double(_) => FieldKind::Null,
        Bson::Decimal128(_) => FieldKind::Decimal,
        Bson::DateTime(_) | Bson::Timestamp(_) => FieldKind::DateTime,
        Bson::Binary(bin)
            if matches!(bin.subtype, BinarySubtype::Uuid | BinarySubtype::UuidOld)
                && bin.bytes.len() == 16 =>
        {
            FieldKind::String
        }
        Bson::Binary(_) => FieldKind::Binary,
        Bson::String(_)
        | Bson::Symbol(_)
        | Bson::ObjectId(_)
        | Bson::RegularExpression(_)
        | Bson::JavaScriptCode(_) => FieldKind::String,
    };
    Shape::Scalar(kind)
}
