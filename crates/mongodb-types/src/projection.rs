//! Inclusion projections applied client-side.
//!
//! Oplog inserts carry the full document, so the field list the server
//! applies to queries has to be applied here as well.

use bson::{Bson, Document};
use sync_core::ID_FIELD;

/// Keep only `fields` of `doc` (dotted paths reach into embedded documents
/// and arrays of documents). `_id` is always kept; field order is preserved.
pub fn project_document(doc: &Document, fields: &[String]) -> Document {
    let paths: Vec<&str> = fields.iter().map(String::as_str).collect();
    let mut out = project_paths(doc, &paths);
    if !out.contains_key(ID_FIELD) {
        if let Some(id) = doc.get(ID_FIELD) {
            let mut with_id = Document::new();
            with_id.insert(ID_FIELD, id.clone());
            for (k, v) in out {
                with_id.insert(k, v);
            }
            out = with_id;
        }
    }
    out
}

fn project_paths(doc: &Document, paths: &[&str]) -> Document {
    let mut out = Document::new();
    for (key, value) in doc {
        if paths.iter().any(|p| *p == key.as_str()) {
            out.insert(key.clone(), value.clone());
            continue;
        }
        let nested: Vec<&str> = paths
            .iter()
            .filter_map(|p| p.strip_prefix(key.as_str())?.strip_prefix('.'))
            .collect();
        if nested.is_empty() {
            continue;
        }
        match value {
            Bson::Document(inner) => {
                out.insert(key.clone(), project_paths(inner, &nested));
            }
            Bson::Array(items) => {
                let items = items
                    .iter()
                    .filter_map(|item| match item {
                        Bson::Document(inner) => Some(Bson::Document(project_paths(inner, &nested))),
                        _ => None,
                    })
                    .collect::<Vec<_>>();
                out.insert(key.clone(), items);
            }
            _ => {}
        }
    }
    out
}
