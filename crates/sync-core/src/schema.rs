//! Schema accumulation.
//!
//! Documents in a collection do not share a fixed shape, so the output schema
//! is inferred while documents are observed. [`SchemaAccumulator::observe`]
//! widens the running schema and reports a change only when the document
//! introduced something new: a field, a type for an existing field, or a
//! field that is now known to be absent or null in some documents.
//!
//! Growth is monotonic within a run. Fields are never removed.

use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, BTreeSet};

/// JSON-level kind of an observed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FieldKind {
    Null,
    Boolean,
    Integer,
    Number,
    /// Decimal emitted as a string to keep precision
    Decimal,
    String,
    /// RFC 3339 string
    DateTime,
    /// Base64 string
    Binary,
    Object,
    Array,
}

impl FieldKind {
    fn to_json_schema(self) -> Value {
        match self {
            FieldKind::Null => json!({"type": "null"}),
            FieldKind::Boolean => json!({"type": "boolean"}),
            FieldKind::Integer => json!({"type": "integer"}),
            FieldKind::Number => json!({"type": "number"}),
            FieldKind::Decimal => json!({"type": "string", "format": "decimal"}),
            FieldKind::String => json!({"type": "string"}),
            FieldKind::DateTime => json!({"type": "string", "format": "date-time"}),
            FieldKind::Binary => json!({"type": "string", "contentEncoding": "base64"}),
            FieldKind::Object => json!({"type": "object"}),
            FieldKind::Array => json!({"type": "array"}),
        }
    }
}

/// Shape of one observed value, produced by the source-specific type crate.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Scalar(FieldKind),
    Object(Vec<(String, Shape)>),
    Array(Vec<Shape>),
}

/// Accumulated schema of one field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldSchema {
    kinds: BTreeSet<FieldKind>,
    properties: BTreeMap<String, FieldSchema>,
    items: Option<Box<FieldSchema>>,
}

impl FieldSchema {
    pub fn kinds(&self) -> impl Iterator<Item = FieldKind> + '_ {
        self.kinds.iter().copied()
    }

    pub fn is_nullable(&self) -> bool {
        self.kinds.contains(&FieldKind::Null)
    }

    pub fn property(&self, name: &str) -> Option<&FieldSchema> {
        self.properties.get(name)
    }

    fn merge(&mut self, shape: &Shape) -> bool {
        match shape {
            Shape::Scalar(kind) => self.kinds.insert(*kind),
            Shape::Object(fields) => {
                let seen_before = self.kinds.contains(&FieldKind::Object);
                let inserted = self.kinds.insert(FieldKind::Object);
                let widened = merge_properties(&mut self.properties, seen_before, fields);
                inserted | widened
            }
            Shape::Array(elements) => {
                let mut changed = self.kinds.insert(FieldKind::Array);
                let items = self.items.get_or_insert_with(Default::default);
                for element in elements {
                    changed |= items.merge(element);
                }
                changed
            }
        }
    }

    fn mark_nullable(&mut self) -> bool {
        self.kinds.insert(FieldKind::Null)
    }

    fn to_json_schema(&self) -> Value {
        let variants: Vec<Value> = self
            .kinds
            .iter()
            .map(|kind| {
                let mut schema = kind.to_json_schema();
                match kind {
                    FieldKind::Object => {
                        schema["properties"] = properties_to_json(&self.properties);
                    }
                    FieldKind::Array => {
                        if let Some(items) = &self.items {
                            if !items.kinds.is_empty() {
                                schema["items"] = items.to_json_schema();
                            }
                        }
                    }
                    _ => {}
                }
                schema
            })
            .collect();

        match variants.len() {
            0 => json!({}),
            1 => variants.into_iter().next().unwrap_or_else(|| json!({})),
            _ => json!({ "anyOf": variants }),
        }
    }

    fn from_json_schema(value: &Value) -> Self {
        let mut field = FieldSchema::default();
        if let Some(any_of) = value.get("anyOf").and_then(Value::as_array) {
            for variant in any_of {
                let sub = FieldSchema::from_json_schema(variant);
                field.absorb(sub);
            }
            return field;
        }

        let types: Vec<&str> = match value.get("type") {
            Some(Value::String(t)) => vec![t.as_str()],
            Some(Value::Array(ts)) => ts.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        };
        let format = value.get("format").and_then(Value::as_str);
        let encoding = value.get("contentEncoding").and_then(Value::as_str);

        for t in types {
            let kind = match (t, format, encoding) {
                ("null", _, _) => FieldKind::Null,
                ("boolean", _, _) => FieldKind::Boolean,
                ("integer", _, _) => FieldKind::Integer,
                ("number", _, _) => FieldKind::Number,
                ("string", Some("date-time"), _) => FieldKind::DateTime,
                ("string", Some("decimal"), _) => FieldKind::Decimal,
                ("string", _, Some("base64")) => FieldKind::Binary,
                ("string", _, _) => FieldKind::String,
                ("object", _, _) => {
                    if let Some(props) = value.get("properties").and_then(Value::as_object) {
                        for (name, prop) in props {
                            field
                                .properties
                                .insert(name.clone(), FieldSchema::from_json_schema(prop));
                        }
                    }
                    FieldKind::Object
                }
                ("array", _, _) => {
                    if let Some(items) = value.get("items") {
                        field.items = Some(Box::new(FieldSchema::from_json_schema(items)));
                    }
                    FieldKind::Array
                }
                _ => continue,
            };
            field.kinds.insert(kind);
        }
        field
    }

    fn absorb(&mut self, other: FieldSchema) {
        self.kinds.extend(other.kinds);
        for (name, prop) in other.properties {
            self.properties.entry(name).or_default().absorb(prop);
        }
        if let Some(items) = other.items {
            self.items.get_or_insert_with(Default::default).absorb(*items);
        }
    }
}

fn merge_properties(
    properties: &mut BTreeMap<String, FieldSchema>,
    seen_before: bool,
    fields: &[(String, Shape)],
) -> bool {
    let mut changed = false;
    let mut present = BTreeSet::new();

    for (name, shape) in fields {
        present.insert(name.as_str());
        match properties.get_mut(name) {
            Some(existing) => changed |= existing.merge(shape),
            None => {
                let mut field = FieldSchema::default();
                field.merge(shape);
                // Earlier documents at this level lacked the field.
                if seen_before {
                    field.mark_nullable();
                }
                properties.insert(name.clone(), field);
                changed = true;
            }
        }
    }

    for (name, field) in properties.iter_mut() {
        if !present.contains(name.as_str()) {
            changed |= field.mark_nullable();
        }
    }

    changed
}

fn properties_to_json(properties: &BTreeMap<String, FieldSchema>) -> Value {
    let mut out = Map::new();
    for (name, field) in properties {
        out.insert(name.clone(), field.to_json_schema());
    }
    Value::Object(out)
}

/// Running schema of one stream.
#[derive(Debug, Clone, Default)]
pub struct SchemaAccumulator {
    properties: BTreeMap<String, FieldSchema>,
    documents_seen: u64,
}

impl SchemaAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a declared JSON schema (`{"type": "object", "properties": {...}}`).
    ///
    /// Declared fields count as already seen, so a document lacking one of
    /// them makes it nullable.
    pub fn from_json_schema(schema: &Value) -> Self {
        let mut properties = BTreeMap::new();
        if let Some(props) = schema.get("properties").and_then(Value::as_object) {
            for (name, prop) in props {
                properties.insert(name.clone(), FieldSchema::from_json_schema(prop));
            }
        }
        let documents_seen = if properties.is_empty() { 0 } else { 1 };
        Self {
            properties,
            documents_seen,
        }
    }

    /// Widen the schema with one document's shape.
    ///
    /// Returns the updated JSON schema if anything changed, `None` otherwise.
    pub fn observe(&mut self, document: &[(String, Shape)]) -> Option<Value> {
        let seen_before = self.documents_seen > 0;
        self.documents_seen += 1;
        let changed = merge_properties(&mut self.properties, seen_before, document);
        // The first document always announces a schema, even an empty one.
        if changed || !seen_before {
            Some(self.to_json_schema())
        } else {
            None
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.properties.get(name)
    }

    pub fn documents_seen(&self) -> u64 {
        self.documents_seen
    }

    pub fn to_json_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": properties_to_json(&self.properties),
        })
    }
}
