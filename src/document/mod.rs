//! Documents - typed records at the store boundary.
//!
//! The store itself is schemaless: it holds JSON field maps under
//! hierarchical paths. Everything above the store works with typed records
//! that implement [`Document`]; they are parsed on read
//! ([`DocumentSnapshot::parse`]) and serialized and validated before write
//! ([`DocumentWrite::from_document`]).
//!
//! ## Example
//!
//! ```ignore
//! use booksnap::Document;
//!
//! #[derive(Clone, Serialize, Deserialize, Document)]
//! #[document(collection = "comments")]
//! struct Comment {
//!     id: String,
//!     text: String,
//! }
//!
//! let comment: Comment = snapshot.parse()?;
//! ```

mod path;

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::error::DocumentError;

pub use path::{CollectionPath, DocumentPath};

/// Field map of a stored document.
pub type Fields = serde_json::Map<String, Value>;

/// Trait for typed records stored in a collection.
pub trait Document: Serialize + DeserializeOwned + Clone + Send + Sync {
    /// Leaf collection name, e.g. `comments` in `books/{bookId}/comments`.
    const COLLECTION: &'static str;

    /// Returns the document identifier.
    fn id(&self) -> &str;

    /// Field-level validation run on both read and write.
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

/// A point-in-time read of one document.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSnapshot {
    pub path: DocumentPath,
    pub fields: Fields,
}

impl DocumentSnapshot {
    pub fn new(path: DocumentPath, fields: Fields) -> Self {
        Self { path, fields }
    }

    pub fn id(&self) -> &str {
        self.path.id()
    }

    /// Parse into a typed record. The path's id is injected as the `id`
    /// field, overriding any stored value.
    pub fn parse<T: Document>(&self) -> Result<T, DocumentError> {
        let mut fields = self.fields.clone();
        fields.insert("id".to_string(), Value::String(self.id().to_string()));

        let doc: T =
            serde_json::from_value(Value::Object(fields)).map_err(|e| DocumentError::Malformed {
                path: self.path.to_string(),
                reason: e.to_string(),
            })?;
        doc.validate().map_err(|reason| DocumentError::Invalid {
            path: self.path.to_string(),
            reason,
        })?;
        Ok(doc)
    }
}

/// A full, ordered result set of a collection query.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySnapshot {
    pub collection: CollectionPath,
    pub documents: Vec<DocumentSnapshot>,
}

impl QuerySnapshot {
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Parse every document, failing on the first malformed one.
    pub fn parse_all<T: Document>(&self) -> Result<Vec<T>, DocumentError> {
        self.documents.iter().map(DocumentSnapshot::parse).collect()
    }
}

/// Field data for a write, plus the fields the store must fill in with its
/// own clock at commit time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentWrite {
    fields: Fields,
    server_timestamps: Vec<String>,
}

impl DocumentWrite {
    pub fn new(fields: Fields) -> Self {
        Self {
            fields,
            server_timestamps: Vec::new(),
        }
    }

    /// Serialize any record that maps to a JSON object.
    pub fn from_serialize<T: Serialize>(value: &T) -> Result<Self, DocumentError> {
        match serde_json::to_value(value).map_err(|e| DocumentError::Serde(e.to_string()))? {
            Value::Object(fields) => Ok(Self::new(fields)),
            other => Err(DocumentError::Serde(format!(
                "expected an object, got {}",
                other
            ))),
        }
    }

    /// Validate and serialize a typed document. The `id` field is dropped;
    /// it lives in the path.
    pub fn from_document<T: Document>(doc: &T, path: &DocumentPath) -> Result<Self, DocumentError> {
        Self::validated(doc, path.to_string())
    }

    /// Like [`from_document`](Self::from_document), for a document the
    /// store has not assigned an id to yet.
    pub fn from_new_document<T: Document>(
        doc: &T,
        collection: &CollectionPath,
    ) -> Result<Self, DocumentError> {
        Self::validated(doc, collection.to_string())
    }

    fn validated<T: Document>(doc: &T, path: String) -> Result<Self, DocumentError> {
        doc.validate()
            .map_err(|reason| DocumentError::Invalid { path, reason })?;
        let mut write = Self::from_serialize(doc)?;
        write.fields.remove("id");
        Ok(write)
    }

    /// Mark a field to be filled with the store's commit time.
    pub fn server_timestamp(mut self, field: impl Into<String>) -> Self {
        let field = field.into();
        self.fields.remove(&field);
        self.server_timestamps.push(field);
        self
    }

    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    pub fn server_timestamp_fields(&self) -> &[String] {
        &self.server_timestamps
    }

    /// Field map as it will be committed at `now`.
    pub fn resolve(&self, now: DateTime<Utc>) -> Fields {
        let mut fields = self.fields.clone();
        for field in &self.server_timestamps {
            fields.insert(field.clone(), timestamp_value(now));
        }
        fields
    }
}

/// Timestamps are stored as epoch milliseconds.
pub fn timestamp_value(at: DateTime<Utc>) -> Value {
    Value::from(at.timestamp_millis())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// Single-field query ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

impl OrderBy {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Ascending,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Descending,
        }
    }

    /// Missing fields sort as null, before any value.
    pub fn compare(&self, a: &Fields, b: &Fields) -> Ordering {
        let ordering = compare_values(
            a.get(&self.field).unwrap_or(&Value::Null),
            b.get(&self.field).unwrap_or(&Value::Null),
        );
        match self.direction {
            Direction::Ascending => ordering,
            Direction::Descending => ordering.reverse(),
        }
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}
