use std::fmt;

use crate::error::DocumentError;

/// Path to a collection, e.g. `books/OL45883W/comments`.
///
/// Collection paths always have an odd number of segments; none may be empty
/// or contain `/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollectionPath(String);

impl CollectionPath {
    pub fn new(segments: &[&str]) -> Result<Self, DocumentError> {
        let joined = segments.join("/");
        if segments.len() % 2 == 0 {
            return Err(DocumentError::InvalidPath {
                path: joined,
                reason: "collection paths need an odd number of segments",
            });
        }
        validate_segments(segments, &joined)?;
        Ok(CollectionPath(joined))
    }

    /// Reference a document inside this collection.
    pub fn doc(&self, id: &str) -> Result<DocumentPath, DocumentError> {
        validate_segments(&[id], &format!("{}/{}", self.0, id))?;
        Ok(DocumentPath {
            collection: self.clone(),
            id: id.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The last segment, e.g. `comments`.
    pub fn name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Path to a single document, e.g. `books/OL45883W/comments/abc123`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentPath {
    collection: CollectionPath,
    id: String,
}

impl DocumentPath {
    pub fn collection(&self) -> &CollectionPath {
        &self.collection
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

fn validate_segments(segments: &[&str], path: &str) -> Result<(), DocumentError> {
    for segment in segments {
        if segment.is_empty() {
            return Err(DocumentError::InvalidPath {
                path: path.to_string(),
                reason: "empty path segment",
            });
        }
        if segment.contains('/') {
            return Err(DocumentError::InvalidPath {
                path: path.to_string(),
                reason: "path segment contains '/'",
            });
        }
    }
    Ok(())
}
