use std::fmt;

use serde::{Deserialize, Serialize};

/// The kind of store request that failed, as reported to access rules and
/// error-channel listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Get,
    List,
    Create,
    Update,
    Delete,
    /// Full overwrite of a document (set without merge).
    Write,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Get => "get",
            Operation::List => "list",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::Write => "write",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Schema and path failures at the typed document boundary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DocumentError {
    #[error("invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: &'static str },

    #[error("malformed document {path}: {reason}")]
    Malformed { path: String, reason: String },

    #[error("invalid document {path}: {reason}")]
    Invalid { path: String, reason: String },

    #[error("document serialization error: {0}")]
    Serde(String),
}

/// Failures reported by a [`DocumentStore`](crate::DocumentStore).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("missing or insufficient permissions: {operation} on {path}")]
    PermissionDenied { path: String, operation: Operation },

    #[error("document not found: {path}")]
    NotFound { path: String },

    #[error("transaction on {path} gave up after {attempts} conflicting attempts")]
    Contention { path: String, attempts: u32 },

    #[error("transaction on {path} aborted: {reason}")]
    Aborted { path: String, reason: String },

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, StoreError::PermissionDenied { .. })
    }
}

/// Failures from the external book-metadata and AI providers.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider returned status {status}")]
    Status { status: u16 },

    #[error("unexpected response shape: {0}")]
    Decode(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}
