//! DocumentStore - the remote, real-time document store collaborator.
//!
//! The store holds schemaless field maps under hierarchical paths and offers
//! four capabilities the rest of the crate relies on:
//!
//! - plain writes (`add_document`, `set_document`, `update_document`,
//!   `delete_document`), each checked against the store's access rules;
//! - reads and ordered collection queries;
//! - single-document read-modify-write transactions with optimistic
//!   concurrency. A conflicting commit is retried by the store itself, up to
//!   its retry budget; callers never loop;
//! - live queries that deliver a full snapshot whenever the result changes.
//!
//! [`InMemoryDocumentStore`] implements all of this in-process.

mod clock;
mod in_memory;
mod rules;
mod subscription;

use async_trait::async_trait;

use crate::document::{
    CollectionPath, DocumentPath, DocumentSnapshot, DocumentWrite, Fields, OrderBy, QuerySnapshot,
};
use crate::error::StoreError;

pub use clock::{Clock, SteppingClock, SystemClock};
pub use in_memory::{InMemoryDocumentStore, DEFAULT_MAX_TRANSACTION_ATTEMPTS};
pub use rules::{AccessRequest, AccessRules, AllowAll, BooksnapRules};
pub use subscription::{QuerySubscription, SubscriptionFeed};

/// Returned by a transaction body to abort without retrying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionAbort {
    pub reason: String,
}

impl TransactionAbort {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Body of a single-document transaction.
///
/// Receives the current document (`None` if it does not exist) and returns
/// the fields to merge into it. The store may call it several times if the
/// document changes between read and commit.
pub type TransactionFn =
    dyn Fn(Option<&DocumentSnapshot>) -> Result<Fields, TransactionAbort> + Send + Sync;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create a document with a store-assigned id.
    async fn add_document(
        &self,
        collection: &CollectionPath,
        write: DocumentWrite,
    ) -> Result<DocumentPath, StoreError>;

    /// Create or overwrite a document. With `merge`, existing fields not in
    /// the write are kept.
    async fn set_document(
        &self,
        path: &DocumentPath,
        write: DocumentWrite,
        merge: bool,
    ) -> Result<(), StoreError>;

    /// Merge fields into an existing document. Fails with `NotFound` if the
    /// document does not exist.
    async fn update_document(
        &self,
        path: &DocumentPath,
        write: DocumentWrite,
    ) -> Result<(), StoreError>;

    /// Delete a document. Deleting a missing document succeeds.
    async fn delete_document(&self, path: &DocumentPath) -> Result<(), StoreError>;

    async fn get_document(
        &self,
        path: &DocumentPath,
    ) -> Result<Option<DocumentSnapshot>, StoreError>;

    async fn query_documents(
        &self,
        collection: &CollectionPath,
        order_by: &OrderBy,
    ) -> Result<QuerySnapshot, StoreError>;

    /// Run an optimistic read-modify-write transaction on one document.
    async fn run_transaction(
        &self,
        path: &DocumentPath,
        body: &TransactionFn,
    ) -> Result<(), StoreError>;

    /// Start a live query. The first snapshot is delivered as soon as it is
    /// available; dropping the subscription unsubscribes.
    fn subscribe(&self, collection: &CollectionPath, order_by: OrderBy) -> QuerySubscription;
}
