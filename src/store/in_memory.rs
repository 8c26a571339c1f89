//! InMemoryDocumentStore - HashMap-backed document store for tests and
//! single-process use.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;
use uuid::Uuid;

use super::clock::{Clock, SystemClock};
use super::rules::{AccessRequest, AccessRules, AllowAll};
use super::subscription::{QuerySubscription, SubscriptionFeed};
use super::{DocumentStore, TransactionFn};
use crate::config::StoreConfig;
use crate::document::{
    CollectionPath, DocumentPath, DocumentSnapshot, DocumentWrite, Fields, OrderBy, QuerySnapshot,
};
use crate::error::{Operation, StoreError};

/// Transaction attempts before giving up on a contended document.
pub const DEFAULT_MAX_TRANSACTION_ATTEMPTS: u32 = 5;

struct StoredDocument {
    fields: Fields,
    version: u64,
    /// Creation order, used to break ordering ties.
    seq: u64,
}

struct Watcher {
    collection: CollectionPath,
    order_by: OrderBy,
    feed: SubscriptionFeed,
}

enum CommitResult {
    Committed,
    Conflict { expected: Option<u64>, actual: Option<u64> },
}

/// In-memory document store.
///
/// Every document carries a version that increases on each write.
/// Transactions remember the version they read and only commit if it is
/// unchanged; otherwise the body is re-run against the fresh document, up to
/// `max_transaction_attempts` times.
pub struct InMemoryDocumentStore {
    collections: RwLock<HashMap<CollectionPath, HashMap<String, StoredDocument>>>,
    watchers: Mutex<Vec<Watcher>>,
    auth: RwLock<Option<String>>,
    available: AtomicBool,
    seq: AtomicU64,
    rules: Box<dyn AccessRules>,
    clock: Box<dyn Clock>,
    max_transaction_attempts: u32,
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryDocumentStore {
    /// Create an empty store that allows every request.
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            watchers: Mutex::new(Vec::new()),
            auth: RwLock::new(None),
            available: AtomicBool::new(true),
            seq: AtomicU64::new(1),
            rules: Box::new(AllowAll),
            clock: Box::new(SystemClock),
            max_transaction_attempts: DEFAULT_MAX_TRANSACTION_ATTEMPTS,
        }
    }

    /// Set the access rules evaluated on every request.
    pub fn with_rules(mut self, rules: impl AccessRules + 'static) -> Self {
        self.rules = Box::new(rules);
        self
    }

    /// Set the clock used for server timestamps.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Set the transaction retry budget (at least one attempt).
    pub fn with_max_transaction_attempts(mut self, attempts: u32) -> Self {
        self.max_transaction_attempts = attempts.max(1);
        self
    }

    /// Apply the store section of [`Config`](crate::config::Config).
    pub fn with_config(self, config: &StoreConfig) -> Self {
        self.with_max_transaction_attempts(config.max_transaction_attempts)
    }

    pub fn max_transaction_attempts(&self) -> u32 {
        self.max_transaction_attempts
    }

    /// Act as the given user for subsequent requests.
    pub fn sign_in(&self, user_id: impl Into<String>) {
        if let Ok(mut auth) = self.auth.write() {
            *auth = Some(user_id.into());
        }
    }

    pub fn sign_out(&self) {
        if let Ok(mut auth) = self.auth.write() {
            *auth = None;
        }
    }

    /// Simulate losing or regaining the connection. While unavailable every
    /// request fails and live queries receive an error.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
        self.notify_all();
    }

    /// Number of documents in a collection.
    pub fn document_count(&self, collection: &CollectionPath) -> usize {
        self.collections
            .read()
            .map(|c| c.get(collection).map(HashMap::len).unwrap_or(0))
            .unwrap_or(0)
    }

    /// Current version of a document, if it exists.
    pub fn version_of(&self, path: &DocumentPath) -> Option<u64> {
        let collections = self.collections.read().ok()?;
        collections
            .get(path.collection())
            .and_then(|docs| docs.get(path.id()))
            .map(|doc| doc.version)
    }

    /// Number of live queries still attached.
    pub fn subscriber_count(&self) -> usize {
        self.watchers
            .lock()
            .map(|mut watchers| {
                watchers.retain(|w| !w.feed.is_closed());
                watchers.len()
            })
            .unwrap_or(0)
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("client is offline".into()))
        }
    }

    fn current_auth(&self) -> Option<String> {
        self.auth.read().ok().and_then(|auth| auth.clone())
    }

    fn authorize(
        &self,
        operation: Operation,
        collection: &CollectionPath,
        document_id: Option<&str>,
        resource: Option<&Fields>,
        request_data: Option<&Fields>,
    ) -> Result<(), StoreError> {
        let auth = self.current_auth();
        let request = AccessRequest {
            operation,
            collection,
            document_id,
            auth: auth.as_deref(),
            resource,
            request_data,
        };
        if self.rules.allows(&request) {
            return Ok(());
        }
        let path = match document_id {
            Some(id) => format!("{}/{}", collection, id),
            None => collection.to_string(),
        };
        tracing::debug!(%path, %operation, auth = ?auth, "request denied by access rules");
        Err(StoreError::PermissionDenied { path, operation })
    }

    fn read_versioned(
        &self,
        path: &DocumentPath,
    ) -> Result<(Option<DocumentSnapshot>, Option<u64>), StoreError> {
        let collections = self
            .collections
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".into()))?;
        let stored = collections
            .get(path.collection())
            .and_then(|docs| docs.get(path.id()));
        self.authorize(
            Operation::Get,
            path.collection(),
            Some(path.id()),
            stored.map(|doc| &doc.fields),
            None,
        )?;
        Ok(match stored {
            Some(doc) => (
                Some(DocumentSnapshot::new(path.clone(), doc.fields.clone())),
                Some(doc.version),
            ),
            None => (None, None),
        })
    }

    fn try_commit(
        &self,
        path: &DocumentPath,
        expected: Option<u64>,
        update: &Fields,
    ) -> Result<CommitResult, StoreError> {
        let mut collections = self
            .collections
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".into()))?;
        let stored = collections
            .get_mut(path.collection())
            .and_then(|docs| docs.get_mut(path.id()));

        let actual = stored.as_ref().map(|doc| doc.version);
        if actual != expected {
            return Ok(CommitResult::Conflict { expected, actual });
        }
        let doc = stored.ok_or_else(|| StoreError::NotFound {
            path: path.to_string(),
        })?;

        self.authorize(
            Operation::Update,
            path.collection(),
            Some(path.id()),
            Some(&doc.fields),
            Some(update),
        )?;
        for (key, value) in update {
            doc.fields.insert(key.clone(), value.clone());
        }
        doc.version += 1;
        Ok(CommitResult::Committed)
    }

    fn snapshot_of(
        &self,
        collection: &CollectionPath,
        order_by: &OrderBy,
    ) -> Result<QuerySnapshot, StoreError> {
        self.check_available()?;
        self.authorize(Operation::List, collection, None, None, None)?;

        let collections = self
            .collections
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".into()))?;
        let mut docs: Vec<(&String, &StoredDocument)> = collections
            .get(collection)
            .map(|docs| docs.iter().collect())
            .unwrap_or_default();
        docs.sort_by(|(_, a), (_, b)| {
            order_by
                .compare(&a.fields, &b.fields)
                .then_with(|| a.seq.cmp(&b.seq))
        });

        let mut documents = Vec::with_capacity(docs.len());
        for (id, doc) in docs {
            documents.push(DocumentSnapshot::new(collection.doc(id)?, doc.fields.clone()));
        }
        Ok(QuerySnapshot {
            collection: collection.clone(),
            documents,
        })
    }

    /// Push a fresh snapshot to every live query on `collection`.
    fn notify(&self, collection: &CollectionPath) {
        let Ok(mut watchers) = self.watchers.lock() else {
            return;
        };
        watchers.retain(|w| !w.feed.is_closed());
        for watcher in watchers.iter().filter(|w| &w.collection == collection) {
            watcher
                .feed
                .deliver(self.snapshot_of(&watcher.collection, &watcher.order_by));
        }
    }

    fn notify_all(&self) {
        let Ok(mut watchers) = self.watchers.lock() else {
            return;
        };
        watchers.retain(|w| !w.feed.is_closed());
        for watcher in watchers.iter() {
            watcher
                .feed
                .deliver(self.snapshot_of(&watcher.collection, &watcher.order_by));
        }
    }

    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn add_document(
        &self,
        collection: &CollectionPath,
        write: DocumentWrite,
    ) -> Result<DocumentPath, StoreError> {
        self.check_available()?;
        let path = collection.doc(&Uuid::new_v4().simple().to_string())?;
        let fields = write.resolve(self.clock.now());
        self.authorize(
            Operation::Create,
            collection,
            Some(path.id()),
            None,
            Some(&fields),
        )?;

        {
            let mut collections = self
                .collections
                .write()
                .map_err(|_| StoreError::Unavailable("lock poisoned".into()))?;
            collections.entry(collection.clone()).or_default().insert(
                path.id().to_string(),
                StoredDocument {
                    fields,
                    version: 1,
                    seq: self.next_seq(),
                },
            );
        }
        tracing::debug!(path = %path, "document created");
        self.notify(collection);
        Ok(path)
    }

    async fn set_document(
        &self,
        path: &DocumentPath,
        write: DocumentWrite,
        merge: bool,
    ) -> Result<(), StoreError> {
        self.check_available()?;
        let incoming = write.resolve(self.clock.now());
        {
            let mut collections = self
                .collections
                .write()
                .map_err(|_| StoreError::Unavailable("lock poisoned".into()))?;
            let docs = collections.entry(path.collection().clone()).or_default();

            match docs.get_mut(path.id()) {
                Some(doc) => {
                    let operation = if merge { Operation::Update } else { Operation::Write };
                    self.authorize(
                        operation,
                        path.collection(),
                        Some(path.id()),
                        Some(&doc.fields),
                        Some(&incoming),
                    )?;
                    if merge {
                        for (key, value) in incoming {
                            doc.fields.insert(key, value);
                        }
                    } else {
                        doc.fields = incoming;
                    }
                    doc.version += 1;
                }
                None => {
                    self.authorize(
                        Operation::Create,
                        path.collection(),
                        Some(path.id()),
                        None,
                        Some(&incoming),
                    )?;
                    let seq = self.next_seq();
                    docs.insert(
                        path.id().to_string(),
                        StoredDocument {
                            fields: incoming,
                            version: 1,
                            seq,
                        },
                    );
                }
            }
        }
        tracing::debug!(%path, merge, "document set");
        self.notify(path.collection());
        Ok(())
    }

    async fn update_document(
        &self,
        path: &DocumentPath,
        write: DocumentWrite,
    ) -> Result<(), StoreError> {
        self.check_available()?;
        let incoming = write.resolve(self.clock.now());
        {
            let mut collections = self
                .collections
                .write()
                .map_err(|_| StoreError::Unavailable("lock poisoned".into()))?;
            let doc = collections
                .get_mut(path.collection())
                .and_then(|docs| docs.get_mut(path.id()))
                .ok_or_else(|| StoreError::NotFound {
                    path: path.to_string(),
                })?;
            self.authorize(
                Operation::Update,
                path.collection(),
                Some(path.id()),
                Some(&doc.fields),
                Some(&incoming),
            )?;
            for (key, value) in incoming {
                doc.fields.insert(key, value);
            }
            doc.version += 1;
        }
        tracing::debug!(%path, "document updated");
        self.notify(path.collection());
        Ok(())
    }

    async fn delete_document(&self, path: &DocumentPath) -> Result<(), StoreError> {
        self.check_available()?;
        let removed = {
            let mut collections = self
                .collections
                .write()
                .map_err(|_| StoreError::Unavailable("lock poisoned".into()))?;
            let docs = collections.get_mut(path.collection());
            let resource = docs
                .as_ref()
                .and_then(|docs| docs.get(path.id()))
                .map(|doc| &doc.fields);
            self.authorize(
                Operation::Delete,
                path.collection(),
                Some(path.id()),
                resource,
                None,
            )?;
            docs.and_then(|docs| docs.remove(path.id())).is_some()
        };
        tracing::debug!(%path, removed, "document deleted");
        if removed {
            self.notify(path.collection());
        }
        Ok(())
    }

    async fn get_document(
        &self,
        path: &DocumentPath,
    ) -> Result<Option<DocumentSnapshot>, StoreError> {
        self.check_available()?;
        let (snapshot, _) = self.read_versioned(path)?;
        Ok(snapshot)
    }

    async fn query_documents(
        &self,
        collection: &CollectionPath,
        order_by: &OrderBy,
    ) -> Result<QuerySnapshot, StoreError> {
        self.snapshot_of(collection, order_by)
    }

    async fn run_transaction(
        &self,
        path: &DocumentPath,
        body: &TransactionFn,
    ) -> Result<(), StoreError> {
        for attempt in 1..=self.max_transaction_attempts {
            self.check_available()?;
            let (current, expected) = self.read_versioned(path)?;
            let update = body(current.as_ref()).map_err(|abort| StoreError::Aborted {
                path: path.to_string(),
                reason: abort.reason,
            })?;

            // Commit round-trip; concurrent transactions may land in between.
            tokio::task::yield_now().await;

            match self.try_commit(path, expected, &update)? {
                CommitResult::Committed => {
                    tracing::debug!(%path, attempt, "transaction committed");
                    self.notify(path.collection());
                    return Ok(());
                }
                CommitResult::Conflict { expected, actual } => {
                    tracing::trace!(
                        %path,
                        attempt,
                        ?expected,
                        ?actual,
                        "transaction conflict, retrying"
                    );
                }
            }
        }

        tracing::warn!(%path, attempts = self.max_transaction_attempts, "transaction gave up");
        Err(StoreError::Contention {
            path: path.to_string(),
            attempts: self.max_transaction_attempts,
        })
    }

    fn subscribe(&self, collection: &CollectionPath, order_by: OrderBy) -> QuerySubscription {
        let (feed, subscription) = SubscriptionFeed::channel();
        // First snapshot and registration both happen under the lock
        // `notify` takes.
        match self.watchers.lock() {
            Ok(mut watchers) => {
                feed.deliver(self.snapshot_of(collection, &order_by));
                watchers.push(Watcher {
                    collection: collection.clone(),
                    order_by,
                    feed,
                });
            }
            Err(_) => {
                feed.deliver(Err(StoreError::Unavailable("lock poisoned".into())));
            }
        }
        tracing::info!(%collection, "live query attached");
        subscription
    }
}
