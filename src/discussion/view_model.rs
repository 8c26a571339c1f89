use std::sync::Arc;

use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;

use super::{comments_path, Comment, CommentThreads};
use crate::document::{OrderBy, QuerySnapshot};
use crate::error::StoreError;
use crate::store::DocumentStore;

/// What the discussion UI renders.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiscussionState {
    /// True until the first snapshot (or error) arrives.
    pub is_loading: bool,
    /// Last failure, cleared by the next good snapshot. The previous threads
    /// stay visible while it is set.
    pub error: Option<String>,
    pub threads: CommentThreads,
}

/// Live, threaded view of one book's comments.
///
/// Subscribes to `books/{bookId}/comments` ordered by `createdAt` and
/// rebuilds [`CommentThreads`] from every full snapshot. Dropping the view
/// model ends the subscription.
pub struct DiscussionViewModel {
    state: watch::Receiver<DiscussionState>,
    refetch: Arc<Notify>,
    task: Option<JoinHandle<()>>,
}

impl DiscussionViewModel {
    /// Start observing `book_id`. An empty id yields an idle, empty view.
    /// Must be called within a tokio runtime.
    pub fn new(store: Arc<dyn DocumentStore>, book_id: &str) -> Self {
        let refetch = Arc::new(Notify::new());
        let collection = match comments_path(book_id) {
            Ok(collection) if !book_id.is_empty() => collection,
            _ => {
                let (_tx, rx) = watch::channel(DiscussionState::default());
                return Self {
                    state: rx,
                    refetch,
                    task: None,
                };
            }
        };

        let (tx, rx) = watch::channel(DiscussionState {
            is_loading: true,
            ..Default::default()
        });
        let order_by = OrderBy::asc("createdAt");
        let mut subscription = store.subscribe(&collection, order_by.clone());
        let notify = refetch.clone();

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    next = subscription.next() => match next {
                        Some(result) => apply(&tx, result),
                        None => break,
                    },
                    _ = notify.notified() => {
                        tracing::debug!(%collection, "refetching comments");
                        apply(&tx, store.query_documents(&collection, &order_by).await);
                    }
                }
            }
            tracing::info!(%collection, "comment subscription ended");
        });

        Self {
            state: rx,
            refetch,
            task: Some(task),
        }
    }

    /// Current state.
    pub fn state(&self) -> DiscussionState {
        self.state.borrow().clone()
    }

    /// A receiver that is notified on every state change.
    pub fn watch(&self) -> watch::Receiver<DiscussionState> {
        self.state.clone()
    }

    /// Re-read the collection now instead of waiting for the next snapshot.
    pub fn force_refetch(&self) {
        self.refetch.notify_one();
    }
}

impl Drop for DiscussionViewModel {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

fn apply(tx: &watch::Sender<DiscussionState>, result: Result<QuerySnapshot, StoreError>) {
    let parsed = result
        .and_then(|snapshot| snapshot.parse_all::<Comment>().map_err(StoreError::from));
    tx.send_modify(|state| {
        state.is_loading = false;
        match parsed {
            Ok(comments) => {
                state.error = None;
                state.threads = CommentThreads::build(comments);
            }
            Err(err) => {
                tracing::warn!(error = %err, "comment snapshot rejected");
                state.error = Some(err.to_string());
            }
        }
    });
}
