//! Shared fixtures for the discussion suite.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use booksnap::discussion::comments_path;
use booksnap::{
    AccessRules, Comment, CommentRepository, DiscussionState, DiscussionViewModel, DocumentStore,
    ErrorChannel, ErrorLog, InMemoryDocumentStore, NewComment, OrderBy,
};

pub const BOOK: &str = "OL45804W";

/// A store, a repository writing to it and a log of every error event.
pub struct Fixture {
    pub store: Arc<InMemoryDocumentStore>,
    pub repo: CommentRepository,
    pub log: ErrorLog,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_store(InMemoryDocumentStore::new())
    }

    pub fn with_rules(rules: impl AccessRules + 'static) -> Self {
        Self::with_store(InMemoryDocumentStore::new().with_rules(rules))
    }

    pub fn with_store(store: InMemoryDocumentStore) -> Self {
        init_tracing();
        let store = Arc::new(store);
        let errors = ErrorChannel::new();
        let log = ErrorLog::new();
        errors.subscribe({
            let log = log.clone();
            move |event| log.record(event)
        });
        let repo = CommentRepository::new(store.clone(), errors);
        Self { store, repo, log }
    }

    /// Post a top-level comment and return its id.
    pub async fn post(&self, user: &str, text: &str) -> String {
        self.repo
            .add_comment(BOOK, NewComment::new(user, user, text))
            .wait()
            .await
            .committed()
            .expect("comment should be committed")
    }

    pub async fn reply(&self, user: &str, parent: &str, text: &str) -> String {
        self.repo
            .add_comment(BOOK, NewComment::new(user, user, text).reply_to(parent))
            .wait()
            .await
            .committed()
            .expect("reply should be committed")
    }

    pub async fn comment(&self, id: &str) -> Option<Comment> {
        let path = comments_path(BOOK).unwrap().doc(id).unwrap();
        self.store
            .get_document(&path)
            .await
            .unwrap()
            .map(|snapshot| snapshot.parse().unwrap())
    }

    pub async fn comments(&self) -> Vec<Comment> {
        self.store
            .query_documents(&comments_path(BOOK).unwrap(), &OrderBy::asc("createdAt"))
            .await
            .unwrap()
            .parse_all()
            .unwrap()
    }

    pub fn count(&self) -> usize {
        self.store.document_count(&comments_path(BOOK).unwrap())
    }
}

/// Route store and repository logs to the test output.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// Wait until the view model's state satisfies `ready`.
pub async fn state_where(
    view: &DiscussionViewModel,
    ready: impl FnMut(&DiscussionState) -> bool,
) -> DiscussionState {
    let mut rx = view.watch();
    let state = tokio::time::timeout(Duration::from_secs(2), rx.wait_for(ready))
        .await
        .expect("timed out waiting for discussion state")
        .expect("view model stopped");
    state.clone()
}
