use std::sync::Arc;

use serde_json::{json, Value};

use super::vote::apply_vote;
use super::{comments_path, Comment, NewComment, VoteType};
use crate::bus::{ErrorChannel, ErrorEvent};
use crate::document::{DocumentSnapshot, DocumentWrite, Fields};
use crate::error::{Operation, StoreError};
use crate::store::{DocumentStore, TransactionAbort};
use crate::submission::{Outcome, Submission};

/// Placeholder reported for vote fields: the exact sets a failed
/// transaction tried to write are not known.
const IN_TRANSACTION: &str = "(Updated in transaction)";

/// Creates, deletes and votes on comments.
///
/// Every mutation is submitted in the background and returns immediately.
/// Store failures are published on the error channel, never returned.
/// Invalid input (empty ids) is dropped silently.
#[derive(Clone)]
pub struct CommentRepository {
    store: Arc<dyn DocumentStore>,
    errors: ErrorChannel,
}

impl CommentRepository {
    pub fn new(store: Arc<dyn DocumentStore>, errors: ErrorChannel) -> Self {
        Self { store, errors }
    }

    pub fn errors(&self) -> &ErrorChannel {
        &self.errors
    }

    /// Post a comment or a reply. Resolves to the new comment's id.
    ///
    /// Replies must target an existing top-level comment; anything deeper is
    /// rejected before the write is sent.
    pub fn add_comment(&self, book_id: &str, payload: NewComment) -> Submission<String> {
        if book_id.is_empty() || payload.user_id.is_empty() {
            return Submission::skipped();
        }
        let Ok(collection) = comments_path(book_id) else {
            return Submission::skipped();
        };

        let parent_id = payload.parent_id.filter(|p| !p.is_empty());
        let comment = Comment {
            id: String::new(),
            user_id: payload.user_id,
            username: payload.username,
            user_avatar: payload.user_avatar,
            book_id: book_id.to_string(),
            parent_id: parent_id.clone(),
            text: payload.text,
            is_spoiler: payload.is_spoiler.unwrap_or(false),
            created_at: None,
            score: 0,
            upvotes: Vec::new(),
            downvotes: Vec::new(),
        };
        let write = match DocumentWrite::from_new_document(&comment, &collection) {
            Ok(write) => write.server_timestamp("createdAt"),
            Err(err) => {
                tracing::warn!(%collection, error = %err, "comment failed validation");
                return Submission::skipped();
            }
        };

        tracing::debug!(%collection, parent_id = ?parent_id, "submitting comment");
        let store = self.store.clone();
        let errors = self.errors.clone();
        Submission::spawn(async move {
            if let Some(parent_id) = &parent_id {
                let parent = match collection.doc(parent_id) {
                    Ok(path) => store.get_document(&path).await,
                    Err(err) => Err(StoreError::from(err)),
                };
                match parent {
                    Ok(Some(parent)) => {
                        if let Some(reason) = reply_target_problem(&parent) {
                            tracing::warn!(%collection, %parent_id, reason, "reply rejected");
                            return Outcome::Rejected(reason.to_string());
                        }
                    }
                    Ok(None) => {
                        tracing::warn!(
                            %collection,
                            %parent_id,
                            "reply to missing comment rejected"
                        );
                        return Outcome::Rejected("parent comment does not exist".into());
                    }
                    Err(err) => {
                        let path = format!("{}/{}", collection, parent_id);
                        let event = ErrorEvent::new(path, Operation::Get, &err);
                        errors.emit(event.clone());
                        return Outcome::Failed(event);
                    }
                }
            }

            match store.add_document(&collection, write.clone()).await {
                Ok(path) => Outcome::Committed(path.id().to_string()),
                Err(err) => {
                    let event = ErrorEvent::new(collection.to_string(), Operation::Create, &err)
                        .with_attempted_data(Value::Object(write.fields().clone()));
                    errors.emit(event.clone());
                    Outcome::Failed(event)
                }
            }
        })
    }

    /// Delete a comment. Only its author may; the store enforces that.
    pub fn delete_comment(&self, book_id: &str, comment_id: &str) -> Submission<()> {
        if book_id.is_empty() || comment_id.is_empty() {
            return Submission::skipped();
        }
        let Ok(path) = comments_path(book_id).and_then(|c| c.doc(comment_id)) else {
            return Submission::skipped();
        };

        tracing::debug!(%path, "submitting comment delete");
        let store = self.store.clone();
        let errors = self.errors.clone();
        Submission::spawn(async move {
            match store.delete_document(&path).await {
                Ok(()) => Outcome::Committed(()),
                Err(err) => {
                    let event = ErrorEvent::new(path.to_string(), Operation::Delete, &err);
                    errors.emit(event.clone());
                    Outcome::Failed(event)
                }
            }
        })
    }

    /// Toggle `user_id`'s vote on a comment inside a store transaction.
    ///
    /// A comment that no longer exists aborts the transaction; that and any
    /// other failure produce exactly one error event.
    pub fn handle_vote(
        &self,
        book_id: &str,
        comment_id: &str,
        user_id: &str,
        vote: VoteType,
    ) -> Submission<()> {
        if book_id.is_empty() || comment_id.is_empty() || user_id.is_empty() {
            return Submission::skipped();
        }
        let Ok(path) = comments_path(book_id).and_then(|c| c.doc(comment_id)) else {
            return Submission::skipped();
        };

        tracing::debug!(%path, user_id, ?vote, "submitting vote");
        let store = self.store.clone();
        let errors = self.errors.clone();
        let user_id = user_id.to_string();
        Submission::spawn(async move {
            let body =
                move |current: Option<&DocumentSnapshot>| vote_update(current, &user_id, vote);
            match store.run_transaction(&path, &body).await {
                Ok(()) => Outcome::Committed(()),
                Err(err) => {
                    let event = ErrorEvent::new(path.to_string(), Operation::Update, &err)
                        .with_attempted_data(json!({
                            "upvotes": IN_TRANSACTION,
                            "downvotes": IN_TRANSACTION,
                            "score": IN_TRANSACTION,
                        }));
                    errors.emit(event.clone());
                    Outcome::Failed(event)
                }
            }
        })
    }
}

/// Transaction body for a vote. A missing or malformed comment aborts.
fn vote_update(
    current: Option<&DocumentSnapshot>,
    user_id: &str,
    vote: VoteType,
) -> Result<Fields, TransactionAbort> {
    let current = current.ok_or_else(|| TransactionAbort::new("Document does not exist!"))?;
    let comment = current
        .parse::<Comment>()
        .map_err(|err| TransactionAbort::new(err.to_string()))?;
    Ok(apply_vote(&comment.votes(), user_id, vote).to_update())
}

/// Why `parent` cannot take replies, if it cannot.
fn reply_target_problem(parent: &DocumentSnapshot) -> Option<&'static str> {
    match parent.parse::<Comment>() {
        Ok(comment) if comment.is_reply() => Some("replies to replies are not supported"),
        Ok(_) => None,
        Err(_) => Some("parent comment is malformed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::ErrorLog;
    use crate::store::{AccessRequest, InMemoryDocumentStore};
    use crate::document::OrderBy;

    fn setup() -> (Arc<InMemoryDocumentStore>, CommentRepository, ErrorLog) {
        let store = Arc::new(InMemoryDocumentStore::new());
        let errors = ErrorChannel::new();
        let log = ErrorLog::new();
        // Registered for the channel's whole life.
        errors.subscribe({
            let log = log.clone();
            move |event| log.record(event)
        });
        let repo = CommentRepository::new(store.clone(), errors);
        (store, repo, log)
    }

    async fn stored(store: &InMemoryDocumentStore, book_id: &str) -> Vec<Comment> {
        store
            .query_documents(&comments_path(book_id).unwrap(), &OrderBy::asc("createdAt"))
            .await
            .unwrap()
            .parse_all()
            .unwrap()
    }

    #[tokio::test]
    async fn add_comment_normalizes_payload() {
        let (store, repo, log) = setup();
        let id = repo
            .add_comment("b1", NewComment::new("alice", "Alice", "Great book"))
            .wait()
            .await
            .committed()
            .unwrap();

        let comments = stored(&store, "b1").await;
        assert_eq!(comments.len(), 1);
        let comment = &comments[0];
        assert_eq!(comment.id, id);
        assert_eq!(comment.book_id, "b1");
        assert_eq!(comment.parent_id, None);
        assert_eq!(comment.score, 0);
        assert!(comment.upvotes.is_empty() && comment.downvotes.is_empty());
        assert!(!comment.is_spoiler);
        assert!(comment.created_at.is_some());
        assert!(log.is_empty());
    }

    #[tokio::test]
    async fn empty_ids_are_skipped() {
        let (store, repo, log) = setup();
        assert_eq!(
            repo.add_comment("", NewComment::new("alice", "Alice", "x")).wait().await,
            Outcome::Skipped
        );
        assert_eq!(
            repo.add_comment("b1", NewComment::new("", "Anon", "x")).wait().await,
            Outcome::Skipped
        );
        assert_eq!(repo.delete_comment("b1", "").wait().await, Outcome::Skipped);
        assert_eq!(
            repo.handle_vote("b1", "c1", "", VoteType::Up).wait().await,
            Outcome::Skipped
        );
        assert_eq!(store.document_count(&comments_path("b1").unwrap()), 0);
        assert!(log.is_empty());
    }

    #[tokio::test]
    async fn empty_parent_id_posts_top_level() {
        let (store, repo, _log) = setup();
        repo.add_comment("b1", NewComment::new("a", "A", "x").reply_to(""))
            .wait()
            .await;
        assert_eq!(stored(&store, "b1").await[0].parent_id, None);
    }

    #[tokio::test]
    async fn reply_to_reply_is_rejected() {
        let (store, repo, log) = setup();
        let root = repo
            .add_comment("b1", NewComment::new("a", "A", "root"))
            .wait()
            .await
            .committed()
            .unwrap();
        let reply = repo
            .add_comment("b1", NewComment::new("b", "B", "reply").reply_to(&root))
            .wait()
            .await
            .committed()
            .unwrap();

        let nested = repo
            .add_comment("b1", NewComment::new("c", "C", "nested").reply_to(&reply))
            .wait()
            .await;
        assert!(matches!(nested, Outcome::Rejected(_)));

        let missing = repo
            .add_comment("b1", NewComment::new("c", "C", "lost").reply_to("nope"))
            .wait()
            .await;
        assert!(matches!(missing, Outcome::Rejected(_)));

        assert_eq!(stored(&store, "b1").await.len(), 2);
        assert!(log.is_empty());
    }

    #[tokio::test]
    async fn rejected_create_reports_attempted_data() {
        let store = Arc::new(InMemoryDocumentStore::new().with_rules(
            |request: &AccessRequest<'_>| request.operation != Operation::Create,
        ));
        let errors = ErrorChannel::new();
        let log = ErrorLog::new();
        let _guard = log.attach(&errors);
        let repo = CommentRepository::new(store, errors);

        let outcome = repo
            .add_comment("b1", NewComment::new("alice", "Alice", "hi"))
            .wait()
            .await;
        assert!(matches!(outcome, Outcome::Failed(_)));

        let events = log.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].path, "books/b1/comments");
        assert_eq!(events[0].operation, Operation::Create);
        let data = events[0].attempted_data.as_ref().unwrap();
        assert_eq!(data["text"], "hi");
        assert_eq!(data["score"], 0);
    }

    #[tokio::test]
    async fn vote_updates_sets_and_score() {
        let (store, repo, _log) = setup();
        let id = repo
            .add_comment("b1", NewComment::new("alice", "Alice", "hi"))
            .wait()
            .await
            .committed()
            .unwrap();

        repo.handle_vote("b1", &id, "bob", VoteType::Up).wait().await;
        repo.handle_vote("b1", &id, "carol", VoteType::Down).wait().await;
        repo.handle_vote("b1", &id, "dave", VoteType::Up).wait().await;

        let comment = &stored(&store, "b1").await[0];
        assert_eq!(comment.upvotes, vec!["bob".to_string(), "dave".to_string()]);
        assert_eq!(comment.downvotes, vec!["carol".to_string()]);
        assert_eq!(comment.score, 1);
    }

    #[tokio::test]
    async fn vote_on_missing_comment_reports_update() {
        let (_store, repo, log) = setup();
        let outcome = repo.handle_vote("b1", "gone", "bob", VoteType::Up).wait().await;
        assert!(matches!(outcome, Outcome::Failed(_)));

        let events = log.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].path, "books/b1/comments/gone");
        assert_eq!(events[0].operation, Operation::Update);
        assert_eq!(
            events[0].attempted_data.as_ref().unwrap()["score"],
            IN_TRANSACTION
        );
    }

    #[tokio::test]
    async fn stored_comment_has_exactly_the_schema_fields() {
        let (store, repo, _log) = setup();
        let id = repo
            .add_comment("b1", NewComment::new("alice", "Alice", "hi").spoiler(true))
            .wait()
            .await
            .committed()
            .unwrap();

        let path = comments_path("b1").unwrap().doc(&id).unwrap();
        let stored = store.get_document(&path).await.unwrap().unwrap();
        let mut keys: Vec<&str> = stored.fields.keys().map(String::as_str).collect();
        keys.sort();
        assert_eq!(
            keys,
            vec![
                "bookId", "createdAt", "downvotes", "isSpoiler", "parentId", "score", "text",
                "upvotes", "userAvatar", "userId", "username",
            ]
        );
        assert_eq!(stored.fields["parentId"], Value::Null);
        assert_eq!(stored.fields["isSpoiler"], json!(true));
        assert!(stored.fields["createdAt"].is_i64());
    }

    #[tokio::test]
    async fn vote_on_malformed_comment_aborts_untouched() {
        let (store, repo, log) = setup();
        let path = comments_path("b1").unwrap().doc("c1").unwrap();
        let malformed = json!({ "userId": "alice", "text": "hi", "upvotes": "bob" });
        store
            .set_document(&path, DocumentWrite::new(malformed.as_object().cloned().unwrap()), false)
            .await
            .unwrap();
        let version = store.version_of(&path);

        let outcome = repo.handle_vote("b1", "c1", "carol", VoteType::Up).wait().await;
        assert!(matches!(outcome, Outcome::Failed(_)));
        assert_eq!(store.version_of(&path), version);

        let events = log.events();
        assert_eq!(events.len(), 1);
        assert!(events[0].cause.contains("aborted"));
        let stored = store.get_document(&path).await.unwrap().unwrap();
        assert_eq!(stored.fields["upvotes"], json!("bob"));
    }
}
