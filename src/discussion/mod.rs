//! Discussion - threaded, votable comments on a book.
//!
//! Comments live at `books/{bookId}/comments/{commentId}`. They are created
//! and deleted through [`CommentRepository`], mutated only by voting, and
//! observed through [`DiscussionViewModel`], which turns each live snapshot
//! into sorted [`CommentThreads`].
//!
//! ## Example
//!
//! ```ignore
//! let repo = CommentRepository::new(store.clone(), errors.clone());
//! repo.add_comment("OL1W", NewComment::new("alice", "Alice", "Loved it"));
//!
//! let view = DiscussionViewModel::new(store, "OL1W");
//! let state = view.state();
//! for comment in state.threads.top_level() { /* ... */ }
//! ```

mod repository;
mod threads;
mod view_model;
mod vote;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::document::CollectionPath;
use crate::error::DocumentError;
use crate::Document;

pub use repository::CommentRepository;
pub use threads::CommentThreads;
pub use view_model::{DiscussionState, DiscussionViewModel};
pub use vote::{apply_vote, VoteState, Votes};

/// A discussion post or a reply to one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Document)]
#[document(collection = "comments", validate = "Comment::check")]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    #[serde(default)]
    pub id: String,
    pub user_id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub user_avatar: String,
    #[serde(default)]
    pub book_id: String,
    /// `None` for top-level comments.
    #[serde(default, deserialize_with = "empty_as_none")]
    pub parent_id: Option<String>,
    pub text: String,
    #[serde(default)]
    pub is_spoiler: bool,
    /// Filled in by the store at commit time.
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub upvotes: Vec<String>,
    #[serde(default)]
    pub downvotes: Vec<String>,
}

impl Comment {
    pub fn is_reply(&self) -> bool {
        self.parent_id.is_some()
    }

    /// Creation time in epoch millis; comments not yet timestamped sort as 0.
    pub fn created_millis(&self) -> i64 {
        self.created_at.map(|t| t.timestamp_millis()).unwrap_or(0)
    }

    pub fn votes(&self) -> Votes {
        Votes {
            upvotes: self.upvotes.clone(),
            downvotes: self.downvotes.clone(),
        }
    }

    pub fn vote_of(&self, user_id: &str) -> VoteState {
        self.votes().vote_of(user_id)
    }

    fn check(&self) -> Result<(), String> {
        if self.user_id.is_empty() {
            return Err("userId must not be empty".into());
        }
        if let Some(user) = self.upvotes.iter().find(|u| self.downvotes.contains(u)) {
            return Err(format!("{} appears in both upvotes and downvotes", user));
        }
        Ok(())
    }
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()))
}

/// Payload for a new comment or reply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewComment {
    pub user_id: String,
    pub username: String,
    pub user_avatar: String,
    pub text: String,
    pub parent_id: Option<String>,
    pub is_spoiler: Option<bool>,
}

impl NewComment {
    pub fn new(
        user_id: impl Into<String>,
        username: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            username: username.into(),
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_avatar(mut self, avatar: impl Into<String>) -> Self {
        self.user_avatar = avatar.into();
        self
    }

    pub fn reply_to(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn spoiler(mut self, is_spoiler: bool) -> Self {
        self.is_spoiler = Some(is_spoiler);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteType {
    Up,
    Down,
}

/// `books/{bookId}/comments`
pub fn comments_path(book_id: &str) -> Result<CollectionPath, DocumentError> {
    CollectionPath::new(&["books", book_id, Comment::COLLECTION])
}
