//! Library - a user's reading shelves.
//!
//! Entries live at `users/{userId}/libraryEntries/{bookId}`, one per book,
//! and are private to their owner.

mod repository;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::books::BookSearchResult;
use crate::document::CollectionPath;
use crate::error::DocumentError;
use crate::Document;

pub use repository::{LibraryRepository, Shelves};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReadingStatus {
    WantToRead,
    Reading,
    Finished,
}

impl ReadingStatus {
    pub const ALL: [ReadingStatus; 3] = [
        ReadingStatus::WantToRead,
        ReadingStatus::Reading,
        ReadingStatus::Finished,
    ];

    /// Progress a freshly added entry starts at.
    pub fn initial_progress(self) -> u8 {
        match self {
            ReadingStatus::Finished => 100,
            _ => 0,
        }
    }
}

/// Cached book metadata stored with an entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryBook {
    pub id: String,
    pub title: String,
    pub author: String,
    pub cover_id: Option<i64>,
    pub publication_year: Option<i32>,
}

impl From<&BookSearchResult> for LibraryBook {
    fn from(book: &BookSearchResult) -> Self {
        LibraryBook {
            id: book.id.clone(),
            title: book.title.clone(),
            author: book.author.clone(),
            cover_id: book.cover_id,
            publication_year: book.publication_year,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Document)]
#[document(collection = "libraryEntries", validate = "LibraryEntry::check")]
#[serde(rename_all = "camelCase")]
pub struct LibraryEntry {
    /// The book id.
    pub id: String,
    pub user_id: String,
    pub reading_status: ReadingStatus,
    pub progress: u8,
    pub book: LibraryBook,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub added_at: Option<DateTime<Utc>>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl LibraryEntry {
    fn check(&self) -> Result<(), String> {
        if self.user_id.is_empty() {
            return Err("userId must not be empty".into());
        }
        if self.progress > 100 {
            return Err(format!("progress {} is out of range", self.progress));
        }
        Ok(())
    }
}

/// Partial update of an entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryEntryUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reading_status: Option<ReadingStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<i64>,
}

impl LibraryEntryUpdate {
    pub fn status(status: ReadingStatus) -> Self {
        Self {
            reading_status: Some(status),
            ..Default::default()
        }
    }

    pub fn progress(progress: i64) -> Self {
        Self {
            progress: Some(progress),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.reading_status.is_none() && self.progress.is_none()
    }
}

/// `users/{userId}/libraryEntries`
pub fn library_path(user_id: &str) -> Result<CollectionPath, DocumentError> {
    CollectionPath::new(&["users", user_id, LibraryEntry::COLLECTION])
}
