//! Book metadata - search, details and similar books from an external
//! catalogue.
//!
//! Providers make a single attempt per call and never fail the caller: any
//! network or decoding problem is logged and turned into an empty list or
//! `None`.

mod open_library;
mod parse;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use open_library::OpenLibraryClient;
pub use parse::{fallback_rating, first_paragraph, publication_year, subject_slug};

pub const COVERS_BASE_URL: &str = "https://covers.openlibrary.org";

/// A search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookSearchResult {
    /// Work id, e.g. `OL45883W`.
    pub id: String,
    pub title: String,
    pub author: String,
    pub publication_year: Option<i32>,
    pub cover_id: Option<i64>,
}

/// Full details of one work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: String,
    pub title: String,
    pub author: String,
    /// 0 when unknown.
    pub publication_year: i32,
    /// First paragraph only.
    pub description: String,
    pub rating: f64,
    pub rating_count: u64,
    /// At most five subjects.
    pub genres: Vec<String>,
    pub cover_id: Option<i64>,
}

impl Book {
    pub fn summary(&self) -> BookSearchResult {
        BookSearchResult {
            id: self.id.clone(),
            title: self.title.clone(),
            author: self.author.clone(),
            publication_year: (self.publication_year > 0).then_some(self.publication_year),
            cover_id: self.cover_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverImage {
    pub image_url: String,
    pub image_hint: String,
}

/// Large cover image for `cover_id`, if the book has one.
pub fn cover_image(cover_id: Option<i64>) -> Option<CoverImage> {
    let cover_id = cover_id.filter(|id| *id > 0)?;
    Some(CoverImage {
        image_url: format!("{}/b/id/{}-L.jpg", COVERS_BASE_URL, cover_id),
        image_hint: "book cover".to_string(),
    })
}

#[async_trait]
pub trait BookMetadataProvider: Send + Sync {
    /// Free-text search. An empty query returns nothing without a request.
    async fn search_books(&self, query: &str) -> Vec<BookSearchResult>;

    async fn book_by_id(&self, id: &str) -> Option<Book>;

    /// Up to three other works sharing the book's first genre.
    async fn similar_books(&self, id: &str) -> Vec<BookSearchResult>;
}
