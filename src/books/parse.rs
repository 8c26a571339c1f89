//! Response shapes of the Open Library API and their mapping to our records.

use serde::Deserialize;

use super::{Book, BookSearchResult};

const UNKNOWN_AUTHOR: &str = "Unknown Author";
const NO_DESCRIPTION: &str = "No description available.";
const MAX_GENRES: usize = 5;
pub(crate) const MAX_SIMILAR: usize = 3;

#[derive(Debug, Deserialize)]
pub(crate) struct SearchResponse {
    #[serde(default)]
    pub docs: Vec<SearchDoc>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchDoc {
    pub key: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub author_name: Vec<String>,
    pub first_publish_year: Option<i32>,
    pub cover_i: Option<i64>,
}

impl From<SearchDoc> for BookSearchResult {
    fn from(doc: SearchDoc) -> Self {
        BookSearchResult {
            id: work_id(&doc.key),
            title: doc.title,
            author: doc
                .author_name
                .into_iter()
                .next()
                .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string()),
            publication_year: doc.first_publish_year.filter(|y| *y != 0),
            cover_id: doc.cover_i.filter(|c| *c != 0),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct Work {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub authors: Vec<WorkAuthor>,
    pub description: Option<Description>,
    #[serde(default)]
    pub subjects: Vec<String>,
    pub first_publish_date: Option<String>,
    #[serde(default)]
    pub covers: Vec<i64>,
}

impl Work {
    /// Path of the first author record, e.g. `/authors/OL23919A`.
    pub fn author_key(&self) -> Option<&str> {
        self.authors
            .first()
            .and_then(|a| a.author.as_ref())
            .map(|a| a.key.as_str())
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct WorkAuthor {
    pub author: Option<KeyRef>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct KeyRef {
    pub key: String,
}

/// Either a bare string or a typed text block.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum Description {
    Text(String),
    Typed { value: String },
}

#[derive(Debug, Deserialize)]
pub(crate) struct Author {
    pub name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Ratings {
    pub summary: Option<RatingSummary>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RatingSummary {
    pub average: Option<f64>,
    pub count: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SubjectResponse {
    #[serde(default)]
    pub works: Vec<SubjectWork>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SubjectWork {
    pub key: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub authors: Vec<SubjectAuthor>,
    pub first_publish_year: Option<i32>,
    pub cover_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SubjectAuthor {
    pub name: String,
}

impl From<SubjectWork> for BookSearchResult {
    fn from(work: SubjectWork) -> Self {
        BookSearchResult {
            id: work_id(&work.key),
            title: work.title,
            author: work
                .authors
                .into_iter()
                .next()
                .map(|a| a.name)
                .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string()),
            publication_year: work.first_publish_year.filter(|y| *y != 0),
            cover_id: work.cover_id.filter(|c| *c != 0),
        }
    }
}

/// `/works/OL45883W` -> `OL45883W`
fn work_id(key: &str) -> String {
    key.strip_prefix("/works/").unwrap_or(key).to_string()
}

/// Assemble a [`Book`] from a work record plus the optional author and
/// rating lookups.
pub(crate) fn book_from_work(
    id: &str,
    work: Work,
    author: Option<String>,
    ratings: Option<Ratings>,
) -> Book {
    let summary = ratings.and_then(|r| r.summary).unwrap_or_default();
    let description = match &work.description {
        Some(Description::Text(text)) | Some(Description::Typed { value: text }) => text.as_str(),
        None => NO_DESCRIPTION,
    };

    Book {
        id: id.to_string(),
        author: author.unwrap_or_else(|| UNKNOWN_AUTHOR.to_string()),
        publication_year: work
            .first_publish_date
            .as_deref()
            .and_then(publication_year)
            .unwrap_or(0),
        description: first_paragraph(description).to_string(),
        rating: summary
            .average
            .filter(|a| *a > 0.0)
            .unwrap_or_else(|| fallback_rating(id)),
        rating_count: summary.count.unwrap_or(0),
        genres: work.subjects.iter().take(MAX_GENRES).cloned().collect(),
        cover_id: work.covers.first().copied().filter(|c| *c != 0),
        title: work.title,
    }
}

/// Deterministic stand-in rating in `3.0..=4.9`, derived from the id's last
/// character.
pub fn fallback_rating(id: &str) -> f64 {
    match id.chars().last() {
        Some(c) => (c as u32 % 20) as f64 / 10.0 + 3.0,
        None => 3.0,
    }
}

/// Text up to the first line break.
pub fn first_paragraph(text: &str) -> &str {
    text.split('\n').next().unwrap_or("")
}

/// Year out of a free-form date such as `1954`, `July 29, 1954` or
/// `Jul 1954`: the first run of four digits.
pub fn publication_year(date: &str) -> Option<i32> {
    let bytes = date.as_bytes();
    let mut start = None;
    for (i, b) in bytes.iter().enumerate() {
        match (b.is_ascii_digit(), start) {
            (true, None) => start = Some(i),
            (false, Some(s)) => {
                if i - s == 4 {
                    return date[s..i].parse().ok();
                }
                start = None;
            }
            _ => {}
        }
    }
    match start {
        Some(s) if bytes.len() - s == 4 => date[s..].parse().ok(),
        _ => None,
    }
}

/// Subject URL slug: lowercase, spaces to underscores.
pub fn subject_slug(subject: &str) -> String {
    subject.to_lowercase().replace(' ', "_")
}

/// Similar books from a subject listing, excluding `exclude_id`.
pub(crate) fn similar_from_subject(
    response: SubjectResponse,
    exclude_id: &str,
) -> Vec<BookSearchResult> {
    response
        .works
        .into_iter()
        .map(BookSearchResult::from)
        .filter(|b| b.id != exclude_id)
        .take(MAX_SIMILAR)
        .collect()
}
