use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use super::parse::{
    book_from_work, similar_from_subject, subject_slug, Author, Ratings, SearchResponse,
    SubjectResponse, Work,
};
use super::{Book, BookMetadataProvider, BookSearchResult};
use crate::config::OpenLibraryConfig;
use crate::error::ProviderError;

/// Open Library HTTP client.
#[derive(Debug, Clone)]
pub struct OpenLibraryClient {
    client: reqwest::Client,
    base_url: String,
}

impl OpenLibraryClient {
    pub fn new(config: &OpenLibraryConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ProviderError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.client.get(&url).query(query).send().await?;

        if !response.status().is_success() {
            return Err(ProviderError::Status {
                status: response.status().as_u16(),
            });
        }
        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| ProviderError::Decode(e.to_string()))
    }

    pub async fn try_search_books(
        &self,
        query: &str,
    ) -> Result<Vec<BookSearchResult>, ProviderError> {
        let response: SearchResponse = self.get_json("/search.json", &[("q", query)]).await?;
        Ok(response.docs.into_iter().map(BookSearchResult::from).collect())
    }

    pub async fn try_book_by_id(&self, id: &str) -> Result<Book, ProviderError> {
        if id.is_empty() || id.contains('/') {
            return Err(ProviderError::InvalidInput(format!("bad work id {:?}", id)));
        }
        let work: Work = self.get_json(&format!("/works/{}.json", id), &[]).await?;

        // Author and rating are best effort; the book is still returned
        // without them.
        let author = match work.author_key() {
            Some(key) => match self.get_json::<Author>(&format!("{}.json", key), &[]).await {
                Ok(author) => author.name,
                Err(err) => {
                    tracing::debug!(%id, error = %err, "author lookup failed");
                    None
                }
            },
            None => None,
        };
        let ratings = match self
            .get_json::<Ratings>(&format!("/works/{}/ratings.json", id), &[])
            .await
        {
            Ok(ratings) => Some(ratings),
            Err(err) => {
                tracing::debug!(%id, error = %err, "could not fetch rating, using fallback");
                None
            }
        };

        Ok(book_from_work(id, work, author, ratings))
    }

    pub async fn try_similar_books(
        &self,
        id: &str,
    ) -> Result<Vec<BookSearchResult>, ProviderError> {
        let book = self.try_book_by_id(id).await?;
        let Some(subject) = book.genres.first() else {
            return Ok(Vec::new());
        };
        let response: SubjectResponse = self
            .get_json(&format!("/subjects/{}.json", subject_slug(subject)), &[("limit", "4")])
            .await?;
        Ok(similar_from_subject(response, id))
    }
}

#[async_trait]
impl BookMetadataProvider for OpenLibraryClient {
    async fn search_books(&self, query: &str) -> Vec<BookSearchResult> {
        if query.trim().is_empty() {
            return Vec::new();
        }
        match self.try_search_books(query).await {
            Ok(results) => results,
            Err(err) => {
                tracing::error!(%query, error = %err, "book search failed");
                Vec::new()
            }
        }
    }

    async fn book_by_id(&self, id: &str) -> Option<Book> {
        match self.try_book_by_id(id).await {
            Ok(book) => Some(book),
            Err(err) => {
                tracing::error!(%id, error = %err, "error fetching book");
                None
            }
        }
    }

    async fn similar_books(&self, id: &str) -> Vec<BookSearchResult> {
        match self.try_similar_books(id).await {
            Ok(similar) => similar,
            Err(err) => {
                tracing::error!(%id, error = %err, "error fetching similar books");
                Vec::new()
            }
        }
    }
}
