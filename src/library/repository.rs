use std::sync::Arc;

use serde_json::Value;

use super::{library_path, LibraryBook, LibraryEntry, LibraryEntryUpdate, ReadingStatus};
use crate::books::BookSearchResult;
use crate::bus::{ErrorChannel, ErrorEvent};
use crate::document::{DocumentPath, DocumentWrite, Fields, OrderBy};
use crate::error::{Operation, StoreError};
use crate::store::DocumentStore;
use crate::submission::{Outcome, Submission};

/// A user's entries grouped by reading status, most recently added first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Shelves {
    pub want_to_read: Vec<LibraryEntry>,
    pub reading: Vec<LibraryEntry>,
    pub finished: Vec<LibraryEntry>,
}

impl Shelves {
    pub fn shelf(&self, status: ReadingStatus) -> &[LibraryEntry] {
        match status {
            ReadingStatus::WantToRead => &self.want_to_read,
            ReadingStatus::Reading => &self.reading,
            ReadingStatus::Finished => &self.finished,
        }
    }

    pub fn len(&self) -> usize {
        self.want_to_read.len() + self.reading.len() + self.finished.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push(&mut self, entry: LibraryEntry) {
        match entry.reading_status {
            ReadingStatus::WantToRead => self.want_to_read.push(entry),
            ReadingStatus::Reading => self.reading.push(entry),
            ReadingStatus::Finished => self.finished.push(entry),
        }
    }
}

/// Reads and writes a user's library entries. Writes are fire-and-forget
/// like comment mutations; reads are awaited.
#[derive(Clone)]
pub struct LibraryRepository {
    store: Arc<dyn DocumentStore>,
    errors: ErrorChannel,
}

impl LibraryRepository {
    pub fn new(store: Arc<dyn DocumentStore>, errors: ErrorChannel) -> Self {
        Self { store, errors }
    }

    fn entry_path(user_id: &str, book_id: &str) -> Option<DocumentPath> {
        if user_id.is_empty() || book_id.is_empty() {
            return None;
        }
        library_path(user_id).and_then(|c| c.doc(book_id)).ok()
    }

    /// Put a book on a shelf, replacing any existing entry for it.
    pub fn add_entry(
        &self,
        user_id: &str,
        book: &BookSearchResult,
        status: ReadingStatus,
    ) -> Submission<()> {
        let Some(path) = Self::entry_path(user_id, &book.id) else {
            return Submission::skipped();
        };
        let entry = LibraryEntry {
            id: book.id.clone(),
            user_id: user_id.to_string(),
            reading_status: status,
            progress: status.initial_progress(),
            book: LibraryBook::from(book),
            added_at: None,
            updated_at: None,
        };
        let write = match DocumentWrite::from_document(&entry, &path) {
            Ok(write) => write.server_timestamp("addedAt").server_timestamp("updatedAt"),
            Err(err) => {
                tracing::warn!(%path, error = %err, "library entry failed validation");
                return Submission::skipped();
            }
        };

        tracing::debug!(%path, ?status, "submitting library entry");
        self.submit(path, Operation::Write, write, |store, path, write| async move {
            store.set_document(&path, write, false).await
        })
    }

    /// Change status and/or progress. Progress is clamped to `0..=100`.
    pub fn update_entry(
        &self,
        user_id: &str,
        book_id: &str,
        update: LibraryEntryUpdate,
    ) -> Submission<()> {
        let Some(path) = Self::entry_path(user_id, book_id) else {
            return Submission::skipped();
        };
        let mut fields = Fields::new();
        if let Some(status) = update.reading_status {
            fields.insert(
                "readingStatus".into(),
                serde_json::to_value(status).unwrap_or(Value::Null),
            );
        }
        if let Some(progress) = update.progress {
            fields.insert("progress".into(), Value::from(progress.clamp(0, 100)));
        }
        let write = DocumentWrite::new(fields).server_timestamp("updatedAt");

        tracing::debug!(%path, "submitting library update");
        self.submit(path, Operation::Update, write, |store, path, write| async move {
            store.update_document(&path, write).await
        })
    }

    pub fn remove_entry(&self, user_id: &str, book_id: &str) -> Submission<()> {
        let Some(path) = Self::entry_path(user_id, book_id) else {
            return Submission::skipped();
        };
        tracing::debug!(%path, "submitting library removal");
        self.submit(path, Operation::Delete, DocumentWrite::default(), |store, path, _| async move {
            store.delete_document(&path).await
        })
    }

    pub async fn get_entry(
        &self,
        user_id: &str,
        book_id: &str,
    ) -> Result<Option<LibraryEntry>, StoreError> {
        let Some(path) = Self::entry_path(user_id, book_id) else {
            return Ok(None);
        };
        match self.store.get_document(&path).await? {
            Some(snapshot) => Ok(Some(snapshot.parse()?)),
            None => Ok(None),
        }
    }

    pub async fn shelves(&self, user_id: &str) -> Result<Shelves, StoreError> {
        if user_id.is_empty() {
            return Ok(Shelves::default());
        }
        let collection = library_path(user_id)?;
        let snapshot = self
            .store
            .query_documents(&collection, &OrderBy::desc("addedAt"))
            .await?;

        let mut shelves = Shelves::default();
        for entry in snapshot.parse_all::<LibraryEntry>()? {
            shelves.push(entry);
        }
        Ok(shelves)
    }

    fn submit<F, Fut>(
        &self,
        path: DocumentPath,
        operation: Operation,
        write: DocumentWrite,
        run: F,
    ) -> Submission<()>
    where
        F: FnOnce(Arc<dyn DocumentStore>, DocumentPath, DocumentWrite) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = Result<(), StoreError>> + Send + 'static,
    {
        let store = self.store.clone();
        let errors = self.errors.clone();
        Submission::spawn(async move {
            let attempted =
                (!write.fields().is_empty()).then(|| Value::Object(write.fields().clone()));
            match run(store, path.clone(), write).await {
                Ok(()) => Outcome::Committed(()),
                Err(err) => {
                    let mut event = ErrorEvent::new(path.to_string(), operation, &err);
                    event.attempted_data = attempted;
                    errors.emit(event.clone());
                    Outcome::Failed(event)
                }
            }
        })
    }
}
