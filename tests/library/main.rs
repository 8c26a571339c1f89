//! Integration tests for reading shelves.

use std::sync::Arc;

use booksnap::store::SteppingClock;
use booksnap::{
    BookSearchResult, BooksnapRules, ErrorChannel, ErrorLog, InMemoryDocumentStore,
    LibraryEntryUpdate, LibraryRepository, Operation, Outcome, ReadingStatus,
};

fn book(id: &str, title: &str) -> BookSearchResult {
    BookSearchResult {
        id: id.to_string(),
        title: title.to_string(),
        author: "Ursula K. Le Guin".to_string(),
        publication_year: Some(1969),
        cover_id: Some(8_231_856),
    }
}

fn setup(
    store: InMemoryDocumentStore,
) -> (Arc<InMemoryDocumentStore>, LibraryRepository, ErrorLog) {
    let store = Arc::new(store);
    let errors = ErrorChannel::new();
    let log = ErrorLog::new();
    errors.subscribe({
        let log = log.clone();
        move |event| log.record(event)
    });
    (store.clone(), LibraryRepository::new(store, errors), log)
}

#[tokio::test]
async fn shelves_group_by_status_newest_first() {
    let (_store, repo, log) = setup(
        InMemoryDocumentStore::new().with_clock(SteppingClock::new(1_700_000_000_000, 60_000)),
    );
    let shelf = [
        ("OL1W", "A Wizard of Earthsea", ReadingStatus::Finished),
        ("OL2W", "The Tombs of Atuan", ReadingStatus::Reading),
        ("OL3W", "The Farthest Shore", ReadingStatus::WantToRead),
        ("OL4W", "Tehanu", ReadingStatus::WantToRead),
    ];
    for (id, title, status) in shelf {
        assert!(repo
            .add_entry("ged", &book(id, title), status)
            .wait()
            .await
            .is_committed());
    }

    let shelves = repo.shelves("ged").await.unwrap();
    assert_eq!(shelves.len(), 4);
    let want: Vec<&str> = shelves
        .shelf(ReadingStatus::WantToRead)
        .iter()
        .map(|e| e.id.as_str())
        .collect();
    assert_eq!(want, vec!["OL4W", "OL3W"]);
    assert_eq!(shelves.reading[0].book.title, "The Tombs of Atuan");
    assert_eq!(shelves.finished[0].progress, 100);
    assert!(log.is_empty());
}

#[tokio::test]
async fn progress_updates_are_clamped() {
    let (_store, repo, _log) = setup(InMemoryDocumentStore::new());
    repo.add_entry("ged", &book("OL1W", "Earthsea"), ReadingStatus::Reading)
        .wait()
        .await;

    repo.update_entry("ged", "OL1W", LibraryEntryUpdate::progress(250))
        .wait()
        .await;
    assert_eq!(repo.get_entry("ged", "OL1W").await.unwrap().unwrap().progress, 100);

    repo.update_entry("ged", "OL1W", LibraryEntryUpdate::progress(-5))
        .wait()
        .await;
    let entry = repo.get_entry("ged", "OL1W").await.unwrap().unwrap();
    assert_eq!(entry.progress, 0);
    assert_eq!(entry.reading_status, ReadingStatus::Reading);
    assert!(entry.updated_at >= entry.added_at);
}

#[tokio::test]
async fn moving_between_shelves_keeps_one_entry() {
    let (_store, repo, _log) = setup(InMemoryDocumentStore::new());
    repo.add_entry("ged", &book("OL1W", "Earthsea"), ReadingStatus::WantToRead)
        .wait()
        .await;
    repo.update_entry("ged", "OL1W", LibraryEntryUpdate::status(ReadingStatus::Finished))
        .wait()
        .await;

    let shelves = repo.shelves("ged").await.unwrap();
    assert!(shelves.want_to_read.is_empty());
    assert_eq!(shelves.finished.len(), 1);

    assert!(repo.remove_entry("ged", "OL1W").wait().await.is_committed());
    assert!(repo.shelves("ged").await.unwrap().is_empty());
}

#[tokio::test]
async fn updating_a_missing_entry_reports_an_error() {
    let (_store, repo, log) = setup(InMemoryDocumentStore::new());
    let outcome = repo
        .update_entry("ged", "OL9W", LibraryEntryUpdate::progress(10))
        .wait()
        .await;
    assert!(matches!(outcome, Outcome::Failed(_)));

    let events = log.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].operation, Operation::Update);
    assert_eq!(events[0].path, "users/ged/libraryEntries/OL9W");
}

#[tokio::test]
async fn libraries_are_private_to_their_owner() {
    let (store, repo, log) = setup(InMemoryDocumentStore::new().with_rules(BooksnapRules));
    store.sign_in("ged");
    assert!(repo
        .add_entry("ged", &book("OL1W", "Earthsea"), ReadingStatus::Reading)
        .wait()
        .await
        .is_committed());

    store.sign_in("tenar");
    assert!(repo.shelves("ged").await.unwrap_err().is_permission_denied());
    let outcome = repo
        .add_entry("ged", &book("OL2W", "Atuan"), ReadingStatus::Reading)
        .wait()
        .await;
    let event = outcome.error_event().unwrap();
    assert_eq!(event.operation, Operation::Write);
    assert_eq!(event.attempted_data.as_ref().unwrap()["book"]["title"], "Atuan");
    assert_eq!(log.len(), 1);

    store.sign_in("ged");
    assert_eq!(repo.shelves("ged").await.unwrap().len(), 1);
}

#[tokio::test]
async fn empty_ids_are_skipped() {
    let (_store, repo, log) = setup(InMemoryDocumentStore::new());
    assert_eq!(
        repo.add_entry("", &book("OL1W", "Earthsea"), ReadingStatus::Reading)
            .wait()
            .await,
        Outcome::Skipped
    );
    assert_eq!(
        repo.add_entry("ged", &book("", "No id"), ReadingStatus::Reading)
            .wait()
            .await,
        Outcome::Skipped
    );
    assert_eq!(repo.remove_entry("ged", "").wait().await, Outcome::Skipped);
    assert!(repo.get_entry("", "OL1W").await.unwrap().is_none());
    assert!(log.is_empty());
}
