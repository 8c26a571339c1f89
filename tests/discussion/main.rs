//! Integration tests for comments: posting, threading, voting and the live
//! view, against the in-memory store.

mod support;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use booksnap::discussion::comments_path;
use booksnap::store::SteppingClock;
use booksnap::{
    BooksnapRules, Config, DiscussionViewModel, DocumentStore, DocumentWrite, ErrorChannel,
    ErrorKind, ErrorLog, InMemoryDocumentStore, NewComment, Operation, Outcome, StoreError,
    VoteState, VoteType,
};
use serde_json::json;
use support::{state_where, Fixture, BOOK};

#[tokio::test]
async fn upvote_toggles_with_call_parity() {
    let fx = Fixture::new();
    let id = fx.post("alice", "Loved it").await;

    for n in 1..=6 {
        let outcome = fx.repo.handle_vote(BOOK, &id, "bob", VoteType::Up).wait().await;
        assert!(outcome.is_committed());

        let comment = fx.comment(&id).await.unwrap();
        if n % 2 == 1 {
            assert_eq!(comment.vote_of("bob"), VoteState::Up);
            assert_eq!(comment.score, 1);
        } else {
            assert_eq!(comment.vote_of("bob"), VoteState::None);
            assert_eq!(comment.score, 0);
        }
        assert!(!comment.downvotes.contains(&"bob".to_string()));
    }
    assert!(fx.log.is_empty());
}

#[tokio::test]
async fn mixed_votes_keep_sets_disjoint_and_score_consistent() {
    let fx = Fixture::new();
    let id = fx.post("alice", "Discuss").await;

    let sequence = [
        ("bob", VoteType::Up),
        ("carol", VoteType::Down),
        ("bob", VoteType::Down),
        ("dave", VoteType::Up),
        ("carol", VoteType::Up),
        ("dave", VoteType::Up),
        ("bob", VoteType::Up),
        ("erin", VoteType::Down),
    ];
    for (user, vote) in sequence {
        fx.repo.handle_vote(BOOK, &id, user, vote).wait().await;

        let comment = fx.comment(&id).await.unwrap();
        let up: HashSet<_> = comment.upvotes.iter().collect();
        let down: HashSet<_> = comment.downvotes.iter().collect();
        assert!(up.is_disjoint(&down), "{:?} / {:?}", comment.upvotes, comment.downvotes);
        assert_eq!(
            comment.score,
            comment.upvotes.len() as i64 - comment.downvotes.len() as i64
        );
    }

    let comment = fx.comment(&id).await.unwrap();
    assert_eq!(comment.vote_of("bob"), VoteState::Up);
    assert_eq!(comment.vote_of("carol"), VoteState::Up);
    assert_eq!(comment.vote_of("dave"), VoteState::None);
    assert_eq!(comment.vote_of("erin"), VoteState::Down);
    assert_eq!(comment.score, 1);
}

#[tokio::test]
async fn vote_after_delete_reports_once_and_touches_nothing() {
    let fx = Fixture::new();
    let doomed = fx.post("alice", "Soon gone").await;
    let survivor = fx.post("bob", "Still here").await;
    let survivor_path = comments_path(BOOK).unwrap().doc(&survivor).unwrap();
    let version_before = fx.store.version_of(&survivor_path);

    assert!(fx.repo.delete_comment(BOOK, &doomed).wait().await.is_committed());
    let outcome = fx
        .repo
        .handle_vote(BOOK, &doomed, "carol", VoteType::Up)
        .wait()
        .await;

    let event = outcome.error_event().cloned().unwrap();
    assert_eq!(event.operation, Operation::Update);
    assert_eq!(event.path, format!("books/{}/comments/{}", BOOK, doomed));
    assert_eq!(event.kind, ErrorKind::Aborted);
    assert!(event.message().contains("does not exist"));
    assert_eq!(fx.log.events(), vec![event]);

    assert_eq!(fx.count(), 1);
    assert!(fx.comment(&doomed).await.is_none());
    assert_eq!(fx.store.version_of(&survivor_path), version_before);
}

#[tokio::test]
async fn add_comment_returns_before_the_write_lands() {
    let fx = Fixture::new();

    let submission = fx
        .repo
        .add_comment(BOOK, NewComment::new("alice", "Alice", "First!"));
    // Nothing has run yet on this single-threaded runtime.
    assert!(!submission.is_finished());
    assert_eq!(fx.count(), 0);

    let id = submission.wait().await.committed().unwrap();
    assert_eq!(fx.count(), 1);
    assert_eq!(fx.comment(&id).await.unwrap().text, "First!");
}

#[tokio::test]
async fn every_comment_lands_in_exactly_one_thread_slot() {
    let fx = Fixture::with_store(
        InMemoryDocumentStore::new().with_clock(SteppingClock::new(1_700_000_000_000, 1_000)),
    );
    let a = fx.post("alice", "A").await;
    let b = fx.post("bob", "B").await;
    fx.post("carol", "C").await;
    let a1 = fx.reply("bob", &a, "re: A").await;
    let a2 = fx.reply("carol", &a, "re: A again").await;
    let b1 = fx.reply("alice", &b, "re: B").await;

    let view = DiscussionViewModel::new(fx.store.clone(), BOOK);
    let state = state_where(&view, |s| !s.is_loading && s.threads.len() == 6).await;
    let threads = state.threads;

    let mut seen: Vec<String> = threads.top_level().iter().map(|c| c.id.clone()).collect();
    for (parent, replies) in threads.replies_by_parent_id() {
        for reply in replies {
            assert_eq!(reply.parent_id.as_deref(), Some(parent.as_str()));
            seen.push(reply.id.clone());
        }
    }
    seen.sort();
    let mut all: Vec<String> = fx.comments().await.into_iter().map(|c| c.id).collect();
    all.sort();
    assert_eq!(seen, all);

    let replies_to_a: Vec<&str> = threads.replies_to(&a).iter().map(|c| c.id.as_str()).collect();
    assert_eq!(replies_to_a, vec![a1.as_str(), a2.as_str()]);
    assert_eq!(threads.replies_to(&b)[0].id, b1);
    assert!(threads.orphaned_replies().is_empty());
}

fn comment_fields(user: &str, parent: Option<&str>, score: i64, created_at: i64) -> DocumentWrite {
    let fields = json!({
        "userId": user,
        "username": user,
        "userAvatar": "",
        "bookId": BOOK,
        "parentId": parent,
        "text": format!("by {}", user),
        "isSpoiler": false,
        "score": score,
        "upvotes": [],
        "downvotes": [],
        "createdAt": created_at,
    });
    DocumentWrite::new(fields.as_object().cloned().unwrap())
}

#[tokio::test]
async fn threads_sort_top_level_newest_first_and_replies_oldest_first() {
    let store = Arc::new(InMemoryDocumentStore::new());
    let collection = comments_path(BOOK).unwrap();
    let seed = [
        ("A", None, 3, 10),
        ("B", None, 3, 20),
        ("C", None, 5, 5),
        ("R1", Some("A"), 2, 5),
        ("R2", Some("A"), 2, 1),
    ];
    for (id, parent, score, t) in seed {
        store
            .set_document(&collection.doc(id).unwrap(), comment_fields(id, parent, score, t), false)
            .await
            .unwrap();
    }

    let view = DiscussionViewModel::new(store.clone(), BOOK);
    let threads = state_where(&view, |s| s.threads.len() == 5).await.threads;

    let top: Vec<&str> = threads.top_level().iter().map(|c| c.id.as_str()).collect();
    assert_eq!(top, vec!["C", "B", "A"]);
    let replies: Vec<&str> = threads.replies_to("A").iter().map(|c| c.id.as_str()).collect();
    assert_eq!(replies, vec!["R2", "R1"]);
}

#[tokio::test]
async fn view_model_follows_live_changes() {
    let fx = Fixture::new();
    let view = DiscussionViewModel::new(fx.store.clone(), BOOK);

    let state = state_where(&view, |s| !s.is_loading).await;
    assert!(state.threads.is_empty());
    assert_eq!(state.error, None);

    let id = fx.post("alice", "Hello").await;
    state_where(&view, |s| s.threads.len() == 1).await;

    fx.repo.handle_vote(BOOK, &id, "bob", VoteType::Up).wait().await;
    let state = state_where(&view, |s| {
        s.threads.top_level().first().map(|c| c.score) == Some(1)
    })
    .await;
    assert_eq!(state.threads.top_level()[0].upvotes, vec!["bob".to_string()]);

    fx.repo.delete_comment(BOOK, &id).wait().await;
    state_where(&view, |s| s.threads.is_empty()).await;

    drop(view);
    tokio::time::timeout(Duration::from_secs(2), async {
        while fx.store.subscriber_count() > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("subscription should end with the view model");
}

#[tokio::test]
async fn outage_keeps_last_threads_until_refetch() {
    let fx = Fixture::new();
    fx.post("alice", "Before the outage").await;

    let view = DiscussionViewModel::new(fx.store.clone(), BOOK);
    state_where(&view, |s| s.threads.len() == 1).await;

    fx.store.set_available(false);
    let state = state_where(&view, |s| s.error.is_some()).await;
    assert_eq!(state.threads.len(), 1);

    fx.store.set_available(true);
    view.force_refetch();
    let state = state_where(&view, |s| s.error.is_none()).await;
    assert_eq!(state.threads.len(), 1);
}

#[tokio::test]
async fn empty_book_id_gives_idle_view() {
    let store = Arc::new(InMemoryDocumentStore::new());
    let view = DiscussionViewModel::new(store.clone(), "");
    let state = view.state();
    assert!(!state.is_loading);
    assert!(state.threads.is_empty());
    assert_eq!(store.subscriber_count(), 0);
}

#[tokio::test]
async fn only_the_author_may_delete() {
    let fx = Fixture::with_rules(BooksnapRules);
    fx.store.sign_in("alice");
    let id = fx.post("alice", "Mine").await;

    fx.store.sign_in("mallory");
    let outcome = fx.repo.delete_comment(BOOK, &id).wait().await;
    assert!(matches!(outcome, Outcome::Failed(_)));

    let events = fx.log.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].operation, Operation::Delete);
    assert!(events[0].message().contains("delete on books/"));
    assert_eq!(fx.count(), 1);

    fx.store.sign_in("alice");
    assert!(fx.repo.delete_comment(BOOK, &id).wait().await.is_committed());
    assert_eq!(fx.count(), 0);
}

#[tokio::test]
async fn comments_must_be_posted_as_the_signed_in_user() {
    let fx = Fixture::with_rules(BooksnapRules);
    fx.store.sign_in("mallory");

    let outcome = fx
        .repo
        .add_comment(BOOK, NewComment::new("alice", "Alice", "Not really Alice"))
        .wait()
        .await;

    let event = outcome.error_event().unwrap();
    assert_eq!(event.operation, Operation::Create);
    assert_eq!(event.path, format!("books/{}/comments", BOOK));
    assert_eq!(
        event.attempted_data.as_ref().unwrap()["userId"],
        "alice"
    );
    assert_eq!(fx.count(), 0);
}

#[tokio::test]
async fn signed_in_users_may_vote_on_any_comment() {
    let fx = Fixture::with_rules(BooksnapRules);
    fx.store.sign_in("alice");
    let id = fx.post("alice", "Vote on me").await;

    fx.store.sign_in("bob");
    assert!(fx
        .repo
        .handle_vote(BOOK, &id, "bob", VoteType::Down)
        .wait()
        .await
        .is_committed());
    assert_eq!(fx.comment(&id).await.unwrap().score, -1);

    fx.store.sign_out();
    let outcome = fx.repo.handle_vote(BOOK, &id, "bob", VoteType::Down).wait().await;
    let event = outcome.error_event().unwrap();
    assert_eq!(event.operation, Operation::Update);
    assert_eq!(fx.comment(&id).await.unwrap().score, -1);
}

#[tokio::test]
async fn concurrent_voters_all_land_given_enough_retries() {
    const VOTERS: u32 = 12;
    let fx =
        Fixture::with_store(InMemoryDocumentStore::new().with_max_transaction_attempts(VOTERS));
    let id = fx.post("alice", "Popular").await;

    let submissions: Vec<_> = (0..VOTERS)
        .map(|n| {
            fx.repo
                .handle_vote(BOOK, &id, &format!("voter-{}", n), VoteType::Up)
        })
        .collect();
    for submission in submissions {
        assert!(submission.wait().await.is_committed());
    }

    let comment = fx.comment(&id).await.unwrap();
    assert_eq!(comment.upvotes.len(), VOTERS as usize);
    assert_eq!(comment.score, VOTERS as i64);
    assert!(fx.log.is_empty());
}

#[tokio::test]
async fn exhausted_retries_surface_as_contention() {
    let config = Config::from_lookup(|name| {
        (name == "BOOKSNAP_TRANSACTION_ATTEMPTS").then(|| "1".to_string())
    });
    let fx = Fixture::with_store(InMemoryDocumentStore::new().with_config(&config.store));
    let id = fx.post("alice", "Hot take").await;

    let submissions: Vec<_> = (0..5)
        .map(|n| {
            fx.repo
                .handle_vote(BOOK, &id, &format!("voter-{}", n), VoteType::Up)
        })
        .collect();
    let mut committed = 0;
    for submission in submissions {
        match submission.wait().await {
            Outcome::Committed(()) => committed += 1,
            Outcome::Failed(event) => assert_eq!(event.operation, Operation::Update),
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    let events = fx.log.events();
    assert!(!events.is_empty());
    assert_eq!(events.len(), 5 - committed);
    assert!(events.iter().all(|e| e.cause.contains("conflicting attempts")));

    let comment = fx.comment(&id).await.unwrap();
    assert_eq!(comment.score, committed as i64);
}

#[tokio::test]
async fn dropped_listener_stops_receiving() {
    let store = Arc::new(InMemoryDocumentStore::new().with_rules(BooksnapRules));
    let errors = ErrorChannel::new();
    let repo = booksnap::CommentRepository::new(store, errors.clone());
    let log = ErrorLog::new();

    let guard = log.attach(&errors);
    repo.delete_comment(BOOK, "c1").wait().await;
    assert_eq!(log.len(), 1);

    drop(guard);
    assert_eq!(errors.listener_count(), 0);
    repo.delete_comment(BOOK, "c1").wait().await;
    assert_eq!(log.len(), 1);
}

#[tokio::test]
async fn malformed_documents_fail_the_snapshot() {
    let store = Arc::new(InMemoryDocumentStore::new());
    let collection = comments_path(BOOK).unwrap();
    let bad = json!({ "userId": "alice", "score": "lots" });
    store
        .add_document(&collection, DocumentWrite::new(bad.as_object().cloned().unwrap()))
        .await
        .unwrap();

    let err = store
        .query_documents(&collection, &booksnap::OrderBy::asc("createdAt"))
        .await
        .unwrap()
        .parse_all::<booksnap::Comment>()
        .map_err(StoreError::from)
        .unwrap_err();
    assert!(matches!(err, StoreError::Document(_)));

    let view = DiscussionViewModel::new(store, BOOK);
    let state = state_where(&view, |s| !s.is_loading).await;
    assert!(state.error.is_some());
    assert!(state.threads.is_empty());
}
