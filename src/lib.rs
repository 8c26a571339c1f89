extern crate self as booksnap;

pub mod ai;
pub mod books;
pub mod bus;
pub mod config;
pub mod discussion;
pub mod document;
pub mod error;
pub mod library;
pub mod search_history;
pub mod store;
pub mod submission;

pub use ai::{ActionResult, AiActions, GenerationProvider, HttpGenerationProvider, ImageDataUri};
pub use books::{Book, BookMetadataProvider, BookSearchResult, CoverImage, OpenLibraryClient};
pub use bus::{
    ErrorChannel, ErrorEvent, ErrorKind, ErrorLog, ListenerGuard, ListenerId, LogListener,
};
pub use config::Config;
pub use discussion::{
    apply_vote, Comment, CommentRepository, CommentThreads, DiscussionState,
    DiscussionViewModel, NewComment, VoteState, VoteType, Votes,
};
pub use document::{
    CollectionPath, Direction, Document, DocumentPath, DocumentSnapshot, DocumentWrite, Fields,
    OrderBy, QuerySnapshot,
};
pub use error::{DocumentError, Operation, ProviderError, StoreError};
pub use library::{
    LibraryBook, LibraryEntry, LibraryEntryUpdate, LibraryRepository, ReadingStatus, Shelves,
};
pub use search_history::RecentSearches;
pub use store::{
    AccessRules, AllowAll, BooksnapRules, DocumentStore, InMemoryDocumentStore, QuerySubscription,
};
pub use submission::{Outcome, Submission};

// Derive macro shares the trait's name, like serde's Serialize.
pub use booksnap_macros::Document;

#[cfg(feature = "emitter")]
pub use bus::{EmitterBridge, PERMISSION_ERROR_EVENT};

// Re-export the EventEmitter from the event_emitter_rs crate
#[cfg(feature = "emitter")]
pub use event_emitter_rs::EventEmitter;
