use crate::document::{CollectionPath, Fields};
use crate::error::Operation;

/// A request as seen by the store's access rules.
#[derive(Debug, Clone, Copy)]
pub struct AccessRequest<'a> {
    pub operation: Operation,
    pub collection: &'a CollectionPath,
    /// `None` for collection-wide requests (`list`).
    pub document_id: Option<&'a str>,
    /// The signed-in user, if any.
    pub auth: Option<&'a str>,
    /// The document as currently stored.
    pub resource: Option<&'a Fields>,
    /// The incoming fields of a write.
    pub request_data: Option<&'a Fields>,
}

/// Server-side access control. Rules are evaluated by the store on every
/// request; clients never enforce them.
pub trait AccessRules: Send + Sync {
    fn allows(&self, request: &AccessRequest<'_>) -> bool;
}

impl<F> AccessRules for F
where
    F: Fn(&AccessRequest<'_>) -> bool + Send + Sync,
{
    fn allows(&self, request: &AccessRequest<'_>) -> bool {
        self(request)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAll;

impl AccessRules for AllowAll {
    fn allows(&self, _request: &AccessRequest<'_>) -> bool {
        true
    }
}

const VOTE_FIELDS: [&str; 3] = ["upvotes", "downvotes", "score"];

/// The application's production rules.
///
/// - `books/{bookId}/comments/{commentId}`: anyone may read; signed-in users
///   may create comments under their own `userId`, vote (change only
///   `upvotes`, `downvotes` and `score`), and delete their own comments.
/// - `users/{userId}/libraryEntries/{bookId}`: only `userId` may read or
///   write.
/// - Everything else is denied.
#[derive(Debug, Default, Clone, Copy)]
pub struct BooksnapRules;

impl AccessRules for BooksnapRules {
    fn allows(&self, request: &AccessRequest<'_>) -> bool {
        let segments: Vec<&str> = request.collection.as_str().split('/').collect();
        match segments.as_slice() {
            ["books", _, "comments"] => allows_comment(request),
            ["users", owner, "libraryEntries"] => request.auth == Some(*owner),
            _ => false,
        }
    }
}

fn allows_comment(request: &AccessRequest<'_>) -> bool {
    match request.operation {
        Operation::Get | Operation::List => true,
        Operation::Create | Operation::Write => {
            let author = request
                .request_data
                .and_then(|data| data.get("userId"))
                .and_then(|v| v.as_str());
            request.auth.is_some() && request.auth == author
        }
        Operation::Update => {
            request.auth.is_some()
                && request
                    .request_data
                    .map(|data| data.keys().all(|k| VOTE_FIELDS.contains(&k.as_str())))
                    .unwrap_or(false)
        }
        Operation::Delete => {
            let author = request
                .resource
                .and_then(|data| data.get("userId"))
                .and_then(|v| v.as_str());
            request.auth.is_some() && request.auth == author
        }
    }
}
