use std::pin::Pin;
use std::task::{ready, Context, Poll};

use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tokio_stream::Stream;

use crate::document::QuerySnapshot;
use crate::error::StoreError;

type FeedState = Option<Result<QuerySnapshot, StoreError>>;

/// Store-side half of a live query.
///
/// Only the latest result is kept: results delivered faster than the
/// subscriber reads them are coalesced, the subscriber always sees the most
/// recent one.
pub struct SubscriptionFeed {
    tx: watch::Sender<FeedState>,
}

impl SubscriptionFeed {
    /// Create a connected feed/subscription pair with nothing delivered yet.
    pub fn channel() -> (SubscriptionFeed, QuerySubscription) {
        let (tx, rx) = watch::channel(None);
        let subscription = QuerySubscription {
            inner: Box::pin(WatchStream::new(rx)),
        };
        (SubscriptionFeed { tx }, subscription)
    }

    /// Publish a result. Returns `false` once the subscriber is gone.
    pub fn deliver(&self, result: Result<QuerySnapshot, StoreError>) -> bool {
        self.tx.send(Some(result)).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Client-side half of a live query: a stream of full result snapshots.
///
/// Dropping it unsubscribes.
pub struct QuerySubscription {
    inner: Pin<Box<dyn Stream<Item = FeedState> + Send>>,
}

impl Stream for QuerySubscription {
    type Item = Result<QuerySnapshot, StoreError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            match ready!(self.inner.as_mut().poll_next(cx)) {
                Some(Some(result)) => return Poll::Ready(Some(result)),
                // Nothing delivered yet.
                Some(None) => continue,
                None => return Poll::Ready(None),
            }
        }
    }
}
