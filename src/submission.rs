//! Submission - handle to a fire-and-forget mutation.
//!
//! Repository mutations start immediately and return a [`Submission`]. UI
//! callers drop it and move on; failures reach them through the
//! [`ErrorChannel`](crate::bus::ErrorChannel). Tests and callers that care
//! can `wait()` for the [`Outcome`].

use std::future::Future;

use tokio::task::JoinHandle;

use crate::bus::ErrorEvent;

/// How a submitted mutation ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    /// The store accepted the write.
    Committed(T),
    /// Input validation failed; nothing was sent.
    Skipped,
    /// The write was refused before reaching the store.
    Rejected(String),
    /// The store refused the write. The same event went to the error channel.
    Failed(ErrorEvent),
    /// The task was aborted before it finished.
    Cancelled,
}

impl<T> Outcome<T> {
    pub fn is_committed(&self) -> bool {
        matches!(self, Outcome::Committed(_))
    }

    pub fn committed(self) -> Option<T> {
        match self {
            Outcome::Committed(value) => Some(value),
            _ => None,
        }
    }

    pub fn error_event(&self) -> Option<&ErrorEvent> {
        match self {
            Outcome::Failed(event) => Some(event),
            _ => None,
        }
    }
}

enum State<T> {
    Ready(Outcome<T>),
    Running(JoinHandle<Outcome<T>>),
}

/// A mutation in flight. Dropping it does not cancel the mutation.
pub struct Submission<T> {
    state: State<T>,
}

impl<T: Send + 'static> Submission<T> {
    /// Run `task` in the background on the current tokio runtime.
    pub fn spawn<F>(task: F) -> Self
    where
        F: Future<Output = Outcome<T>> + Send + 'static,
    {
        Self {
            state: State::Running(tokio::spawn(task)),
        }
    }

    /// A submission that did nothing because its input was invalid.
    pub fn skipped() -> Self {
        Self {
            state: State::Ready(Outcome::Skipped),
        }
    }

    pub fn is_finished(&self) -> bool {
        match &self.state {
            State::Ready(_) => true,
            State::Running(handle) => handle.is_finished(),
        }
    }

    /// Wait for the mutation to finish. Panics inside the task are resumed
    /// on the caller.
    pub async fn wait(self) -> Outcome<T> {
        match self.state {
            State::Ready(outcome) => outcome,
            State::Running(handle) => match handle.await {
                Ok(outcome) => outcome,
                Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
                Err(_) => Outcome::Cancelled,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn skipped_is_ready() {
        let submission = Submission::<()>::skipped();
        assert!(submission.is_finished());
        assert_eq!(submission.wait().await, Outcome::Skipped);
    }

    #[tokio::test]
    async fn spawn_returns_before_task_completes() {
        let (tx, rx) = oneshot::channel::<()>();
        let submission = Submission::spawn(async move {
            let _ = rx.await;
            Outcome::Committed(7)
        });
        assert!(!submission.is_finished());

        tx.send(()).unwrap();
        assert_eq!(submission.wait().await.committed(), Some(7));
    }
}
