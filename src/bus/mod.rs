//! Error channel - publish/subscribe for store failures.
//!
//! Mutations are fire-and-forget, so their failures cannot be returned to the
//! caller. Instead the repositories convert each rejected write into an
//! [`ErrorEvent`] and publish it on an [`ErrorChannel`] that is passed to
//! them explicitly. UI code (or a test) subscribes to the same channel.
//!
//! ```text
//! CommentRepository ──┐
//!                     ├──► ErrorChannel ──► listeners (toast, LogListener, ErrorLog, ...)
//! LibraryRepository ──┘
//! ```

#[cfg(feature = "emitter")]
mod emitter;
mod listeners;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Operation, StoreError};

#[cfg(feature = "emitter")]
pub use emitter::{EmitterBridge, PERMISSION_ERROR_EVENT};
pub use listeners::{ErrorLog, LogListener};

/// Broad class of a store failure, used to word the display message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    PermissionDenied,
    NotFound,
    Contention,
    Aborted,
    InvalidDocument,
    Unavailable,
}

impl From<&StoreError> for ErrorKind {
    fn from(err: &StoreError) -> Self {
        match err {
            StoreError::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            StoreError::NotFound { .. } => ErrorKind::NotFound,
            StoreError::Contention { .. } => ErrorKind::Contention,
            StoreError::Aborted { .. } => ErrorKind::Aborted,
            StoreError::Document(_) => ErrorKind::InvalidDocument,
            StoreError::Unavailable(_) => ErrorKind::Unavailable,
        }
    }
}

/// A rejected store request, as reported on the error channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEvent {
    /// Path of the document or collection the request targeted.
    pub path: String,
    pub operation: Operation,
    /// The data the request tried to write, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempted_data: Option<Value>,
    pub kind: ErrorKind,
    /// What the store said.
    pub cause: String,
}

impl ErrorEvent {
    pub fn new(path: impl Into<String>, operation: Operation, cause: &StoreError) -> Self {
        Self {
            path: path.into(),
            operation,
            attempted_data: None,
            kind: ErrorKind::from(cause),
            cause: cause.to_string(),
        }
    }

    pub fn with_attempted_data(mut self, data: impl Into<Value>) -> Self {
        self.attempted_data = Some(data.into());
        self
    }

    /// Human-readable description for display.
    pub fn message(&self) -> String {
        let (operation, path) = (self.operation, &self.path);
        match self.kind {
            ErrorKind::PermissionDenied => format!(
                "Missing or insufficient permissions: the following request was denied: {} on {}",
                operation, path
            ),
            ErrorKind::NotFound => format!("{} failed: {} does not exist", operation, path),
            ErrorKind::Contention => format!(
                "{} on {} failed: too many concurrent changes, please try again",
                operation, path
            ),
            ErrorKind::Aborted => {
                format!("{} on {} was abandoned: {}", operation, path, self.cause)
            }
            ErrorKind::InvalidDocument => {
                format!("{} on {} was rejected: {}", operation, path, self.cause)
            }
            ErrorKind::Unavailable => format!(
                "{} on {} failed: the server could not be reached",
                operation, path
            ),
        }
    }
}

/// Identifies a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Arc<dyn Fn(&ErrorEvent) + Send + Sync>;

struct Inner {
    listeners: RwLock<Vec<(ListenerId, Listener)>>,
    next_id: AtomicU64,
}

/// Cloneable handle to a shared error channel. All clones publish to and
/// deliver from the same listener set.
#[derive(Clone)]
pub struct ErrorChannel {
    inner: Arc<Inner>,
}

impl Default for ErrorChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ErrorChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorChannel")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl ErrorChannel {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                listeners: RwLock::new(Vec::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Register a listener until [`unsubscribe`](Self::unsubscribe) is called.
    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&ErrorEvent) + Send + Sync + 'static,
    {
        let id = ListenerId(self.inner.next_id.fetch_add(1, Ordering::SeqCst));
        if let Ok(mut listeners) = self.inner.listeners.write() {
            listeners.push((id, Arc::new(listener)));
        }
        id
    }

    /// Remove a listener. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let Ok(mut listeners) = self.inner.listeners.write() else {
            return false;
        };
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }

    /// Register a listener for as long as the returned guard lives.
    #[must_use = "the listener is removed when the guard is dropped"]
    pub fn listen<F>(&self, listener: F) -> ListenerGuard
    where
        F: Fn(&ErrorEvent) + Send + Sync + 'static,
    {
        ListenerGuard {
            channel: self.clone(),
            id: self.subscribe(listener),
        }
    }

    /// Deliver an event to every listener registered right now.
    pub fn emit(&self, event: ErrorEvent) {
        tracing::warn!(
            path = %event.path,
            operation = %event.operation,
            cause = %event.cause,
            "store request rejected"
        );
        // Snapshot so listeners may (un)subscribe while being called.
        let listeners: Vec<Listener> = match self.inner.listeners.read() {
            Ok(listeners) => listeners.iter().map(|(_, l)| l.clone()).collect(),
            Err(_) => return,
        };
        for listener in listeners {
            listener(&event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.read().map(|l| l.len()).unwrap_or(0)
    }
}

/// Keeps a listener registered; dropping it unsubscribes.
pub struct ListenerGuard {
    channel: ErrorChannel,
    id: ListenerId,
}

impl ListenerGuard {
    pub fn id(&self) -> ListenerId {
        self.id
    }
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        self.channel.unsubscribe(self.id);
    }
}
