use std::sync::{Arc, Mutex};

use super::{ErrorChannel, ErrorEvent, ListenerGuard};

/// Records every event it sees. Used by tests and by callers that want to
/// inspect failures after the fact.
#[derive(Clone, Default)]
pub struct ErrorLog {
    events: Arc<Mutex<Vec<ErrorEvent>>>,
}

impl ErrorLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start recording events from `channel`.
    pub fn attach(&self, channel: &ErrorChannel) -> ListenerGuard {
        let log = self.clone();
        channel.listen(move |event| log.record(event))
    }

    pub fn record(&self, event: &ErrorEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }

    pub fn events(&self) -> Vec<ErrorEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.events.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

/// Forwards events to `tracing` at error level, with their display message.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogListener;

impl LogListener {
    pub fn attach(self, channel: &ErrorChannel) -> ListenerGuard {
        channel.listen(move |event| self.log(event))
    }

    pub fn log(&self, event: &ErrorEvent) {
        tracing::error!(
            path = %event.path,
            operation = %event.operation,
            attempted_data = ?event.attempted_data,
            "{}",
            event.message()
        );
    }
}
