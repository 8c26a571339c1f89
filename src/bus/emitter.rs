use std::sync::{Arc, Mutex};

use event_emitter_rs::EventEmitter;

use super::{ErrorChannel, ErrorEvent, ListenerGuard};

/// Event name used for every error-channel event re-emitted on the emitter.
pub const PERMISSION_ERROR_EVENT: &str = "permission-error";

/// Re-emits error-channel events on an `EventEmitter` for in-process
/// consumers that listen by event name.
///
/// Payloads travel as JSON strings. The emitter runs callbacks on their own
/// threads, so listeners observe events asynchronously.
#[derive(Clone)]
pub struct EmitterBridge {
    emitter: Arc<Mutex<EventEmitter>>,
}

impl Default for EmitterBridge {
    fn default() -> Self {
        Self::new(EventEmitter::new())
    }
}

impl EmitterBridge {
    pub fn new(emitter: EventEmitter) -> Self {
        Self {
            emitter: Arc::new(Mutex::new(emitter)),
        }
    }

    /// Forward every event published on `channel` while the guard lives.
    pub fn attach(&self, channel: &ErrorChannel) -> ListenerGuard {
        let bridge = self.clone();
        channel.listen(move |event| bridge.forward(event))
    }

    /// Register a callback for forwarded events. Payloads that fail to
    /// decode are dropped.
    pub fn on<F>(&self, callback: F) -> Option<String>
    where
        F: Fn(ErrorEvent) + Send + Sync + 'static,
    {
        let mut emitter = self.emitter.lock().ok()?;
        let id = emitter.on(PERMISSION_ERROR_EVENT, move |payload: String| {
            match serde_json::from_str::<ErrorEvent>(&payload) {
                Ok(event) => callback(event),
                Err(err) => tracing::warn!(error = %err, "dropping undecodable error event"),
            }
        });
        Some(id)
    }

    fn forward(&self, event: &ErrorEvent) {
        let payload = match serde_json::to_string(event) {
            Ok(payload) => payload,
            Err(err) => {
                tracing::warn!(error = %err, "failed to encode error event");
                return;
            }
        };
        if let Ok(mut emitter) = self.emitter.lock() {
            emitter.emit(PERMISSION_ERROR_EVENT, payload);
        }
    }
}
