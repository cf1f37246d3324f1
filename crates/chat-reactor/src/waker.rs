use std::sync::Arc;

use chat_queue::Waker as ChatWaker;

/// Bridges `mio::Waker` to the `chat_queue::Waker` trait so `chat-state`
/// and the signal handlers can nudge the reactor without depending on
/// `mio` directly. Holds an `Arc` since the same waker is shared between
/// the reactor's `Poll` registration, the worker pool, and the signal
/// handlers installed at startup.
pub struct MioWaker(pub Arc<mio::Waker>);

impl ChatWaker for MioWaker {
    fn wake(&self) {
        if let Err(e) = self.0.wake() {
            tracing::warn!(?e, "failed to wake reactor");
        }
    }
}
