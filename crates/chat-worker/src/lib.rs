//! The logic side of the chat server: `WORKER_THREAD_NUM` threads draining
//! `logic_queue` and mutating `chat-state` in response to each job.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use chat_core::ConnHandle;
use chat_protocol::{Packet, PacketType};
use chat_queue::{BoundedQueue, Job, Waker};
use chat_state::ChatState;

/// Spawns `count` worker threads, each running `worker_loop` against the
/// shared state and queues. Returns their join handles so the caller (the
/// bootstrap binary) can wait for a clean exit after shutdown.
pub fn spawn_pool(
    count: usize,
    state: Arc<ChatState>,
    logic_queue: BoundedQueue<Job>,
    io_queue: BoundedQueue<Job>,
    waker: Arc<dyn Waker>,
) -> Vec<JoinHandle<()>> {
    (0..count)
        .map(|id| {
            let state = Arc::clone(&state);
            let logic_queue = logic_queue.clone();
            let io_queue = io_queue.clone();
            let waker = Arc::clone(&waker);
            thread::Builder::new()
                .name(format!("chat-worker-{id}"))
                .spawn(move || worker_loop(&state, &logic_queue, &io_queue, waker.as_ref()))
                .expect("failed to spawn worker thread")
        })
        .collect()
}

/// One worker's main loop: block for a job, dispatch, repeat until told to
/// shut down. `Shutdown` is the only way out.
fn worker_loop(state: &ChatState, logic_queue: &BoundedQueue<Job>, io_queue: &BoundedQueue<Job>, waker: &dyn Waker) {
    loop {
        let Some(job) = logic_queue.pop_blocking() else {
            // Every sender dropped: the reactor is gone. Treat the same as
            // an explicit Shutdown.
            return;
        };
        match job {
            Job::Packet { handle, packet } => handle_packet(state, handle, &packet, io_queue, waker),
            Job::Disconnect { handle } => handle_disconnect(state, handle),
            Job::Shutdown => {
                tracing::debug!("worker received shutdown");
                handle_shutdown(state);
                return;
            }
            Job::Send { .. } => {
                chat_core::safe_panic!("logic_queue received a Send job, which belongs on io_queue");
            }
        }
    }
}

/// Ensures the session exists (first packet from a connection creates it
/// lazily), then dispatches on the packet's wire type.
fn handle_packet(state: &ChatState, handle: ConnHandle, packet: &Packet, io_queue: &BoundedQueue<Job>, waker: &dyn Waker) {
    if state.ensure_session(handle).is_none() {
        tracing::warn!(handle = %handle, "packet for out-of-range handle, dropping");
        return;
    }

    match packet.kind() {
        Some(PacketType::JoinRoom) => state.join_room(handle),
        Some(PacketType::Chat) => state.chat(handle, packet, io_queue, waker),
        Some(PacketType::LeaveRoom) => state.leave_room(handle),
        Some(PacketType::GameAction | PacketType::GameResult) | None => {
            tracing::debug!(handle = %handle, type_raw = packet.type_raw, "ignoring packet type");
        }
    }
}

/// Leaves any room `handle` was in, then forgets its session.
fn handle_disconnect(state: &ChatState, handle: ConnHandle) {
    state.disconnect(handle);
}

/// Walks every possible handle, tearing down whatever session remains.
/// Idempotent and safe to call from every worker that receives a
/// `Shutdown` job: by the time workers see it, the reactor has already
/// disconnected every live connection and most sessions are already gone.
fn handle_shutdown(state: &ChatState) {
    state.shutdown();
}

#[cfg(test)]
mod tests {
    use super::*;
    use chat_protocol::Packet;

    struct NullWaker;
    impl Waker for NullWaker {
        fn wake(&self) {}
    }

    #[test]
    fn join_then_chat_via_handle_packet_reaches_roommate() {
        let state = ChatState::new();
        let io_queue: BoundedQueue<Job> = BoundedQueue::new(16);
        let waker = NullWaker;

        let a = ConnHandle::new(0);
        let b = ConnHandle::new(1);

        handle_packet(&state, a, &Packet::of_type(PacketType::JoinRoom, Vec::new()), &io_queue, &waker);
        handle_packet(&state, b, &Packet::of_type(PacketType::JoinRoom, Vec::new()), &io_queue, &waker);
        handle_packet(&state, a, &Packet::of_type(PacketType::Chat, b"hi".to_vec()), &io_queue, &waker);

        let job = io_queue.pop_nonblocking().expect("expected a Send job");
        match job {
            Job::Send { handle, packet } => {
                assert_eq!(handle, b);
                assert_eq!(packet.payload, b"hi\n");
            }
            other => panic!("expected Send, got {other:?}"),
        }
        assert!(io_queue.is_empty());
    }

    #[test]
    fn chat_before_join_is_silently_dropped() {
        let state = ChatState::new();
        let io_queue: BoundedQueue<Job> = BoundedQueue::new(16);
        let waker = NullWaker;
        let a = ConnHandle::new(0);

        handle_packet(&state, a, &Packet::of_type(PacketType::Chat, b"x".to_vec()), &io_queue, &waker);
        assert!(io_queue.is_empty());
        assert!(state.sessions.get(a).is_some(), "session is still created lazily");
    }

    #[test]
    fn disconnect_clears_session_and_room() {
        let state = ChatState::new();
        let io_queue: BoundedQueue<Job> = BoundedQueue::new(16);
        let waker = NullWaker;
        let a = ConnHandle::new(0);

        handle_packet(&state, a, &Packet::of_type(PacketType::JoinRoom, Vec::new()), &io_queue, &waker);
        handle_disconnect(&state, a);

        assert!(state.sessions.get(a).is_none());
        assert_eq!(state.rooms.get(0).unwrap().user_count(), 0);
    }

    #[test]
    fn unknown_packet_type_is_ignored() {
        let state = ChatState::new();
        let io_queue: BoundedQueue<Job> = BoundedQueue::new(16);
        let waker = NullWaker;
        let a = ConnHandle::new(0);

        handle_packet(&state, a, &Packet::new(99, b"???".to_vec()), &io_queue, &waker);
        assert!(io_queue.is_empty());
    }
}
