//! Session and room bookkeeping: the shared state the worker pool mutates in
//! response to jobs pulled off the logic queue.

mod room;
mod session;

pub use room::{Room, RoomTable};
pub use session::{Session, SessionTable};

use chat_core::{ConnHandle, MAX_CLIENTS};
use chat_protocol::Packet;
use chat_queue::{BoundedQueue, Job, Waker};

/// Combines the session table and room table behind the operations the
/// worker pool actually needs, so `chat-worker` doesn't have to reach into
/// both tables and get the join/leave/broadcast choreography right itself.
pub struct ChatState {
    pub sessions: SessionTable,
    pub rooms: RoomTable,
}

impl ChatState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            sessions: SessionTable::new(),
            rooms: RoomTable::new(),
        }
    }

    /// Ensures a session exists for `handle`, creating one lazily on the
    /// first packet from a connection.
    pub fn ensure_session(&self, handle: ConnHandle) -> Option<Session> {
        self.sessions.get_or_create(handle)
    }

    /// Puts `handle` into a room with free space, creating one if every
    /// existing room is full. A no-op if the session is already in a room,
    /// or if the server is at `MAX_ROOMS` and every room is full.
    pub fn join_room(&self, handle: ConnHandle) {
        let Some(session) = self.sessions.get(handle) else {
            return;
        };
        if session.room_id.is_some() {
            return;
        }
        let room = match self.rooms.find_with_space() {
            Some(room) => room,
            None => match self.rooms.create() {
                Some(room) => room,
                None => {
                    tracing::warn!(handle = %handle, "no room available, at MAX_ROOMS");
                    return;
                }
            },
        };
        room.join(handle, &self.sessions);
    }

    /// Removes `handle` from whatever room it's in, if any. Resolves a
    /// dangling `room_id` (the room it pointed at no longer exists) by just
    /// clearing it.
    pub fn leave_room(&self, handle: ConnHandle) {
        let Some(session) = self.sessions.get(handle) else {
            return;
        };
        let Some(room_id) = session.room_id else {
            return;
        };
        match self.rooms.get(room_id) {
            Some(room) => room.leave(handle, &self.sessions),
            None => self.sessions.set_room(handle, None),
        }
    }

    /// Broadcasts `packet` to every other member of `handle`'s room. A no-op
    /// if the session isn't in a room.
    pub fn chat(
        &self,
        handle: ConnHandle,
        packet: &Packet,
        io_queue: &BoundedQueue<Job>,
        waker: &dyn Waker,
    ) {
        let Some(session) = self.sessions.get(handle) else {
            return;
        };
        let Some(room_id) = session.room_id else {
            return;
        };
        let Some(room) = self.rooms.get(room_id) else {
            return;
        };
        room.broadcast(handle, packet, &self.sessions, io_queue, waker);
    }

    /// Tears down a session on disconnect: leaves its room, then removes it
    /// from the session table.
    pub fn disconnect(&self, handle: ConnHandle) {
        if self.sessions.get(handle).is_some() {
            self.leave_room(handle);
            self.sessions.remove(handle);
        }
    }

    /// Walks every possible handle and tears down whatever session remains,
    /// regardless of whether its connection was individually disconnected
    /// first. Called once by each worker as it drains its final `Shutdown`
    /// job, so it must be safe to call concurrently and safe to call when
    /// there's nothing left to clean up.
    pub fn shutdown(&self) {
        for idx in 0..MAX_CLIENTS {
            self.disconnect(ConnHandle::new(idx));
        }
        chat_core::safe_assert!(self.sessions.is_empty(), "session table must be empty after shutdown");
        for room_id in 0..self.rooms.room_count() {
            let count = self.rooms.get(room_id).map_or(0, |r| r.user_count());
            chat_core::safe_assert!(count == 0, "room {room_id} still has {count} members after shutdown");
        }
    }
}

impl Default for ChatState {
    fn default() -> Self {
        Self::new()
    }
}
