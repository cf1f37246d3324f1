use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chat_core::{ConnHandle, MAX_ROOMS, MAX_ROOM_USER};
use chat_protocol::{Packet, PacketType};
use chat_queue::{BoundedQueue, Job, Waker};

use crate::session::SessionTable;

struct RoomInner {
    members: Vec<ConnHandle>,
}

/// A single chat room: a membership list guarded by its own lock, plus an
/// approximate member count kept outside that lock so `RoomTable::find_with_space`
/// can scan rooms without ever holding two locks at once.
pub struct Room {
    pub room_id: usize,
    member_count: AtomicUsize,
    inner: Mutex<RoomInner>,
}

impl Room {
    fn new(room_id: usize) -> Self {
        Self {
            room_id,
            member_count: AtomicUsize::new(0),
            inner: Mutex::new(RoomInner { members: Vec::with_capacity(MAX_ROOM_USER) }),
        }
    }

    #[must_use]
    pub fn user_count(&self) -> usize {
        self.member_count.load(Ordering::Acquire)
    }

    /// Idempotent: joining a room you're already in, or a full room, is a
    /// silent no-op rather than an error.
    pub fn join(&self, handle: ConnHandle, sessions: &SessionTable) {
        let mut inner = self.inner.lock().unwrap();
        if inner.members.contains(&handle) {
            return;
        }
        if inner.members.len() >= MAX_ROOM_USER {
            return;
        }
        inner.members.push(handle);
        self.member_count.store(inner.members.len(), Ordering::Release);
        drop(inner);
        sessions.set_room(handle, Some(self.room_id));
        tracing::info!(handle = %handle, room_id = self.room_id, "joined room");
    }

    /// Swap-removes `handle` from the membership list if present, then
    /// clears the session's `room_id` regardless of whether it was found -
    /// this is also the unconditional cleanup path called when the caller
    /// already knows the room id is stale.
    pub fn leave(&self, handle: ConnHandle, sessions: &SessionTable) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(pos) = inner.members.iter().position(|&h| h == handle) {
            let last = inner.members.len() - 1;
            inner.members.swap(pos, last);
            inner.members.pop();
            self.member_count.store(inner.members.len(), Ordering::Release);
        }
        drop(inner);
        sessions.set_room(handle, None);
        tracing::info!(handle = %handle, room_id = self.room_id, "left room");
    }

    /// Collects targets under the room lock, releases it, then enqueues one
    /// `Send` job per target before waking the reactor once.
    pub fn broadcast(
        &self,
        sender: ConnHandle,
        packet: &Packet,
        sessions: &SessionTable,
        io_queue: &BoundedQueue<Job>,
        waker: &dyn Waker,
    ) {
        if packet.payload.is_empty() {
            return;
        }

        let targets: Vec<ConnHandle> = {
            let inner = self.inner.lock().unwrap();
            inner
                .members
                .iter()
                .copied()
                .filter(|&h| h != sender)
                .filter(|&h| sessions.get(h).is_some_and(|s| s.alive))
                .collect()
        };
        if targets.is_empty() {
            return;
        }

        let mut payload = packet.payload.clone();
        payload.push(b'\n');
        if payload.len() > chat_protocol::MAX_PAYLOAD {
            tracing::warn!(room_id = self.room_id, "broadcast payload overflowed MAX_PAYLOAD, dropping");
            return;
        }
        let out = Packet::of_type(PacketType::Chat, payload);

        for handle in targets {
            io_queue.push(Job::Send { handle, packet: out.clone() });
        }
        waker.wake();
    }
}

/// Table of rooms, guarding only room creation/lookup - membership is
/// guarded per-room. `rooms_lock` (here, the table's own mutex) is never
/// held while acquiring a room's lock.
pub struct RoomTable {
    rooms: Mutex<Vec<Arc<Room>>>,
}

impl RoomTable {
    #[must_use]
    pub fn new() -> Self {
        Self { rooms: Mutex::new(Vec::new()) }
    }

    pub fn create(&self) -> Option<Arc<Room>> {
        let mut rooms = self.rooms.lock().unwrap();
        if rooms.len() >= MAX_ROOMS {
            return None;
        }
        let room = Arc::new(Room::new(rooms.len()));
        rooms.push(room.clone());
        tracing::info!(room_id = room.room_id, "room created");
        Some(room)
    }

    #[must_use]
    pub fn get(&self, room_id: usize) -> Option<Arc<Room>> {
        self.rooms.lock().unwrap().get(room_id).cloned()
    }

    /// First room with a free slot, read via each room's atomic count -
    /// never taking a room's own lock while `rooms` is held.
    #[must_use]
    pub fn find_with_space(&self) -> Option<Arc<Room>> {
        self.rooms
            .lock()
            .unwrap()
            .iter()
            .find(|room| room.user_count() < MAX_ROOM_USER)
            .cloned()
    }

    #[must_use]
    pub fn room_count(&self) -> usize {
        self.rooms.lock().unwrap().len()
    }
}

impl Default for RoomTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chat_queue::BoundedQueue;

    struct NullWaker;
    impl Waker for NullWaker {
        fn wake(&self) {}
    }

    #[test]
    fn join_is_idempotent_and_capped() {
        let sessions = SessionTable::new();
        let room = Room::new(0);
        for i in 0..MAX_ROOM_USER {
            let h = ConnHandle::new(i);
            sessions.get_or_create(h);
            room.join(h, &sessions);
        }
        assert_eq!(room.user_count(), MAX_ROOM_USER);

        let overflow = ConnHandle::new(MAX_ROOM_USER);
        sessions.get_or_create(overflow);
        room.join(overflow, &sessions);
        assert_eq!(room.user_count(), MAX_ROOM_USER, "room must not exceed MAX_ROOM_USER");

        let repeat = ConnHandle::new(0);
        room.join(repeat, &sessions);
        assert_eq!(room.user_count(), MAX_ROOM_USER, "rejoining must not duplicate membership");
    }

    #[test]
    fn leave_swap_removes_and_clears_room_id() {
        let sessions = SessionTable::new();
        let room = Room::new(0);
        let a = ConnHandle::new(0);
        let b = ConnHandle::new(1);
        sessions.get_or_create(a);
        sessions.get_or_create(b);
        room.join(a, &sessions);
        room.join(b, &sessions);

        room.leave(a, &sessions);
        assert_eq!(room.user_count(), 1);
        assert_eq!(sessions.get(a).unwrap().room_id, None);
        assert_eq!(sessions.get(b).unwrap().room_id, Some(0));
    }

    #[test]
    fn broadcast_excludes_sender_and_dead_sessions() {
        let sessions = SessionTable::new();
        let room = Room::new(0);
        let io_queue: BoundedQueue<Job> = BoundedQueue::new(16);
        let waker = NullWaker;

        let sender = ConnHandle::new(0);
        let listener = ConnHandle::new(1);
        let gone = ConnHandle::new(2);

        sessions.get_or_create(sender);
        sessions.get_or_create(listener);
        sessions.get_or_create(gone);
        room.join(sender, &sessions);
        room.join(listener, &sessions);
        room.join(gone, &sessions);
        sessions.remove(gone);

        let packet = Packet::of_type(PacketType::Chat, b"hi".to_vec());
        room.broadcast(sender, &packet, &sessions, &io_queue, &waker);

        let mut dispatched = Vec::new();
        while let Ok(job) = io_queue.pop_nonblocking() {
            dispatched.push(job);
        }
        assert_eq!(dispatched.len(), 1);
        match &dispatched[0] {
            Job::Send { handle, packet } => {
                assert_eq!(*handle, listener);
                assert_eq!(packet.payload, b"hi\n");
            }
            other => panic!("expected a Send job, got {other:?}"),
        }
    }

    #[test]
    fn broadcast_of_empty_payload_is_dropped() {
        let sessions = SessionTable::new();
        let room = Room::new(0);
        let io_queue: BoundedQueue<Job> = BoundedQueue::new(16);
        let waker = NullWaker;

        let sender = ConnHandle::new(0);
        let listener = ConnHandle::new(1);
        sessions.get_or_create(sender);
        sessions.get_or_create(listener);
        room.join(sender, &sessions);
        room.join(listener, &sessions);

        let packet = Packet::of_type(PacketType::Chat, Vec::new());
        room.broadcast(sender, &packet, &sessions, &io_queue, &waker);
        assert!(io_queue.is_empty());
    }

    #[test]
    fn find_with_space_skips_full_rooms() {
        let table = RoomTable::new();
        let sessions = SessionTable::new();
        let full = table.create().unwrap();
        for i in 0..MAX_ROOM_USER {
            let h = ConnHandle::new(i);
            sessions.get_or_create(h);
            full.join(h, &sessions);
        }
        let spare = table.create().unwrap();

        let found = table.find_with_space().unwrap();
        assert_eq!(found.room_id, spare.room_id);
    }
}
