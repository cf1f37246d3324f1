use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use chat_core::{ConnHandle, MAX_CLIENTS};

/// A connected client's chat-level identity, independent of the socket that
/// the reactor owns for it.
#[derive(Debug, Clone, Copy)]
pub struct Session {
    pub session_id: u64,
    pub handle: ConnHandle,
    pub room_id: Option<usize>,
    pub alive: bool,
}

/// Dense table of sessions indexed by connection handle: a fixed
/// `MAX_CLIENTS`-sized slot array plus a session-id counter, both guarded
/// by a single lock.
pub struct SessionTable {
    sessions: Mutex<Vec<Option<Session>>>,
    next_session_id: AtomicU64,
}

impl SessionTable {
    #[must_use]
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(vec![None; MAX_CLIENTS]),
            next_session_id: AtomicU64::new(1),
        }
    }

    #[must_use]
    pub fn get(&self, handle: ConnHandle) -> Option<Session> {
        let idx = handle.as_usize();
        if idx >= MAX_CLIENTS {
            return None;
        }
        self.sessions.lock().unwrap()[idx]
    }

    /// Returns the existing session for `handle`, or creates one. A second
    /// call for an already-sessioned handle just returns the existing
    /// session unchanged.
    pub fn get_or_create(&self, handle: ConnHandle) -> Option<Session> {
        let idx = handle.as_usize();
        if idx >= MAX_CLIENTS {
            return None;
        }
        let mut sessions = self.sessions.lock().unwrap();
        if let Some(existing) = sessions[idx] {
            return Some(existing);
        }
        let session_id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        let session = Session {
            session_id,
            handle,
            room_id: None,
            alive: true,
        };
        sessions[idx] = Some(session);
        tracing::debug!(session_id, handle = %handle, "session created");
        Some(session)
    }

    pub fn remove(&self, handle: ConnHandle) -> Option<Session> {
        let idx = handle.as_usize();
        if idx >= MAX_CLIENTS {
            return None;
        }
        let removed = self.sessions.lock().unwrap()[idx].take();
        if let Some(session) = removed {
            tracing::debug!(session_id = session.session_id, handle = %handle, "session removed");
        }
        removed
    }

    pub fn set_room(&self, handle: ConnHandle, room_id: Option<usize>) {
        let idx = handle.as_usize();
        if idx >= MAX_CLIENTS {
            return;
        }
        if let Some(session) = self.sessions.lock().unwrap()[idx].as_mut() {
            session.room_id = room_id;
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.lock().unwrap().iter().all(Option::is_none)
    }
}

impl Default for SessionTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_or_create_is_idempotent() {
        let table = SessionTable::new();
        let handle = ConnHandle::new(3);
        let first = table.get_or_create(handle).unwrap();
        let second = table.get_or_create(handle).unwrap();
        assert_eq!(first.session_id, second.session_id);
    }

    #[test]
    fn out_of_range_handle_is_rejected() {
        let table = SessionTable::new();
        let handle = ConnHandle::new(MAX_CLIENTS);
        assert!(table.get_or_create(handle).is_none());
        assert!(table.get(handle).is_none());
    }

    #[test]
    fn remove_clears_the_slot() {
        let table = SessionTable::new();
        let handle = ConnHandle::new(1);
        table.get_or_create(handle);
        assert!(table.remove(handle).is_some());
        assert!(table.get(handle).is_none());
        assert!(table.remove(handle).is_none());
    }
}
