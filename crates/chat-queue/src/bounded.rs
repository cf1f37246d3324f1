use crossbeam_channel::{bounded, Receiver, RecvError, Sender, TryRecvError};

/// Returned by `pop_nonblocking` when there is currently nothing to pop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Empty;

/// A fixed-capacity multi-producer multi-consumer queue.
///
/// `push` blocks while the queue is full, `pop_blocking` blocks while it's
/// empty, and `pop_nonblocking` returns immediately either way - the same
/// three operations the reactor and worker pool need, backed by
/// `crossbeam_channel`'s bounded channel instead of a hand-rolled
/// mutex/condvar ring buffer.
pub struct BoundedQueue<T> {
    tx: Sender<T>,
    rx: Receiver<T>,
}

impl<T> BoundedQueue<T> {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity);
        Self { tx, rx }
    }

    /// Blocks until there is room, then pushes `item`.
    ///
    /// The only way this can fail is if every receiver has been dropped,
    /// which only happens while the process is tearing down; the job is
    /// silently discarded rather than panicking the caller.
    pub fn push(&self, item: T) {
        let _ = self.tx.send(item);
    }

    /// Blocks until an item is available.
    ///
    /// Returns `None` once every sender has been dropped and the queue is
    /// drained, signalling there is nothing left to ever arrive.
    pub fn pop_blocking(&self) -> Option<T> {
        match self.rx.recv() {
            Ok(item) => Some(item),
            Err(RecvError) => None,
        }
    }

    /// Returns immediately with `Err(Empty)` if nothing is queued.
    pub fn pop_nonblocking(&self) -> Result<T, Empty> {
        self.rx.try_recv().map_err(|err| match err {
            TryRecvError::Empty | TryRecvError::Disconnected => Empty,
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

impl<T> Clone for BoundedQueue<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            rx: self.rx.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn pops_in_fifo_order() {
        let q: BoundedQueue<i32> = BoundedQueue::new(8);
        for i in 0..5 {
            q.push(i);
        }
        let popped: Vec<i32> = (0..5).map(|_| q.pop_nonblocking().unwrap()).collect();
        assert_eq!(popped, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn pop_nonblocking_reports_empty() {
        let q: BoundedQueue<i32> = BoundedQueue::new(4);
        assert_eq!(q.pop_nonblocking(), Err(Empty));
    }

    #[test]
    fn push_blocks_while_full_until_a_slot_frees() {
        let q = Arc::new(BoundedQueue::new(1));
        q.push(1);

        let q2 = q.clone();
        let handle = thread::spawn(move || {
            q2.push(2);
        });

        thread::sleep(Duration::from_millis(50));
        assert!(!handle.is_finished(), "push should still be blocked on a full queue");

        assert_eq!(q.pop_blocking(), Some(1));
        handle.join().unwrap();
        assert_eq!(q.pop_blocking(), Some(2));
    }

    #[test]
    fn pop_blocking_waits_for_a_push() {
        let q = Arc::new(BoundedQueue::new(4));
        let q2 = q.clone();
        let handle = thread::spawn(move || q2.pop_blocking());

        thread::sleep(Duration::from_millis(20));
        q.push(42);

        assert_eq!(handle.join().unwrap(), Some(42));
    }
}
