//! Bounded job queues connecting the reactor thread to the worker pool.

mod bounded;
mod job;
mod waker;

pub use bounded::{BoundedQueue, Empty};
pub use job::Job;
pub use waker::Waker;
