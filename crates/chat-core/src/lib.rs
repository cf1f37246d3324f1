//! Shared constants and identifiers used across the chat server crates.

pub mod assert;
mod handle;

pub use handle::ConnHandle;

/// Maximum number of connections the server will track at once. Anything
/// beyond this is rejected at accept time.
pub const MAX_CLIENTS: usize = 512;

/// Maximum number of concurrently open rooms.
pub const MAX_ROOMS: usize = 256;

/// Maximum number of members a single room can hold.
pub const MAX_ROOM_USER: usize = 8;

/// Capacity of each bounded job queue (logic queue and io queue).
pub const JOB_QUEUE_SIZE: usize = 1024;

/// Number of worker threads draining the logic queue.
pub const WORKER_THREAD_NUM: usize = 4;
