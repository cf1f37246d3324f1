use chat_core::ConnHandle;
use chat_protocol::Packet;

/// Unit of work passed between the reactor and the worker pool.
///
/// `Packet` and `Disconnect` flow reactor -> workers on the logic queue;
/// `Send` flows workers -> reactor on the io queue. `Shutdown` is posted
/// once per worker thread by the reactor as it tears down.
#[derive(Debug, Clone)]
pub enum Job {
    Packet { handle: ConnHandle, packet: Packet },
    Disconnect { handle: ConnHandle },
    Send { handle: ConnHandle, packet: Packet },
    Shutdown,
}
