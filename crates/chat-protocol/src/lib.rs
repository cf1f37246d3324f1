//! Wire format and framing state machine for the chat protocol.
//!
//! Packets are `{ length: u16 (big-endian), type: u16 (big-endian), payload }`
//! where `length` covers `type` plus `payload` (i.e. `length == 2 + payload.len()`).

mod error;
mod framing;
mod packet;

pub use error::ProtocolError;
pub use framing::{DecodeOutcome, RecvBuffer, RECV_BUF_SIZE};
pub use packet::{encode, Packet, PacketType, HEADER_SIZE, MAX_PAYLOAD};
