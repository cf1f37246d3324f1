use thiserror::Error;

/// A malformed frame on the wire. Any occurrence terminates the connection;
/// there is no recovery within a stream once framing is lost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("packet length field is zero")]
    ZeroLength,
    #[error("packet length {0} exceeds the maximum of {1}")]
    LengthTooLarge(u16, u16),
}
