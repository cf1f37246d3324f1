/// Largest payload a packet may carry.
pub const MAX_PAYLOAD: usize = 1024;

/// Bytes of `length` + `type` preceding the payload.
pub const HEADER_SIZE: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    Chat,
    JoinRoom,
    LeaveRoom,
    GameAction,
    GameResult,
}

impl PacketType {
    #[must_use]
    pub const fn from_u16(raw: u16) -> Option<Self> {
        match raw {
            1 => Some(Self::Chat),
            2 => Some(Self::JoinRoom),
            3 => Some(Self::LeaveRoom),
            4 => Some(Self::GameAction),
            5 => Some(Self::GameResult),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_u16(self) -> u16 {
        match self {
            Self::Chat => 1,
            Self::JoinRoom => 2,
            Self::LeaveRoom => 3,
            Self::GameAction => 4,
            Self::GameResult => 5,
        }
    }
}

/// A decoded or to-be-encoded application packet.
///
/// `type_raw` is kept alongside the parsed [`PacketType`] rather than
/// collapsing to it: an unrecognised type is not a protocol error, it's a
/// packet the worker pool silently ignores (see `PKT_GAME_ACTION` /
/// `PKT_GAME_RESULT`, which are reserved wire types with no handler yet).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub type_raw: u16,
    pub payload: Vec<u8>,
}

impl Packet {
    #[must_use]
    pub fn new(type_raw: u16, payload: Vec<u8>) -> Self {
        Self { type_raw, payload }
    }

    #[must_use]
    pub fn of_type(kind: PacketType, payload: Vec<u8>) -> Self {
        Self::new(kind.as_u16(), payload)
    }

    #[must_use]
    pub const fn kind(&self) -> Option<PacketType> {
        PacketType::from_u16(self.type_raw)
    }

    /// Value that goes in the wire `length` field: type (2 bytes) + payload.
    #[must_use]
    pub fn wire_length(&self) -> usize {
        2 + self.payload.len()
    }
}

/// Serialises `packet` onto the end of `out`.
///
/// Callers are responsible for keeping `packet.payload.len() <= MAX_PAYLOAD`;
/// this function does not validate it, matching the framing layer which only
/// enforces the bound on the receive side.
pub fn encode(packet: &Packet, out: &mut Vec<u8>) {
    let length = packet.wire_length() as u16;
    out.reserve(HEADER_SIZE + packet.payload.len());
    out.extend_from_slice(&length.to_be_bytes());
    out.extend_from_slice(&packet.type_raw.to_be_bytes());
    out.extend_from_slice(&packet.payload);
}
