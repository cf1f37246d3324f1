use crate::error::ProtocolError;
use crate::packet::{Packet, HEADER_SIZE, MAX_PAYLOAD};

/// Per-connection receive buffer, fixed at `RECV_BUF_SIZE` bytes.
pub const RECV_BUF_SIZE: usize = 4096;

/// Result of attempting to pull one frame out of a [`RecvBuffer`].
#[derive(Debug)]
pub enum DecodeOutcome {
    /// Fewer than a full frame is buffered; caller should read more bytes
    /// and try again. The buffer is left untouched.
    NeedMore,
    /// A full frame was decoded and the consumed bytes compacted out of the
    /// buffer.
    Packet(Packet),
    /// The buffered header describes an impossible frame. The connection
    /// must be closed; the buffer is left untouched.
    ProtocolError(ProtocolError),
}

/// Owns the raw bytes read off a socket and the length-prefix framing state
/// machine that turns them into [`Packet`]s.
///
/// `decode_one` never mutates the buffer on `NeedMore` or `ProtocolError` -
/// only a successfully decoded packet is compacted out.
pub struct RecvBuffer {
    buf: Vec<u8>,
    len: usize,
}

impl RecvBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            buf: vec![0u8; RECV_BUF_SIZE],
            len: 0,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Spare capacity a reader may fill with fresh bytes from the socket.
    pub fn spare_mut(&mut self) -> &mut [u8] {
        &mut self.buf[self.len..]
    }

    /// Marks `n` freshly written bytes (via `spare_mut`) as valid data.
    pub fn commit(&mut self, n: usize) {
        self.len += n;
    }

    /// Attempts to decode one frame from the front of the buffer.
    pub fn decode_one(&mut self) -> DecodeOutcome {
        if self.len < HEADER_SIZE {
            return DecodeOutcome::NeedMore;
        }

        let pkt_len = u16::from_be_bytes([self.buf[0], self.buf[1]]);
        if pkt_len == 0 {
            return DecodeOutcome::ProtocolError(ProtocolError::ZeroLength);
        }
        let max_len = (2 + MAX_PAYLOAD) as u16;
        if pkt_len > max_len {
            return DecodeOutcome::ProtocolError(ProtocolError::LengthTooLarge(pkt_len, max_len));
        }

        let total = 2 + pkt_len as usize;
        if self.len < total {
            return DecodeOutcome::NeedMore;
        }

        let type_raw = u16::from_be_bytes([self.buf[2], self.buf[3]]);
        let payload = self.buf[HEADER_SIZE..total].to_vec();

        let remain = self.len - total;
        self.buf.copy_within(total..self.len, 0);
        self.len = remain;

        DecodeOutcome::Packet(Packet::new(type_raw, payload))
    }
}

impl Default for RecvBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::encode;

    fn push(buf: &mut RecvBuffer, bytes: &[u8]) {
        let spare = buf.spare_mut();
        spare[..bytes.len()].copy_from_slice(bytes);
        buf.commit(bytes.len());
    }

    #[test]
    fn decodes_a_full_frame_in_one_shot() {
        let packet = Packet::new(1, b"hello".to_vec());
        let mut wire = Vec::new();
        encode(&packet, &mut wire);

        let mut buf = RecvBuffer::new();
        push(&mut buf, &wire);

        match buf.decode_one() {
            DecodeOutcome::Packet(p) => assert_eq!(p, packet),
            other => panic!("expected Packet, got {other:?}"),
        }
        assert_eq!(buf.len(), 0);
    }

    #[test]
    fn needs_more_on_partial_header() {
        let mut buf = RecvBuffer::new();
        push(&mut buf, &[0x00, 0x05]);
        assert!(matches!(buf.decode_one(), DecodeOutcome::NeedMore));
        assert_eq!(buf.len(), 2, "buffer must be untouched on NeedMore");
    }

    #[test]
    fn needs_more_on_partial_payload() {
        let packet = Packet::new(2, vec![1, 2, 3, 4, 5, 6, 7, 8]);
        let mut wire = Vec::new();
        encode(&packet, &mut wire);

        let mut buf = RecvBuffer::new();
        push(&mut buf, &wire[..wire.len() - 2]);
        assert!(matches!(buf.decode_one(), DecodeOutcome::NeedMore));

        push(&mut buf, &wire[wire.len() - 2..]);
        match buf.decode_one() {
            DecodeOutcome::Packet(p) => assert_eq!(p, packet),
            other => panic!("expected Packet, got {other:?}"),
        }
    }

    #[test]
    fn rejects_zero_length() {
        let mut buf = RecvBuffer::new();
        push(&mut buf, &[0x00, 0x00, 0x00, 0x01]);
        assert!(matches!(
            buf.decode_one(),
            DecodeOutcome::ProtocolError(ProtocolError::ZeroLength)
        ));
        assert_eq!(buf.len(), 4, "buffer must be untouched on ProtocolError");
    }

    #[test]
    fn rejects_length_over_max_payload() {
        let mut buf = RecvBuffer::new();
        let bad_len: u16 = 2 + MAX_PAYLOAD as u16 + 1;
        push(&mut buf, &bad_len.to_be_bytes());
        push(&mut buf, &[0, 1]);
        assert!(matches!(
            buf.decode_one(),
            DecodeOutcome::ProtocolError(ProtocolError::LengthTooLarge(_, _))
        ));
    }

    #[test]
    fn compacts_remaining_bytes_after_a_decode() {
        let first = Packet::new(1, b"ab".to_vec());
        let second = Packet::new(1, b"cd".to_vec());
        let mut wire = Vec::new();
        encode(&first, &mut wire);
        encode(&second, &mut wire);

        let mut buf = RecvBuffer::new();
        push(&mut buf, &wire);

        match buf.decode_one() {
            DecodeOutcome::Packet(p) => assert_eq!(p, first),
            other => panic!("expected Packet, got {other:?}"),
        }
        match buf.decode_one() {
            DecodeOutcome::Packet(p) => assert_eq!(p, second),
            other => panic!("expected Packet, got {other:?}"),
        }
        assert_eq!(buf.len(), 0);
    }

    #[test]
    fn accepts_exactly_max_payload() {
        let packet = Packet::new(1, vec![7u8; MAX_PAYLOAD]);
        let mut wire = Vec::new();
        encode(&packet, &mut wire);

        let mut buf = RecvBuffer::new();
        push(&mut buf, &wire);
        match buf.decode_one() {
            DecodeOutcome::Packet(p) => assert_eq!(p.payload.len(), MAX_PAYLOAD),
            other => panic!("expected Packet, got {other:?}"),
        }
    }
}
