use std::io::{self, Read, Write};

use mio::net::TcpStream;

use chat_protocol::RecvBuffer;

/// Fixed outbound buffer size per connection.
pub const SEND_BUF_SIZE: usize = 4096;

/// Raised when queuing more bytes would overflow the connection's send
/// buffer. The caller disconnects; there's no partial-enqueue fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendOverflow;

/// Everything the reactor owns for one accepted socket: the socket itself,
/// its partially-filled receive buffer, and an outbound byte buffer with an
/// offset marking how much of it has already been written.
pub struct Connection {
    pub stream: TcpStream,
    pub recv: RecvBuffer,
    send_buf: Vec<u8>,
    send_len: usize,
    send_offset: usize,
    write_armed: bool,
}

impl Connection {
    #[must_use]
    pub fn new(stream: TcpStream) -> Self {
        Self {
            stream,
            recv: RecvBuffer::new(),
            send_buf: vec![0u8; SEND_BUF_SIZE],
            send_len: 0,
            send_offset: 0,
            write_armed: false,
        }
    }

    #[must_use]
    pub fn write_armed(&self) -> bool {
        self.write_armed
    }

    /// Appends `data` to the send buffer. Returns `Ok(true)` if this is the
    /// transition from no pending output to some (i.e. the reactor needs to
    /// arm write-readiness), `Ok(false)` if output was already pending.
    pub fn enqueue_send(&mut self, data: &[u8]) -> Result<bool, SendOverflow> {
        if self.send_len + data.len() > self.send_buf.len() {
            return Err(SendOverflow);
        }
        self.send_buf[self.send_len..self.send_len + data.len()].copy_from_slice(data);
        self.send_len += data.len();
        let was_armed = self.write_armed;
        self.write_armed = true;
        Ok(!was_armed)
    }

    /// Writes as much of the pending send buffer as the socket will take
    /// right now. Returns `Ok(true)` once the buffer is fully drained
    /// (caller should drop write interest), `Ok(false)` if more remains.
    pub fn drain_send_buf(&mut self) -> io::Result<bool> {
        while self.send_offset < self.send_len {
            match self.stream.write(&self.send_buf[self.send_offset..self.send_len]) {
                Ok(0) => return Err(io::Error::from(io::ErrorKind::WriteZero)),
                Ok(n) => self.send_offset += n,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(false),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        self.send_offset = 0;
        self.send_len = 0;
        self.write_armed = false;
        Ok(true)
    }

    /// Reads whatever is currently available into the receive buffer's
    /// spare capacity and commits it. `Ok(0)` means the peer closed its
    /// write half.
    pub fn read_some(&mut self) -> io::Result<usize> {
        let n = self.stream.read(self.recv.spare_mut())?;
        self.recv.commit(n);
        Ok(n)
    }
}
