//! Single-threaded `mio` event loop: accept/read/write multiplexing, framing
//! via `chat-protocol`, and the `logic_queue`/`io_queue` funnel described in
//! the reactor component of the chat server design.

mod connection;
mod listener;
mod waker;

pub use connection::{Connection, SendOverflow, SEND_BUF_SIZE};
pub use listener::bind_listener;
pub use waker::MioWaker;

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use mio::net::TcpListener;
use mio::{Events, Interest, Poll, Token};

use chat_core::{safe_assert, ConnHandle, MAX_CLIENTS};
use chat_protocol::{encode, DecodeOutcome};
use chat_queue::{BoundedQueue, Job};

const LISTENER: Token = Token(0);
const WAKER: Token = Token(1);
const TOKEN_OFFSET: usize = 2;

const fn token_to_handle(token: Token) -> Option<ConnHandle> {
    if token.0 < TOKEN_OFFSET {
        None
    } else {
        Some(ConnHandle::new(token.0 - TOKEN_OFFSET))
    }
}

const fn handle_to_token(handle: ConnHandle) -> Token {
    Token(handle.as_usize() + TOKEN_OFFSET)
}

/// Owns every connection, the listen socket, and the `mio` registry. Runs on
/// its own thread; the worker pool never touches any of this directly, only
/// via `logic_queue` and `io_queue`.
pub struct Reactor {
    poll: Poll,
    listener: TcpListener,
    connections: Vec<Option<Connection>>,
    events: Events,
    logic_queue: BoundedQueue<Job>,
    io_queue: BoundedQueue<Job>,
    terminate: Arc<AtomicBool>,
}

impl Reactor {
    /// Registers `listener` and a wakeup handle with a fresh `Poll`
    /// instance. Returns the reactor plus the waker, which callers hand to
    /// the state layer so broadcasts can interrupt the blocking poll.
    pub fn new(
        mut listener: TcpListener,
        logic_queue: BoundedQueue<Job>,
        io_queue: BoundedQueue<Job>,
        terminate: Arc<AtomicBool>,
    ) -> io::Result<(Self, Arc<mio::Waker>)> {
        let poll = Poll::new()?;
        poll.registry()
            .register(&mut listener, LISTENER, Interest::READABLE)?;
        let waker = Arc::new(mio::Waker::new(poll.registry(), WAKER)?);

        let mut connections = Vec::with_capacity(MAX_CLIENTS);
        connections.resize_with(MAX_CLIENTS, || None);

        Ok((
            Self {
                poll,
                listener,
                connections,
                events: Events::with_capacity(256),
                logic_queue,
                io_queue,
                terminate,
            },
            waker,
        ))
    }

    /// Runs the event loop until the termination flag is observed. Blocks
    /// with no timeout on each iteration - termination is only detected
    /// because the signal handler also fires the waker registered at
    /// `Reactor::new`, per the wakeup contract: it's callable from any
    /// thread, including a signal handler.
    pub fn run(&mut self) {
        loop {
            if let Err(e) = self.poll.poll(&mut self.events, None) {
                if e.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                tracing::error!(?e, "poll failed, shutting down reactor");
                break;
            }

            if self.terminate.load(Ordering::Relaxed) {
                break;
            }

            self.drain_io_queue();

            // Collect tokens first: handling an event may accept new
            // connections and resize nothing, but it's simplest and safest
            // not to hold a borrow of `self.events` while mutating `self`.
            let ready: Vec<(Token, bool, bool, bool)> = self
                .events
                .iter()
                .map(|e| (e.token(), e.is_readable(), e.is_writable(), e.is_error() || e.is_read_closed() || e.is_write_closed()))
                .collect();

            for (token, readable, writable, hup) in ready {
                if token == WAKER {
                    continue;
                }
                if token == LISTENER {
                    if readable {
                        self.accept_loop();
                    }
                    continue;
                }
                let Some(handle) = token_to_handle(token) else {
                    chat_core::safe_panic!("reactor event for out-of-range token {token:?}");
                    continue;
                };
                if readable && self.read_loop(handle) {
                    // connection already closed by read_loop (EOF/error/protocol violation)
                    continue;
                }
                if hup {
                    self.disconnect(handle);
                    continue;
                }
                if writable {
                    self.write_ready(handle);
                }
            }
        }

        self.shutdown_all();
    }

    /// Accepts every pending connection until the listener would block.
    fn accept_loop(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((mut stream, addr)) => {
                    let Some(idx) = self.connections.iter().position(Option::is_none) else {
                        tracing::warn!(%addr, "rejecting connection: MAX_CLIENTS reached");
                        let _ = stream.shutdown(std::net::Shutdown::Both);
                        continue;
                    };
                    let handle = ConnHandle::new(idx);
                    if let Err(e) =
                        self.poll
                            .registry()
                            .register(&mut stream, handle_to_token(handle), Interest::READABLE)
                    {
                        tracing::warn!(?e, %addr, "failed to register accepted socket");
                        continue;
                    }
                    tracing::info!(%addr, handle = %handle, "accepted connection");
                    self.connections[idx] = Some(Connection::new(stream));
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    tracing::warn!(?e, "accept failed");
                    break;
                }
            }
        }
    }

    /// Reads and frames everything currently available on `handle`'s
    /// socket, enqueueing one `Packet` job per decoded frame. Returns
    /// `true` if the connection was closed (EOF, hard error, or protocol
    /// violation) during this call.
    fn read_loop(&mut self, handle: ConnHandle) -> bool {
        loop {
            let Some(conn) = self.connections[handle.as_usize()].as_mut() else {
                return true;
            };
            match conn.read_some() {
                Ok(0) => {
                    self.disconnect(handle);
                    return true;
                }
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return false,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    tracing::debug!(?e, handle = %handle, "read error, disconnecting");
                    self.disconnect(handle);
                    return true;
                }
            }

            loop {
                let Some(conn) = self.connections[handle.as_usize()].as_mut() else {
                    return true;
                };
                match conn.recv.decode_one() {
                    DecodeOutcome::NeedMore => break,
                    DecodeOutcome::Packet(packet) => {
                        self.logic_queue.push(Job::Packet { handle, packet });
                    }
                    DecodeOutcome::ProtocolError(err) => {
                        tracing::warn!(%err, handle = %handle, "protocol error, disconnecting");
                        self.disconnect(handle);
                        return true;
                    }
                }
            }
        }
    }

    /// Drains as much of `handle`'s pending send buffer as the socket will
    /// currently take.
    fn write_ready(&mut self, handle: ConnHandle) {
        let idx = handle.as_usize();
        let Some(conn) = self.connections[idx].as_mut() else {
            return;
        };
        safe_assert!(conn.write_armed(), "write readiness for a connection with nothing queued, handle {handle}");
        let drained = conn.drain_send_buf();
        match drained {
            Ok(true) => {
                let conn = self.connections[idx].as_mut().expect("checked above");
                if let Err(e) = self.poll.registry().reregister(
                    &mut conn.stream,
                    handle_to_token(handle),
                    Interest::READABLE,
                ) {
                    tracing::debug!(?e, handle = %handle, "reregister after drain failed");
                }
            }
            Ok(false) => {}
            Err(e) => {
                tracing::debug!(?e, handle = %handle, "write error, disconnecting");
                self.disconnect(handle);
            }
        }
    }

    /// Pops every currently queued `Send` job and appends it to the target
    /// connection's send buffer, arming write interest as needed. Must run
    /// to exhaustion on every wakeup regardless of where in the loop the
    /// corresponding push landed relative to the wakeup signal itself.
    fn drain_io_queue(&mut self) {
        loop {
            match self.io_queue.pop_nonblocking() {
                Ok(Job::Send { handle, packet }) => {
                    let idx = handle.as_usize();
                    if idx >= self.connections.len() {
                        continue;
                    }
                    let Some(conn) = self.connections[idx].as_mut() else {
                        continue;
                    };
                    let mut wire = Vec::with_capacity(4 + packet.payload.len());
                    encode(&packet, &mut wire);
                    match conn.enqueue_send(&wire) {
                        Ok(true) => {
                            if let Err(e) = self.poll.registry().reregister(
                                &mut conn.stream,
                                handle_to_token(handle),
                                Interest::READABLE | Interest::WRITABLE,
                            ) {
                                tracing::debug!(?e, handle = %handle, "arm write interest failed");
                            }
                        }
                        Ok(false) => {}
                        Err(SendOverflow) => {
                            tracing::warn!(handle = %handle, "send buffer overflow, disconnecting");
                            self.disconnect(handle);
                        }
                    }
                }
                Ok(other) => {
                    chat_core::safe_panic!("unexpected job on io_queue: {other:?}");
                }
                Err(_empty) => break,
            }
        }
    }

    /// Tears down `handle`'s connection: deregisters it, closes the socket,
    /// frees the slot, and funnels a `Disconnect` job to the workers so
    /// they clean up session/room state. No-op if already gone.
    fn disconnect(&mut self, handle: ConnHandle) {
        let idx = handle.as_usize();
        let Some(mut conn) = self.connections[idx].take() else {
            return;
        };
        let _ = self.poll.registry().deregister(&mut conn.stream);
        let _ = conn.stream.shutdown(std::net::Shutdown::Both);
        self.logic_queue.push(Job::Disconnect { handle });
    }

    /// Closes the listen socket and every remaining connection, then posts
    /// one `Shutdown` job per worker thread so they can exit their
    /// `pop_blocking` loop.
    fn shutdown_all(&mut self) {
        tracing::info!("reactor shutting down");
        let _ = self.poll.registry().deregister(&mut self.listener);

        let handles: Vec<ConnHandle> = self
            .connections
            .iter()
            .enumerate()
            .filter_map(|(idx, c)| c.as_ref().map(|_| ConnHandle::new(idx)))
            .collect();
        for handle in handles {
            self.disconnect(handle);
        }

        safe_assert!(self.connections.iter().all(Option::is_none));

        for _ in 0..chat_core::WORKER_THREAD_NUM {
            self.logic_queue.push(Job::Shutdown);
        }
    }
}
