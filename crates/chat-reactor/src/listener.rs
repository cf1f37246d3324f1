use std::io;
use std::mem;
use std::net::{SocketAddr, TcpListener as StdTcpListener};
use std::os::fd::{FromRawFd, RawFd};

/// Backlog passed to `listen(2)`, per the external interface contract.
const BACKLOG: libc::c_int = 256;

struct FdGuard(RawFd);

impl Drop for FdGuard {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.0);
        }
    }
}

/// Builds the listening socket by hand instead of going through
/// `std::net::TcpListener::bind`, so `SO_REUSEADDR` is guaranteed to be set
/// before `bind(2)` regardless of what the standard library defaults to.
pub fn bind_listener(addr: SocketAddr) -> io::Result<StdTcpListener> {
    let SocketAddr::V4(addr_v4) = addr else {
        return Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "chat-reactor only binds IPv4 listen addresses",
        ));
    };

    unsafe {
        let fd = libc::socket(libc::AF_INET, libc::SOCK_STREAM, 0);
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        let guard = FdGuard(fd);

        let reuse: libc::c_int = 1;
        if libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_REUSEADDR,
            (&raw const reuse).cast(),
            mem::size_of::<libc::c_int>() as libc::socklen_t,
        ) < 0
        {
            return Err(io::Error::last_os_error());
        }

        let mut sockaddr: libc::sockaddr_in = mem::zeroed();
        sockaddr.sin_family = libc::AF_INET as libc::sa_family_t;
        sockaddr.sin_port = addr_v4.port().to_be();
        sockaddr.sin_addr.s_addr = u32::from_ne_bytes(addr_v4.ip().octets());

        let ret = libc::bind(
            fd,
            (&raw const sockaddr).cast(),
            mem::size_of::<libc::sockaddr_in>() as libc::socklen_t,
        );
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }

        if libc::listen(fd, BACKLOG) < 0 {
            return Err(io::Error::last_os_error());
        }

        let listener = StdTcpListener::from_raw_fd(fd);
        listener.set_nonblocking(true)?;
        mem::forget(guard);
        Ok(listener)
    }
}
