use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use signal_hook::consts::{SIGINT, SIGPIPE, SIGTERM};

use crate::error::BootstrapError;

/// Holds the reactor's wakeup handle so the signal handlers installed below
/// can interrupt a blocking `Poll::poll` the moment the termination flag is
/// set, rather than waiting for otherwise-unrelated socket activity.
static REACTOR_WAKER: OnceCell<Arc<mio::Waker>> = OnceCell::new();

/// Installs `SIGINT`/`SIGTERM` handlers that set `terminate` and nudge the
/// reactor's waker, and sets `SIGPIPE` to `SIG_IGN` so a write to a
/// half-closed socket surfaces as `EPIPE` instead of killing the process.
///
/// Must be called before any socket is created: `SIGPIPE` needs to be
/// ignored ahead of any other setup that might write to a socket.
pub fn install(terminate: &Arc<AtomicBool>, waker: Arc<mio::Waker>) -> Result<(), BootstrapError> {
    unsafe {
        libc::signal(SIGPIPE, libc::SIG_IGN);
    }

    let _ = REACTOR_WAKER.set(waker);

    for (signal, name) in [(SIGINT, "SIGINT"), (SIGTERM, "SIGTERM")] {
        signal_hook::flag::register(signal, Arc::clone(terminate))
            .map_err(|source| BootstrapError::Signal { signal: name, source })?;
        // SAFETY: the closure only touches an already-initialised
        // `Arc<mio::Waker>` and calls its `wake()`, which is a single
        // non-allocating write syscall - safe to run on the signal stack.
        unsafe {
            signal_hook::low_level::register(signal, wake_reactor)
                .map_err(|source| BootstrapError::Signal { signal: name, source })?;
        }
    }

    Ok(())
}

fn wake_reactor() {
    if let Some(waker) = REACTOR_WAKER.get() {
        let _ = waker.wake();
    }
}
