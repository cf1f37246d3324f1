//! Bootstraps the chat server: parses CLI flags, wires up the reactor,
//! worker pool, and shared state, installs signal handlers, and runs until
//! a `SIGINT`/`SIGTERM` drains everything cleanly.

mod cli;
mod error;
mod logging;
mod signals;

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use clap::Parser;

use chat_queue::{BoundedQueue, Job};
use chat_reactor::{bind_listener, MioWaker, Reactor};
use chat_state::ChatState;
use cli::Args;
use error::BootstrapError;

fn main() {
    let args = Args::parse();
    logging::init(&args.log_level);

    match run(&args) {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            tracing::error!(error = %e, "fatal startup error");
            std::process::exit(e.exit_code());
        }
    }
}

fn run(args: &Args) -> Result<(), BootstrapError> {
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, args.port));
    let std_listener = bind_listener(addr).map_err(BootstrapError::Bind)?;
    let listener = mio::net::TcpListener::from_std(std_listener);

    let logic_queue: BoundedQueue<Job> = BoundedQueue::new(args.queue_capacity);
    let io_queue: BoundedQueue<Job> = BoundedQueue::new(args.queue_capacity);
    let terminate = Arc::new(AtomicBool::new(false));

    let (mut reactor, mio_waker) = Reactor::new(
        listener,
        logic_queue.clone(),
        io_queue.clone(),
        Arc::clone(&terminate),
    )
    .map_err(BootstrapError::Poll)?;

    signals::install(&terminate, Arc::clone(&mio_waker))?;

    let state = Arc::new(ChatState::new());
    let waker: Arc<dyn chat_queue::Waker> = Arc::new(MioWaker(Arc::clone(&mio_waker)));
    let workers = chat_worker::spawn_pool(args.workers, state, logic_queue, io_queue, waker);

    tracing::info!(port = args.port, workers = args.workers, "chat server listening");
    reactor.run();

    for (id, handle) in workers.into_iter().enumerate() {
        if handle.join().is_err() {
            tracing::warn!(worker = id, "worker thread panicked during shutdown");
        }
    }

    tracing::info!("shutdown complete");
    Ok(())
}
