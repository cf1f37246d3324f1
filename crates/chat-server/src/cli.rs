use clap::Parser;

/// Multi-room TCP chat server.
///
/// Every tunable is exposed as a flag with a sensible default; there is no
/// config file and nothing is persisted across restarts.
#[derive(Debug, Parser)]
#[command(name = "chat-server", author, version, about)]
pub struct Args {
    /// TCP port to listen on.
    #[arg(long, default_value_t = 3800)]
    pub port: u16,

    /// Number of logic worker threads draining the logic queue.
    #[arg(long, default_value_t = chat_core::WORKER_THREAD_NUM)]
    pub workers: usize,

    /// Capacity of each bounded job queue (logic_queue and io_queue).
    #[arg(long, default_value_t = chat_core::JOB_QUEUE_SIZE)]
    pub queue_capacity: usize,

    /// Log filter passed to `tracing_subscriber::EnvFilter`, e.g.
    /// "chat_reactor=debug,info". Overridden by `RUST_LOG` if set.
    #[arg(short, long, default_value = "info")]
    pub log_level: String,
}
