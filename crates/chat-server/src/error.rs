use thiserror::Error;

/// Fatal conditions that prevent the server from ever accepting a
/// connection. Every variant maps to a non-zero exit code in `main`;
/// nothing past bootstrap is modeled as a `Result` - per-connection and
/// per-job errors are handled locally (disconnect, ignore, log).
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("failed to bind listen socket: {0}")]
    Bind(#[source] std::io::Error),

    #[error("failed to set up the mio poll registry: {0}")]
    Poll(#[source] std::io::Error),

    #[error("failed to install {signal} handler: {source}")]
    Signal {
        signal: &'static str,
        #[source]
        source: std::io::Error,
    },
}

impl BootstrapError {
    /// Exit code reported to the shell. All bootstrap failures map to `1`;
    /// there's exactly one success path (`0`, normal termination) and one
    /// failure path.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        1
    }
}
