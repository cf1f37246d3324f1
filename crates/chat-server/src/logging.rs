use tracing_subscriber::EnvFilter;

/// Initializes the global `tracing` subscriber once at startup. `RUST_LOG`
/// takes precedence over `default_level` when set, matching the usual
/// `EnvFilter` convention.
pub fn init(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
