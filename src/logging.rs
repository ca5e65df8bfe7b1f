//! Logging initialization

use tracing_subscriber::EnvFilter;

pub fn init_logging() {
    // Writes to stderr, filtered by RUST_LOG, "info" when unset
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_file(true)
        .with_line_number(true)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}
