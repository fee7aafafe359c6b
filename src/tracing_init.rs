//! Subscriber setup for tests and the command-line tools
//!
//! Filtering comes from `RUST_LOG`, e.g. `rustyofdm=debug` for lock and
//! re-acquisition events or `rustyofdm::sync::acquisition=trace` for every
//! window result.

use once_cell::sync::Lazy;
use tracing_subscriber::{fmt, EnvFilter};

fn filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Quiet (`warn`) unless `RUST_LOG` says otherwise. Only the first call in
/// a test binary installs the subscriber.
pub fn init_test_tracing() {
    static TRACING: Lazy<()> = Lazy::new(|| {
        let _ = fmt()
            .with_env_filter(filter("rustyofdm=warn"))
            .with_line_number(true)
            .with_test_writer()
            .try_init();
    });

    Lazy::force(&TRACING);
}

/// Reports configuration and lock events (`info`) by default
pub fn init_tracing() {
    fmt()
        .with_env_filter(filter("rustyofdm=info"))
        .with_thread_ids(true)
        .init();
}
