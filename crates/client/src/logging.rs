//! Tracing setup.
//!
//! Library code only emits `tracing` events; installing a subscriber is up to
//! the binary (or an embedding application).

use tracing_subscriber::EnvFilter;

/// Used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "petadmin_client=info";

/// Install a stderr `fmt` subscriber filtered by `RUST_LOG`.
///
/// Does nothing if a global subscriber is already set.
pub fn init() {
    init_with(DEFAULT_FILTER);
}

pub fn init_with(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    // stdout carries command output.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
