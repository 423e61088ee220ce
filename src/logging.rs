//! Logging setup for providers using the waiter.
//!
//! Waits emit `tracing` events under the `hemmer_resource_waiter` target: one
//! `debug` event per read, `info` on success and `warn` on timeouts and
//! failure states. Logs go to **stderr**, leaving stdout to the provider
//! handshake.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Controls log levels (e.g., `info`, `hemmer_resource_waiter=debug`)
//!
//! # Examples
//!
//! ```bash
//! # Show every poll
//! RUST_LOG=hemmer_resource_waiter=debug ./my-provider
//! ```

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Level used when `RUST_LOG` is not set.
pub const DEFAULT_LEVEL: &str = "info";

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Initialize logging at the default level.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging() {
    init_logging_with_default(DEFAULT_LEVEL);
}

/// Initialize logging, using `default_level` if `RUST_LOG` is not set.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging_with_default(default_level: &str) {
    if !try_init_logging_with_default(default_level) {
        panic!("a global tracing subscriber has already been set");
    }
}

/// Try to initialize logging, returning false if already initialized.
pub fn try_init_logging() -> bool {
    try_init_logging_with_default(DEFAULT_LEVEL)
}

/// Like [`try_init_logging`], with a custom default level.
pub fn try_init_logging_with_default(default_level: &str) -> bool {
    tracing_subscriber::registry()
        .with(env_filter(default_level))
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false),
        )
        .try_init()
        .is_ok()
}
