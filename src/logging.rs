//! Logging setup for the provider binary.
//!
//! All logs are written to **stderr**: stdout carries the handshake line the
//! host reads to find the gRPC address.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Controls log levels (e.g., `info`, `hemmer_provider_sumologic=debug`)
//!
//! ```bash
//! # Trace every SumoLogic API call
//! RUST_LOG=hemmer_provider_sumologic::client=debug ./hemmer-provider-sumologic
//! ```

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_LEVEL: &str = "info";

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

fn stderr_layer<S>() -> impl tracing_subscriber::Layer<S>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
}

/// Initialize the global subscriber, falling back to `default_level` when
/// `RUST_LOG` is unset.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging_with_default(default_level: &str) {
    tracing_subscriber::registry()
        .with(env_filter(default_level))
        .with(stderr_layer())
        .init();
}

/// Initialize the global subscriber at [`DEFAULT_LOG_LEVEL`].
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging() {
    init_logging_with_default(DEFAULT_LOG_LEVEL);
}

/// Try to initialize logging, returning false if a subscriber is already set.
pub fn try_init_logging() -> bool {
    tracing_subscriber::registry()
        .with(env_filter(DEFAULT_LOG_LEVEL))
        .with(stderr_layer())
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    // The global subscriber can only be set once per process, so only the
    // filter side is covered here.

    use super::*;

    #[test]
    fn test_env_filter_parsing() {
        assert!(EnvFilter::try_new(DEFAULT_LOG_LEVEL).is_ok());
        assert!(EnvFilter::try_new("hemmer_provider_sumologic=debug").is_ok());
        assert!(EnvFilter::try_new("warn,hemmer_provider_sumologic::client=trace").is_ok());
    }

    #[test]
    fn test_try_init_twice() {
        let _ = try_init_logging();
        assert!(!try_init_logging());
    }
}
