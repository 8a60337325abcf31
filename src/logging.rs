//! Diagnostic logging setup.
//!
//! Logs go to stderr so they never mix with model replies on stdout.
//! `RUST_LOG` wins over the configured level; an unparsable directive falls
//! back to `warn`.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const FALLBACK_DIRECTIVE: &str = "warn";

/// Pick the filter from `RUST_LOG` (if set) or the configured level.
pub fn build_filter(rust_log: Option<&str>, configured: &str) -> EnvFilter {
    rust_log
        .filter(|value| !value.trim().is_empty())
        .and_then(|value| EnvFilter::try_new(value).ok())
        .or_else(|| EnvFilter::try_new(configured).ok())
        .unwrap_or_else(|| EnvFilter::new(FALLBACK_DIRECTIVE))
}

/// Install the global subscriber. Returns false if one was already set.
pub fn init_tracing(configured: &str) -> bool {
    let rust_log = std::env::var("RUST_LOG").ok();
    let filter = build_filter(rust_log.as_deref(), configured);
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true),
        )
        .with(filter)
        .try_init()
        .is_ok()
}
