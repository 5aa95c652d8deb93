// Tracing initialization with a configurable, reloadable log level.
use std::sync::OnceLock;

use tracing_subscriber::{EnvFilter, fmt, prelude::*, reload};

static LOG_RELOAD_HANDLE: OnceLock<reload::Handle<EnvFilter, tracing_subscriber::Registry>> =
    OnceLock::new();

/// Installs a global subscriber filtered at `level`.
///
/// `RUST_LOG` takes precedence when set. Safe to call more than once; only
/// the first call installs anything.
pub fn init_tracing_with_level(level: &str) {
    let (reload_layer, handle) = reload::Layer::new(filter(level));
    let installed = tracing_subscriber::registry()
        .with(reload_layer)
        .with(fmt::layer())
        .try_init()
        .is_ok();
    if installed {
        let _ = LOG_RELOAD_HANDLE.set(handle);
    }
}

/// Installs a subscriber that writes through the test harness capture.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::registry()
        .with(filter("debug"))
        .with(fmt::layer().with_test_writer())
        .try_init();
}

/// Applies a new log level at runtime if [`init_tracing_with_level`] installed
/// the subscriber.
pub fn apply_logging_level(level: &str) {
    if let Some(handle) = LOG_RELOAD_HANDLE.get() {
        let _ = handle.modify(|f| {
            *f = EnvFilter::new(level);
        });
    }
}

fn filter(level: &str) -> EnvFilter {
    std::env::var("RUST_LOG")
        .ok()
        .and_then(|_| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(level))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_init_is_harmless() {
        init_test_tracing();
        init_test_tracing();
        init_tracing_with_level("debug");
        apply_logging_level("warn");
        tracing::debug!("still alive");
    }
}
