use std::sync::atomic::{AtomicBool, Ordering};

use tracing_subscriber::EnvFilter;

/// Global flag to control logging of generated SQL
pub static QUERY_DEBUG_ENABLED: AtomicBool = AtomicBool::new(false);

/// Set query debug logging on/off
pub fn set_query_debug(enabled: bool) {
    QUERY_DEBUG_ENABLED.store(enabled, Ordering::Relaxed);
    tracing::info!(
        "🔧 Query debug logging {}",
        if enabled { "ENABLED" } else { "DISABLED" }
    );
}

/// Check if query debug logging is enabled
pub fn is_query_debug_enabled() -> bool {
    QUERY_DEBUG_ENABLED.load(Ordering::Relaxed)
}

/// Install a fmt subscriber filtered by `RUST_LOG`, or `default_directive`
/// when unset. Safe to call more than once; later calls are ignored.
pub fn init_tracing(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}

/// Query debug macro - only logs if query debug is enabled
#[macro_export]
macro_rules! query_debug {
    ($($arg:tt)*) => {
        if $crate::log::QUERY_DEBUG_ENABLED.load(std::sync::atomic::Ordering::Relaxed) {
            tracing::debug!($($arg)*);
        }
    };
}
