//! C ABI over steamshim-core.
//!
//! Exposes `extern "C"` functions a foreign runtime (C# P/Invoke, cgo, JNI,
//! ...) can call to register callbacks and call-result waiters with the
//! Steamworks SDK. Registrations are addressed by opaque `u64` handles held
//! in per-session tables, so a stale or repeated unregister is a no-op.

pub mod bridge;
pub mod core;
pub mod error;

use once_cell::sync::OnceCell;
use steamshim_core::ShimConfig;
use steamshim_core::config::DEFAULT_LOG_FILTER;
use tracing_subscriber::EnvFilter;

static LOGGING: OnceCell<()> = OnceCell::new();

/// Install the global tracing subscriber once per process. A subscriber the
/// host already installed is left alone.
pub(crate) fn init_logging(config: &ShimConfig) {
    LOGGING.get_or_init(|| {
        let filter = EnvFilter::try_new(config.effective_log_filter())
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
        let installed = if config.log_json {
            tracing_subscriber::fmt().with_env_filter(filter).json().try_init()
        } else {
            tracing_subscriber::fmt().with_env_filter(filter).try_init()
        };
        if installed.is_err() {
            tracing::debug!("tracing subscriber already installed by host");
        }
    });
}
