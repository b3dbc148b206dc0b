//! Logging initialization.
//!
//! Event lines own stdout, so diagnostics (per-call query warnings,
//! discovery failures) go to stderr through `tracing`.

use std::sync::Once;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

/// Initializes the logging subsystem.
///
/// Call once at startup. Safe to call multiple times; subsequent calls are
/// no-ops. Honours `RUST_LOG`, defaulting to `info`.
pub fn init_logging() {
    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    });
}
