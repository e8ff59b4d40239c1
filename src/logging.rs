//! Tracing setup for binaries and tests.

use tracing_subscriber::EnvFilter;

/// Initialize tracing with `RUST_LOG` support. Safe to call more than
/// once; later calls are no-ops.
pub fn init() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("sharecircle_client=debug")),
        )
        .try_init();
}
