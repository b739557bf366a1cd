//! Shared helpers for fstore test binaries.

use std::sync::Once;

use tracing_subscriber::filter::EnvFilter;

static INIT: Once = Once::new();

/// Default directive when `RUST_LOG` is unset or unparsable.
pub const DEFAULT_TEST_FILTER: &str = "warn,fstore=debug,fstore_table=debug";

/// Install a tracing subscriber for test binaries. Safe to call from every
/// test; only the first call has an effect.
///
/// Output goes through the libtest writer so it is only shown for failing
/// tests.
pub fn init_tracing_for_tests() {
    INIT.call_once(|| {
        let filter = std::env::var("RUST_LOG")
            .ok()
            .and_then(|_| EnvFilter::try_from_default_env().ok())
            .unwrap_or_else(|| EnvFilter::new(DEFAULT_TEST_FILTER));
        // Another harness may already have installed a global subscriber.
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_test_writer()
            .try_init();
    });
}
