//! Tracing for tests.
//!
//! [`init_test_tracing`] routes events to the test-harness writer so they
//! show up only for failing tests (or with `--nocapture`). The subscriber is
//! installed at most once per process; repeated calls are no-ops.

use tracing_subscriber::EnvFilter;

/// Directive used when `RUST_LOG` is unset: orchestrator phases and tool
/// dispatch at debug, everything else at info.
pub const DEFAULT_TEST_FILTER: &str = "info,inkwell_core=debug";

/// Install the test subscriber with [`DEFAULT_TEST_FILTER`] or `RUST_LOG`.
///
/// ```ignore
/// #[tokio::test]
/// async fn my_test() {
///     inkwell_test_utils::tracing_setup::init_test_tracing();
///     tracing::debug!("captured by the harness");
/// }
/// ```
pub fn init_test_tracing() {
    init_test_tracing_with(DEFAULT_TEST_FILTER);
}

/// Install the test subscriber with an explicit fallback directive.
pub fn init_test_tracing_with(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .with_target(true)
        .try_init();
}
