//! Shared test plumbing: tracing setup and logging assertion macros.
//!
//! Enabled for this crate's own tests and, through the `test-internals`
//! feature, for downstream crates that want the same structured test logs
//! when driving a virtual clock in their suites. Run with
//! `RUST_LOG=lockstep=trace` to watch every queue operation a test performs.

use std::sync::Once;

static INIT: Once = Once::new();

/// Installs a tracing subscriber writing to the test harness's capture
/// buffer. Safe to call from every test; only the first call installs.
pub fn init_test_logging() {
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// Marks the start of a test in the log stream.
#[macro_export]
macro_rules! test_phase {
    ($name:expr) => {
        tracing::info!(test = $name, "==== TEST START ====");
    };
}

/// Marks a named section inside a test.
#[macro_export]
macro_rules! test_section {
    ($name:expr) => {
        tracing::info!(section = $name, "---- section ----");
    };
}

/// Asserts a condition, logging the expected and actual values either way.
///
/// Failures land in the log stream before the panic so the surrounding
/// trace output explains what the clock was doing at the time.
#[macro_export]
macro_rules! assert_with_log {
    ($cond:expr, $what:expr, $expected:expr, $actual:expr) => {
        if $cond {
            tracing::debug!(
                check = $what,
                expected = ?$expected,
                actual = ?$actual,
                "assertion passed"
            );
        } else {
            tracing::error!(
                check = $what,
                expected = ?$expected,
                actual = ?$actual,
                "ASSERTION FAILED"
            );
            panic!(
                "assertion failed: {} (expected {:?}, got {:?})",
                $what, $expected, $actual
            );
        }
    };
}

/// Marks the successful end of a test, with optional summary fields.
#[macro_export]
macro_rules! test_complete {
    ($name:expr $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::info!(test = $name $(, $key = ?$value)*, "==== TEST COMPLETE ====");
    };
}
