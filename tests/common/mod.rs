//! Common test utilities.
//!
//! ```rust,ignore
//! mod common;
//!
//! #[test]
//! fn my_test() {
//!     common::init_tracing();
//!     // ...
//! }
//! ```
//!
//! With the `tracing` feature enabled, `RUST_LOG` selects what gets logged
//! (e.g. `RUST_LOG=keynode=trace`). Without the feature this is a no-op.

#![allow(dead_code)]

/// Install a subscriber that forwards collection traces to the test output.
#[cfg(feature = "tracing")]
pub fn init_tracing() {
    use std::sync::Once;

    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// No-op without the `tracing` feature.
#[cfg(not(feature = "tracing"))]
pub fn init_tracing() {}
