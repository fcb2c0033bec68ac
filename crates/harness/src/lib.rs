//! Fakes and fixtures for driving the sync engine in tests.

pub mod app;
pub mod clock;
pub mod remote;

pub use app::{CountingStore, START_MS, TestApp, TestEngine};
pub use clock::ManualClock;
pub use remote::{FAKE_CDN, FakeRemote, PageRequest};

use tracing_subscriber::EnvFilter;

/// Route engine logs to the test output. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
