pub mod builders;
pub mod fake_runner;

use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use harbormaster::supervisor::ReportSink;
use harbormaster::types::{ProjectStatus, Report};
use tracing_subscriber::{EnvFilter, fmt};

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `RUST_LOG=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer() // print only for failing tests unless --nocapture
            .with_target(true)
            .init();
    });
}

/// Run a future with a 5-second timeout.
#[allow(dead_code)]
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(Duration::from_secs(5), f)
        .await
        .expect("Test timed out after 5 seconds")
}

/// Poll `cond` every 10ms until it holds; panics after 5 seconds.
pub async fn wait_until<F>(what: &str, mut cond: F)
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !cond() {
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for {what}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// A [`ReportSink`] that keeps every report it receives.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    reports: Arc<Mutex<Vec<Report>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<Report> {
        self.reports.lock().unwrap().clone()
    }

    pub fn statuses(&self) -> Vec<ProjectStatus> {
        self.reports().into_iter().map(|r| r.status).collect()
    }

    pub fn details(&self) -> Vec<String> {
        self.reports().into_iter().map(|r| r.detail).collect()
    }

    pub fn last(&self) -> Option<Report> {
        self.reports.lock().unwrap().last().cloned()
    }

    pub fn clear(&self) {
        self.reports.lock().unwrap().clear();
    }
}

impl ReportSink for RecordingSink {
    fn report(&self, report: Report) {
        self.reports.lock().unwrap().push(report);
    }
}
