//! Load metrics and tracing setup

use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::EnvFilter;

/// Counters recorded by the loader
#[derive(Debug, Default)]
pub struct Metrics {
    files_started: AtomicU64,
    files_completed: AtomicU64,
    files_failed: AtomicU64,
    bytes_received: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file_started(&self) {
        self.files_started.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "files_started", "Metric incremented");
    }

    pub fn file_completed(&self) {
        self.files_completed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "files_completed", "Metric incremented");
    }

    pub fn file_failed(&self) {
        self.files_failed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "files_failed", "Metric incremented");
    }

    pub fn bytes_received(&self, bytes: u64) {
        self.bytes_received.fetch_add(bytes, Ordering::Relaxed);
        tracing::debug!(counter = "bytes_received", bytes, "Metric incremented");
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            files_started: self.files_started.load(Ordering::Relaxed),
            files_completed: self.files_completed.load(Ordering::Relaxed),
            files_failed: self.files_failed.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub files_started: u64,
    pub files_completed: u64,
    pub files_failed: u64,
    pub bytes_received: u64,
}

/// Install the fmt subscriber; `RUST_LOG` wins over `default_filter`
pub fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    // A second init (tests, embedding) keeps the first subscriber
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
