use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Counters for archive requests and their outcomes
#[derive(Clone)]
pub struct Metrics {
    pub requests: Arc<AtomicUsize>,
    pub not_found: Arc<AtomicUsize>,
    pub archives_started: Arc<AtomicUsize>,
    pub archives_completed: Arc<AtomicUsize>,
    pub archives_cancelled: Arc<AtomicUsize>,
    pub archives_failed: Arc<AtomicUsize>,
    pub active_streams: Arc<AtomicUsize>,
    pub chunks_sent: Arc<AtomicU64>,
    pub bytes_sent: Arc<AtomicU64>,
    pub start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            requests: Arc::new(AtomicUsize::new(0)),
            not_found: Arc::new(AtomicUsize::new(0)),
            archives_started: Arc::new(AtomicUsize::new(0)),
            archives_completed: Arc::new(AtomicUsize::new(0)),
            archives_cancelled: Arc::new(AtomicUsize::new(0)),
            archives_failed: Arc::new(AtomicUsize::new(0)),
            active_streams: Arc::new(AtomicUsize::new(0)),
            chunks_sent: Arc::new(AtomicU64::new(0)),
            bytes_sent: Arc::new(AtomicU64::new(0)),
            start_time: Instant::now(),
        }
    }

    pub fn inc_requests(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_not_found(&self) {
        self.not_found.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts a spawned archiver and marks its stream active.
    pub fn stream_started(&self) {
        self.archives_started.fetch_add(1, Ordering::Relaxed);
        self.active_streams.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stream_completed(&self) {
        self.archives_completed.fetch_add(1, Ordering::Relaxed);
        self.active_streams.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn stream_cancelled(&self) {
        self.archives_cancelled.fetch_add(1, Ordering::Relaxed);
        self.active_streams.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn stream_failed(&self) {
        self.archives_failed.fetch_add(1, Ordering::Relaxed);
        self.active_streams.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn add_chunk(&self, bytes: u64) {
        self.chunks_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn get_snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            not_found: self.not_found.load(Ordering::Relaxed),
            archives_started: self.archives_started.load(Ordering::Relaxed),
            archives_completed: self.archives_completed.load(Ordering::Relaxed),
            archives_cancelled: self.archives_cancelled.load(Ordering::Relaxed),
            archives_failed: self.archives_failed.load(Ordering::Relaxed),
            active_streams: self.active_streams.load(Ordering::Relaxed),
            chunks_sent: self.chunks_sent.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub requests: usize,
    pub not_found: usize,
    pub archives_started: usize,
    pub archives_completed: usize,
    pub archives_cancelled: usize,
    pub archives_failed: usize,
    pub active_streams: usize,
    pub chunks_sent: u64,
    pub bytes_sent: u64,
    pub uptime_seconds: u64,
}
