//! Global atomic counters for stream and scoring activity.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single
//! `tracing::info!` event (e.g. at the end of a round).

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Lightweight atomic counters, lock-free.
pub struct Metrics {
    streams_opened: AtomicU64,
    stream_retries: AtomicU64,
    stream_failures: AtomicU64,
    oracle_calls: AtomicU64,
    oracle_failures: AtomicU64,
    rounds_scored: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            streams_opened: AtomicU64::new(0),
            stream_retries: AtomicU64::new(0),
            stream_failures: AtomicU64::new(0),
            oracle_calls: AtomicU64::new(0),
            oracle_failures: AtomicU64::new(0),
            rounds_scored: AtomicU64::new(0),
        }
    }

    /// Count one stream attempt (retries included).
    pub fn inc_streams_opened(&self) {
        self.streams_opened.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "streams_opened", "counter incremented");
    }

    pub fn inc_stream_retries(&self) {
        self.stream_retries.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "stream_retries", "counter incremented");
    }

    pub fn inc_stream_failures(&self) {
        self.stream_failures.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "stream_failures", "counter incremented");
    }

    pub fn inc_oracle_calls(&self) {
        self.oracle_calls.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "oracle_calls", "counter incremented");
    }

    pub fn inc_oracle_failures(&self) {
        self.oracle_failures.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "oracle_failures", "counter incremented");
    }

    pub fn inc_rounds_scored(&self) {
        self.rounds_scored.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "rounds_scored", "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    ///
    /// Call this at natural boundaries (end of a round, daemon tick, etc.)
    /// rather than on every increment.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            streams_opened = self.streams_opened(),
            stream_retries = self.stream_retries(),
            stream_failures = self.stream_failures(),
            oracle_calls = self.oracle_calls(),
            oracle_failures = self.oracle_failures(),
            rounds_scored = self.rounds_scored(),
        );
    }

    pub fn streams_opened(&self) -> u64 {
        self.streams_opened.load(Ordering::Relaxed)
    }

    pub fn stream_retries(&self) -> u64 {
        self.stream_retries.load(Ordering::Relaxed)
    }

    pub fn stream_failures(&self) -> u64 {
        self.stream_failures.load(Ordering::Relaxed)
    }

    pub fn oracle_calls(&self) -> u64 {
        self.oracle_calls.load(Ordering::Relaxed)
    }

    pub fn oracle_failures(&self) -> u64 {
        self.oracle_failures.load(Ordering::Relaxed)
    }

    pub fn rounds_scored(&self) -> u64 {
        self.rounds_scored.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        self.streams_opened.store(0, Ordering::Relaxed);
        self.stream_retries.store(0, Ordering::Relaxed);
        self.stream_failures.store(0, Ordering::Relaxed);
        self.oracle_calls.store(0, Ordering::Relaxed);
        self.oracle_failures.store(0, Ordering::Relaxed);
        self.rounds_scored.store(0, Ordering::Relaxed);
    }
}
