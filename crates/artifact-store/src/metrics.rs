//! Global atomic counters for artifact persistence.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single
//! `tracing::info!` event (e.g. after a save).

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Atomic counters, safe to bump from any task.
pub struct Metrics {
    traces_written: AtomicU64,
    chunks_streamed: AtomicU64,
    bytes_streamed: AtomicU64,
    sets_loaded: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            traces_written: AtomicU64::new(0),
            chunks_streamed: AtomicU64::new(0),
            bytes_streamed: AtomicU64::new(0),
            sets_loaded: AtomicU64::new(0),
        }
    }

    /// Increment the traces-written counter by one.
    pub fn inc_traces_written(&self) {
        self.traces_written.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "traces_written", "counter incremented");
    }

    /// Add the totals of one finished stream.
    pub fn add_streamed(&self, chunks: u64, bytes: u64) {
        self.chunks_streamed.fetch_add(chunks, Ordering::Relaxed);
        self.bytes_streamed.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Increment the artifact-sets-loaded counter by one.
    pub fn inc_sets_loaded(&self) {
        self.sets_loaded.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "sets_loaded", "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            traces_written = self.traces_written(),
            chunks_streamed = self.chunks_streamed(),
            bytes_streamed = self.bytes_streamed(),
            sets_loaded = self.sets_loaded(),
        );
    }

    pub fn traces_written(&self) -> u64 {
        self.traces_written.load(Ordering::Relaxed)
    }

    pub fn chunks_streamed(&self) -> u64 {
        self.chunks_streamed.load(Ordering::Relaxed)
    }

    pub fn bytes_streamed(&self) -> u64 {
        self.bytes_streamed.load(Ordering::Relaxed)
    }

    pub fn sets_loaded(&self) -> u64 {
        self.sets_loaded.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        self.traces_written.store(0, Ordering::Relaxed);
        self.chunks_streamed.store(0, Ordering::Relaxed);
        self.bytes_streamed.store(0, Ordering::Relaxed);
        self.sets_loaded.store(0, Ordering::Relaxed);
    }
}
