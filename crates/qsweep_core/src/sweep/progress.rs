use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Progress tracking for a running sweep
#[derive(Debug, Clone, Default)]
pub struct SweepProgress {
    /// Runs whose result has been joined (emitted or skipped)
    completed: Arc<AtomicUsize>,
    /// Total runs in the sweep
    total: Arc<AtomicUsize>,
    /// Batches started
    flushes: Arc<AtomicUsize>,
}

impl SweepProgress {
    #[must_use]
    pub fn new(total: usize) -> Self {
        let progress = Self::default();
        progress.total.store(total, Ordering::Relaxed);
        progress
    }

    #[must_use]
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.total.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn flushes(&self) -> usize {
        self.flushes.load(Ordering::Relaxed)
    }

    pub(crate) fn increment(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_flush(&self) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
    }

    /// Fraction of runs joined so far, in `[0, 1]`
    #[must_use]
    pub fn fraction(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            total => self.completed() as f64 / total as f64,
        }
    }
}
