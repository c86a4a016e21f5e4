//! Per-channel point storage read by the presentation layer while a sweep runs.

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::statistics::MetricChannel;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Default)]
struct SinkState {
    name: String,
    series: FxHashMap<MetricChannel, Vec<SeriesPoint>>,
}

/// Ordered, append-only series for each [`MetricChannel`].
///
/// Appends are serialized behind a write lock; readers get a consistent prefix of
/// each series from [`SeriesSink::snapshot`].
#[derive(Debug, Default)]
pub struct SeriesSink {
    state: RwLock<SinkState>,
}

impl SeriesSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, SinkState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, SinkState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn append(&self, channel: MetricChannel, x: f64, y: f64) {
        self.write()
            .series
            .entry(channel)
            .or_default()
            .push(SeriesPoint { x, y });
    }

    /// Clear every channel and name the series for the next sweep.
    pub fn reset(&self, name: impl Into<String>) {
        let mut state = self.write();
        state.name = name.into();
        state.series.clear();
    }

    pub fn name(&self) -> String {
        self.read().name.clone()
    }

    pub fn snapshot(&self, channel: MetricChannel) -> Vec<SeriesPoint> {
        self.read().series.get(&channel).cloned().unwrap_or_default()
    }

    pub fn len(&self, channel: MetricChannel) -> usize {
        self.read().series.get(&channel).map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.read().series.values().all(Vec::is_empty)
    }

    /// Snapshot every channel in [`MetricChannel::ALL`] order
    pub fn snapshot_all(&self) -> Vec<(MetricChannel, Vec<SeriesPoint>)> {
        let state = self.read();
        MetricChannel::ALL
            .iter()
            .map(|channel| {
                let points = state.series.get(channel).cloned().unwrap_or_default();
                (*channel, points)
            })
            .collect()
    }
}
