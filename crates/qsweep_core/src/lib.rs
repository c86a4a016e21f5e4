//! Parameter sweeps over a queueing-system simulation
//!
//! This crate runs one simulation per step of an integer range while varying one
//! dimension of a base configuration (number of sources, number of processors, or
//! buffer capacity), and streams three series as batches complete:
//! - reject probability
//! - mean request lifetime
//! - mean processor utilization
//!
//! # Example
//!
//! ```ignore
//! use qsweep_core::{BaseConfiguration, QueueingFactory, SeriesSink, SweepParams, SweepScheduler, SweepSelector};
//!
//! let base = BaseConfiguration::load(Path::new("config.json"))?;
//! let scheduler = SweepScheduler::new(QueueingFactory::new(7), base);
//! let params = SweepParams::new(SweepSelector::ProcessorSet, 1, 20, 1.0, 4);
//!
//! let sink = Arc::new(SeriesSink::new());
//! let handle = scheduler.launch_into(params, sink.clone(), |_| {})?;
//! handle.join();
//! ```

#![warn(clippy::all)]

// ============================================================================
// Core modules
// ============================================================================

pub mod analyzer;
pub mod config;
pub mod engine;
pub mod error;
pub mod sink;
pub mod statistics;
pub mod sweep;

// ============================================================================
// Test modules
// ============================================================================

#[cfg(test)]
mod tests;

// ============================================================================
// Public re-exports for convenience
// ============================================================================

pub use analyzer::{AnalyzerError, AnalyzerResults};
pub use config::{BaseConfiguration, StepConfiguration, SweepSelector};
pub use engine::queueing::{QueueingFactory, QueueingSimulator};
pub use engine::{CancelToken, EngineFactory, RunReport, SimulationEngine};
pub use error::{ConfigLoadError, InputError, RunError, SweepError};
pub use sink::{SeriesPoint, SeriesSink};
pub use statistics::{MetricChannel, RunResult};
pub use sweep::{
    SweepHandle, SweepOutcome, SweepParams, SweepProgress, SweepScheduler, SweepState, SweepStopper,
};
