//! Simulation engine boundary.
//!
//! The sweep scheduler only needs to build an engine from a [`StepConfiguration`],
//! run it to completion on a worker, ask it to stop, and read a [`RunReport`]
//! afterwards. [`queueing`] provides the reference discrete-event engine.

pub mod queueing;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::StepConfiguration;
use crate::error::RunError;

/// Cooperative stop signal shared between a caller and the work it started.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Returns `true` only for the call that flipped the flag.
    pub fn cancel(&self) -> bool {
        !self.cancelled.swap(true, Ordering::SeqCst)
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Read-only outcome of one completed run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    /// Requests rejected because every processor was busy and the buffer was full
    pub full_reject_count: u64,
    /// Lifetimes of successfully served requests, grouped by source
    pub success_lifetimes: Vec<Vec<f64>>,
    pub success_count: u64,
    /// Accumulated busy time of each processor
    pub processor_busy_times: Vec<f64>,
    /// Simulated time at which the run ended
    pub end_time: f64,
}

/// One simulation instance, owned by exactly one batch slot.
pub trait SimulationEngine: Send + 'static {
    /// Run to completion. Implementations poll `stop` and return
    /// [`RunError::Stopped`] once it is set.
    fn run(&mut self, stop: &CancelToken) -> Result<RunReport, RunError>;
}

/// Builds engines for sweep steps. Building does not start the run.
pub trait EngineFactory: Send + Sync + 'static {
    type Engine: SimulationEngine;

    fn build(&self, config: &StepConfiguration) -> Result<Self::Engine, RunError>;
}

impl<F, E> EngineFactory for F
where
    F: Fn(&StepConfiguration) -> Result<E, RunError> + Send + Sync + 'static,
    E: SimulationEngine,
{
    type Engine = E;

    fn build(&self, config: &StepConfiguration) -> Result<E, RunError> {
        self(config)
    }
}
