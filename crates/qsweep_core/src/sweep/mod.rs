//! Parameter sweeps over the queueing simulation.
//!
//! ```ignore
//! use qsweep_core::sweep::{SweepParams, SweepScheduler};
//!
//! let scheduler = SweepScheduler::new(QueueingFactory::new(42), base_config);
//! let sink = Arc::new(SeriesSink::new());
//! let handle = scheduler.launch_into(params, sink.clone(), |outcome| {
//!     tracing::info!(?outcome, "done");
//! })?;
//! // ... later, from any thread
//! handle.stop();
//! ```

mod params;
mod progress;
mod scheduler;

pub use params::*;
pub use progress::*;
pub use scheduler::*;
