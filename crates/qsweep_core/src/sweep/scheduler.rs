//! Batched sweep execution.
//!
//! A driver thread walks the step range, builds one engine per step and groups
//! them into batches of `batch_size`. Each batch is started at once on the run
//! executor, then joined strictly in step order so points are emitted in
//! ascending step order no matter which run finishes first.
//!
//! Cancellation is observed before each step is built, before a batch starts and
//! after each ordered join. The runs of the current batch are registered in a
//! mutex-guarded list so [`SweepHandle::stop`] can signal them from any thread.

use std::any::Any;
use std::ops::ControlFlow;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use super::{SweepParams, SweepProgress};
use crate::config::{BaseConfiguration, variator};
use crate::engine::{CancelToken, EngineFactory, RunReport, SimulationEngine};
use crate::error::{RunError, SweepError};
use crate::sink::SeriesSink;
use crate::statistics::{self, MetricChannel};

/// Upper bound on worker threads per sweep, whatever the batch size
const MAX_RUN_THREADS: usize = 256;

/// Lifecycle of a launched sweep. `Completed` and `Cancelled` are terminal.
///
/// A sweep is already `Running` when `launch` hands out its handle, so `Idle` is
/// never observed through a [`SweepHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SweepState {
    Idle = 0,
    Running = 1,
    Completed = 2,
    Cancelled = 3,
}

impl SweepState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => SweepState::Running,
            2 => SweepState::Completed,
            3 => SweepState::Cancelled,
            _ => SweepState::Idle,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SweepState::Completed | SweepState::Cancelled)
    }
}

/// Reason passed to the completion callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepOutcome {
    /// Every step was processed
    Completed,
    /// A stop request was observed
    Cancelled,
    /// The sweep was rejected before any run started
    Failed,
}

struct ActiveRun {
    step: u32,
    stop: CancelToken,
}

struct SweepShared {
    cancel: CancelToken,
    state: AtomicU8,
    active: Mutex<Vec<ActiveRun>>,
    progress: SweepProgress,
}

impl SweepShared {
    fn new(total_steps: usize) -> Self {
        Self {
            cancel: CancelToken::new(),
            state: AtomicU8::new(SweepState::Running as u8),
            active: Mutex::new(Vec::new()),
            progress: SweepProgress::new(total_steps),
        }
    }

    fn active(&self) -> MutexGuard<'_, Vec<ActiveRun>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn state(&self) -> SweepState {
        SweepState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn set_state(&self, state: SweepState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    /// Signal every registered run to stop and forget them.
    fn signal_active(&self) {
        let mut active = self.active();
        for run in active.drain(..) {
            if run.stop.cancel() {
                tracing::debug!(step = run.step, "Signalled run to stop");
            }
        }
    }
}

/// Runs the completion callback exactly once, on every exit path.
struct Completion<C: FnOnce(SweepOutcome)> {
    callback: Option<C>,
    outcome: SweepOutcome,
}

impl<C: FnOnce(SweepOutcome)> Completion<C> {
    fn new(callback: C) -> Self {
        Self {
            callback: Some(callback),
            outcome: SweepOutcome::Failed,
        }
    }

    fn finish(mut self, outcome: SweepOutcome) {
        self.outcome = outcome;
    }
}

impl<C: FnOnce(SweepOutcome)> Drop for Completion<C> {
    fn drop(&mut self) {
        if let Some(callback) = self.callback.take() {
            callback(self.outcome);
        }
    }
}

#[cfg(feature = "parallel")]
struct RunExecutor {
    pool: rayon::ThreadPool,
}

#[cfg(feature = "parallel")]
impl RunExecutor {
    fn new(threads: usize) -> Result<Self, SweepError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|idx| format!("qsweep-run-{idx}"))
            .build()
            .map_err(|e| SweepError::Spawn(e.to_string()))?;
        Ok(Self { pool })
    }

    fn spawn(&self, job: impl FnOnce() + Send + 'static) {
        self.pool.spawn(job);
    }
}

#[cfg(not(feature = "parallel"))]
struct RunExecutor;

#[cfg(not(feature = "parallel"))]
impl RunExecutor {
    fn new(_threads: usize) -> Result<Self, SweepError> {
        Ok(Self)
    }

    fn spawn(&self, job: impl FnOnce() + Send + 'static) {
        // A job that fails to spawn drops its sender; the join reports Disconnected
        if let Err(e) = thread::Builder::new()
            .name("qsweep-run".to_string())
            .spawn(job)
        {
            tracing::error!(error = %e, "Failed to spawn run thread");
        }
    }
}

type RunReceiver = Receiver<Result<RunReport, RunError>>;

struct PendingRun<E> {
    step: u32,
    engine: Result<E, RunError>,
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

fn execute<E: SimulationEngine>(
    engine: &mut E,
    stop: &CancelToken,
) -> Result<RunReport, RunError> {
    match panic::catch_unwind(AssertUnwindSafe(|| engine.run(stop))) {
        Ok(result) => result,
        Err(payload) => Err(RunError::Panicked(panic_message(payload.as_ref()))),
    }
}

struct SweepDriver<F: EngineFactory> {
    factory: Arc<F>,
    base: Arc<BaseConfiguration>,
    params: SweepParams,
    shared: Arc<SweepShared>,
    executor: RunExecutor,
}

impl<F: EngineFactory> SweepDriver<F> {
    fn run<P>(self, on_point: &mut P) -> SweepOutcome
    where
        P: FnMut(MetricChannel, f64, f64),
    {
        let outcome = self.drive(on_point);
        let state = match outcome {
            SweepOutcome::Completed => SweepState::Completed,
            SweepOutcome::Cancelled | SweepOutcome::Failed => SweepState::Cancelled,
        };
        self.shared.set_state(state);

        let progress = &self.shared.progress;
        tracing::info!(
            outcome = ?outcome,
            runs = progress.completed(),
            batches = progress.flushes(),
            "Sweep finished"
        );
        outcome
    }

    fn drive<P>(&self, on_point: &mut P) -> SweepOutcome
    where
        P: FnMut(MetricChannel, f64, f64),
    {
        let params = &self.params;
        let mut pending = Vec::with_capacity(params.batch_size.min(params.total_steps()));

        for step in params.min_count..=params.max_count {
            if self.shared.cancel.is_cancelled() {
                return SweepOutcome::Cancelled;
            }

            let config =
                variator::step_configuration(params.selector, step, &self.base, params.rate);
            pending.push(PendingRun {
                step,
                engine: self.factory.build(&config),
            });

            let batch_full = pending.len() >= params.batch_size;
            if (batch_full || step == params.max_count)
                && self.flush(&mut pending, on_point).is_break()
            {
                return SweepOutcome::Cancelled;
            }
        }

        SweepOutcome::Completed
    }

    /// Start every pending run, then join and emit them in step order.
    fn flush<P>(
        &self,
        pending: &mut Vec<PendingRun<F::Engine>>,
        on_point: &mut P,
    ) -> ControlFlow<()>
    where
        P: FnMut(MetricChannel, f64, f64),
    {
        let runs = pending.len();
        let receivers = {
            let mut active = self.shared.active();
            // Checked under the lock so a concurrent stop either sees these runs or is seen here
            if self.shared.cancel.is_cancelled() {
                pending.clear();
                return ControlFlow::Break(());
            }

            let mut receivers = Vec::with_capacity(runs);
            for run in pending.drain(..) {
                let stop = CancelToken::new();
                active.push(ActiveRun {
                    step: run.step,
                    stop: stop.clone(),
                });
                receivers.push((run.step, self.start(run, stop)));
            }
            receivers
        };
        self.shared.progress.record_flush();
        tracing::debug!(
            batch = self.shared.progress.flushes(),
            runs,
            "Started batch"
        );

        for (step, receiver) in receivers {
            let result = receiver.recv().unwrap_or(Err(RunError::Disconnected));
            if self.shared.cancel.is_cancelled() {
                self.shared.signal_active();
                return ControlFlow::Break(());
            }
            self.shared.progress.increment();

            match result {
                Ok(report) => {
                    let result = statistics::collect(step, &report, self.base.request_count);
                    for (channel, x, y) in result.points() {
                        on_point(channel, x, y);
                    }
                }
                Err(RunError::Stopped) => {
                    tracing::debug!(step, "Run stopped before finishing");
                }
                Err(e) => {
                    tracing::warn!(step, error = %e, "Run failed, skipping its points");
                }
            }
        }

        self.shared.active().clear();
        ControlFlow::Continue(())
    }

    fn start(&self, run: PendingRun<F::Engine>, stop: CancelToken) -> RunReceiver {
        let (tx, rx) = mpsc::sync_channel(1);
        match run.engine {
            Ok(mut engine) => self.executor.spawn(move || {
                let result = execute(&mut engine, &stop);
                // The receiver is gone once the sweep is cancelled
                let _ = tx.send(result);
            }),
            Err(e) => {
                let _ = tx.send(Err(e));
            }
        }
        rx
    }
}

/// Launches sweeps of one engine factory over one base configuration.
pub struct SweepScheduler<F: EngineFactory> {
    factory: Arc<F>,
    base: Arc<BaseConfiguration>,
}

impl<F: EngineFactory> SweepScheduler<F> {
    pub fn new(factory: F, base: BaseConfiguration) -> Self {
        Self {
            factory: Arc::new(factory),
            base: Arc::new(base),
        }
    }

    pub fn base(&self) -> &BaseConfiguration {
        &self.base
    }

    /// Start a sweep on a background driver thread.
    ///
    /// `on_point` receives `(channel, step, value)` for every successful run, in
    /// ascending step order. `on_complete` is called exactly once: with the sweep's
    /// outcome when it ends, or with [`SweepOutcome::Failed`] when this call returns
    /// an error.
    pub fn launch<P, C>(
        &self,
        params: SweepParams,
        on_point: P,
        on_complete: C,
    ) -> Result<SweepHandle, SweepError>
    where
        P: FnMut(MetricChannel, f64, f64) + Send + 'static,
        C: FnOnce(SweepOutcome) + Send + 'static,
    {
        self.start(params, |_| {}, on_point, on_complete)
    }

    /// Reset `sink`, name it after the sweep, and launch a sweep appending into it.
    ///
    /// The sink is left untouched when the sweep is rejected.
    pub fn launch_into<C>(
        &self,
        params: SweepParams,
        sink: Arc<SeriesSink>,
        on_complete: C,
    ) -> Result<SweepHandle, SweepError>
    where
        C: FnOnce(SweepOutcome) + Send + 'static,
    {
        let target = sink.clone();
        self.start(
            params,
            move |params| target.reset(params.series_name()),
            move |channel, x, y| sink.append(channel, x, y),
            on_complete,
        )
    }

    /// Validate, run `prepare`, then spawn the driver.
    fn start<R, P, C>(
        &self,
        params: SweepParams,
        prepare: R,
        mut on_point: P,
        on_complete: C,
    ) -> Result<SweepHandle, SweepError>
    where
        R: FnOnce(&SweepParams),
        P: FnMut(MetricChannel, f64, f64) + Send + 'static,
        C: FnOnce(SweepOutcome) + Send + 'static,
    {
        let completion = Completion::new(on_complete);

        params.validate()?;
        self.base.validate_for(params.selector)?;
        let executor = RunExecutor::new(params.batch_size.min(MAX_RUN_THREADS))?;
        prepare(&params);

        let shared = Arc::new(SweepShared::new(params.total_steps()));

        tracing::info!(
            selector = ?params.selector,
            from = params.min_count,
            to = params.max_count,
            rate = params.rate,
            batch_size = params.batch_size,
            "Starting sweep"
        );

        let driver = SweepDriver {
            factory: self.factory.clone(),
            base: self.base.clone(),
            params,
            shared: shared.clone(),
            executor,
        };
        let thread = thread::Builder::new()
            .name("qsweep-driver".to_string())
            .spawn(move || {
                let outcome = driver.run(&mut on_point);
                completion.finish(outcome);
            })
            .map_err(|e| SweepError::Spawn(e.to_string()))?;

        Ok(SweepHandle {
            shared,
            driver: Some(thread),
        })
    }
}

/// Cloneable stop trigger for a sweep, usable from other threads or signal handlers.
#[derive(Clone)]
pub struct SweepStopper {
    shared: Arc<SweepShared>,
}

impl SweepStopper {
    /// Request cancellation. Idempotent, and a no-op once the sweep has ended.
    pub fn stop(&self) {
        if self.shared.cancel.cancel() && !self.shared.state().is_terminal() {
            tracing::info!("Sweep stop requested");
        }
        self.shared.signal_active();
    }
}

/// Control over a launched sweep.
pub struct SweepHandle {
    shared: Arc<SweepShared>,
    driver: Option<JoinHandle<()>>,
}

impl SweepHandle {
    /// Request cancellation. Idempotent, and a no-op once the sweep has ended.
    pub fn stop(&self) {
        self.stopper().stop();
    }

    pub fn stopper(&self) -> SweepStopper {
        SweepStopper {
            shared: self.shared.clone(),
        }
    }

    pub fn state(&self) -> SweepState {
        self.shared.state()
    }

    pub fn progress(&self) -> &SweepProgress {
        &self.shared.progress
    }

    pub fn is_finished(&self) -> bool {
        self.driver.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Wait for the driver thread and return the final state.
    pub fn join(mut self) -> SweepState {
        if let Some(driver) = self.driver.take()
            && driver.join().is_err()
        {
            tracing::error!("Sweep driver panicked");
            self.shared.set_state(SweepState::Cancelled);
        }
        self.state()
    }
}
