//! Scheduler scenario tests
//!
//! Tests are organized by topic:
//! - `scheduler` - batching, ordering, cancellation and failure handling with scripted engines
//! - `end_to_end` - full sweeps over the reference queueing engine

mod scheduler;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crate::config::{BaseConfiguration, StepConfiguration};
use crate::engine::{CancelToken, EngineFactory, RunReport, SimulationEngine};
use crate::error::{RunError, SweepError};
use crate::statistics::MetricChannel;
use crate::sweep::{SweepHandle, SweepOutcome, SweepParams, SweepScheduler};

/// What a scripted run does
#[derive(Debug, Clone, Copy)]
pub enum Script {
    /// Sleep, then report
    Finish(Duration),
    Fail,
    Panic,
    /// Block until told to stop
    WaitForStop,
}

/// Factory and engine activity, in the order it happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trace {
    Built(u32),
    Finished(u32),
}

pub type TraceLog = Arc<Mutex<Vec<Trace>>>;

/// Sizes of the runs of consecutive builds in `trace`.
///
/// Steps of the next batch are only built once every run of the current one has
/// been joined, so with finishing runs each group is exactly one batch.
pub fn batch_sizes(trace: &TraceLog) -> Vec<usize> {
    let mut sizes = Vec::new();
    let mut current = 0;
    for event in trace.lock().unwrap().iter() {
        match event {
            Trace::Built(_) => current += 1,
            Trace::Finished(_) if current > 0 => {
                sizes.push(current);
                current = 0;
            }
            Trace::Finished(_) => {}
        }
    }
    if current > 0 {
        sizes.push(current);
    }
    sizes
}

/// Engine factory whose runs follow a per-step script and record what happened.
pub struct ScriptedFactory {
    script: Box<dyn Fn(u32) -> Script + Send + Sync>,
    started: Arc<AtomicUsize>,
    finished: Arc<Mutex<Vec<u32>>>,
    trace: TraceLog,
}

impl ScriptedFactory {
    pub fn new(script: impl Fn(u32) -> Script + Send + Sync + 'static) -> Self {
        Self {
            script: Box::new(script),
            started: Arc::new(AtomicUsize::new(0)),
            finished: Arc::new(Mutex::new(Vec::new())),
            trace: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn instant() -> Self {
        Self::new(|_| Script::Finish(Duration::ZERO))
    }

    pub fn started(&self) -> Arc<AtomicUsize> {
        self.started.clone()
    }

    pub fn finished(&self) -> Arc<Mutex<Vec<u32>>> {
        self.finished.clone()
    }

    pub fn trace(&self) -> TraceLog {
        self.trace.clone()
    }
}

pub struct ScriptedEngine {
    step: u32,
    script: Script,
    started: Arc<AtomicUsize>,
    finished: Arc<Mutex<Vec<u32>>>,
    trace: TraceLog,
}

impl ScriptedEngine {
    /// Engine that reports at once and records nothing shared
    pub fn finishing(step: u32) -> Self {
        Self {
            step,
            script: Script::Finish(Duration::ZERO),
            started: Arc::new(AtomicUsize::new(0)),
            finished: Arc::new(Mutex::new(Vec::new())),
            trace: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

/// Report whose reject probability is `step / 100` with the default base config
pub fn report_for(step: u32) -> RunReport {
    RunReport {
        full_reject_count: u64::from(step),
        success_lifetimes: vec![vec![2.0, 2.0]],
        success_count: 2,
        processor_busy_times: vec![5.0],
        end_time: 10.0,
    }
}

impl SimulationEngine for ScriptedEngine {
    fn run(&mut self, stop: &CancelToken) -> Result<RunReport, RunError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        match self.script {
            Script::Finish(delay) => {
                thread::sleep(delay);
                self.finished.lock().unwrap().push(self.step);
                self.trace.lock().unwrap().push(Trace::Finished(self.step));
                Ok(report_for(self.step))
            }
            Script::Fail => Err(RunError::Engine(format!("step {} failed", self.step))),
            Script::Panic => panic!("step {} exploded", self.step),
            Script::WaitForStop => {
                if wait_until(|| stop.is_cancelled()) {
                    Err(RunError::Stopped)
                } else {
                    Err(RunError::Engine("never stopped".to_string()))
                }
            }
        }
    }
}

impl EngineFactory for ScriptedFactory {
    type Engine = ScriptedEngine;

    fn build(&self, config: &StepConfiguration) -> Result<ScriptedEngine, RunError> {
        self.trace.lock().unwrap().push(Trace::Built(config.step));
        Ok(ScriptedEngine {
            step: config.step,
            script: (self.script)(config.step),
            started: self.started.clone(),
            finished: self.finished.clone(),
            trace: self.trace.clone(),
        })
    }
}

pub fn base() -> BaseConfiguration {
    BaseConfiguration {
        request_count: 100,
        buffer_capacity: 2,
        source_rates: vec![1.0],
        processor_rates: vec![1.0],
    }
}

/// Poll `condition` for up to five seconds
pub fn wait_until(condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    condition()
}

pub type Points = Arc<Mutex<Vec<(MetricChannel, f64, f64)>>>;

pub struct Launched {
    pub handle: SweepHandle,
    pub points: Points,
    pub outcomes: Receiver<SweepOutcome>,
}

pub fn launch<F: EngineFactory>(
    scheduler: &SweepScheduler<F>,
    params: SweepParams,
) -> Result<Launched, (SweepError, Receiver<SweepOutcome>)> {
    let points: Points = Arc::new(Mutex::new(Vec::new()));
    let (tx, outcomes) = mpsc::channel();

    let sink = points.clone();
    let result = scheduler.launch(
        params,
        move |channel, x, y| sink.lock().unwrap().push((channel, x, y)),
        move |outcome| tx.send(outcome).unwrap(),
    );

    match result {
        Ok(handle) => Ok(Launched {
            handle,
            points,
            outcomes,
        }),
        Err(e) => Err((e, outcomes)),
    }
}

/// x-values emitted on one channel, in emission order
pub fn xs(points: &Points, channel: MetricChannel) -> Vec<f64> {
    points
        .lock()
        .unwrap()
        .iter()
        .filter(|(c, _, _)| *c == channel)
        .map(|(_, x, _)| *x)
        .collect()
}
