//! Reference discrete-event engine for a multi-source, multi-processor queueing system.
//!
//! Sources emit requests with exponentially distributed inter-arrival times. An
//! arriving request goes to the lowest-numbered free processor, otherwise waits in a
//! FIFO buffer of fixed capacity, otherwise is rejected. Processors serve with
//! exponentially distributed service times. A run generates `request_count`
//! arrivals and then drains the system.

use std::collections::VecDeque;

use rand::SeedableRng;
use rand::rngs::SmallRng;
use rand_distr::{Distribution, Exp};

use super::{CancelToken, EngineFactory, RunReport, SimulationEngine};
use crate::config::StepConfiguration;
use crate::error::RunError;

/// Number of processed events between stop-token polls
const STOP_POLL_INTERVAL: u64 = 256;

#[derive(Debug, Clone, Copy)]
struct Request {
    source: usize,
    arrived_at: f64,
}

#[derive(Debug, Clone, Copy)]
struct InService {
    request: Request,
    finishes_at: f64,
}

#[derive(Debug, Clone, Copy)]
enum Event {
    Arrival { source: usize, at: f64 },
    Completion { processor: usize, at: f64 },
}

pub struct QueueingSimulator {
    step: u32,
    request_count: u32,
    buffer_capacity: usize,
    arrivals: Vec<Exp<f64>>,
    services: Vec<Exp<f64>>,
    rng: SmallRng,
}

impl QueueingSimulator {
    pub fn new(config: &StepConfiguration, seed: u64) -> Result<Self, RunError> {
        let arrivals = config
            .source_rates
            .iter()
            .map(|&rate| exponential("source", rate))
            .collect::<Result<Vec<_>, _>>()?;
        let services = config
            .processor_rates
            .iter()
            .map(|&rate| exponential("processor", rate))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            step: config.step,
            request_count: config.request_count,
            buffer_capacity: config.buffer_capacity as usize,
            arrivals,
            services,
            rng: SmallRng::seed_from_u64(seed),
        })
    }

    fn serve(
        &mut self,
        processor: usize,
        request: Request,
        now: f64,
        report: &mut RunReport,
    ) -> InService {
        let duration = self.services[processor].sample(&mut self.rng);
        report.processor_busy_times[processor] += duration;
        InService {
            request,
            finishes_at: now + duration,
        }
    }
}

fn exponential(kind: &str, rate: f64) -> Result<Exp<f64>, RunError> {
    if !rate.is_finite() || rate <= 0.0 {
        return Err(RunError::Engine(format!(
            "{kind} rate must be positive and finite, got {rate}"
        )));
    }
    Exp::new(rate).map_err(|e| RunError::Engine(format!("{kind} rate {rate}: {e}")))
}

fn next_event(
    next_arrival: Option<(usize, f64)>,
    processors: &[Option<InService>],
) -> Option<Event> {
    let completion = processors
        .iter()
        .enumerate()
        .filter_map(|(idx, slot)| slot.map(|s| (idx, s.finishes_at)))
        .min_by(|a, b| a.1.total_cmp(&b.1));

    match (next_arrival, completion) {
        (None, None) => None,
        (Some((source, at)), None) => Some(Event::Arrival { source, at }),
        (None, Some((processor, at))) => Some(Event::Completion { processor, at }),
        // Completions win ties so the freed processor can take the arrival
        (Some((source, arrival_at)), Some((processor, completion_at))) => {
            if completion_at <= arrival_at {
                Some(Event::Completion {
                    processor,
                    at: completion_at,
                })
            } else {
                Some(Event::Arrival {
                    source,
                    at: arrival_at,
                })
            }
        }
    }
}

impl SimulationEngine for QueueingSimulator {
    fn run(&mut self, stop: &CancelToken) -> Result<RunReport, RunError> {
        if stop.is_cancelled() {
            return Err(RunError::Stopped);
        }

        let mut next_arrival: Vec<f64> = Vec::with_capacity(self.arrivals.len());
        for dist in &self.arrivals {
            next_arrival.push(dist.sample(&mut self.rng));
        }
        let mut processors: Vec<Option<InService>> = vec![None; self.services.len()];
        let mut buffer: VecDeque<Request> = VecDeque::with_capacity(self.buffer_capacity);
        let mut report = RunReport {
            success_lifetimes: vec![Vec::new(); self.arrivals.len()],
            processor_busy_times: vec![0.0; self.services.len()],
            ..Default::default()
        };

        let mut generated: u32 = 0;
        let mut now = 0.0;
        let mut events: u64 = 0;

        loop {
            events += 1;
            if events % STOP_POLL_INTERVAL == 0 && stop.is_cancelled() {
                tracing::debug!(step = self.step, events, "Run stopped");
                return Err(RunError::Stopped);
            }

            let arrival = if generated < self.request_count {
                next_arrival
                    .iter()
                    .copied()
                    .enumerate()
                    .min_by(|a, b| a.1.total_cmp(&b.1))
            } else {
                None
            };

            match next_event(arrival, &processors) {
                None => break,
                Some(Event::Arrival { source, at }) => {
                    now = at;
                    generated += 1;
                    next_arrival[source] = at + self.arrivals[source].sample(&mut self.rng);

                    let request = Request {
                        source,
                        arrived_at: at,
                    };
                    if let Some(idx) = processors.iter().position(Option::is_none) {
                        processors[idx] = Some(self.serve(idx, request, now, &mut report));
                    } else if buffer.len() < self.buffer_capacity {
                        buffer.push_back(request);
                    } else {
                        report.full_reject_count += 1;
                    }
                }
                Some(Event::Completion { processor, at }) => {
                    now = at;
                    if let Some(done) = processors[processor].take() {
                        let lifetime = at - done.request.arrived_at;
                        report.success_lifetimes[done.request.source].push(lifetime);
                        report.success_count += 1;
                    }
                    if let Some(waiting) = buffer.pop_front() {
                        let next = self.serve(processor, waiting, now, &mut report);
                        processors[processor] = Some(next);
                    }
                }
            }
        }

        report.end_time = now;
        tracing::trace!(
            step = self.step,
            rejected = report.full_reject_count,
            served = report.success_count,
            end_time = report.end_time,
            "Run finished"
        );
        Ok(report)
    }
}

/// Builds [`QueueingSimulator`]s seeded with `seed + step`, so every step is reproducible.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueueingFactory {
    pub seed: u64,
}

impl QueueingFactory {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }
}

impl EngineFactory for QueueingFactory {
    type Engine = QueueingSimulator;

    fn build(&self, config: &StepConfiguration) -> Result<QueueingSimulator, RunError> {
        QueueingSimulator::new(config, self.seed.wrapping_add(u64::from(config.step)))
    }
}
