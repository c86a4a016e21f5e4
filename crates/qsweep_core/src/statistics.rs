//! Metrics extracted from a completed run.

use serde::{Deserialize, Serialize};

use crate::engine::RunReport;

/// One of the tracked output series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MetricChannel {
    RejectProbability,
    LifeTime,
    ProcessorUtilization,
}

impl MetricChannel {
    pub const ALL: [MetricChannel; 3] = [
        MetricChannel::RejectProbability,
        MetricChannel::LifeTime,
        MetricChannel::ProcessorUtilization,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            MetricChannel::RejectProbability => "RejectProbability",
            MetricChannel::LifeTime => "LifeTime",
            MetricChannel::ProcessorUtilization => "ProcessorsUsingRate",
        }
    }

    /// Axis label for the metric's values
    pub fn unit(&self) -> &'static str {
        match self {
            MetricChannel::RejectProbability => "Probability",
            MetricChannel::LifeTime => "Time",
            MetricChannel::ProcessorUtilization => "Rate",
        }
    }
}

/// Metrics of one sweep step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub step: u32,
    pub reject_probability: f64,
    /// Mean lifetime of served requests; 0.0 when nothing was served
    pub mean_life_time: f64,
    /// Mean over processors of busy time / run length; 0.0 for an empty or instant run
    pub mean_processor_utilization: f64,
}

impl RunResult {
    pub fn value(&self, channel: MetricChannel) -> f64 {
        match channel {
            MetricChannel::RejectProbability => self.reject_probability,
            MetricChannel::LifeTime => self.mean_life_time,
            MetricChannel::ProcessorUtilization => self.mean_processor_utilization,
        }
    }

    /// The `(channel, x, y)` points for this run in channel order
    pub fn points(&self) -> [(MetricChannel, f64, f64); 3] {
        let x = f64::from(self.step);
        MetricChannel::ALL.map(|channel| (channel, x, self.value(channel)))
    }
}

/// Compute the tracked metrics for one run.
///
/// `request_count` is the number of requests the run was configured to generate.
pub fn collect(step: u32, report: &RunReport, request_count: u32) -> RunResult {
    let reject_probability = if request_count == 0 {
        0.0
    } else {
        report.full_reject_count as f64 / f64::from(request_count)
    };

    let total_life_time: f64 = report.success_lifetimes.iter().flatten().sum();
    let mean_life_time = if report.success_count == 0 {
        0.0
    } else {
        total_life_time / report.success_count as f64
    };

    let mean_processor_utilization =
        if report.processor_busy_times.is_empty() || report.end_time <= 0.0 {
            0.0
        } else {
            let total: f64 = report
                .processor_busy_times
                .iter()
                .map(|busy| busy / report.end_time)
                .sum();
            total / report.processor_busy_times.len() as f64
        };

    RunResult {
        step,
        reject_probability,
        mean_life_time,
        mean_processor_utilization,
    }
}
