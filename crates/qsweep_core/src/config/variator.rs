//! Per-step configuration building.
//!
//! Each function replaces exactly one dimension of the base configuration when the
//! selector matches it and returns the base value otherwise.

use super::{BaseConfiguration, StepConfiguration, SweepSelector};

/// Source rates for step `step`: `step` copies of `rate` when sweeping sources.
pub fn sources(
    selector: SweepSelector,
    step: u32,
    base: &BaseConfiguration,
    rate: f64,
) -> Vec<f64> {
    match selector {
        SweepSelector::ArrivalSources => vec![rate; step as usize],
        SweepSelector::ProcessorSet | SweepSelector::BufferCapacity => base.source_rates.clone(),
    }
}

/// Processor rates for step `step`: `step` copies of `rate` when sweeping processors.
pub fn processors(
    selector: SweepSelector,
    step: u32,
    base: &BaseConfiguration,
    rate: f64,
) -> Vec<f64> {
    match selector {
        SweepSelector::ProcessorSet => vec![rate; step as usize],
        SweepSelector::ArrivalSources | SweepSelector::BufferCapacity => {
            base.processor_rates.clone()
        }
    }
}

pub fn buffer_capacity(selector: SweepSelector, step: u32, base: &BaseConfiguration) -> u32 {
    match selector {
        SweepSelector::BufferCapacity => step,
        SweepSelector::ArrivalSources | SweepSelector::ProcessorSet => base.buffer_capacity,
    }
}

/// Build the full configuration for one step.
pub fn step_configuration(
    selector: SweepSelector,
    step: u32,
    base: &BaseConfiguration,
    rate: f64,
) -> StepConfiguration {
    StepConfiguration {
        step,
        request_count: base.request_count,
        buffer_capacity: buffer_capacity(selector, step, base),
        source_rates: sources(selector, step, base, rate),
        processor_rates: processors(selector, step, base, rate),
    }
}
