//! Queueing-system configuration and the per-step variations derived from it.

pub mod variator;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigLoadError;

/// The configuration dimension a sweep varies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SweepSelector {
    /// Number of arrival sources, each emitting at the sweep's rate parameter
    ArrivalSources,
    /// Number of processors, each serving at the sweep's rate parameter
    ProcessorSet,
    /// Buffer capacity; the rate parameter is unused
    BufferCapacity,
}

impl SweepSelector {
    pub const ALL: [SweepSelector; 3] = [
        SweepSelector::ArrivalSources,
        SweepSelector::ProcessorSet,
        SweepSelector::BufferCapacity,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            SweepSelector::ArrivalSources => "Source",
            SweepSelector::ProcessorSet => "Processor",
            SweepSelector::BufferCapacity => "BufferCapacity",
        }
    }

    /// Whether the sweep's rate parameter feeds into the step configuration
    pub fn uses_rate(&self) -> bool {
        match self {
            SweepSelector::ArrivalSources | SweepSelector::ProcessorSet => true,
            SweepSelector::BufferCapacity => false,
        }
    }
}

/// Base configuration supplied by the caller, read-only for a sweep.
///
/// Field names on disk follow the simulator's config file format:
///
/// ```json
/// { "requestsCount": 1000, "bufferCapacity": 3, "sources": [1.0, 1.5], "processors": [2.0] }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseConfiguration {
    #[serde(rename = "requestsCount")]
    pub request_count: u32,
    #[serde(rename = "bufferCapacity")]
    pub buffer_capacity: u32,
    /// Arrival rate of each source
    #[serde(rename = "sources")]
    pub source_rates: Vec<f64>,
    /// Service rate of each processor
    #[serde(rename = "processors")]
    pub processor_rates: Vec<f64>,
}

impl BaseConfiguration {
    /// Load a configuration file. `.yaml`/`.yml` files are read as YAML, anything else as JSON.
    pub fn load(path: &Path) -> Result<Self, ConfigLoadError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let is_yaml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));

        let config = if is_yaml {
            Self::from_yaml(&content)?
        } else {
            Self::from_json(&content)?
        };
        config.validate()?;

        tracing::debug!(
            path = %path.display(),
            sources = config.source_rates.len(),
            processors = config.processor_rates.len(),
            "Loaded base configuration"
        );
        Ok(config)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigLoadError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigLoadError> {
        Ok(serde_saphyr::from_str(yaml)?)
    }

    /// Check the invariants every sweep relies on.
    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.request_count == 0 {
            return Err(ConfigLoadError::Invalid(
                "requestsCount must be at least 1".to_string(),
            ));
        }
        check_rates("sources", &self.source_rates)?;
        check_rates("processors", &self.processor_rates)?;
        Ok(())
    }

    /// Validate, then require the lists the selector leaves untouched to be non-empty.
    pub fn validate_for(&self, selector: SweepSelector) -> Result<(), ConfigLoadError> {
        self.validate()?;
        if selector != SweepSelector::ArrivalSources && self.source_rates.is_empty() {
            return Err(ConfigLoadError::Invalid(
                "at least one source is required".to_string(),
            ));
        }
        if selector != SweepSelector::ProcessorSet && self.processor_rates.is_empty() {
            return Err(ConfigLoadError::Invalid(
                "at least one processor is required".to_string(),
            ));
        }
        Ok(())
    }
}

fn check_rates(field: &str, rates: &[f64]) -> Result<(), ConfigLoadError> {
    match rates.iter().position(|r| !r.is_finite() || *r <= 0.0) {
        Some(idx) => Err(ConfigLoadError::Invalid(format!(
            "{field}[{idx}] must be positive and finite, got {}",
            rates[idx]
        ))),
        None => Ok(()),
    }
}

/// Configuration of one sweep step: the base with a single dimension replaced.
#[derive(Debug, Clone, PartialEq)]
pub struct StepConfiguration {
    pub step: u32,
    pub request_count: u32,
    pub buffer_capacity: u32,
    pub source_rates: Vec<f64>,
    pub processor_rates: Vec<f64>,
}
