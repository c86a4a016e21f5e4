//! Per-source and per-processor aggregate results.
//!
//! Sweeps emit only the three series in [`crate::statistics`]; this schema is kept
//! for per-entity reports and is not populated by the scheduler.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AnalyzerResults {
    /// `true` for a source entry, `false` for a processor entry
    pub is_source: bool,
    /// Entity number, unique within its category
    pub number: u32,
    pub request_count: u64,
    pub reject_probability: f64,
    pub life_time: f64,
    pub buffer_time: f64,
    pub process_time: f64,
    pub buffer_time_dispersion: f64,
    pub process_time_dispersion: f64,
    pub usage_rate: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AnalyzerError {
    OutOfUnitRange { field: &'static str, value: f64 },
    NegativeDispersion { field: &'static str, value: f64 },
    DuplicateNumber { is_source: bool, number: u32 },
}

impl fmt::Display for AnalyzerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalyzerError::OutOfUnitRange { field, value } => {
                write!(f, "{field} must be within [0, 1], got {value}")
            }
            AnalyzerError::NegativeDispersion { field, value } => {
                write!(f, "{field} must not be negative, got {value}")
            }
            AnalyzerError::DuplicateNumber { is_source, number } => {
                let kind = if *is_source { "source" } else { "processor" };
                write!(f, "{kind} {number} appears more than once")
            }
        }
    }
}

impl std::error::Error for AnalyzerError {}

impl AnalyzerResults {
    pub fn source(number: u32) -> Self {
        Self {
            is_source: true,
            number,
            ..Default::default()
        }
    }

    pub fn processor(number: u32) -> Self {
        Self {
            is_source: false,
            number,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), AnalyzerError> {
        for (field, value) in [
            ("reject_probability", self.reject_probability),
            ("usage_rate", self.usage_rate),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(AnalyzerError::OutOfUnitRange { field, value });
            }
        }
        for (field, value) in [
            ("buffer_time_dispersion", self.buffer_time_dispersion),
            ("process_time_dispersion", self.process_time_dispersion),
        ] {
            if value.is_nan() || value < 0.0 {
                return Err(AnalyzerError::NegativeDispersion { field, value });
            }
        }
        Ok(())
    }
}

/// Validate a full report: every entry, plus unique numbers per category.
pub fn validate_all(results: &[AnalyzerResults]) -> Result<(), AnalyzerError> {
    let mut seen = rustc_hash::FxHashSet::default();
    for entry in results {
        entry.validate()?;
        if !seen.insert((entry.is_source, entry.number)) {
            return Err(AnalyzerError::DuplicateNumber {
                is_source: entry.is_source,
                number: entry.number,
            });
        }
    }
    Ok(())
}
