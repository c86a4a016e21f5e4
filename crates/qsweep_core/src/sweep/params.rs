//! Sweep launch parameters.

use serde::{Deserialize, Serialize};

use crate::config::SweepSelector;
use crate::error::InputError;

/// What to vary and over which step range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SweepParams {
    pub selector: SweepSelector,
    /// First step, inclusive
    pub min_count: u32,
    /// Last step, inclusive
    pub max_count: u32,
    /// Rate given to every swept source or processor; unused for buffer sweeps
    pub rate: f64,
    /// Number of runs executed concurrently before their points are emitted
    pub batch_size: usize,
}

impl Default for SweepParams {
    fn default() -> Self {
        Self {
            selector: SweepSelector::ArrivalSources,
            min_count: 10,
            max_count: 100,
            rate: 1.0,
            batch_size: 5,
        }
    }
}

impl SweepParams {
    pub fn new(
        selector: SweepSelector,
        min_count: u32,
        max_count: u32,
        rate: f64,
        batch_size: usize,
    ) -> Self {
        Self {
            selector,
            min_count,
            max_count,
            rate,
            batch_size,
        }
    }

    /// Build parameters from raw text fields, then validate them.
    ///
    /// The rate field is not read for selectors that do not use it.
    pub fn from_text(
        selector: SweepSelector,
        from: &str,
        to: &str,
        rate: &str,
        batch_size: &str,
    ) -> Result<Self, InputError> {
        let rate = if selector.uses_rate() {
            parse_field("rate", rate)?
        } else {
            0.0
        };
        let params = Self {
            selector,
            min_count: parse_field("from", from)?,
            max_count: parse_field("to", to)?,
            rate,
            batch_size: parse_field("batch size", batch_size)?,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<(), InputError> {
        if self.min_count > self.max_count {
            return Err(InputError::EmptyRange {
                min_count: self.min_count,
                max_count: self.max_count,
            });
        }
        if self.batch_size == 0 {
            return Err(InputError::ZeroBatchSize);
        }
        if self.selector.uses_rate() {
            if self.min_count == 0 {
                return Err(InputError::ZeroCount {
                    selector: self.selector,
                });
            }
            if !self.rate.is_finite() || self.rate <= 0.0 {
                return Err(InputError::InvalidScalar(self.rate));
            }
        }
        Ok(())
    }

    /// Number of runs in the sweep
    pub fn total_steps(&self) -> usize {
        (self.max_count - self.min_count) as usize + 1
    }

    /// Number of batch flushes a full sweep performs
    pub fn total_batches(&self) -> usize {
        self.total_steps().div_ceil(self.batch_size)
    }

    /// Legend label for the sweep's series, e.g. `Source[10:100], lambda=1.0`
    pub fn series_name(&self) -> String {
        let label = self.selector.label();
        if self.selector.uses_rate() {
            format!(
                "{label}[{}:{}], lambda={:?}",
                self.min_count, self.max_count, self.rate
            )
        } else {
            format!("{label}[{}:{}]", self.min_count, self.max_count)
        }
    }
}

fn parse_field<T: std::str::FromStr>(field: &'static str, value: &str) -> Result<T, InputError> {
    value.trim().parse().map_err(|_| InputError::NotANumber {
        field,
        value: value.to_string(),
    })
}
