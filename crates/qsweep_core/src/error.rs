use std::fmt;
use std::path::PathBuf;

use crate::config::SweepSelector;

/// Malformed sweep parameters. Reported before any run starts.
#[derive(Debug, Clone, PartialEq)]
pub enum InputError {
    NotANumber { field: &'static str, value: String },
    EmptyRange { min_count: u32, max_count: u32 },
    ZeroBatchSize,
    /// Step 0 would build a configuration with no sources or no processors
    ZeroCount { selector: SweepSelector },
    InvalidScalar(f64),
}

impl fmt::Display for InputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputError::NotANumber { field, value } => {
                write!(f, "{field} must be a number, got {value:?}")
            }
            InputError::EmptyRange {
                min_count,
                max_count,
            } => write!(f, "empty step range: from {min_count} is above to {max_count}"),
            InputError::ZeroBatchSize => write!(f, "batch size must be at least 1"),
            InputError::ZeroCount { selector } => {
                write!(f, "{} sweep must start at a count of at least 1", selector.label())
            }
            InputError::InvalidScalar(value) => {
                write!(f, "rate parameter must be positive and finite, got {value}")
            }
        }
    }
}

impl std::error::Error for InputError {}

/// Base configuration could not be read, parsed or accepted.
#[derive(Debug)]
pub enum ConfigLoadError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Json(serde_json::Error),
    Yaml(serde_saphyr::Error),
    Invalid(String),
}

impl fmt::Display for ConfigLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigLoadError::Io { path, source } => {
                write!(f, "cannot read config {}: {source}", path.display())
            }
            ConfigLoadError::Json(e) => write!(f, "invalid JSON config: {e}"),
            ConfigLoadError::Yaml(e) => write!(f, "invalid YAML config: {e}"),
            ConfigLoadError::Invalid(msg) => write!(f, "invalid config: {msg}"),
        }
    }
}

impl std::error::Error for ConfigLoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigLoadError::Io { source, .. } => Some(source),
            ConfigLoadError::Json(e) => Some(e),
            ConfigLoadError::Yaml(e) => Some(e),
            ConfigLoadError::Invalid(_) => None,
        }
    }
}

impl From<serde_json::Error> for ConfigLoadError {
    fn from(e: serde_json::Error) -> Self {
        ConfigLoadError::Json(e)
    }
}

impl From<serde_saphyr::Error> for ConfigLoadError {
    fn from(e: serde_saphyr::Error) -> Self {
        ConfigLoadError::Yaml(e)
    }
}

/// Failure of a single simulation run inside a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum RunError {
    /// The engine rejected its configuration or failed internally
    Engine(String),
    /// The run honoured a stop request before finishing
    Stopped,
    /// The engine panicked; the payload message is kept when it is a string
    Panicked(String),
    /// The run's task went away without reporting a result
    Disconnected,
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunError::Engine(msg) => write!(f, "engine error: {msg}"),
            RunError::Stopped => write!(f, "run stopped"),
            RunError::Panicked(msg) => write!(f, "run panicked: {msg}"),
            RunError::Disconnected => write!(f, "run exited without a result"),
        }
    }
}

impl std::error::Error for RunError {}

/// Fatal errors that prevent a sweep from starting.
#[derive(Debug)]
pub enum SweepError {
    Input(InputError),
    Config(ConfigLoadError),
    /// Worker threads for the sweep could not be created
    Spawn(String),
}

impl fmt::Display for SweepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SweepError::Input(e) => write!(f, "{e}"),
            SweepError::Config(e) => write!(f, "{e}"),
            SweepError::Spawn(msg) => write!(f, "cannot start sweep workers: {msg}"),
        }
    }
}

impl std::error::Error for SweepError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SweepError::Input(e) => Some(e),
            SweepError::Config(e) => Some(e),
            SweepError::Spawn(_) => None,
        }
    }
}

impl From<InputError> for SweepError {
    fn from(e: InputError) -> Self {
        SweepError::Input(e)
    }
}

impl From<ConfigLoadError> for SweepError {
    fn from(e: ConfigLoadError) -> Self {
        SweepError::Config(e)
    }
}
