mod loader;
mod types;
mod units;
mod validate;

pub use loader::{load_config, load_config_from_str};
pub use types::*;
pub use units::{DistanceUnits, OutputFormat, TimeUnits, TIME_OF_DAY_FORMAT};
pub use validate::{resolve_config, validate_config, MAX_SHARED_SERVICE_PROCESSES};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
