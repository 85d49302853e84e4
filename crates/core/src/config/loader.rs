use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::RunConfig, ConfigError};

/// Load configuration from file with environment variable overrides
///
/// Overrides use the `ODGRID_` prefix with `__` between sections, e.g.
/// `ODGRID_POOL__MAX_PROCESSES=8`.
pub fn load_config(path: &Path) -> Result<RunConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    let config: RunConfig = Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed("ODGRID_").split("__"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;

    Ok(config)
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<RunConfig, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}
