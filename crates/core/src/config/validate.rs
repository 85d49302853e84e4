use chrono::NaiveDateTime;
use tracing::warn;

use super::units::TIME_OF_DAY_FORMAT;
use super::{types::RunConfig, ConfigError, InputMode};

/// Concurrent solves allowed against a shared routing service.
pub const MAX_SHARED_SERVICE_PROCESSES: usize = 4;

fn invalid(msg: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError(msg.into())
}

/// Validate configuration
///
/// Rejects parameter combinations that would fail before any chunk is dispatched.
pub fn validate_config(config: &RunConfig) -> Result<(), ConfigError> {
    if config.network.source.trim().is_empty() {
        return Err(invalid("network.source cannot be empty"));
    }
    if config.network.travel_mode.trim().is_empty() {
        return Err(invalid("network.travel_mode cannot be empty"));
    }
    if let Some(ref tod) = config.network.time_of_day {
        NaiveDateTime::parse_from_str(tod, TIME_OF_DAY_FORMAT).map_err(|e| {
            invalid(format!(
                "network.time_of_day '{}' does not match {}: {}",
                tod, TIME_OF_DAY_FORMAT, e
            ))
        })?;
    }

    match config.inputs.mode {
        InputMode::CrossProduct => {
            if config.chunking.max_per_chunk == 0 {
                return Err(invalid("chunking.max_per_chunk must be greater than 0"));
            }
        }
        InputMode::KnownPairs => {
            if config.chunking.max_pairs_per_chunk == 0 {
                return Err(invalid(
                    "chunking.max_pairs_per_chunk must be greater than 0",
                ));
            }
            let field_ok = config
                .inputs
                .assigned_destination_field
                .as_deref()
                .is_some_and(|f| !f.trim().is_empty());
            if !field_ok {
                return Err(invalid(
                    "inputs.assigned_destination_field is required in known_pairs mode",
                ));
            }
        }
    }

    if let Some(cutoff) = config.solve.cutoff {
        if !(cutoff.is_finite() && cutoff > 0.0) {
            return Err(invalid("solve.cutoff must be a positive number"));
        }
    }
    if config.solve.max_destinations == Some(0) {
        return Err(invalid("solve.max_destinations must be greater than 0"));
    }
    if config.solve.timeout_secs == 0 {
        return Err(invalid("solve.timeout_secs must be greater than 0"));
    }

    if config.solver.command.trim().is_empty() {
        return Err(invalid("solver.command cannot be empty"));
    }

    if config.pool.max_processes == 0 {
        return Err(invalid("pool.max_processes must be greater than 0"));
    }
    if config.pool.retry.max_attempts == 0 {
        return Err(invalid("pool.retry.max_attempts must be greater than 0"));
    }
    if config.pool.retry.backoff_multiplier < 1.0 {
        return Err(invalid("pool.retry.backoff_multiplier must be at least 1.0"));
    }

    for (name, path) in [
        ("output.od_lines", &config.output.od_lines),
        ("output.updated_origins", &config.output.updated_origins),
        ("output.updated_destinations", &config.output.updated_destinations),
    ] {
        if path.as_os_str().is_empty() {
            return Err(invalid(format!("{} cannot be empty", name)));
        }
    }
    if config.output.batch_size == 0 {
        return Err(invalid("output.batch_size must be greater than 0"));
    }
    if config.output.block_rows == 0 {
        return Err(invalid("output.block_rows must be greater than 0"));
    }

    Ok(())
}

/// Validate and apply service limits.
///
/// Caps are applied here, once, with a warning, so the worker never has to
/// second-guess the configuration it receives.
pub fn resolve_config(mut config: RunConfig) -> Result<RunConfig, ConfigError> {
    validate_config(&config)?;

    if !config.network.is_service() {
        return Ok(config);
    }

    let limits = config.network.service_limits.clone().unwrap_or_default();

    let mut process_cap = limits.max_concurrent;
    if config.network.shared_service {
        process_cap = Some(
            process_cap.map_or(MAX_SHARED_SERVICE_PROCESSES, |c| {
                c.min(MAX_SHARED_SERVICE_PROCESSES)
            }),
        );
    }
    if let Some(cap) = process_cap {
        if config.pool.max_processes > cap {
            warn!(
                "Service allows at most {} concurrent solves; reducing max_processes from {}",
                cap, config.pool.max_processes
            );
            config.pool.max_processes = cap.max(1);
        }
    }

    let axis_cap = match (limits.max_origins, limits.max_destinations) {
        (Some(o), Some(d)) => Some(o.min(d)),
        (o, d) => o.or(d),
    };
    if let Some(cap) = axis_cap {
        if config.chunking.max_per_chunk > cap {
            warn!(
                "Service allows at most {} points per axis; reducing max_per_chunk from {}",
                cap, config.chunking.max_per_chunk
            );
            config.chunking.max_per_chunk = cap.max(1);
        }
    }
    if let Some(cap) = limits.max_pairs {
        if config.chunking.max_pairs_per_chunk > cap {
            warn!(
                "Service allows at most {} pairs per request; reducing max_pairs_per_chunk from {}",
                cap, config.chunking.max_pairs_per_chunk
            );
            config.chunking.max_pairs_per_chunk = cap.max(1);
        }
    }

    if config.network.precalculate_locations {
        warn!("Network locations cannot be precalculated for a service; disabling");
        config.network.precalculate_locations = false;
    }

    Ok(config)
}
