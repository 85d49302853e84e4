//! Orchestrator configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How the caller launches the isolated worker process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Worker executable. Defaults to the running executable.
    #[serde(default)]
    pub worker_program: Option<PathBuf>,

    /// Arguments placed before `--bundle <file>`.
    #[serde(default = "default_worker_args")]
    pub worker_args: Vec<String>,

    /// Number of stderr lines kept for error reports.
    #[serde(default = "default_stderr_tail_lines")]
    pub stderr_tail_lines: usize,
}

fn default_worker_args() -> Vec<String> {
    vec!["worker".to_string()]
}

fn default_stderr_tail_lines() -> usize {
    50
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            worker_program: None,
            worker_args: default_worker_args(),
            stderr_tail_lines: default_stderr_tail_lines(),
        }
    }
}

impl OrchestratorConfig {
    /// Resolves the worker executable.
    pub fn program(&self) -> std::io::Result<PathBuf> {
        match &self.worker_program {
            Some(program) => Ok(program.clone()),
            None => std::env::current_exe(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OrchestratorConfig::default();
        assert!(config.worker_program.is_none());
        assert_eq!(config.worker_args, vec!["worker"]);
        assert_eq!(config.stderr_tail_lines, 50);
        assert!(config.program().is_ok());
    }

    #[test]
    fn test_partial_toml() {
        let config: OrchestratorConfig =
            toml::from_str(r#"worker_program = "/opt/odgrid/bin/odgrid""#).unwrap();
        assert_eq!(
            config.program().unwrap(),
            PathBuf::from("/opt/odgrid/bin/odgrid")
        );
        assert_eq!(config.worker_args, vec!["worker"]);
    }
}
