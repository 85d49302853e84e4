//! Configuration for the command-line solver adapter.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How to launch the external routing engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandSolverConfig {
    /// Program to execute, looked up on `PATH` when it has no directory part.
    pub command: String,

    /// Arguments passed before the request is piped to stdin.
    #[serde(default)]
    pub args: Vec<String>,

    /// Working directory for the engine process.
    #[serde(default)]
    pub working_dir: Option<PathBuf>,

    /// Exit codes that mean "try again later".
    #[serde(default = "default_transient_exit_codes")]
    pub transient_exit_codes: Vec<i32>,
}

fn default_transient_exit_codes() -> Vec<i32> {
    // EX_TEMPFAIL
    vec![75]
}

impl CommandSolverConfig {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            working_dir: None,
            transient_exit_codes: default_transient_exit_codes(),
        }
    }
}
