//! Solver adapter that runs an external engine process per chunk.
//!
//! The request is written to the engine's stdin as JSON and the response is
//! read from its stdout. The exit status decides how a failure is classified.

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use super::config::CommandSolverConfig;
use super::error::SolveError;
use super::traits::SolverAdapter;
use super::types::{SolveRequest, SolveResponse, SolveSettings};

/// Longest stderr excerpt carried in an error.
const STDERR_EXCERPT_CHARS: usize = 2000;

/// Runs `command args...` once per chunk.
pub struct CommandSolver {
    config: CommandSolverConfig,
}

impl CommandSolver {
    pub fn new(config: CommandSolverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CommandSolverConfig {
        &self.config
    }

    /// Classifies a finished engine process.
    fn interpret(
        &self,
        success: bool,
        code: Option<i32>,
        stdout: &[u8],
        stderr: &[u8],
    ) -> Result<SolveResponse, SolveError> {
        if success {
            return serde_json::from_slice(stdout).map_err(|e| {
                SolveError::permanent(format!("engine returned an unreadable response: {}", e))
            });
        }

        let excerpt = stderr_excerpt(stderr);
        match code {
            Some(code) if self.config.transient_exit_codes.contains(&code) => Err(
                SolveError::transient(format!("engine exited with code {}: {}", code, excerpt)),
            ),
            Some(code) => Err(SolveError::permanent(format!(
                "engine exited with code {}: {}",
                code, excerpt
            ))),
            None => Err(SolveError::transient(format!(
                "engine terminated by signal: {}",
                excerpt
            ))),
        }
    }

    fn command_exists(&self) -> bool {
        let command = Path::new(&self.config.command);
        if command.components().count() > 1 {
            return command.is_file();
        }
        std::env::var_os("PATH")
            .map(|paths| std::env::split_paths(&paths).any(|dir| dir.join(command).is_file()))
            .unwrap_or(false)
    }
}

fn stderr_excerpt(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    let skip = text.chars().count().saturating_sub(STDERR_EXCERPT_CHARS);
    text.chars().skip(skip).collect()
}

#[async_trait]
impl SolverAdapter for CommandSolver {
    fn name(&self) -> &str {
        "command"
    }

    async fn validate(&self, settings: &SolveSettings) -> Result<(), SolveError> {
        if !self.command_exists() {
            return Err(SolveError::permanent(format!(
                "solver command not found: {}",
                self.config.command
            )));
        }
        if let Some(dir) = &self.config.working_dir {
            if !dir.is_dir() {
                return Err(SolveError::permanent(format!(
                    "solver working directory does not exist: {}",
                    dir.display()
                )));
            }
        }
        for barrier in &settings.barriers {
            if !barrier.exists() {
                return Err(SolveError::permanent(format!(
                    "barrier source does not exist: {}",
                    barrier.display()
                )));
            }
        }
        Ok(())
    }

    async fn solve(&self, request: SolveRequest) -> Result<SolveResponse, SolveError> {
        let chunk_id = request.chunk_id;
        let payload = serde_json::to_vec(&request)
            .map_err(|e| SolveError::permanent(format!("failed to encode request: {}", e)))?;

        let mut command = Command::new(&self.config.command);
        command
            .args(&self.config.args)
            .env("ODGRID_CHUNK_ID", chunk_id.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.config.working_dir {
            command.current_dir(dir);
        }

        debug!(chunk_id = %chunk_id, command = %self.config.command, "Starting engine process");

        let mut child = command.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SolveError::permanent(format!("solver command not found: {}", self.config.command))
            } else {
                SolveError::transient(format!("failed to start engine: {}", e))
            }
        })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| SolveError::transient("engine stdin was not captured"))?;

        // Feed stdin while stdout is drained so a large response cannot block the engine.
        let feeder = tokio::spawn(async move {
            stdin.write_all(&payload).await?;
            stdin.shutdown().await
        });

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| SolveError::transient(format!("failed to wait for engine: {}", e)))?;

        match feeder.await {
            Ok(Err(e)) if e.kind() != std::io::ErrorKind::BrokenPipe => {
                return Err(SolveError::transient(format!(
                    "failed to send request to engine: {}",
                    e
                )));
            }
            Err(e) => {
                return Err(SolveError::transient(format!("request writer failed: {}", e)));
            }
            _ => {}
        }

        debug!(
            chunk_id = %chunk_id,
            status = ?output.status.code(),
            stdout_bytes = output.stdout.len(),
            "Engine process finished"
        );

        self.interpret(
            output.status.success(),
            output.status.code(),
            &output.stdout,
            &output.stderr,
        )
    }
}
