//! Command-line interface definitions.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "odgrid")]
#[command(about = "Chunked parallel origin-destination cost matrix solver", long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Log level used when RUST_LOG is not set (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    /// Log line format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run an analysis in a worker process
    Solve {
        /// Path to configuration file
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Execute a run bundle (started by `solve`)
    Worker {
        /// Path to the run bundle
        #[arg(long)]
        bundle: PathBuf,

        /// Write Prometheus metrics here when the run ends
        #[arg(long)]
        metrics_file: Option<PathBuf>,
    },

    /// Load, validate and resolve a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Print the chunk plan without solving
    Plan {
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_args() {
        let cli = Cli::try_parse_from([
            "odgrid",
            "worker",
            "--bundle",
            "/tmp/bundle.json",
            "--metrics-file",
            "/tmp/metrics.txt",
        ])
        .unwrap();
        match cli.command {
            Command::Worker {
                bundle,
                metrics_file,
            } => {
                assert_eq!(bundle, PathBuf::from("/tmp/bundle.json"));
                assert_eq!(metrics_file, Some(PathBuf::from("/tmp/metrics.txt")));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "odgrid",
            "plan",
            "--config",
            "run.toml",
            "--log-format",
            "json",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(cli.log_format, LogFormat::Json);
        assert_eq!(cli.log_level, "debug");
    }

    #[test]
    fn test_solve_requires_config() {
        assert!(Cli::try_parse_from(["odgrid", "solve"]).is_err());
    }
}
