//! End-to-end tests of the `odgrid` binary.
//!
//! The routing engine is a shell script that ignores its request and answers
//! with one row for the first origin and destination of the chunk.

#![cfg(unix)]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use serde_json::Value;
use tempfile::TempDir;

const ONE_ROW: &str = r#"cat > /dev/null; echo '{"rows":[{"origin":0,"destination":0,"total_time":1.5}]}'"#;

/// Test helper holding a run folder with inputs and a config file.
struct TestRun {
    dir: TempDir,
    config_path: PathBuf,
}

impl TestRun {
    fn new(script: &str, policy: &str) -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let base = dir.path();

        write_records(&base.join("origins.jsonl"), "o", 3);
        write_records(&base.join("destinations.jsonl"), "d", 2);

        let config = format!(
            r#"
[network]
source = "/data/streets.nd"
travel_mode = "Driving Time"

[inputs]
origins = "{base}/origins.jsonl"
destinations = "{base}/destinations.jsonl"

[chunking]
max_per_chunk = 2

[solver]
command = "sh"
args = ["-c", {script}]

[pool]
max_processes = 2
failure_policy = "{policy}"

[pool.retry]
initial_delay_ms = 1
max_delay_ms = 5

[output]
format = "csv"
od_lines = "{base}/od_lines.csv"
updated_origins = "{base}/updated_origins.csv"
updated_destinations = "{base}/updated_destinations.csv"
scratch_dir = "{base}/scratch"
"#,
            base = base.display(),
            script = toml_string(script),
            policy = policy,
        );
        let config_path = base.join("run.toml");
        std::fs::write(&config_path, config).expect("Failed to write config");

        Self { dir, config_path }
    }

    fn odgrid(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_odgrid"))
            .args(args)
            .env_remove("RUST_LOG")
            .output()
            .expect("Failed to run odgrid")
    }

    fn config_arg(&self) -> &str {
        self.config_path.to_str().expect("Non-UTF-8 temp path")
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

fn write_records(path: &Path, prefix: &str, n: usize) {
    let lines: String = (0..n)
        .map(|i| format!("{{\"id\":\"{}{}\",\"x\":{}}}\n", prefix, i, i))
        .collect();
    std::fs::write(path, lines).expect("Failed to write records");
}

/// A JSON string literal is also a valid TOML basic string.
fn toml_string(s: &str) -> String {
    serde_json::to_string(s).expect("Failed to quote script")
}

fn data_lines(path: &Path) -> usize {
    std::fs::read_to_string(path)
        .expect("Failed to read output")
        .lines()
        .count()
        - 1
}

#[test]
fn test_solve_end_to_end() {
    let run = TestRun::new(ONE_ROW, "best_effort");

    let output = run.odgrid(&["solve", "--config", run.config_arg()]);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(output.status.success(), "solve failed: {}", stderr);

    // 2 origin groups x 1 destination group, one row each.
    assert_eq!(data_lines(&run.path("od_lines.csv")), 2);
    assert_eq!(data_lines(&run.path("updated_origins.csv")), 2);
    assert_eq!(data_lines(&run.path("updated_destinations.csv")), 2);

    let summary: Value = serde_json::from_slice(&output.stdout).expect("Summary is not JSON");
    assert_eq!(summary["run_state"], "completed");
    assert_eq!(summary["chunks_total"], 2);
    assert_eq!(summary["pairs_found"], 2);

    // Worker events were relayed into the log.
    assert!(stderr.contains("Finished chunk 2 of 2"), "{}", stderr);
}

#[test]
fn test_solve_aborts_on_fatal_failure() {
    let script = "cat > /dev/null; echo 'license unavailable' >&2; exit 3";
    let run = TestRun::new(script, "abort_on_fatal");

    let output = run.odgrid(&["solve", "--config", run.config_arg()]);

    assert_eq!(output.status.code(), Some(2));
    assert!(!run.path("od_lines.csv").exists());
    let summary: Value = serde_json::from_slice(&output.stdout).expect("Summary is not JSON");
    assert_eq!(summary["run_state"], "aborted");
}

#[test]
fn test_validate_prints_resolved_config() {
    let run = TestRun::new(ONE_ROW, "best_effort");

    let output = run.odgrid(&["validate", "--config", run.config_arg()]);

    assert!(output.status.success());
    let config: Value = serde_json::from_slice(&output.stdout).expect("Config is not JSON");
    assert_eq!(config["pool"]["max_processes"], 2);
    assert_eq!(config["network"]["travel_mode"], "Driving Time");
}

#[test]
fn test_validate_rejects_bad_config() {
    let run = TestRun::new(ONE_ROW, "best_effort");
    let text = std::fs::read_to_string(&run.config_path).unwrap();
    std::fs::write(&run.config_path, text.replace("max_per_chunk = 2", "max_per_chunk = 0"))
        .unwrap();

    let output = run.odgrid(&["validate", "--config", run.config_arg()]);

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("max_per_chunk"));
}

#[test]
fn test_plan_lists_chunks() {
    let run = TestRun::new(ONE_ROW, "best_effort");

    let output = run.odgrid(&["plan", "--config", run.config_arg()]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("chunk 0"));
    assert!(stdout.contains("chunk 1"));
    assert!(stdout.contains("2 chunks, 6 requested pairs"));
    // Nothing is solved.
    assert!(!run.path("od_lines.csv").exists());
}

#[test]
fn test_worker_rejects_missing_bundle() {
    let run = TestRun::new(ONE_ROW, "best_effort");
    let bundle = run.path("missing.json");

    let output = run.odgrid(&["worker", "--bundle", bundle.to_str().unwrap()]);

    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());
}
