//! Launches the worker process and relays its event stream.

use std::collections::VecDeque;
use std::process::Stdio;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::bundle::WorkerBundle;
use super::config::OrchestratorConfig;
use super::sink::{MessageSink, TracingSink};
use super::{OrchestratorError, RunReport};
use crate::config::RunConfig;
use crate::events::{RunEvent, RunSummary};
use crate::metrics;

/// Worker exit code for a run that ended Aborted.
pub const EXIT_ABORTED: i32 = 2;

/// Runs one analysis in an isolated worker process.
///
/// The pool never runs in this process; a worker crash surfaces as an
/// [`OrchestratorError`] carrying the exit code and the tail of its stderr.
pub struct Orchestrator {
    config: OrchestratorConfig,
    sink: Arc<dyn MessageSink>,
}

impl Orchestrator {
    /// Creates an orchestrator relaying through `tracing`.
    pub fn new(config: OrchestratorConfig) -> Self {
        Self {
            config,
            sink: Arc::new(TracingSink),
        }
    }

    /// Sets the sink relayed events are forwarded to.
    pub fn with_sink(mut self, sink: Arc<dyn MessageSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Runs `config` to completion.
    pub async fn run(&self, config: &RunConfig) -> Result<RunReport, OrchestratorError> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let bundle = WorkerBundle::new(run_id.clone(), config.clone())?;
        let bundle_path = bundle.write(&config.output.scratch_dir).await?;
        info!(run_id = %run_id, bundle = %bundle_path.display(), "Starting worker");

        let result = self.run_worker(&run_id, &bundle_path, config).await;

        if let Err(e) = tokio::fs::remove_file(&bundle_path).await {
            warn!("Failed to remove bundle {}: {}", bundle_path.display(), e);
        }
        result
    }

    async fn run_worker(
        &self,
        run_id: &str,
        bundle_path: &std::path::Path,
        config: &RunConfig,
    ) -> Result<RunReport, OrchestratorError> {
        let program = self.config.program().map_err(OrchestratorError::Spawn)?;
        let mut child = Command::new(&program)
            .args(&self.config.worker_args)
            .arg("--bundle")
            .arg(bundle_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(OrchestratorError::Spawn)?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| OrchestratorError::Spawn(std::io::Error::other("stdout not captured")))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| OrchestratorError::Spawn(std::io::Error::other("stderr not captured")))?;

        // Both pipes are drained together so a chatty stderr cannot stall stdout.
        let (relay, tail) = futures::join!(
            relay_events(stdout, self.sink.as_ref()),
            drain_stderr(stderr, self.config.stderr_tail_lines),
        );

        let status = child.wait().await?;
        let stderr_tail: Vec<String> = tail.into();
        let relay = relay?;

        debug!(
            run_id,
            status = ?status.code(),
            events = relay.events,
            malformed = relay.malformed,
            "Worker exited"
        );

        match status.code() {
            Some(0) => {
                for path in config.output.paths() {
                    if !path.exists() {
                        return Err(OrchestratorError::MissingOutput(path.clone()));
                    }
                }
                info!(run_id, "Run completed");
                Ok(RunReport {
                    run_id: run_id.to_string(),
                    summary: relay.summary,
                    events_relayed: relay.events,
                    malformed_lines: relay.malformed,
                    stderr_tail,
                })
            }
            Some(EXIT_ABORTED) => Err(OrchestratorError::Aborted {
                summary: relay.summary.map(Box::new),
                stderr_tail: stderr_tail.join("\n"),
            }),
            code => Err(OrchestratorError::WorkerFailed {
                code,
                stderr_tail: stderr_tail.join("\n"),
            }),
        }
    }
}

struct Relayed {
    events: usize,
    malformed: usize,
    summary: Option<RunSummary>,
}

/// Forwards each stdout line to the sink as soon as it is read.
async fn relay_events<R: AsyncRead + Unpin>(
    stdout: R,
    sink: &dyn MessageSink,
) -> Result<Relayed, OrchestratorError> {
    let mut lines = BufReader::new(stdout).lines();
    let mut relayed = Relayed {
        events: 0,
        malformed: 0,
        summary: None,
    };

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match RunEvent::parse_line(&line) {
            Ok(event) => {
                metrics::RELAYED_EVENTS
                    .with_label_values(&[event.level.as_str()])
                    .inc();
                sink.relay(&event);
                if let Some(summary) = event.summary {
                    relayed.summary = Some(summary);
                }
                relayed.events += 1;
            }
            Err(e) => {
                debug!("Relaying malformed worker line: {}", e);
                metrics::RELAYED_EVENTS
                    .with_label_values(&["malformed"])
                    .inc();
                sink.relay_raw(&line);
                relayed.malformed += 1;
            }
        }
    }
    Ok(relayed)
}

/// Keeps the last `keep` lines of the worker's stderr.
async fn drain_stderr<R: AsyncRead + Unpin>(stderr: R, keep: usize) -> VecDeque<String> {
    let mut lines = BufReader::new(stderr).lines();
    let mut tail = VecDeque::with_capacity(keep);
    while let Ok(Some(line)) = lines.next_line().await {
        debug!(target: "odgrid::worker::stderr", "{}", line);
        if keep == 0 {
            continue;
        }
        if tail.len() == keep {
            tail.pop_front();
        }
        tail.push_back(line);
    }
    tail
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventLevel;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Collecting {
        events: Mutex<Vec<RunEvent>>,
        raw: Mutex<Vec<String>>,
    }

    impl MessageSink for Collecting {
        fn relay(&self, event: &RunEvent) {
            self.events.lock().unwrap().push(event.clone());
        }

        fn relay_raw(&self, line: &str) {
            self.raw.lock().unwrap().push(line.to_string());
        }
    }

    #[tokio::test]
    async fn test_relay_events_and_malformed_lines() {
        let first = RunEvent::new(EventLevel::Info, "Planned 2 chunks").to_line().unwrap();
        let second = RunEvent::new(EventLevel::Warning, "Chunk 1 failed").to_line().unwrap();
        let input = format!("{}\nnot an event\n\n{}\n", first, second);

        let sink = Collecting::default();
        let relayed = relay_events(input.as_bytes(), &sink).await.unwrap();

        assert_eq!(relayed.events, 2);
        assert_eq!(relayed.malformed, 1);
        assert!(relayed.summary.is_none());
        assert_eq!(sink.raw.lock().unwrap().as_slice(), ["not an event"]);
        let events = sink.events.lock().unwrap();
        assert_eq!(events[1].level, EventLevel::Warning);
    }

    #[tokio::test]
    async fn test_stderr_tail_is_bounded() {
        let input: String = (0..10).map(|i| format!("line {}\n", i)).collect();
        let tail = drain_stderr(input.as_bytes(), 3).await;
        assert_eq!(tail, ["line 7", "line 8", "line 9"]);
    }

    #[cfg(unix)]
    mod process {
        use super::*;
        use crate::testing::fixtures;
        use tempfile::TempDir;

        fn orchestrator(script: &str, sink: Arc<Collecting>) -> Orchestrator {
            let config = OrchestratorConfig {
                worker_program: Some("sh".into()),
                worker_args: vec!["-c".to_string(), script.to_string()],
                stderr_tail_lines: 5,
            };
            Orchestrator::new(config).with_sink(sink)
        }

        #[tokio::test]
        async fn test_worker_failure_carries_stderr() {
            let dir = TempDir::new().unwrap();
            let config = fixtures::run_config(dir.path());
            let sink = Arc::new(Collecting::default());
            let script = r#"echo '{"version":1,"level":"info","message":"starting","timestamp":"2026-01-01T00:00:00Z"}'; echo 'boom' >&2; exit 1"#;

            let err = orchestrator(script, Arc::clone(&sink))
                .run(&config)
                .await
                .unwrap_err();
            match err {
                OrchestratorError::WorkerFailed { code, stderr_tail } => {
                    assert_eq!(code, Some(1));
                    assert!(stderr_tail.contains("boom"));
                }
                other => panic!("unexpected error: {other}"),
            }
            assert_eq!(sink.events.lock().unwrap()[0].message, "starting");
        }

        #[tokio::test]
        async fn test_worker_receives_bundle() {
            let dir = TempDir::new().unwrap();
            let config = fixtures::run_config(dir.path());
            for path in config.output.paths() {
                std::fs::write(path, "").unwrap();
            }
            let sink = Arc::new(Collecting::default());
            // $0 is "--bundle", $1 the bundle path.
            let script = r#"test "$0" = "--bundle" && test -f "$1" && grep -q config_hash "$1""#;

            let report = orchestrator(script, sink).run(&config).await.unwrap();
            assert_eq!(report.events_relayed, 0);
            assert!(report.summary.is_none());
            // Bundle removed afterwards.
            let leftovers = std::fs::read_dir(&config.output.scratch_dir)
                .unwrap()
                .filter_map(Result::ok)
                .filter(|e| e.file_name().to_string_lossy().starts_with("bundle_"))
                .count();
            assert_eq!(leftovers, 0);
        }

        #[tokio::test]
        async fn test_missing_output_after_success() {
            let dir = TempDir::new().unwrap();
            let config = fixtures::run_config(dir.path());
            let sink = Arc::new(Collecting::default());

            let err = orchestrator("exit 0", sink).run(&config).await.unwrap_err();
            assert!(matches!(err, OrchestratorError::MissingOutput(_)));
        }

        #[tokio::test]
        async fn test_aborted_exit_code() {
            let dir = TempDir::new().unwrap();
            let config = fixtures::run_config(dir.path());
            let sink = Arc::new(Collecting::default());

            let err = orchestrator("exit 2", sink).run(&config).await.unwrap_err();
            assert!(matches!(err, OrchestratorError::Aborted { summary: None, .. }));
        }
    }
}
