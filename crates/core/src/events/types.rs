use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::EventError;
use crate::pool::FailedChunk;

/// Schema version written into every event.
pub const EVENT_VERSION: u32 = 1;

/// Severity of a run event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl EventLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for EventLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Completed,
    Aborted,
}

/// Final counters of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_state: RunState,
    pub chunks_total: usize,
    pub chunks_succeeded: usize,
    pub chunks_failed: usize,
    pub chunks_skipped: usize,
    /// OD lines written.
    pub pairs_found: u64,
    pub retries: u32,
    pub failed_chunks: Vec<FailedChunk>,
    pub origins_written: u64,
    pub destinations_written: u64,
}

/// One line of the worker's event stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunEvent {
    pub version: u32,
    pub level: EventLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    /// Fraction of chunks finished, 0.0 to 1.0.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f32>,
    /// Present on the final event of a run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<RunSummary>,
}

impl RunEvent {
    pub fn new(level: EventLevel, message: impl Into<String>) -> Self {
        Self {
            version: EVENT_VERSION,
            level,
            message: message.into(),
            timestamp: Utc::now(),
            progress: None,
            summary: None,
        }
    }

    pub fn with_progress(mut self, progress: f32) -> Self {
        self.progress = Some(progress.clamp(0.0, 1.0));
        self
    }

    pub fn with_summary(mut self, summary: RunSummary) -> Self {
        self.summary = Some(summary);
        self
    }

    /// Parses one stream line strictly.
    pub fn parse_line(line: &str) -> Result<Self, EventError> {
        let event: RunEvent =
            serde_json::from_str(line.trim()).map_err(|e| EventError::Parse(e.to_string()))?;
        if event.version != EVENT_VERSION {
            return Err(EventError::UnsupportedVersion(event.version));
        }
        Ok(event)
    }

    /// Serializes to a single line, without the trailing newline.
    pub fn to_line(&self) -> Result<String, EventError> {
        serde_json::to_string(self).map_err(|e| EventError::Parse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_round_trip_with_summary() {
        let summary = RunSummary {
            run_state: RunState::Completed,
            chunks_total: 3,
            chunks_succeeded: 2,
            chunks_failed: 1,
            chunks_skipped: 0,
            pairs_found: 42,
            retries: 2,
            failed_chunks: vec![],
            origins_written: 5,
            destinations_written: 7,
        };
        let event = RunEvent::new(EventLevel::Info, "Run finished").with_summary(summary);
        let line = event.to_line().unwrap();
        assert!(!line.contains('\n'));
        assert!(line.contains(r#""level":"info""#));

        let parsed = RunEvent::parse_line(&line).unwrap();
        assert_eq!(parsed, event);
    }

    #[test]
    fn test_parse_is_strict() {
        let unknown_field = r#"{"version":1,"level":"info","message":"m","timestamp":"2026-01-01T00:00:00Z","extra":1}"#;
        assert!(matches!(
            RunEvent::parse_line(unknown_field),
            Err(EventError::Parse(_))
        ));

        let future = r#"{"version":2,"level":"info","message":"m","timestamp":"2026-01-01T00:00:00Z"}"#;
        assert!(matches!(
            RunEvent::parse_line(future),
            Err(EventError::UnsupportedVersion(2))
        ));

        assert!(RunEvent::parse_line("Traceback (most recent call last):").is_err());
    }

    #[test]
    fn test_progress_is_clamped() {
        let event = RunEvent::new(EventLevel::Info, "x").with_progress(1.5);
        assert_eq!(event.progress, Some(1.0));
    }
}
