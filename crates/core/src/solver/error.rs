//! Error types for the solver module.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// How a failed solve should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveErrorKind {
    /// Worth retrying: timeouts, throttling, a crashed engine process.
    Transient,
    /// Retrying cannot help: bad travel mode, licensing, exhausted quota.
    Permanent,
}

impl fmt::Display for SolveErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transient => f.write_str("transient"),
            Self::Permanent => f.write_str("permanent"),
        }
    }
}

/// A failed chunk solve, classified by the adapter.
#[derive(Debug, Clone, Error)]
#[error("{kind} solve failure: {detail}")]
pub struct SolveError {
    pub kind: SolveErrorKind,
    pub detail: String,
}

impl SolveError {
    /// Creates a transient error.
    pub fn transient(detail: impl Into<String>) -> Self {
        Self {
            kind: SolveErrorKind::Transient,
            detail: detail.into(),
        }
    }

    /// Creates a permanent error.
    pub fn permanent(detail: impl Into<String>) -> Self {
        Self {
            kind: SolveErrorKind::Permanent,
            detail: detail.into(),
        }
    }

    /// Whether this error is retryable.
    pub fn is_retryable(&self) -> bool {
        self.kind == SolveErrorKind::Transient
    }
}
