//! Typed failures recorded on the error stream.
//!
//! Only [`Failure::Critical`] aborts a run, and only the ramp-up phase
//! raises it. Everything else is recorded and the workflow carries on.

use std::fmt;

use serde::Serialize;

/// Category of a [`Failure`], used for per-kind counts in the tally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Critical,
    InvalidStatus,
    Application,
    StaticResource,
    Transport,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::Critical => "critical",
            FailureKind::InvalidStatus => "invalid_status",
            FailureKind::Application => "application",
            FailureKind::StaticResource => "static_resource",
            FailureKind::Transport => "transport",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Failure {
    /// Setup-phase failure; aborts the run.
    #[error("critical: {0}")]
    Critical(String),

    /// Response status outside the allowed set for the call.
    #[error("unexpected status for {method} {path}: expected {expected:?}, got {actual}")]
    InvalidStatus {
        method: String,
        path: String,
        expected: Vec<u16>,
        actual: u16,
    },

    /// Response content disagrees with the reference model.
    #[error("application mismatch: {0}")]
    Application(String),

    /// A static asset was missing or failed its digest check.
    #[error("static resource: {0}")]
    StaticResource(String),

    /// The request never produced a status (connection refused, undecodable reply).
    #[error("transport: {0}")]
    Transport(String),
}

impl Failure {
    pub fn kind(&self) -> FailureKind {
        match self {
            Failure::Critical(_) => FailureKind::Critical,
            Failure::InvalidStatus { .. } => FailureKind::InvalidStatus,
            Failure::Application(_) => FailureKind::Application,
            Failure::StaticResource(_) => FailureKind::StaticResource,
            Failure::Transport(_) => FailureKind::Transport,
        }
    }

    pub fn application(message: impl Into<String>) -> Self {
        Failure::Application(message.into())
    }

    pub fn critical(message: impl Into<String>) -> Self {
        Failure::Critical(message.into())
    }

    pub fn is_critical(&self) -> bool {
        matches!(self, Failure::Critical(_))
    }
}
