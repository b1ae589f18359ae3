//! Error types for cgroup access and reconciliation passes

use crate::reconcile::PassSummary;
use std::path::PathBuf;
use std::time::Duration;

/// Failure talking to the cgroup kernel interface
#[derive(thiserror::Error, Debug)]
pub enum CgroupError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unexpected value {value:?} in {path}")]
    Parse { path: PathBuf, value: String },
}

/// A quota write that failed for a single container
#[derive(thiserror::Error, Debug)]
#[error("pod {pod} container {container} ({relative_path}): {source}")]
pub struct EnforcementFailure {
    pub pod: String,
    pub container: String,
    pub relative_path: String,
    #[source]
    pub source: CgroupError,
}

/// Errors surfaced by a reconciliation pass
#[derive(thiserror::Error, Debug)]
pub enum ReconcileError {
    #[error("{context}: {source:#}")]
    Upstream {
        context: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },
    #[error("no pod maps to cgroup {}", path.display())]
    NotFound { path: PathBuf },
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid advisor target: {0}")]
    InvalidTarget(String),
    #[error("{} container(s) failed quota enforcement: {}", failures.len(), join_failures(failures))]
    PartialFailure {
        failures: Vec<EnforcementFailure>,
        summary: PassSummary,
    },
}

impl ReconcileError {
    pub fn upstream(context: impl Into<String>, source: anyhow::Error) -> Self {
        Self::Upstream {
            context: context.into(),
            source,
        }
    }

    /// True for routine mapping misses that callers skip
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

fn join_failures(failures: &[EnforcementFailure]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
