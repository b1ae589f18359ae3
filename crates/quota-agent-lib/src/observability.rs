//! Observability infrastructure for the quota agent
//!
//! Provides:
//! - Prometheus metrics (pass latency, quota writes, failures, stale cgroups)
//! - Structured JSON logging with tracing

use crate::error::ReconcileError;
use crate::reconcile::PassSummary;
use prometheus::{
    register_histogram, register_int_counter, register_int_gauge, Histogram, IntCounter, IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for pass latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<ReconcilerMetricsInner> = OnceLock::new();

struct ReconcilerMetricsInner {
    pass_latency_seconds: Histogram,
    passes: IntCounter,
    pass_errors: IntCounter,
    quota_writes: IntCounter,
    enforcement_failures: IntCounter,
    stale_directories: IntCounter,
    unresolved_containers: IntCounter,
    containers_reconciled: IntGauge,
}

impl ReconcilerMetricsInner {
    fn new() -> Self {
        Self {
            pass_latency_seconds: register_histogram!(
                "quota_agent_pass_latency_seconds",
                "Time spent in one reconciliation pass",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register pass_latency_seconds"),

            passes: register_int_counter!(
                "quota_agent_passes_total",
                "Reconciliation passes run"
            )
            .expect("Failed to register passes_total"),

            pass_errors: register_int_counter!(
                "quota_agent_pass_errors_total",
                "Reconciliation passes aborted before enforcing anything"
            )
            .expect("Failed to register pass_errors_total"),

            quota_writes: register_int_counter!(
                "quota_agent_quota_writes_total",
                "Container cpu quota writes that succeeded"
            )
            .expect("Failed to register quota_writes_total"),

            enforcement_failures: register_int_counter!(
                "quota_agent_enforcement_failures_total",
                "Container cpu quota reads or writes that failed"
            )
            .expect("Failed to register enforcement_failures_total"),

            stale_directories: register_int_counter!(
                "quota_agent_stale_directories_total",
                "Cgroup directories skipped because no pod owns them"
            )
            .expect("Failed to register stale_directories_total"),

            unresolved_containers: register_int_counter!(
                "quota_agent_unresolved_containers_total",
                "Containers skipped because their cgroup could not be resolved"
            )
            .expect("Failed to register unresolved_containers_total"),

            containers_reconciled: register_int_gauge!(
                "quota_agent_containers_reconciled",
                "Containers whose quota was written in the last pass"
            )
            .expect("Failed to register containers_reconciled"),
        }
    }
}

/// Handle to the global reconciler metrics; clones share the collectors
#[derive(Clone)]
pub struct ReconcilerMetrics {
    _private: (),
}

impl Default for ReconcilerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ReconcilerMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(ReconcilerMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &ReconcilerMetricsInner {
        GLOBAL_METRICS.get_or_init(ReconcilerMetricsInner::new)
    }

    pub fn observe_pass_latency(&self, duration_secs: f64) {
        self.inner().pass_latency_seconds.observe(duration_secs);
    }

    /// Record the outcome of one pass
    pub fn record_pass(&self, outcome: &Result<PassSummary, ReconcileError>) {
        let inner = self.inner();
        inner.passes.inc();

        let summary = match outcome {
            Ok(summary) => summary,
            Err(ReconcileError::PartialFailure { summary, .. }) => summary,
            Err(_) => {
                inner.pass_errors.inc();
                return;
            }
        };

        inner.quota_writes.inc_by(summary.containers_enforced as u64);
        inner
            .enforcement_failures
            .inc_by(summary.enforcement_failures as u64);
        inner.stale_directories.inc_by(summary.stale_directories as u64);
        inner
            .unresolved_containers
            .inc_by(summary.containers_unresolved as u64);
        inner
            .containers_reconciled
            .set(summary.containers_enforced as i64);
    }
}

/// Structured logger for agent events
#[derive(Clone)]
pub struct StructuredLogger {
    node_name: String,
}

impl StructuredLogger {
    pub fn new(node_name: impl Into<String>) -> Self {
        Self {
            node_name: node_name.into(),
        }
    }

    /// Log the outcome of a pass for one advisor target
    pub fn log_pass(&self, cgroup_path: &str, outcome: &Result<PassSummary, ReconcileError>) {
        match outcome {
            Ok(summary) => {
                info!(
                    event = "pass_completed",
                    node = %self.node_name,
                    cgroup_path = %cgroup_path,
                    skipped_unified = summary.skipped_unified,
                    pods = summary.pods_reconciled,
                    containers = summary.containers_enforced,
                    stale_directories = summary.stale_directories,
                    cancelled = summary.cancelled,
                    "Reconciliation pass completed"
                );
            }
            Err(ReconcileError::PartialFailure { failures, summary }) => {
                for failure in failures {
                    warn!(
                        event = "quota_enforcement_failed",
                        node = %self.node_name,
                        cgroup_path = %cgroup_path,
                        pod = %failure.pod,
                        container = %failure.container,
                        relative_path = %failure.relative_path,
                        error = %failure.source,
                        "Container quota enforcement failed"
                    );
                }
                warn!(
                    event = "pass_partially_failed",
                    node = %self.node_name,
                    cgroup_path = %cgroup_path,
                    containers = summary.containers_enforced,
                    failed = summary.enforcement_failures,
                    "Reconciliation pass completed with failures"
                );
            }
            Err(e) => {
                warn!(
                    event = "pass_failed",
                    node = %self.node_name,
                    cgroup_path = %cgroup_path,
                    error = %e,
                    "Reconciliation pass failed"
                );
            }
        }
    }

    /// Log agent startup
    pub fn log_startup(&self, version: &str, cgroup_driver: &str) {
        info!(
            event = "agent_started",
            node = %self.node_name,
            agent_version = %version,
            cgroup_driver = %cgroup_driver,
            "Quota agent started"
        );
    }

    /// Log agent shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "agent_shutdown",
            node = %self.node_name,
            reason = %reason,
            "Quota agent shutting down"
        );
    }
}
