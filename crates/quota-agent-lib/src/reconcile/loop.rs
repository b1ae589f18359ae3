//! Periodic reconciliation loop
//!
//! Re-reads advisor targets and runs one pass per target on a jittered
//! interval. Shutdown cancels an in-flight pass between containers.

use super::{PassSummary, Reconciler};
use crate::advisor::TargetSource;
use crate::error::ReconcileError;
use crate::health::{components, ComponentHealth, HealthRegistry};
use crate::observability::{ReconcilerMetrics, StructuredLogger};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Configuration for the reconciliation loop
#[derive(Debug, Clone)]
pub struct ReconcileLoopConfig {
    /// Delay between passes (default: 30 seconds)
    pub interval: Duration,
    /// Maximum jitter added to the interval (default: 1 second)
    pub jitter: Duration,
}

impl Default for ReconcileLoopConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            jitter: Duration::from_secs(1),
        }
    }
}

/// Runs reconciliation passes until shutdown
pub struct ReconcileLoop {
    reconciler: Arc<Reconciler>,
    targets: Arc<dyn TargetSource>,
    config: ReconcileLoopConfig,
    metrics: ReconcilerMetrics,
    health: HealthRegistry,
    logger: StructuredLogger,
}

/// Outcome counts of one loop cycle
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct CycleResults {
    pub(crate) targets: usize,
    pub(crate) succeeded: usize,
    pub(crate) failed: usize,
}

impl ReconcileLoop {
    /// Run until `shutdown` fires
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            interval_secs = self.config.interval.as_secs(),
            "Starting reconciliation loop"
        );

        loop {
            let (cancel_tx, cancel_rx) = watch::channel(false);
            let cycle = self.run_cycle(&cancel_rx);
            tokio::pin!(cycle);

            let stop = tokio::select! {
                results = &mut cycle => {
                    debug!(targets = results.targets, failed = results.failed, "Reconciliation cycle complete");
                    false
                }
                _ = shutdown.recv() => {
                    let _ = cancel_tx.send(true);
                    let results = cycle.await;
                    debug!(targets = results.targets, "Reconciliation cycle cancelled");
                    true
                }
            };

            if stop {
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.next_delay()) => {}
                _ = shutdown.recv() => break,
            }
        }

        info!("Shutting down reconciliation loop");
    }

    fn next_delay(&self) -> Duration {
        let jitter_ms = rand_jitter(self.config.jitter.as_millis() as u64);
        self.config.interval + Duration::from_millis(jitter_ms)
    }

    /// Fetch the advisor targets and reconcile each of them
    pub(crate) async fn run_cycle(&self, cancel: &watch::Receiver<bool>) -> CycleResults {
        let mut results = CycleResults::default();

        let targets = match self.targets.targets().await {
            Ok(targets) => {
                self.health
                    .update(components::ADVISOR, ComponentHealth::healthy())
                    .await;
                targets
            }
            Err(e) => {
                warn!(error = %e, "Failed to load advisor targets");
                self.health
                    .update(components::ADVISOR, ComponentHealth::unhealthy(e.to_string()))
                    .await;
                return results;
            }
        };

        // Health reflects the worst pass of the cycle, not the last one.
        let mut worst: Option<Result<PassSummary, ReconcileError>> = None;

        for info in &targets {
            if *cancel.borrow() {
                break;
            }
            results.targets += 1;

            let start = Instant::now();
            let outcome = self.reconciler.reconcile_calculation(info, cancel).await;
            self.metrics
                .observe_pass_latency(start.elapsed().as_secs_f64());
            self.metrics.record_pass(&outcome);
            self.logger.log_pass(&info.cgroup_path, &outcome);

            match outcome {
                Ok(_) => results.succeeded += 1,
                Err(_) => results.failed += 1,
            }

            let replace = worst
                .as_ref()
                .map_or(true, |w| severity(&outcome) > severity(w));
            if replace {
                worst = Some(outcome);
            }
        }

        if let Some(outcome) = worst {
            self.health.record_pass(&outcome).await;
        }

        results
    }
}

/// Rank pass outcomes for health reporting
fn severity(outcome: &Result<PassSummary, ReconcileError>) -> u8 {
    match outcome {
        Ok(_) => 0,
        Err(ReconcileError::PartialFailure { .. }) => 1,
        Err(_) => 2,
    }
}

/// Generate a pseudo-random jitter value between 0 and max_ms
fn rand_jitter(max_ms: u64) -> u64 {
    if max_ms == 0 {
        return 0;
    }

    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64;

    now % max_ms
}

/// Builder for the reconciliation loop
pub struct ReconcileLoopBuilder {
    reconciler: Option<Arc<Reconciler>>,
    targets: Option<Arc<dyn TargetSource>>,
    health: Option<HealthRegistry>,
    node_name: String,
    config: ReconcileLoopConfig,
}

impl ReconcileLoopBuilder {
    pub fn new() -> Self {
        Self {
            reconciler: None,
            targets: None,
            health: None,
            node_name: "unknown".to_string(),
            config: ReconcileLoopConfig::default(),
        }
    }

    pub fn reconciler(mut self, reconciler: Arc<Reconciler>) -> Self {
        self.reconciler = Some(reconciler);
        self
    }

    pub fn targets(mut self, targets: Arc<dyn TargetSource>) -> Self {
        self.targets = Some(targets);
        self
    }

    /// Share a health registry (a private one is created otherwise)
    pub fn health(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    pub fn node_name(mut self, node_name: impl Into<String>) -> Self {
        self.node_name = node_name.into();
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.config.interval = interval;
        self
    }

    pub fn jitter(mut self, jitter: Duration) -> Self {
        self.config.jitter = jitter;
        self
    }

    pub fn build(self) -> Result<ReconcileLoop> {
        let reconciler = self
            .reconciler
            .ok_or_else(|| anyhow::anyhow!("Reconciler is required"))?;
        let targets = self
            .targets
            .ok_or_else(|| anyhow::anyhow!("Target source is required"))?;

        Ok(ReconcileLoop {
            reconciler,
            targets,
            config: self.config,
            metrics: ReconcilerMetrics::new(),
            health: self.health.unwrap_or_default(),
            logger: StructuredLogger::new(self.node_name),
        })
    }
}

impl Default for ReconcileLoopBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loop_config_default() {
        let config = ReconcileLoopConfig::default();
        assert_eq!(config.interval, Duration::from_secs(30));
        assert_eq!(config.jitter, Duration::from_secs(1));
    }

    #[test]
    fn test_rand_jitter() {
        assert!(rand_jitter(1000) < 1000);
        assert_eq!(rand_jitter(0), 0);
    }

    #[test]
    fn test_severity_orders_outcomes() {
        let ok: Result<PassSummary, ReconcileError> = Ok(PassSummary::default());
        let partial = Err(ReconcileError::PartialFailure {
            failures: vec![],
            summary: PassSummary::default(),
        });
        let invalid = Err(ReconcileError::InvalidTarget("bad".to_string()));

        assert!(severity(&ok) < severity(&partial));
        assert!(severity(&partial) < severity(&invalid));
    }

    #[test]
    fn test_builder_requires_reconciler() {
        assert!(ReconcileLoopBuilder::new().build().is_err());
    }
}
