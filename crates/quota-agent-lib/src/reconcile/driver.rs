//! Reconciliation pass over a pod cgroup subtree

use super::{
    build_container_path_map, build_pod_path_index, list_subdirectories, resolve_pod_dir,
    QuotaEnforcer,
};
use crate::cgroup::{CgroupCpu, CgroupPathConvention, Subsystem};
use crate::error::{EnforcementFailure, ReconcileError};
use crate::inventory::{ContainerIdResolver, PodInventory, PodStatusResolver};
use crate::models::{CalculationInfo, CgroupResources};
use anyhow::Result;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

/// Default deadline for inventory and container runtime calls
pub const DEFAULT_COLLABORATOR_TIMEOUT: Duration = Duration::from_secs(5);

/// Counters describing one reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PassSummary {
    /// The node runs the unified hierarchy, nothing was done
    pub skipped_unified: bool,
    pub directories_scanned: usize,
    /// Directories with no matching pod
    pub stale_directories: usize,
    pub pods_reconciled: usize,
    pub containers_unresolved: usize,
    pub containers_enforced: usize,
    pub enforcement_failures: usize,
    /// The pass stopped early on shutdown
    pub cancelled: bool,
}

/// Drives reconciliation passes against the legacy cgroup hierarchy
pub struct Reconciler {
    inventory: Arc<dyn PodInventory>,
    resolver: Arc<dyn ContainerIdResolver>,
    paths: Arc<dyn CgroupPathConvention>,
    cgroup: Arc<dyn CgroupCpu>,
    enforcer: QuotaEnforcer,
    collaborator_timeout: Duration,
    /// Serializes passes so reads and writes of a cgroup never interleave
    pass_lock: Mutex<()>,
}

impl Reconciler {
    pub fn builder() -> ReconcilerBuilder {
        ReconcilerBuilder::new()
    }

    /// Run one pass for the pods below `subtree_root`
    ///
    /// `subtree_root` is relative to the CPU subsystem mount. Per-directory
    /// and per-container problems never abort the pass; failed writes are
    /// collected into [`ReconcileError::PartialFailure`].
    pub async fn reconcile(
        &self,
        subtree_root: &str,
        target: &CgroupResources,
        shutdown: &watch::Receiver<bool>,
    ) -> Result<PassSummary, ReconcileError> {
        let _guard = self.pass_lock.lock().await;
        let mut summary = PassSummary::default();

        if self.cgroup.is_unified().await {
            debug!(subtree_root = %subtree_root, "Unified cgroup hierarchy, skipping legacy reconciliation");
            summary.skipped_unified = true;
            return Ok(summary);
        }

        if target.cpu_quota == 0 {
            debug!(subtree_root = %subtree_root, "Target carries no cpu quota");
            return Ok(summary);
        }

        let subtree_path = self.paths.absolute_path(Subsystem::Cpu, subtree_root);
        let (index, dirs) = tokio::try_join!(
            build_pod_path_index(
                self.inventory.as_ref(),
                self.paths.as_ref(),
                self.collaborator_timeout
            ),
            list_subdirectories(&subtree_path),
        )?;
        summary.directories_scanned = dirs.len();

        let mut failures = Vec::new();

        'dirs: for dir in &dirs {
            if is_cancelled(shutdown) {
                summary.cancelled = true;
                break;
            }

            let pod_match = match resolve_pod_dir(subtree_root, dir, &index, self.paths.as_ref()) {
                Ok(pod_match) => pod_match,
                Err(e) => {
                    debug!(dir = %dir, error = %e, "Skipping cgroup directory");
                    summary.stale_directories += 1;
                    continue;
                }
            };
            let pod = pod_match.pod;

            let containers = build_container_path_map(
                pod,
                self.resolver.as_ref(),
                self.paths.as_ref(),
                self.collaborator_timeout,
            )
            .await;
            summary.pods_reconciled += 1;
            summary.containers_unresolved += pod.containers.len().saturating_sub(containers.len());

            for (relative_path, container) in &containers {
                if is_cancelled(shutdown) {
                    summary.cancelled = true;
                    break 'dirs;
                }

                match self
                    .enforcer
                    .enforce(relative_path, &container.resources, target)
                    .await
                {
                    Ok(applied) => {
                        summary.containers_enforced += 1;
                        debug!(
                            pod = %pod.key(),
                            pod_path = %pod_match.relative_path(),
                            container = %container.name,
                            cpu_quota = applied.cpu_quota,
                            cpu_period = applied.cpu_period,
                            "Container quota enforced"
                        );
                    }
                    Err(source) => {
                        warn!(
                            pod = %pod.key(),
                            container = %container.name,
                            relative_path = %relative_path,
                            error = %source,
                            "Container quota enforcement failed"
                        );
                        failures.push(EnforcementFailure {
                            pod: pod.key(),
                            container: container.name.clone(),
                            relative_path: relative_path.clone(),
                            source,
                        });
                    }
                }
            }
        }

        summary.enforcement_failures = failures.len();
        info!(
            subtree_root = %subtree_root,
            directories = summary.directories_scanned,
            stale = summary.stale_directories,
            pods = summary.pods_reconciled,
            enforced = summary.containers_enforced,
            failed = summary.enforcement_failures,
            cancelled = summary.cancelled,
            "Reconciliation pass finished"
        );

        if failures.is_empty() {
            Ok(summary)
        } else {
            Err(ReconcileError::PartialFailure { failures, summary })
        }
    }

    /// Run a pass for an advisor calculation
    pub async fn reconcile_calculation(
        &self,
        info: &CalculationInfo,
        shutdown: &watch::Receiver<bool>,
    ) -> Result<PassSummary, ReconcileError> {
        let target = info
            .cgroup_resources()
            .map_err(|e| ReconcileError::InvalidTarget(format!("{}: {}", info.cgroup_path, e)))?;

        match target {
            Some(target) => self.reconcile(&info.cgroup_path, &target, shutdown).await,
            None => {
                debug!(cgroup_path = %info.cgroup_path, "Advisor sent no cgroup config");
                Ok(PassSummary::default())
            }
        }
    }
}

fn is_cancelled(shutdown: &watch::Receiver<bool>) -> bool {
    *shutdown.borrow()
}

/// Builder wiring the collaborators of a [`Reconciler`]
pub struct ReconcilerBuilder {
    inventory: Option<Arc<dyn PodInventory>>,
    resolver: Option<Arc<dyn ContainerIdResolver>>,
    paths: Option<Arc<dyn CgroupPathConvention>>,
    cgroup: Option<Arc<dyn CgroupCpu>>,
    collaborator_timeout: Duration,
}

impl ReconcilerBuilder {
    pub fn new() -> Self {
        Self {
            inventory: None,
            resolver: None,
            paths: None,
            cgroup: None,
            collaborator_timeout: DEFAULT_COLLABORATOR_TIMEOUT,
        }
    }

    /// Set the pod inventory
    pub fn inventory(mut self, inventory: Arc<dyn PodInventory>) -> Self {
        self.inventory = Some(inventory);
        self
    }

    /// Set the container id resolver (defaults to pod status lookup)
    pub fn resolver(mut self, resolver: Arc<dyn ContainerIdResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Set the cgroup path convention
    pub fn paths(mut self, paths: Arc<dyn CgroupPathConvention>) -> Self {
        self.paths = Some(paths);
        self
    }

    /// Set the cgroup cpu interface
    pub fn cgroup(mut self, cgroup: Arc<dyn CgroupCpu>) -> Self {
        self.cgroup = Some(cgroup);
        self
    }

    /// Set the deadline for inventory and runtime calls
    pub fn collaborator_timeout(mut self, timeout: Duration) -> Self {
        self.collaborator_timeout = timeout;
        self
    }

    pub fn build(self) -> Result<Reconciler> {
        let inventory = self
            .inventory
            .ok_or_else(|| anyhow::anyhow!("Pod inventory is required"))?;
        let paths = self
            .paths
            .ok_or_else(|| anyhow::anyhow!("Cgroup path convention is required"))?;
        let cgroup = self
            .cgroup
            .ok_or_else(|| anyhow::anyhow!("Cgroup interface is required"))?;
        let resolver = self
            .resolver
            .unwrap_or_else(|| Arc::new(PodStatusResolver) as Arc<dyn ContainerIdResolver>);

        Ok(Reconciler {
            inventory,
            resolver,
            paths,
            enforcer: QuotaEnforcer::new(cgroup.clone()),
            cgroup,
            collaborator_timeout: self.collaborator_timeout,
            pass_lock: Mutex::new(()),
        })
    }
}

impl Default for ReconcilerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
