//! Mapping from pod cgroup directories to pod descriptors

use crate::cgroup::{CgroupPathConvention, Subsystem};
use crate::error::ReconcileError;
use crate::inventory::PodInventory;
use crate::models::PodDescriptor;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Pods keyed by their absolute CPU cgroup path
///
/// Rebuilt from the inventory on every pass.
#[derive(Debug, Default)]
pub struct PodPathIndex {
    pods: HashMap<PathBuf, PodDescriptor>,
}

impl PodPathIndex {
    pub fn get(&self, absolute_path: &Path) -> Option<&PodDescriptor> {
        self.pods.get(absolute_path)
    }

    pub fn len(&self) -> usize {
        self.pods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pods.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &PathBuf> {
        self.pods.keys()
    }

    /// Insert a pod, keeping the first pod seen for a given path
    fn insert(&mut self, path: PathBuf, pod: PodDescriptor) {
        match self.pods.entry(path) {
            Entry::Occupied(existing) => {
                warn!(
                    path = %existing.key().display(),
                    kept = %existing.get().key(),
                    dropped = %pod.key(),
                    "Two pods map to the same cgroup path"
                );
            }
            Entry::Vacant(slot) => {
                slot.insert(pod);
            }
        }
    }
}

/// Query the inventory and key every pod by its computed cgroup path
///
/// Pods whose path cannot be computed are left out.
pub async fn build_pod_path_index(
    inventory: &dyn PodInventory,
    paths: &dyn CgroupPathConvention,
    timeout: Duration,
) -> Result<PodPathIndex, ReconcileError> {
    let pods = tokio::time::timeout(timeout, inventory.list_pods())
        .await
        .map_err(|_| ReconcileError::Timeout {
            operation: "pod inventory query",
            timeout,
        })?
        .map_err(|e| ReconcileError::upstream("pod inventory query failed", e))?;

    let mut index = PodPathIndex::default();

    for pod in pods {
        match paths.pod_absolute_path(Subsystem::Cpu, &pod) {
            Ok(path) => index.insert(path, pod),
            Err(e) => {
                warn!(pod = %pod.key(), error = %e, "Skipping pod without a cgroup path");
            }
        }
    }

    debug!(pods = index.len(), "Built pod path index");
    Ok(index)
}
